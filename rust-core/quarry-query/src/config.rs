// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for one search, in milliseconds.
    pub timeout_ms: u64,
    /// Documents per worker task.
    pub chunk_size: usize,
    /// Page size used when a request asks for 0 results.
    pub default_max_results: u32,
    /// Largest page size a request may ask for.
    pub max_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            chunk_size: 1024,
            default_max_results: 10,
            max_page_size: 1000,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Effective page size for a request.
    pub fn page_size(&self, requested: u32) -> u32 {
        if requested == 0 {
            self.default_max_results
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"chunk_size": 8}"#).unwrap();
        assert_eq!(cfg.chunk_size, 8);
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.default_max_results, 10);
    }

    #[test]
    fn test_page_size_zero_means_default() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.page_size(0), 10);
        assert_eq!(cfg.page_size(3), 3);
    }
}
