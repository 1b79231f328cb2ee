// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for filter trees deserialized from JSON

#![no_main]

use libfuzzer_sys::fuzz_target;
use quarry_query::{Document, Filter};

fuzz_target!(|data: &[u8]| {
    let Ok(filter) = serde_json::from_slice::<Filter>(data) else {
        return;
    };
    if filter.validate("filter").is_err() {
        return;
    }

    let doc = Document::new()
        .with_value("price", serde_json::json!(150))
        .with_value("category", serde_json::json!("electronics"))
        .with_value("tags", serde_json::json!(["a", "b"]));
    let _ = filter.evaluate(&doc);
});
