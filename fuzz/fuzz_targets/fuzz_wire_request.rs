// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for wire request decoding, validation and evaluation

#![no_main]

use libfuzzer_sys::fuzz_target;
use prost::Message;
use quarry_proto::proto;
use quarry_query::{Document, Engine, Request};

fuzz_target!(|data: &[u8]| {
    let Ok(wire) = proto::Request::decode(data) else {
        return;
    };
    // Conversion must reject malformed input with an error, never a panic
    let Ok(request) = Request::try_from(wire) else {
        return;
    };

    let doc = Document::new()
        .with_value("id", serde_json::json!(1))
        .with_value("price", serde_json::json!(150))
        .with_value("title", serde_json::json!("red wool scarf"))
        .with_value("tags", serde_json::json!(["winter", "wool"]))
        .with_value("lat", serde_json::json!(51.5))
        .with_value("lng", serde_json::json!(-0.12))
        .with_raw("broken", b"{not json".to_vec());

    let _ = Engine::default().evaluate(&request, &doc);
});
