//! Model and result builders
//!
//! Inputs are assembled as JSON with `serde_json::json!` so that they go
//! through the same deserialization as files on disk.

use serde_json::{json, Value};

use merger_resolver_rs::{HypothesesModel, Label, TrackingResult, UniqueId};

/// Hypotheses model from `(timestep, [(label, unique id)])` frames
pub fn model(frames: &[(usize, Vec<(Label, UniqueId)>)]) -> HypothesesModel {
    let mut table = serde_json::Map::new();
    for (t, traxels) in frames {
        let frame: serde_json::Map<String, Value> = traxels
            .iter()
            .map(|(label, uid)| (label.to_string(), json!(uid)))
            .collect();
        table.insert(t.to_string(), Value::Object(frame));
    }
    serde_json::from_value(json!({ "traxelToUniqueId": table, "segmentationHypotheses": [] }))
        .expect("valid model fixture")
}

/// Tracking result from detection values, link values and optional
/// division decisions
pub fn result(
    detections: &[(UniqueId, u32)],
    links: &[(UniqueId, UniqueId)],
    divisions: Option<&[(UniqueId, bool)]>,
) -> TrackingResult {
    let detection_results: Vec<Value> = detections
        .iter()
        .map(|(id, value)| json!({ "id": id, "value": value }))
        .collect();
    let linking_results: Vec<Value> = links
        .iter()
        .map(|(src, dest)| json!({ "src": src, "dest": dest, "value": 1 }))
        .collect();
    let mut root = json!({
        "detectionResults": detection_results,
        "linkingResults": linking_results,
    });
    if let Some(divisions) = divisions {
        root["divisionResults"] = divisions
            .iter()
            .map(|(id, value)| json!({ "id": id, "value": value }))
            .collect();
    }
    serde_json::from_value(root).expect("valid result fixture")
}
