// crates/scout-cli/src/output.rs
// ============================================================================
// Module: CLI Output
// Description: Line-delimited JSON writer for stdout.
// Purpose: Give every command one place to emit machine-readable results,
//          keeping `run_id` present at the top level (spec.md §6).
// Dependencies: serde_json
// ============================================================================

use scout_core::RunId;
use serde_json::Value;
use serde_json::json;

/// Writes one compact JSON object to stdout, with `run_id` always present
/// at the top level.
pub fn emit(run_id: RunId, payload: Value) {
    println!("{}", with_run_id(run_id, payload));
}

/// Writes one compact JSON object with no `run_id` (`doctor`, which has no
/// associated run).
pub fn emit_plain(payload: Value) {
    println!("{payload}");
}

/// Stamps `run_id` onto `payload`'s top level. Object payloads get a
/// `run_id` key merged in; any other payload shape is wrapped under
/// `value` so `run_id` is always present at the top level either way.
fn with_run_id(run_id: RunId, mut payload: Value) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("run_id".to_string(), Value::String(run_id.to_string()));
        payload
    } else {
        json!({"run_id": run_id.to_string(), "value": payload})
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn with_run_id_merges_into_an_object_payload() {
        let run_id = RunId::new();
        let payload = json!({"files_written": 4});
        let stamped = with_run_id(run_id, payload);
        assert_eq!(stamped["run_id"], run_id.to_string());
        assert_eq!(stamped["files_written"], 4);
    }

    #[test]
    fn with_run_id_wraps_a_non_object_payload() {
        let run_id = RunId::new();
        let stamped = with_run_id(run_id, Value::String("ok".to_string()));
        assert_eq!(stamped["run_id"], run_id.to_string());
        assert_eq!(stamped["value"], "ok");
    }
}
