use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};

// ============================================================================
// Wire Models
// ============================================================================
//
// Shapes exchanged with the bridge service:
// - Snapshot        -> POST /snapshot
// - WireCommand     <- GET /commands, GET /commands/stream
// - CommandResult   -> POST /commands/{id}/ack
//
// ============================================================================

/// Full-state export of the host. Never a delta.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub state_active: bool,
    pub payload: Value,
}

impl Snapshot {
    pub fn new(state_active: bool, payload: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            state_active,
            payload,
        }
    }
}

/// Command as delivered by the service.
///
/// Every field is optional on the wire so that a malformed command can be
/// reported instead of failing the whole batch decode.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WireCommand {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl WireCommand {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: Some(id.into()),
            kind: Some(kind.into()),
            payload,
        }
    }

    /// Trimmed id, `None` when missing or blank.
    pub fn command_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Batch body of `GET /commands` and of each `commands` stream event.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CommandBatch {
    #[serde(default)]
    pub commands: Vec<WireCommand>,
}

/// Outcome reported to the producer when a command is acknowledged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    /// Failure with the reason cut to at most `max_len` characters.
    pub fn failure(reason: impl Into<String>, max_len: usize) -> Self {
        Self {
            ok: false,
            error: Some(truncate_chars(reason.into(), max_len)),
        }
    }
}

/// Cut a string to `max_len` characters without splitting a code point.
pub fn truncate_chars(mut text: String, max_len: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_len) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_command_tolerates_missing_fields() {
        let batch: CommandBatch =
            serde_json::from_value(json!({ "commands": [{ "type": "next_turn" }, {}] })).unwrap();

        assert_eq!(batch.commands.len(), 2);
        assert_eq!(batch.commands[0].command_id(), None);
        assert_eq!(batch.commands[0].kind.as_deref(), Some("next_turn"));
        assert!(batch.commands[1].payload.is_empty());
    }

    #[test]
    fn test_blank_id_is_treated_as_missing() {
        let cmd = WireCommand::new("   ", "set_hp", json!({}));
        assert_eq!(cmd.command_id(), None);
    }

    #[test]
    fn test_failure_reason_is_truncated_on_char_boundary() {
        let result = CommandResult::failure("héllo wörld", 4);
        assert_eq!(result.error.as_deref(), Some("héll"));
        assert!(!result.ok);
    }

    #[test]
    fn test_success_omits_error_field() {
        let body = serde_json::to_value(CommandResult::success()).unwrap();
        assert_eq!(body, json!({ "ok": true }));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = Snapshot::new(true, json!({ "round": 2 }));
        let body = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(body["stateActive"], json!(true));
        assert_eq!(body["payload"]["round"], json!(2));
        assert!(body["timestamp"].is_string());
    }
}
