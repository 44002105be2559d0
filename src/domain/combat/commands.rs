use serde_json::{Map, Value};

use super::errors::{ApplyError, ProtocolError};
use super::value_objects::{CursorStep, Field};

// ============================================================================
// Bridge Commands - Closed set of instructions the host understands
// ============================================================================
//
// Wire `type` strings are trimmed and lower-cased, then mapped onto a
// variant. Anything unrecognized becomes `Unknown` carrying the raw type
// so the producer gets a deterministic `unknown_type:<raw>` result.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    SetValue {
        target: String,
        field: Field,
        value: f64,
    },
    AdjustHp {
        target: String,
        delta: f64,
    },
    StepTurn(CursorStep),
    ToggleCondition {
        target: String,
        condition: String,
        active: Option<bool>,
    },
    Unknown(String),
}

impl BridgeCommand {
    /// Build a command from its wire type and payload.
    ///
    /// Payload validation happens here, before any host mutation: numeric
    /// fields must parse to a finite number and targets must be present.
    pub fn parse(raw_type: &str, payload: &Map<String, Value>) -> Result<Self, ApplyError> {
        let normalized = raw_type.trim().to_ascii_lowercase();

        match normalized.as_str() {
            "" => Err(ProtocolError::MissingType.into()),
            "set_value" => {
                let field = match payload.get("field").and_then(Value::as_str) {
                    Some(name) => Field::parse(name)?,
                    None => Field::Hp,
                };
                Ok(BridgeCommand::SetValue {
                    target: target(payload)?,
                    field,
                    value: number(payload, "value")?,
                })
            }
            "set_hp" => Ok(BridgeCommand::SetValue {
                target: target(payload)?,
                field: Field::Hp,
                value: number_with_alias(payload, "hp", "value")?,
            }),
            "set_initiative" => Ok(BridgeCommand::SetValue {
                target: target(payload)?,
                field: Field::Initiative,
                value: number_with_alias(payload, "initiative", "value")?,
            }),
            "adjust_hp" => Ok(BridgeCommand::AdjustHp {
                target: target(payload)?,
                delta: number(payload, "delta")?,
            }),
            "next_turn" => Ok(BridgeCommand::StepTurn(CursorStep::Forward)),
            "prev_turn" | "previous_turn" => Ok(BridgeCommand::StepTurn(CursorStep::Back)),
            "toggle_condition" => {
                let condition = payload
                    .get("condition")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or(ApplyError::MissingField("condition"))?;
                Ok(BridgeCommand::ToggleCondition {
                    target: target(payload)?,
                    condition: condition.to_string(),
                    active: payload.get("active").and_then(Value::as_bool),
                })
            }
            _ => Ok(BridgeCommand::Unknown(raw_type.to_string())),
        }
    }

    /// Stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeCommand::SetValue { .. } => "set_value",
            BridgeCommand::AdjustHp { .. } => "adjust_hp",
            BridgeCommand::StepTurn(CursorStep::Forward) => "next_turn",
            BridgeCommand::StepTurn(CursorStep::Back) => "prev_turn",
            BridgeCommand::ToggleCondition { .. } => "toggle_condition",
            BridgeCommand::Unknown(_) => "unknown",
        }
    }
}

/// Target id, from `target` or the host's `tokenId` spelling.
fn target(payload: &Map<String, Value>) -> Result<String, ApplyError> {
    ["target", "tokenId", "token_id"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(ApplyError::MissingField("target"))
}

fn number_with_alias(
    payload: &Map<String, Value>,
    key: &'static str,
    alias: &'static str,
) -> Result<f64, ApplyError> {
    if payload.contains_key(key) {
        number(payload, key)
    } else {
        number(payload, alias).map_err(|err| match err {
            ApplyError::MissingField(_) => ApplyError::MissingField(key),
            other => other,
        })
    }
}

/// Read a numeric payload field. Strings are accepted if they parse;
/// non-finite results are rejected.
fn number(payload: &Map<String, Value>, key: &'static str) -> Result<f64, ApplyError> {
    let value = payload.get(key).ok_or(ApplyError::MissingField(key))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or(ApplyError::NotNumeric(key))
}
