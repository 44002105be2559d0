use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ApplyError;

// ============================================================================
// Combat Value Objects
// ============================================================================

/// Numeric combatant field a command may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Hp,
    MaxHp,
    TempHp,
    Initiative,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Hp => "hp",
            Field::MaxHp => "max_hp",
            Field::TempHp => "temp_hp",
            Field::Initiative => "initiative",
        }
    }

    /// Parse a field name, accepting the camelCase spellings the host uses.
    pub fn parse(raw: &str) -> Result<Self, ApplyError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hp" | "value" => Ok(Field::Hp),
            "max_hp" | "maxhp" | "max" => Ok(Field::MaxHp),
            "temp_hp" | "temphp" | "temp" => Ok(Field::TempHp),
            "initiative" => Ok(Field::Initiative),
            _ => Err(ApplyError::InvalidField(raw.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction to move the turn cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    Forward,
    Back,
}

/// Position of the turn cursor after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnPosition {
    pub round: u32,
    pub turn: usize,
}

/// Named condition applied to a combatant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Effect {
    pub id: String,
    pub label: String,
}

impl Effect {
    pub fn condition(label: &str) -> Self {
        let slug: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Self {
            id: format!("condition.{}", slug),
            label: label.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Combatant {
    pub token_id: String,
    pub actor_id: Option<String>,
    pub name: String,
    pub initiative: Option<f64>,
    pub hp: Option<i64>,
    pub max_hp: Option<i64>,
    pub temp_hp: Option<i64>,
    pub effects: Vec<Effect>,
}

impl Combatant {
    pub fn new(token_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            actor_id: None,
            name: name.into(),
            initiative: None,
            hp: None,
            max_hp: None,
            temp_hp: None,
            effects: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_hp(mut self, value: i64, max: i64) -> Self {
        self.hp = Some(value);
        self.max_hp = Some(max);
        self
    }

    pub fn with_initiative(mut self, initiative: f64) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        let wanted = condition.trim();
        self.effects
            .iter()
            .any(|e| e.label.eq_ignore_ascii_case(wanted))
    }
}
