use serde_json::Value;

use super::errors::ApplyError;
use super::value_objects::{CursorStep, Field, TurnPosition};

// ============================================================================
// Combat Host Port
// ============================================================================
//
// The capability set command handlers are written against. A host adapter
// validates its own state once and hands back plain values, so the
// protocol core never has to null-check its way through host objects.
//
// ============================================================================

/// Canonical handle for a resolved combatant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef(String);

impl TargetRef {
    pub fn new(token_id: impl Into<String>) -> Self {
        Self(token_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated export of host state, ready to wrap in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HostExport {
    pub active: bool,
    pub payload: Value,
}

pub trait CombatHost: Send + Sync {
    /// Find a combatant by token or actor id.
    fn resolve(&self, target: &str) -> Option<TargetRef>;

    fn read_field(&self, target: &TargetRef, field: Field) -> Option<f64>;

    fn write_field(&self, target: &TargetRef, field: Field, value: f64) -> Result<(), ApplyError>;

    /// Advance or rewind the turn cursor.
    fn step_cursor(&self, step: CursorStep) -> Result<TurnPosition, ApplyError>;

    /// Set a named condition; `None` flips it. Returns the resulting state.
    fn set_condition(
        &self,
        target: &TargetRef,
        condition: &str,
        active: Option<bool>,
    ) -> Result<bool, ApplyError>;

    fn export(&self) -> HostExport;
}
