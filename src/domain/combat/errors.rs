use super::value_objects::Field;

// ============================================================================
// Command Errors
// ============================================================================
//
// Display strings are what the producer sees in `CommandResult.error`,
// so they stay short and machine-readable.
//
// ============================================================================

/// Malformed command envelope.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing_type")]
    MissingType,
}

/// A command could not be applied to the host.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown_type:{0}")]
    UnknownType(String),

    #[error("missing_field:{0}")]
    MissingField(&'static str),

    #[error("not_numeric:{0}")]
    NotNumeric(&'static str),

    #[error("invalid_field:{0}")]
    InvalidField(String),

    #[error("target_not_found:{0}")]
    TargetNotFound(String),

    #[error("field_unavailable:{0}")]
    FieldUnavailable(Field),

    #[error("no_combatants")]
    NoCombatants,

    #[error("cursor_at_start")]
    CursorAtStart,
}
