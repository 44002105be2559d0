// ============================================================================
// Combat Domain - Host state driven by bridge commands
// ============================================================================
//
// This module contains ALL combat-specific code:
// - Value objects (Field, CursorStep, Combatant, Effect)
// - Commands (BridgeCommand, parsed from wire commands)
// - Errors (ApplyError, ProtocolError)
// - Host port (CombatHost capability trait, HostExport)
// - Tracker (in-memory CombatHost adapter)
// - Command handler (CommandProcessor)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod host;
pub mod tracker;
pub mod command_handler;

pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use host::*;
pub use tracker::*;
pub use command_handler::*;
