// ============================================================================
// Domain Layer - Host state and command semantics
// ============================================================================
//
// Everything the bridge does to the host goes through the combat module:
// commands are parsed into a closed enum, validated, and applied through
// the CombatHost capability trait.
//
// This layer knows nothing about transports; it only sees one command at
// a time and produces one CommandResult.
//
// ============================================================================

pub mod combat;
