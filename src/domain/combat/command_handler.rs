use std::sync::Arc;
use std::time::Instant;

use crate::messaging::{AckOutcome, BridgeApi};
use crate::metrics::Metrics;
use crate::models::{CommandResult, WireCommand};
use crate::sync::{BridgeSession, StateEvents};

use super::commands::BridgeCommand;
use super::errors::ApplyError;
use super::host::{CombatHost, TargetRef};
use super::value_objects::Field;

// ============================================================================
// Command Processor
// ============================================================================
//
// Orchestrates: WireCommand → BridgeCommand → CombatHost → CommandResult → ack
//
// Two entry points, one per transport:
// - handle_polled:  dedup check, apply, remember on success, then ack.
// - apply_claimed:  the streaming transport already claimed (acked) and
//                   recorded the id, so only the apply step remains.
//
// Failures never escape a single command: they become `ok: false` results.
//
// ============================================================================

/// What `handle_polled` did with a command.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// No id, nothing to acknowledge against.
    Dropped,
    /// Already applied earlier in this session; acked again without re-applying.
    Duplicate(CommandResult),
    Applied(CommandResult),
}

pub struct CommandProcessor {
    host: Arc<dyn CombatHost>,
    api: Arc<dyn BridgeApi>,
    session: Arc<BridgeSession>,
    events: StateEvents,
    metrics: Arc<Metrics>,
    error_max_len: usize,
}

impl CommandProcessor {
    pub fn new(
        host: Arc<dyn CombatHost>,
        api: Arc<dyn BridgeApi>,
        session: Arc<BridgeSession>,
        events: StateEvents,
        metrics: Arc<Metrics>,
        error_max_len: usize,
    ) -> Self {
        Self {
            host,
            api,
            session,
            events,
            metrics,
            error_max_len,
        }
    }

    /// Handle a command fetched by the polling transport.
    pub async fn handle_polled(&self, cmd: &WireCommand) -> HandleOutcome {
        let Some(id) = cmd.command_id() else {
            tracing::warn!(
                command_type = ?cmd.kind,
                "Dropping command without id"
            );
            self.metrics.record_dropped_command();
            return HandleOutcome::Dropped;
        };

        if self.session.seen(id) {
            tracing::info!(
                command_id = %id,
                "⏭️  Command already applied, acknowledging again"
            );
            self.metrics.record_duplicate();
            let result = CommandResult::success();
            self.acknowledge(id, &result).await;
            return HandleOutcome::Duplicate(result);
        }

        let result = self.apply(id, cmd);
        if result.ok {
            self.session.record(id);
        }
        self.acknowledge(id, &result).await;
        HandleOutcome::Applied(result)
    }

    /// Apply a command whose id the caller has already claimed and recorded.
    pub fn apply_claimed(&self, id: &str, cmd: &WireCommand) -> CommandResult {
        let result = self.apply(id, cmd);
        if let Some(ref error) = result.error {
            tracing::warn!(
                command_id = %id,
                error = %error,
                "Claimed command failed to apply; claim already acknowledged"
            );
        }
        result
    }

    fn apply(&self, id: &str, cmd: &WireCommand) -> CommandResult {
        let started = Instant::now();
        let raw_type = cmd.kind.as_deref().unwrap_or("");

        let outcome = BridgeCommand::parse(raw_type, &cmd.payload)
            .and_then(|command| self.dispatch(&command).map(|()| command.kind()));
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(kind) => {
                tracing::info!(
                    command_id = %id,
                    kind = %kind,
                    "✅ Applied command"
                );
                self.metrics.record_command(kind, elapsed, true);
                self.events.notify(format!("command:{}", kind));
                CommandResult::success()
            }
            Err(err) => {
                tracing::warn!(
                    command_id = %id,
                    command_type = %raw_type,
                    error = %err,
                    "❌ Command failed to apply"
                );
                self.metrics.record_command(failure_label(&err), elapsed, false);
                CommandResult::failure(err.to_string(), self.error_max_len)
            }
        }
    }

    fn dispatch(&self, command: &BridgeCommand) -> Result<(), ApplyError> {
        match command {
            BridgeCommand::SetValue { target, field, value } => {
                let target = self.resolve(target)?;
                self.host.write_field(&target, *field, *value)
            }
            BridgeCommand::AdjustHp { target, delta } => {
                let target = self.resolve(target)?;
                let current = self
                    .host
                    .read_field(&target, Field::Hp)
                    .ok_or(ApplyError::FieldUnavailable(Field::Hp))?;
                self.host.write_field(&target, Field::Hp, current + delta)
            }
            BridgeCommand::StepTurn(step) => {
                let position = self.host.step_cursor(*step)?;
                tracing::debug!(round = position.round, turn = position.turn, "Turn cursor moved");
                Ok(())
            }
            BridgeCommand::ToggleCondition { target, condition, active } => {
                let target = self.resolve(target)?;
                let now_active = self.host.set_condition(&target, condition, *active)?;
                tracing::debug!(
                    target = %target.as_str(),
                    condition = %condition,
                    active = now_active,
                    "Condition set"
                );
                Ok(())
            }
            BridgeCommand::Unknown(raw) => Err(ApplyError::UnknownType(raw.clone())),
        }
    }

    fn resolve(&self, target: &str) -> Result<TargetRef, ApplyError> {
        self.host
            .resolve(target)
            .ok_or_else(|| ApplyError::TargetNotFound(target.to_string()))
    }

    /// Send the single acknowledgement for a polled command.
    async fn acknowledge(&self, id: &str, result: &CommandResult) {
        match self.api.ack(id, Some(result)).await {
            Ok(AckOutcome::Accepted) => {
                tracing::debug!(command_id = %id, ok = result.ok, "Acknowledged command");
            }
            Ok(AckOutcome::AlreadyConsumed) => {
                tracing::info!(command_id = %id, "Command was already acknowledged upstream");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    command_id = %id,
                    "Failed to acknowledge command; it will be redelivered"
                );
                self.metrics.record_ack_failure();
            }
        }
    }
}

fn failure_label(err: &ApplyError) -> &'static str {
    match err {
        ApplyError::UnknownType(_) => "unknown",
        ApplyError::Protocol(_) => "malformed",
        _ => "rejected",
    }
}
