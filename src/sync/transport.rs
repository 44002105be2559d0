use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::config::{BridgeConfig, TransportMode};
use crate::domain::combat::CommandProcessor;
use crate::messaging::{AckOutcome, BridgeApi, StreamEvent, TransportError};
use crate::metrics::Metrics;
use crate::models::{CommandResult, WireCommand};

use super::session::{BridgeSession, TransportState};

// ============================================================================
// Command Transport - how commands reach the processor
// ============================================================================
//
// State machine:
//
//   Streaming ──(stream error / idle / watchdog)──► Disconnected ──► Polling
//
// - Polling:   fixed-interval fetch of at most `batch_size` commands, handled
//              sequentially. Overlapping ticks are no-ops.
// - Streaming: one long-lived event stream. Every command is claimed (bare
//              ack) before it is applied, because the feed is broadcast to
//              every connected consumer.
//
// Streaming never comes back on its own; only a new session retries it.
// Work resumed after an await checks the session epoch first, so a
// superseded transport cannot apply commands after its replacement starts.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub preferred: TransportMode,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub stream_idle_timeout: Duration,
}

impl TransportSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            preferred: config.transport,
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size,
            stream_idle_timeout: config.stream_idle_timeout(),
        }
    }

    pub fn initial_state(&self) -> TransportState {
        match self.preferred {
            TransportMode::Polling => TransportState::Polling,
            TransportMode::Streaming => TransportState::Streaming,
        }
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another tick was in flight, or the transport is not polling.
    Skipped,
    /// The transport was replaced while the fetch was outstanding.
    Superseded,
    Processed(usize),
    Failed,
}

/// Result of claiming one streamed command.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Dropped,
    Duplicate,
    /// Another consumer claimed it first.
    Lost,
    /// The claim request itself failed; the command stays pending upstream.
    Unclaimed,
    Applied(CommandResult),
}

pub struct CommandTransport {
    api: Arc<dyn BridgeApi>,
    processor: Arc<CommandProcessor>,
    session: Arc<BridgeSession>,
    metrics: Arc<Metrics>,
    settings: TransportSettings,
}

impl CommandTransport {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        processor: Arc<CommandProcessor>,
        session: Arc<BridgeSession>,
        metrics: Arc<Metrics>,
        settings: TransportSettings,
    ) -> Self {
        Self {
            api,
            processor,
            session,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Drive the transport for the lifetime of the session.
    pub async fn run(&self) {
        let state = self.session.state();
        self.metrics.set_transport_state(state);
        tracing::info!(
            session_id = %self.session.id(),
            transport = %state,
            "🔄 Command transport started"
        );

        if state == TransportState::Streaming {
            let epoch = self.session.epoch();
            let reason = match self.stream_session(epoch).await {
                Ok(()) => "stream superseded".to_string(),
                Err(e) => e.to_string(),
            };
            self.fall_back_to_polling(&reason);
        }

        self.poll_loop().await;
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// One poll tick: fetch a bounded batch and handle it in order.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.session.state() != TransportState::Polling {
            return PollOutcome::Skipped;
        }
        let Some(_in_flight) = self.session.try_begin_poll() else {
            tracing::debug!("Previous poll still in flight; skipping tick");
            return PollOutcome::Skipped;
        };
        let epoch = self.session.epoch();

        let commands = match self.api.fetch_commands(self.settings.batch_size).await {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!(error = %e, "Command poll failed");
                return PollOutcome::Failed;
            }
        };
        if !self.session.is_current(epoch) {
            return PollOutcome::Superseded;
        }
        self.session.touch();

        if !commands.is_empty() {
            tracing::info!(command_count = commands.len(), "📬 Fetched pending commands");
        }

        let mut processed = 0;
        for cmd in commands.iter().take(self.settings.batch_size) {
            if !self.session.is_current(epoch) {
                return PollOutcome::Superseded;
            }
            self.processor.handle_polled(cmd).await;
            processed += 1;
        }
        PollOutcome::Processed(processed)
    }

    /// Consume the event stream until it fails or the session moves on.
    /// `Ok` means superseded; `Err` is the reason to fall back.
    async fn stream_session(&self, epoch: u64) -> Result<(), TransportError> {
        let idle = self.settings.stream_idle_timeout;

        // Opening gets the same idle budget as any later read, and yields to
        // a fallback so the poll loop is never held up behind it
        let opened = tokio::select! {
            _ = self.session.preempted() => return Ok(()),
            opened = tokio::time::timeout(idle, self.api.open_stream()) => opened,
        };
        let mut stream = match opened {
            Err(_) => return Err(TransportError::StreamIdle(idle)),
            Ok(result) => result?,
        };
        if !self.session.is_current(epoch) {
            return Ok(());
        }
        self.session.touch();

        loop {
            if !self.session.is_current(epoch) {
                return Ok(());
            }

            let next = tokio::select! {
                _ = self.session.preempted() => return Ok(()),
                next = tokio::time::timeout(idle, stream.next()) => next,
            };
            let event = match next {
                Err(_) => return Err(TransportError::StreamIdle(idle)),
                Ok(None) => return Err(TransportError::StreamClosed),
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(event))) => event,
            };

            if !self.session.is_current(epoch) {
                return Ok(());
            }
            self.session.touch();

            match event {
                StreamEvent::Heartbeat => tracing::trace!("Stream heartbeat"),
                StreamEvent::Commands(commands) => {
                    tracing::info!(command_count = commands.len(), "📨 Streamed commands received");
                    for cmd in &commands {
                        if !self.session.is_current(epoch) {
                            return Ok(());
                        }
                        self.claim_and_apply(cmd).await;
                    }
                }
            }
        }
    }

    /// Claim a streamed command, then apply it if the claim was ours.
    ///
    /// The id is recorded before the apply, so even a crash mid-apply
    /// cannot lead to a second application in this session.
    pub async fn claim_and_apply(&self, cmd: &WireCommand) -> ClaimOutcome {
        let Some(id) = cmd.command_id() else {
            tracing::warn!(command_type = ?cmd.kind, "Dropping streamed command without id");
            self.metrics.record_dropped_command();
            return ClaimOutcome::Dropped;
        };

        if self.session.seen(id) {
            self.metrics.record_duplicate();
            // Retire it upstream in case an earlier ack never landed
            if let Err(e) = self.api.ack(id, None).await {
                tracing::debug!(command_id = %id, error = %e, "Re-ack of duplicate failed");
            }
            return ClaimOutcome::Duplicate;
        }

        match self.api.ack(id, None).await {
            Ok(AckOutcome::Accepted) => {}
            Ok(AckOutcome::AlreadyConsumed) => {
                tracing::info!(command_id = %id, "Command claimed by another consumer");
                self.metrics.record_claim_lost();
                return ClaimOutcome::Lost;
            }
            Err(e) => {
                tracing::warn!(command_id = %id, error = %e, "Claim failed; leaving command pending");
                self.metrics.record_ack_failure();
                return ClaimOutcome::Unclaimed;
            }
        }

        self.session.record(id);
        ClaimOutcome::Applied(self.processor.apply_claimed(id, cmd))
    }

    /// Degrade Streaming to Polling. Returns false if not streaming.
    pub fn fall_back_to_polling(&self, reason: &str) -> bool {
        if self.session.state() != TransportState::Streaming {
            return false;
        }

        self.session.set_state(TransportState::Disconnected);
        self.metrics.set_transport_state(TransportState::Disconnected);
        self.session.supersede();
        self.session.mark_fell_back();
        self.metrics.set_transport_state(TransportState::Polling);
        self.metrics.record_fallback();

        tracing::warn!(reason = %reason, "⚠️  Streaming lost; falling back to polling");
        true
    }

    /// Out-of-band recovery: leave a stalled stream, then poll right away.
    pub async fn recover(&self, reason: &str) -> PollOutcome {
        self.fall_back_to_polling(reason);
        self.poll_once().await
    }
}
