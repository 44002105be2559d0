//! In-memory stand-in for the bridge service, shared by unit and
//! integration tests.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::messaging::{AckOutcome, BridgeApi, CommandStream, StreamEvent, TransportError};
use crate::models::{CommandResult, Snapshot, WireCommand};

type StreamSender = mpsc::UnboundedSender<Result<StreamEvent, TransportError>>;

#[derive(Default)]
struct BridgeState {
    pending: VecDeque<WireCommand>,
    acks: Vec<(String, Option<CommandResult>)>,
    snapshots: Vec<Snapshot>,
    subscribers: Vec<StreamSender>,
    fetches: usize,
    fail_acks: bool,
    fail_fetch: bool,
    fail_snapshots: bool,
    fail_stream_open: bool,
    hang_stream_open: bool,
}

/// Queue semantics match the real service: fetching does not remove a
/// command, only the first ack for its id does.
#[derive(Default)]
pub struct InMemoryBridge {
    state: Mutex<BridgeState>,
}

impl InMemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a command to the pending queue without announcing it.
    pub fn enqueue(&self, command: WireCommand) {
        self.state().pending.push_back(command);
    }

    /// Queue commands and push them to every open stream as one event.
    pub fn emit_commands(&self, commands: Vec<WireCommand>) {
        let mut state = self.state();
        state.pending.extend(commands.iter().cloned());
        state
            .subscribers
            .retain(|tx| tx.send(Ok(StreamEvent::Commands(commands.clone()))).is_ok());
    }

    pub fn emit_heartbeat(&self) {
        self.state()
            .subscribers
            .retain(|tx| tx.send(Ok(StreamEvent::Heartbeat)).is_ok());
    }

    /// Break every open stream with an error.
    pub fn fail_stream(&self) {
        for tx in self.state().subscribers.drain(..) {
            let _ = tx.send(Err(TransportError::StreamClosed));
        }
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state()
            .pending
            .iter()
            .filter_map(|c| c.command_id().map(str::to_string))
            .collect()
    }

    pub fn acks(&self) -> Vec<(String, Option<CommandResult>)> {
        self.state().acks.clone()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.state().snapshots.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    pub fn set_fail_acks(&self, fail: bool) {
        self.state().fail_acks = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state().fail_fetch = fail;
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.state().fail_snapshots = fail;
    }

    pub fn set_fail_stream_open(&self, fail: bool) {
        self.state().fail_stream_open = fail;
    }

    /// Make `open_stream` wait forever, like a server that accepts the
    /// connection but never sends response headers.
    pub fn set_hang_stream_open(&self, hang: bool) {
        self.state().hang_stream_open = hang;
    }
}

#[async_trait]
impl BridgeApi for InMemoryBridge {
    async fn push_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_snapshots {
            return Err(TransportError::status(503, "snapshot store unavailable"));
        }
        state.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn fetch_commands(&self, limit: usize) -> Result<Vec<WireCommand>, TransportError> {
        let mut state = self.state();
        state.fetches += 1;
        if state.fail_fetch {
            return Err(TransportError::status(500, "queue unavailable"));
        }
        Ok(state.pending.iter().take(limit).cloned().collect())
    }

    async fn ack(
        &self,
        id: &str,
        result: Option<&CommandResult>,
    ) -> Result<AckOutcome, TransportError> {
        let mut state = self.state();
        if state.fail_acks {
            return Err(TransportError::status(502, "ack rejected"));
        }
        state.acks.push((id.to_string(), result.cloned()));

        match state.pending.iter().position(|c| c.command_id() == Some(id)) {
            Some(index) => {
                state.pending.remove(index);
                Ok(AckOutcome::Accepted)
            }
            None => Ok(AckOutcome::AlreadyConsumed),
        }
    }

    async fn open_stream(&self) -> Result<CommandStream, TransportError> {
        let hang = self.state().hang_stream_open;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        if state.fail_stream_open {
            return Err(TransportError::status(404, "stream not supported"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        Ok(events)
    }
}
