use tokio::sync::broadcast;

/// A host-side state change. `reason` is only used for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub reason: String,
}

/// Event bus between whatever observes the host and the snapshot publisher.
#[derive(Clone)]
pub struct StateEvents {
    tx: broadcast::Sender<StateChange>,
}

impl StateEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Non-blocking. Dropped silently when nobody is subscribed.
    pub fn notify(&self, reason: impl Into<String>) {
        let _ = self.tx.send(StateChange { reason: reason.into() });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers_is_harmless() {
        let events = StateEvents::new(4);
        events.notify("nobody listening");
    }

    #[test]
    fn test_subscriber_receives_reason() {
        let events = StateEvents::new(4);
        let mut rx = events.subscribe();
        events.clone().notify("combat:update");
        assert_eq!(rx.try_recv().unwrap().reason, "combat:update");
    }
}
