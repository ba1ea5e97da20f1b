// Compile events
//
// Lets a front end follow a run without polling: the orchestrator publishes
// CompileEvents on a tokio broadcast channel and any number of subscribers listen.

use tokio::sync::broadcast;

/// Phases of one orchestration run.
///
/// `Idle -> ResolvingFiles -> Dispatching -> Joining -> Reporting -> Done`, or
/// `Aborted` when a precondition fails before any worker starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    ResolvingFiles,
    Dispatching,
    Joining,
    Reporting,
    Done,
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }
}

/// Progress notifications emitted during a run
#[derive(Clone, Debug, PartialEq)]
pub enum CompileEvent {
    /// Files are resolved and workers are about to start
    RunStarted { total: usize, workers: usize },

    /// A worker claimed a file
    FileStarted { file: String },

    /// A worker finished a file
    FileFinished { file: String, success: bool },

    /// All workers joined
    RunFinished {
        succeeded: usize,
        failed: usize,
        not_attempted: usize,
    },
}

/// Cloneable publisher for [`CompileEvent`]s.
#[derive(Clone, Debug)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<CompileEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompileEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: CompileEvent) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers() {
        let events = EventBroadcaster::default();
        events.send(CompileEvent::FileStarted {
            file: "a.psc".to_string(),
        });
        assert_eq!(events.subscriber_count(), 0);
    }

    #[test]
    fn test_multiple_subscribers() {
        let events = EventBroadcaster::default();
        let mut rx1 = events.subscribe();
        let mut rx2 = events.subscribe();

        events.send(CompileEvent::RunStarted {
            total: 3,
            workers: 3,
        });

        assert!(matches!(
            rx1.try_recv(),
            Ok(CompileEvent::RunStarted { total: 3, .. })
        ));
        assert!(matches!(
            rx2.try_recv(),
            Ok(CompileEvent::RunStarted { workers: 3, .. })
        ));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::Aborted.is_terminal());
        assert!(!RunPhase::Dispatching.is_terminal());
        assert_eq!(RunPhase::default(), RunPhase::Idle);
    }
}
