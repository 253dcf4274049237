// Activity Recorder Port (append-only audit log)

use crate::domain::ActivityEvent;
use async_trait::async_trait;

/// Fire-and-forget sink for activity events
///
/// Implementations must swallow (and log) their own failures: recording an
/// event never fails the operation that produced it.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, event: ActivityEvent);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock recorder that keeps every event in memory
    #[derive(Clone, Default)]
    pub struct RecordingActivityRecorder {
        events: Arc<Mutex<Vec<ActivityEvent>>>,
    }

    impl RecordingActivityRecorder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ActivityEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count_kind(&self, kind: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.kind() == kind)
                .count()
        }
    }

    #[async_trait]
    impl ActivityRecorder for RecordingActivityRecorder {
        async fn record(&self, event: ActivityEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

}
