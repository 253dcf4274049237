// Per-board exclusive locks
//
// Recurrence generation and dependency mutations on the same board serialize
// through one async mutex per board; different boards never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;

/// Registry of board locks, created on first use and dropped with their last guard
#[derive(Default)]
pub struct BoardLocks {
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

/// RAII guard holding a board's lock until dropped
pub struct BoardGuard {
    board_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl BoardGuard {
    pub fn board_id(&self) -> &str {
        &self.board_id
    }
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `board_id`
    pub async fn acquire(&self, board_id: &str) -> BoardGuard {
        let mutex = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

            // Upgrade a live entry or create a fresh one
            let mutex = map
                .get(board_id)
                .and_then(Weak::upgrade)
                .unwrap_or_else(|| {
                    let fresh = Arc::new(tokio::sync::Mutex::new(()));
                    map.insert(board_id.to_string(), Arc::downgrade(&fresh));
                    fresh
                });

            map.retain(|_, weak| weak.strong_count() > 0);
            mutex
        };

        BoardGuard {
            board_id: board_id.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of boards with a live lock (for testing)
    pub fn live_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
