//! In-process director presence. A director counts as online for a short
//! window after their last authenticated request; parents use this to know
//! whether anyone is likely to answer quickly. Best effort by design, the
//! map is not persisted and resets with the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const ONLINE_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Default)]
pub struct PresenceTracker {
    seen: Arc<Mutex<HashMap<i64, Instant>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_online(&self, user_id: i64) {
        let mut seen = self.seen.lock().unwrap();
        seen.insert(user_id, Instant::now());
        // Drop expired entries while we hold the lock anyway.
        seen.retain(|_, last| last.elapsed() < ONLINE_WINDOW);
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.seen
            .lock()
            .unwrap()
            .get(&user_id)
            .is_some_and(|last| last.elapsed() < ONLINE_WINDOW)
    }

    /// Forget a user immediately, used on logout.
    pub fn clear(&self, user_id: i64) {
        self.seen.lock().unwrap().remove(&user_id);
    }

    pub fn any_online(&self, user_ids: &[i64]) -> bool {
        user_ids.iter().any(|id| self.is_online(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear() {
        let tracker = PresenceTracker::new();
        assert!(!tracker.is_online(1));
        tracker.mark_online(1);
        assert!(tracker.is_online(1));
        tracker.clear(1);
        assert!(!tracker.is_online(1));
    }

    #[test]
    fn test_any_online() {
        let tracker = PresenceTracker::new();
        tracker.mark_online(2);
        assert!(tracker.any_online(&[1, 2, 3]));
        assert!(!tracker.any_online(&[4, 5]));
    }
}
