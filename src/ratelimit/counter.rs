//! Fixed-window counter entry.

use std::time::Instant;

use super::policy::{Policy, MAX_WINDOW};

/// End of a window that starts at `now`.
///
/// Saturates instead of panicking when `now + window` is not representable.
pub(crate) fn window_end(now: Instant, policy: &Policy) -> Instant {
    now.checked_add(policy.window())
        .or_else(|| now.checked_add(MAX_WINDOW))
        .unwrap_or(now)
}

/// Actions observed for one key in its current window.
///
/// An entry is never incremented once its window has ended; the limiter
/// replaces it with a fresh one instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Admitted actions in the current window, never above the policy limit
    count: u32,
    /// When the current window ends
    window_reset_at: Instant,
}

impl CounterEntry {
    /// Start a new window at `now` with the first action already counted.
    pub fn fresh(now: Instant, policy: &Policy) -> Self {
        Self {
            count: 1,
            window_reset_at: window_end(now, policy),
        }
    }

    /// Whether the window has ended at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.window_reset_at <= now
    }

    /// Count one more action if the window still has budget.
    ///
    /// Returns `true` if the action was admitted. A denied action leaves the
    /// count untouched, so it stays capped at `max_count`.
    pub fn try_admit(&mut self, policy: &Policy) -> bool {
        if self.count >= policy.max_count() {
            return false;
        }
        self.count += 1;
        true
    }

    /// Budget left in this window.
    pub fn remaining(&self, policy: &Policy) -> u32 {
        policy.max_count().saturating_sub(self.count)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_reset_at(&self) -> Instant {
        self.window_reset_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(max: u32) -> Policy {
        Policy::new(Duration::from_secs(60), max).unwrap()
    }

    #[test]
    fn test_fresh_entry_counts_first_action() {
        let now = Instant::now();
        let entry = CounterEntry::fresh(now, &policy(5));

        assert_eq!(entry.count(), 1);
        assert_eq!(entry.window_reset_at(), now + Duration::from_secs(60));
        assert_eq!(entry.remaining(&policy(5)), 4);
    }

    #[test]
    fn test_try_admit_caps_at_limit() {
        let policy = policy(3);
        let mut entry = CounterEntry::fresh(Instant::now(), &policy);

        assert!(entry.try_admit(&policy));
        assert!(entry.try_admit(&policy));
        assert!(!entry.try_admit(&policy));
        assert!(!entry.try_admit(&policy));

        assert_eq!(entry.count(), 3);
        assert_eq!(entry.remaining(&policy), 0);
    }

    #[test]
    fn test_window_end_at_max_window() {
        let now = Instant::now();
        let policy = Policy::new(MAX_WINDOW, 1).unwrap();
        let entry = CounterEntry::fresh(now, &policy);

        assert!(entry.window_reset_at() > now);
        assert!(!entry.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let entry = CounterEntry::fresh(now, &policy(5));

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_secs(59)));
        assert!(entry.is_expired(now + Duration::from_secs(60)));
        assert!(entry.is_expired(now + Duration::from_secs(61)));
    }
}
