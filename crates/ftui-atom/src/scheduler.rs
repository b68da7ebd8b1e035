//! Commit scheduling: when a write's notifications are delivered.
//!
//! Under [`CommitPolicy::Immediate`] every committed write notifies
//! synchronously. Under [`CommitPolicy::Debounced`] the value is still stored
//! synchronously, but notifications wait until the burst of writes has been
//! quiet for `wait`; the host loop drives this through
//! [`AtomStore::tick`](crate::AtomStore::tick).
//!
//! Each atom owns its own [`CommitDebouncer`]. A write to one atom never
//! postpones or cancels another atom's pending commit.
//!
//! # Invariants
//!
//! 1. The commit base is the value before the *first* write of a burst.
//! 2. Every write reschedules the deadline to `write time + wait`.
//! 3. A commit hands out the base exactly once and leaves the debouncer idle.

use std::time::{Duration, Instant};

use serde_json::Value;

/// How notifications for committed writes are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Notify inside the write call.
    #[default]
    Immediate,
    /// Coalesce writes and notify once the atom has been quiet for `wait`.
    ///
    /// `Duration::ZERO` means "on the next tick", i.e. after the current
    /// synchronous burst.
    Debounced { wait: Duration },
}

impl CommitPolicy {
    /// Debounce until the next tick.
    #[must_use]
    pub const fn next_tick() -> Self {
        Self::Debounced {
            wait: Duration::ZERO,
        }
    }

    /// Debounce for `wait`.
    #[must_use]
    pub const fn debounced(wait: Duration) -> Self {
        Self::Debounced { wait }
    }

    /// Whether notifications are deferred.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Debounced { .. })
    }

    pub(crate) fn debouncer(self) -> Option<CommitDebouncer> {
        match self {
            Self::Immediate => None,
            Self::Debounced { wait } => Some(CommitDebouncer::new(wait)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommitAction {
    None,
    Commit { base: Value, elapsed: Duration },
}

#[derive(Debug)]
pub(crate) struct CommitDebouncer {
    wait: Duration,
    last_write: Option<Instant>,
    base: Option<Value>,
}

impl CommitDebouncer {
    pub(crate) fn new(wait: Duration) -> Self {
        Self {
            wait,
            last_write: None,
            base: None,
        }
    }

    /// Record a write that replaced `old` at `now`.
    pub(crate) fn schedule_at(&mut self, old: &Value, now: Instant) {
        if self.base.is_none() {
            self.base = Some(old.clone());
        }
        self.last_write = Some(now);
    }

    pub(crate) fn tick_at(&mut self, now: Instant) -> CommitAction {
        let Some(last) = self.last_write else {
            return CommitAction::None;
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.wait {
            return CommitAction::None;
        }
        self.take(elapsed)
    }

    /// Commit regardless of the deadline.
    pub(crate) fn flush_at(&mut self, now: Instant) -> CommitAction {
        let Some(last) = self.last_write else {
            return CommitAction::None;
        };
        self.take(now.saturating_duration_since(last))
    }

    fn take(&mut self, elapsed: Duration) -> CommitAction {
        self.last_write = None;
        match self.base.take() {
            Some(base) => CommitAction::Commit { base, elapsed },
            None => CommitAction::None,
        }
    }

    pub(crate) fn time_until_commit(&self, now: Instant) -> Option<Duration> {
        let last = self.last_write?;
        let elapsed = now.saturating_duration_since(last);
        Some(self.wait.saturating_sub(elapsed))
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.last_write.is_some()
    }

    pub(crate) fn cancel(&mut self) {
        self.last_write = None;
        self.base = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_policy_is_immediate() {
        assert_eq!(CommitPolicy::default(), CommitPolicy::Immediate);
        assert!(CommitPolicy::default().debouncer().is_none());
        assert!(CommitPolicy::next_tick().is_deferred());
    }

    #[test]
    fn commits_after_wait() {
        let mut debouncer = CommitDebouncer::new(Duration::from_millis(100));
        let now = Instant::now();

        debouncer.schedule_at(&json!(0), now);
        assert!(debouncer.is_pending());
        assert_eq!(
            debouncer.tick_at(now + Duration::from_millis(50)),
            CommitAction::None
        );
        assert!(matches!(
            debouncer.tick_at(now + Duration::from_millis(120)),
            CommitAction::Commit { base, .. } if base == json!(0)
        ));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn keeps_first_base_and_latest_deadline() {
        let mut debouncer = CommitDebouncer::new(Duration::from_millis(100));
        let now = Instant::now();

        debouncer.schedule_at(&json!(1), now);
        debouncer.schedule_at(&json!(2), now + Duration::from_millis(80));

        // The second write pushed the deadline out.
        assert_eq!(
            debouncer.tick_at(now + Duration::from_millis(120)),
            CommitAction::None
        );
        assert!(matches!(
            debouncer.tick_at(now + Duration::from_millis(200)),
            CommitAction::Commit { base, .. } if base == json!(1)
        ));
    }

    #[test]
    fn zero_wait_commits_on_next_tick() {
        let mut debouncer = CommitDebouncer::new(Duration::ZERO);
        let now = Instant::now();
        debouncer.schedule_at(&json!("a"), now);
        assert!(matches!(debouncer.tick_at(now), CommitAction::Commit { .. }));
        assert_eq!(debouncer.tick_at(now), CommitAction::None);
    }

    #[test]
    fn flush_ignores_deadline() {
        let mut debouncer = CommitDebouncer::new(Duration::from_secs(60));
        let now = Instant::now();
        debouncer.schedule_at(&json!(1), now);
        assert!(matches!(debouncer.flush_at(now), CommitAction::Commit { .. }));
        assert_eq!(debouncer.flush_at(now), CommitAction::None);
    }

    #[test]
    fn time_until_commit_counts_down() {
        let mut debouncer = CommitDebouncer::new(Duration::from_millis(100));
        let now = Instant::now();
        assert_eq!(debouncer.time_until_commit(now), None);

        debouncer.schedule_at(&json!(1), now);
        assert_eq!(
            debouncer.time_until_commit(now + Duration::from_millis(30)),
            Some(Duration::from_millis(70))
        );
        assert_eq!(
            debouncer.time_until_commit(now + Duration::from_millis(300)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn cancel_drops_pending_commit() {
        let mut debouncer = CommitDebouncer::new(Duration::ZERO);
        let now = Instant::now();
        debouncer.schedule_at(&json!(1), now);
        debouncer.cancel();
        assert_eq!(debouncer.tick_at(now), CommitAction::None);
    }
}
