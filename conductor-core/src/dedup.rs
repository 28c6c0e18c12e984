//! `RecentCallRecord` tracking: rapid-duplicate and failed-retry suppression,
//! keyed by call signature (spec.md §3, §4.4 step 3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// `{signature, insertedAtMillis, lastOutcomeSuccess}`.
#[derive(Clone)]
struct RecentCallRecord {
    inserted_at: Instant,
    last_outcome_success: bool,
}

/// Outcome of a dedup check against the recent-calls map.
#[derive(Debug, PartialEq, Eq)]
pub enum DedupDecision {
    /// No recent record, or the record is old enough to allow a re-run.
    Allow,
    /// The exact signature ran within the rapid-duplicate TTL.
    RapidDuplicate { age_secs: u64 },
    /// The signature's last outcome was a failure within the failed-retry TTL.
    FailedRetryBlocked { age_secs: u64 },
}

/// Tracks the most recent call per signature to enforce spec.md §3's
/// `RecentCallRecord` TTLs: rapid-duplicate suppression blocks any repeat
/// within 3s; failed-call suppression blocks repeated failures within 30s.
#[derive(Default)]
pub struct RecentCalls {
    records: HashMap<String, RecentCallRecord>,
}

impl RecentCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `signature` may run now, given the configured TTLs.
    /// Does not mutate state — call [`Self::record_attempt`] once dispatch
    /// proceeds, and [`Self::record_outcome`] once it completes.
    pub fn check(&self, signature: &str, rapid_ttl: Duration, failed_retry_ttl: Duration) -> DedupDecision {
        let Some(record) = self.records.get(signature) else {
            return DedupDecision::Allow;
        };
        let age = record.inserted_at.elapsed();

        if age < rapid_ttl {
            return DedupDecision::RapidDuplicate { age_secs: age.as_secs().max(1) };
        }
        if !record.last_outcome_success && age < failed_retry_ttl {
            return DedupDecision::FailedRetryBlocked { age_secs: age.as_secs().max(1) };
        }
        DedupDecision::Allow
    }

    /// Tentatively record the signature with `outcome = failure`, to be
    /// updated by [`Self::record_outcome`] once the call completes
    /// (spec.md §4.4 step 3: "tentatively record ... to be updated post-execution").
    pub fn record_attempt(&mut self, signature: impl Into<String>) {
        self.records.insert(
            signature.into(),
            RecentCallRecord {
                inserted_at: Instant::now(),
                last_outcome_success: false,
            },
        );
    }

    /// Update the outcome of the most recent attempt for `signature`.
    pub fn record_outcome(&mut self, signature: &str, success: bool) {
        if let Some(record) = self.records.get_mut(signature) {
            record.last_outcome_success = success;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_signature_is_allowed() {
        let recent = RecentCalls::new();
        assert_eq!(
            recent.check("filesystem{}", Duration::from_secs(3), Duration::from_secs(30)),
            DedupDecision::Allow
        );
    }

    #[test]
    fn rapid_repeat_is_blocked_regardless_of_outcome() {
        let mut recent = RecentCalls::new();
        recent.record_attempt("search{}");
        recent.record_outcome("search{}", true);
        let decision = recent.check("search{}", Duration::from_secs(3), Duration::from_secs(30));
        assert!(matches!(decision, DedupDecision::RapidDuplicate { .. }));
    }

    #[test]
    fn old_successful_call_is_allowed_to_rerun() {
        let mut recent = RecentCalls::new();
        recent.record_attempt("search{}");
        recent.record_outcome("search{}", true);
        let decision = recent.check("search{}", Duration::from_millis(0), Duration::from_secs(30));
        assert_eq!(decision, DedupDecision::Allow);
    }

    #[test]
    fn old_failed_call_within_failed_ttl_is_blocked() {
        let mut recent = RecentCalls::new();
        recent.record_attempt("search{}");
        recent.record_outcome("search{}", false);
        let decision = recent.check("search{}", Duration::from_millis(0), Duration::from_secs(30));
        assert!(matches!(decision, DedupDecision::FailedRetryBlocked { .. }));
    }
}
