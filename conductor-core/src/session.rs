//! Session identity and the across-turn [`OrchestratorState`] (spec.md §3).

use crate::approval::ApprovalCache;
use crate::cache::ResultCache;
use crate::config::OrchestratorConfig;
use crate::dedup::RecentCalls;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Opaque session identifier scoping one [`OrchestratorState`], threaded
/// through log events the way the teacher threads `session_id` through its
/// agent runner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the orchestrator carries across turns: result cache, approval
/// cache, recent-calls map, failure counts, duplicate counters, blocked
/// signatures, and approved plan ids. All process-local, never persisted.
pub struct OrchestratorState {
    pub session_id: SessionId,
    pub result_cache: ResultCache,
    pub approval_cache: ApprovalCache,
    pub recent_calls: RecentCalls,
    pub failure_counts: HashMap<String, u32>,
    pub consecutive_failures: u32,
    pub last_successful_signature: Option<String>,
    pub consecutive_successful_duplicates: u32,
    pub last_failed_signature: Option<String>,
    pub consecutive_duplicates: u32,
    pub blocked_signatures: HashSet<String>,
    pub approved_plan_ids: HashSet<String>,
}

impl OrchestratorState {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            session_id: SessionId::new(),
            result_cache: ResultCache::new(config.cache_capacity, config.cache_ttl()),
            approval_cache: ApprovalCache::new(),
            recent_calls: RecentCalls::new(),
            failure_counts: HashMap::new(),
            consecutive_failures: 0,
            last_successful_signature: None,
            consecutive_successful_duplicates: 0,
            last_failed_signature: None,
            consecutive_duplicates: 0,
            blocked_signatures: HashSet::new(),
            approved_plan_ids: HashSet::new(),
        }
    }

    pub fn is_blocked(&self, signature: &str) -> bool {
        self.blocked_signatures.contains(signature)
    }

    /// Update the consecutive-duplicate counters after a call completes
    /// (spec.md §4.4 step 9).
    pub fn record_duplicate_outcome(&mut self, signature: &str, success: bool, was_flagged_duplicate: bool) {
        if success {
            if self.last_successful_signature.as_deref() == Some(signature) {
                self.consecutive_successful_duplicates += 1;
            } else {
                self.consecutive_successful_duplicates = 1;
                self.last_successful_signature = Some(signature.to_string());
            }
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            if was_flagged_duplicate && self.last_failed_signature.as_deref() == Some(signature) {
                self.consecutive_duplicates += 1;
            } else if was_flagged_duplicate {
                self.consecutive_duplicates = 1;
                self.last_failed_signature = Some(signature.to_string());
            } else {
                self.consecutive_duplicates = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn successful_duplicate_counter_increments_on_repeat_signature() {
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        state.record_duplicate_outcome("search{}", true, false);
        state.record_duplicate_outcome("search{}", true, false);
        state.record_duplicate_outcome("search{}", true, false);
        assert_eq!(state.consecutive_successful_duplicates, 3);
    }

    #[test]
    fn different_signature_resets_successful_duplicate_counter() {
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        state.record_duplicate_outcome("search{}", true, false);
        state.record_duplicate_outcome("filesystem{}", true, false);
        assert_eq!(state.consecutive_successful_duplicates, 1);
    }

    #[test]
    fn failure_increments_consecutive_failures_and_resets_on_success() {
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        state.record_duplicate_outcome("x{}", false, false);
        state.record_duplicate_outcome("x{}", false, false);
        assert_eq!(state.consecutive_failures, 2);
        state.record_duplicate_outcome("x{}", true, false);
        assert_eq!(state.consecutive_failures, 0);
    }
}
