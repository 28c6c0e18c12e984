//! Orchestrator configuration: the enumerated knobs from spec.md §4.1,
//! loadable from TOML with `serde(default)` so every field has the spec's
//! default when the file omits it (mirrors the teacher's config crate's
//! `Default` + `Deserialize` pattern).

use crate::tools::ToolCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Every configuration knob enumerated in spec.md §4.1, plus the cache and
/// parser constants named elsewhere in the spec. `updateConfig(partial)`
/// (spec.md §6) is realized as [`OrchestratorConfig::apply_patch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enable_tool_calling: bool,
    pub max_tools_per_request: u32,
    pub tool_timeout_secs: u64,
    pub require_approval_for_categories: HashSet<ToolCategory>,
    pub skip_unapproved_tools: bool,
    pub require_plan_approval: bool,
    pub max_conversation_turns: u32,
    pub max_consecutive_failures: u32,
    pub max_consecutive_tool_only_turns: u32,
    pub max_consecutive_duplicates: u32,
    pub max_successful_duplicates: u32,
    pub model_response_after_tools_timeout_secs: u64,
    pub approval_timeout_secs: u64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub rapid_duplicate_ttl_secs: u64,
    pub failed_retry_ttl_secs: u64,
    pub max_streaming_parse_attempts: u32,
    pub model: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_tool_calling: true,
            max_tools_per_request: 20,
            tool_timeout_secs: 60,
            require_approval_for_categories: HashSet::new(),
            skip_unapproved_tools: false,
            require_plan_approval: true,
            max_conversation_turns: 20,
            max_consecutive_failures: 3,
            max_consecutive_tool_only_turns: 2,
            max_consecutive_duplicates: 3,
            max_successful_duplicates: 3,
            model_response_after_tools_timeout_secs: 30,
            approval_timeout_secs: 60,
            cache_capacity: 200,
            cache_ttl_secs: 30 * 60,
            rapid_duplicate_ttl_secs: 3,
            failed_retry_ttl_secs: 30,
            max_streaming_parse_attempts: 100,
            model: "llama3.1".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rapid_duplicate_ttl(&self) -> Duration {
        Duration::from_secs(self.rapid_duplicate_ttl_secs)
    }

    pub fn failed_retry_ttl(&self) -> Duration {
        Duration::from_secs(self.failed_retry_ttl_secs)
    }

    pub fn model_response_after_tools_timeout(&self) -> Duration {
        Duration::from_secs(self.model_response_after_tools_timeout_secs)
    }

    /// Apply an `Option`-field patch over the live config, leaving `None`
    /// fields untouched. Mirrors `updateConfig(partial)` from spec.md §6.
    pub fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(v) = patch.enable_tool_calling {
            self.enable_tool_calling = v;
        }
        if let Some(v) = patch.max_tools_per_request {
            self.max_tools_per_request = v;
        }
        if let Some(v) = patch.tool_timeout_secs {
            self.tool_timeout_secs = v;
        }
        if let Some(v) = patch.skip_unapproved_tools {
            self.skip_unapproved_tools = v;
        }
        if let Some(v) = patch.require_plan_approval {
            self.require_plan_approval = v;
        }
        if let Some(v) = patch.require_approval_for_categories {
            self.require_approval_for_categories = v;
        }
    }
}

/// Partial update applied over a live [`OrchestratorConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub enable_tool_calling: Option<bool>,
    pub max_tools_per_request: Option<u32>,
    pub tool_timeout_secs: Option<u64>,
    pub skip_unapproved_tools: Option<bool>,
    pub require_plan_approval: Option<bool>,
    pub require_approval_for_categories: Option<HashSet<ToolCategory>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_tools_per_request, 20);
        assert_eq!(config.tool_timeout_secs, 60);
        assert_eq!(config.max_conversation_turns, 20);
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.max_consecutive_tool_only_turns, 2);
        assert_eq!(config.max_consecutive_duplicates, 3);
        assert_eq!(config.max_successful_duplicates, 3);
        assert_eq!(config.cache_capacity, 200);
        assert_eq!(config.cache_ttl_secs, 1800);
        assert_eq!(config.rapid_duplicate_ttl_secs, 3);
        assert_eq!(config.failed_retry_ttl_secs, 30);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: OrchestratorConfig = toml_fragment_defaults();
        assert_eq!(parsed.max_tools_per_request, 5);
        assert_eq!(parsed.tool_timeout_secs, 60);
    }

    fn toml_fragment_defaults() -> OrchestratorConfig {
        serde_json::from_value(serde_json::json!({"max_tools_per_request": 5})).unwrap()
    }

    #[test]
    fn apply_patch_only_touches_set_fields() {
        let mut config = OrchestratorConfig::default();
        config.apply_patch(ConfigPatch {
            max_tools_per_request: Some(5),
            ..Default::default()
        });
        assert_eq!(config.max_tools_per_request, 5);
        assert_eq!(config.tool_timeout_secs, 60);
    }
}
