//! Stack configuration

use crate::error::{ScopeError, ScopeResult};
use crate::set::FrameKind;

/// Configuration for a [`ScopeStack`](crate::ScopeStack)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    /// Ownership set used by `push_default_frame` and `scope!()`
    pub default_kind: FrameKind,

    /// Per-frame cap on tree bookkeeping nodes (None for unbounded)
    pub tree_node_limit: Option<usize>,

    /// Enable statistics tracking
    pub track_stats: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            default_kind: FrameKind::Tree,
            tree_node_limit: None,
            track_stats: true,
        }
    }
}

impl StackConfig {
    /// Production configuration - no counters
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            ..Self::default()
        }
    }

    /// Debug configuration - counters on
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            ..Self::default()
        }
    }

    /// Tree frames capped at `limit` owned addresses each
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            tree_node_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Sets the default frame kind
    #[must_use = "builder methods must be chained or built"]
    pub fn with_default_kind(mut self, kind: FrameKind) -> Self {
        self.default_kind = kind;
        self
    }

    /// Checks the configuration for values no frame could work with
    pub fn validate(&self) -> ScopeResult<()> {
        if self.tree_node_limit == Some(0) {
            return Err(ScopeError::invalid_config("tree_node_limit must be at least 1"));
        }
        if self.default_kind == (FrameKind::Array { capacity: 0 }) {
            return Err(ScopeError::invalid_config(
                "default array frames must have a non-zero capacity",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        StackConfig::default().validate().unwrap();
        StackConfig::production().validate().unwrap();
        StackConfig::debug().validate().unwrap();
        StackConfig::bounded(16).validate().unwrap();
        assert!(!StackConfig::production().track_stats);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = StackConfig::bounded(0).validate().unwrap_err();
        assert_eq!(err.code(), "SCOPE:CONFIG:INVALID");

        let err = StackConfig::default()
            .with_default_kind(FrameKind::array(0))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("non-zero capacity"));
    }
}
