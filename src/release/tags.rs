//! Nearest reachable release tag detection

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while collecting tag history
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Checkout is shallow; tag detection requires full commit and tag history")]
    ShallowHistory,

    #[error("Failed to read tag history: {0}")]
    History(String),

    #[error("Invalid tag pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A tag reachable from the current commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachableTag {
    /// Tag name (e.g. "v0.1.0")
    pub name: String,

    /// Number of commits between HEAD and the tagged commit
    pub distance: usize,

    /// Tag creation time (unix seconds), when known
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl ReachableTag {
    pub fn new(name: impl Into<String>, distance: usize) -> Self {
        Self {
            name: name.into(),
            distance,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Pick the most recent reachable tag
///
/// Closest commit wins; on the same commit the newest tag wins; any remaining
/// tie keeps history order. Names are never compared.
pub fn nearest_tag(history: &[ReachableTag]) -> Option<&ReachableTag> {
    history.iter().reduce(|best, candidate| {
        let closer = candidate.distance < best.distance;
        let newer_on_same_commit = candidate.distance == best.distance
            && candidate.created_at.unwrap_or(i64::MIN) > best.created_at.unwrap_or(i64::MIN);
        if closer || newer_on_same_commit {
            candidate
        } else {
            best
        }
    })
}

/// Filters tag history down to release tags and picks the nearest one
#[derive(Debug, Clone, Default)]
pub struct TagInspector {
    pattern: Option<Regex>,
}

impl TagInspector {
    /// Inspector that treats every tag as a release tag
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspector that only considers tags matching `pattern`
    pub fn with_pattern(pattern: &str) -> Result<Self, TagError> {
        Ok(Self {
            pattern: Some(Regex::new(pattern)?),
        })
    }

    /// Nearest release tag name, or `None` when nothing was released yet
    pub fn detect(&self, history: &[ReachableTag]) -> Option<String> {
        let candidates: Vec<ReachableTag> = history
            .iter()
            .filter(|tag| self.is_release_tag(&tag.name))
            .cloned()
            .collect();

        nearest_tag(&candidates).map(|tag| tag.name.clone())
    }

    fn is_release_tag(&self, name: &str) -> bool {
        self.pattern.as_ref().map_or(true, |p| p.is_match(name))
    }
}
