//! Release gate: declared version, nearest tag and the resulting decision
//!
//! The two inputs are read independently (manifest and tag history) and then
//! combined exactly once per run into a [`ReleaseDecision`].

pub mod gate;
pub mod tags;
pub mod version;

pub use gate::{ReleaseDecision, ReleaseGate, ReleasePolicy, DEFAULT_TAG_PREFIX};
pub use tags::{nearest_tag, ReachableTag, TagError, TagInspector};
pub use version::{resolve_version, resolve_version_file, ManifestParseError, Version, DEFAULT_VERSION_KEY};

use crate::core::config::ReleaseConfig;
use thiserror::Error;

/// Errors that prevent a decision from being made
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Manifest(#[from] ManifestParseError),

    #[error(transparent)]
    Tags(#[from] TagError),
}

/// Run the gate over manifest content and reachable tag history
pub fn decide(
    release: &ReleaseConfig,
    manifest: &str,
    history: &[ReachableTag],
) -> Result<ReleaseDecision, DecisionError> {
    let version = resolve_version(manifest, &release.version_key)?;
    decide_version(release, version, history)
}

/// Run the gate for an already resolved declared version
pub fn decide_version(
    release: &ReleaseConfig,
    version: Version,
    history: &[ReachableTag],
) -> Result<ReleaseDecision, DecisionError> {
    let inspector = match &release.tag_pattern {
        Some(pattern) => TagInspector::with_pattern(pattern)?,
        None => TagInspector::new(),
    };
    let detected = inspector.detect(history);

    let gate = ReleaseGate::new(release.tag_prefix.clone(), release.policy);
    Ok(gate.decide(version, detected.as_deref()))
}
