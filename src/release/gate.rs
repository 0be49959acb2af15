//! Release gate - decides whether the declared version needs a new tag

use crate::release::version::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;

/// Default prefix placed in front of the version to form a tag
pub const DEFAULT_TAG_PREFIX: &str = "v";

/// Policy comparing the expected tag against the detected one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleasePolicy {
    /// Release whenever the expected tag differs from the detected tag.
    ///
    /// A declared version lower than the last tag also releases.
    #[default]
    TagMismatch,

    /// Release only when the declared version is strictly greater than the
    /// version of the detected tag (or no parseable tag exists)
    SemverGreater,
}

impl ReleasePolicy {
    /// The single comparison point of the gate
    pub fn requires_release(
        &self,
        declared: &Version,
        expected_tag: &str,
        detected_tag: &str,
        prefix: &str,
    ) -> bool {
        match self {
            ReleasePolicy::TagMismatch => expected_tag != detected_tag,
            ReleasePolicy::SemverGreater => {
                let detected = detected_tag
                    .strip_prefix(prefix)
                    .and_then(|raw| raw.parse::<Version>().ok());
                match detected {
                    Some(previous) => {
                        declared.semver().cmp_precedence(previous.semver()) == Ordering::Greater
                    }
                    None => true,
                }
            }
        }
    }
}

/// Outcome of the gate for one pipeline run
///
/// Built once, then cloned into every stage that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDecision {
    pub declared_version: Version,
    pub expected_tag: String,
    /// Empty when no release tag is reachable
    pub detected_tag: String,
    pub should_release: bool,
}

impl ReleaseDecision {
    /// Step outputs in wire form, in a stable order
    pub fn outputs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("crate-version", self.declared_version.to_string()),
            ("expected-git-tag", self.expected_tag.clone()),
            ("detected-git-tag", self.detected_tag.clone()),
            ("should-release", self.should_release.to_string()),
        ]
    }

    /// Append the outputs as `key=value` lines (e.g. to `$GITHUB_OUTPUT`)
    pub fn write_outputs<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for (key, value) in self.outputs() {
            writeln!(file, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Combines a declared version and a detected tag into a decision
#[derive(Debug, Clone)]
pub struct ReleaseGate {
    prefix: String,
    policy: ReleasePolicy,
}

impl Default for ReleaseGate {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_PREFIX, ReleasePolicy::default())
    }
}

impl ReleaseGate {
    pub fn new(prefix: impl Into<String>, policy: ReleasePolicy) -> Self {
        Self {
            prefix: prefix.into(),
            policy,
        }
    }

    /// Tag a version is expected to be released under
    pub fn expected_tag(&self, version: &Version) -> String {
        format!("{}{}", self.prefix, version)
    }

    /// Decide whether a release is due; `None` means no tag was found
    pub fn decide(&self, declared_version: Version, detected_tag: Option<&str>) -> ReleaseDecision {
        let expected_tag = self.expected_tag(&declared_version);
        let detected_tag = detected_tag.unwrap_or_default().to_string();
        let should_release =
            self.policy
                .requires_release(&declared_version, &expected_tag, &detected_tag, &self.prefix);

        ReleaseDecision {
            declared_version,
            expected_tag,
            detected_tag,
            should_release,
        }
    }
}
