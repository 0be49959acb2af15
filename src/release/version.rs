//! Declared version resolution from a TOML manifest

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Key path used when the configuration doesn't name one
pub const DEFAULT_VERSION_KEY: &str = "workspace.package.version";

/// Errors raised while reading the declared version
#[derive(Debug, Error)]
pub enum ManifestParseError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest is not valid TOML: {0}")]
    Syntax(String),

    #[error("Manifest has no value at `{0}`")]
    MissingKey(String),

    #[error("Manifest value at `{key}` is a {found}, expected a string")]
    NotAString { key: String, found: &'static str },

    #[error("Invalid version `{raw}`: {reason}")]
    InvalidVersion { raw: String, reason: String },
}

/// A declared package version
///
/// Printing a parsed version yields the manifest string it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(semver::Version);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version(semver::Version::new(major, minor, patch))
    }

    /// Access the underlying semantic version (used by ordering policies)
    pub fn semver(&self) -> &semver::Version {
        &self.0
    }
}

impl FromStr for Version {
    type Err = ManifestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        semver::Version::parse(s)
            .map(Version)
            .map_err(|e| ManifestParseError::InvalidVersion {
                raw: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for Version {
    type Error = ManifestParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Read the version string at a dotted key path (e.g. `package.version`)
pub fn resolve_version(content: &str, key_path: &str) -> Result<Version, ManifestParseError> {
    let document: toml::Table =
        toml::from_str(content).map_err(|e| ManifestParseError::Syntax(e.to_string()))?;

    let mut segments = key_path.split('.').filter(|s| !s.is_empty());
    let first = segments
        .next()
        .ok_or_else(|| ManifestParseError::MissingKey(key_path.to_string()))?;

    let mut value = document
        .get(first)
        .ok_or_else(|| ManifestParseError::MissingKey(key_path.to_string()))?;

    for segment in segments {
        value = value
            .as_table()
            .and_then(|table| table.get(segment))
            .ok_or_else(|| ManifestParseError::MissingKey(key_path.to_string()))?;
    }

    let raw = value.as_str().ok_or_else(|| ManifestParseError::NotAString {
        key: key_path.to_string(),
        found: value.type_str(),
    })?;

    raw.parse()
}

/// Read a manifest from disk and resolve its declared version
pub fn resolve_version_file<P: AsRef<Path>>(
    path: P,
    key_path: &str,
) -> Result<Version, ManifestParseError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ManifestParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    resolve_version(&content, key_path)
}
