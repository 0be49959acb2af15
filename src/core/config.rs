//! Pipeline configuration from YAML

use crate::core::{condition::StageCondition, StageGraph};
use crate::release::{ReleasePolicy, DEFAULT_TAG_PREFIX, DEFAULT_VERSION_KEY};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Release gate and publication settings
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Pipeline stages
    pub stages: Vec<StageConfig>,

    /// Wall-clock budget for the whole run (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Default timeout for stages (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Release gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Manifest declaring the package version
    pub manifest: PathBuf,

    /// Dotted key path of the version inside the manifest
    pub version_key: String,

    /// Prefix in front of the version in release tags
    pub tag_prefix: String,

    /// Regex restricting which tags count as release tags
    pub tag_pattern: Option<String>,

    /// Remote the release tag is pushed to
    pub remote: String,

    /// Comparison between the expected and the detected tag
    pub policy: ReleasePolicy,

    /// Label attached to pending changes that will release
    pub label: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("Cargo.toml"),
            version_key: DEFAULT_VERSION_KEY.to_string(),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            tag_pattern: None,
            remote: "origin".to_string(),
            policy: ReleasePolicy::default(),
            label: "release".to_string(),
        }
    }
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage identifier
    pub id: String,

    /// Human-readable stage name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Stage IDs this stage depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Run condition, evaluated right before the stage starts
    #[serde(default)]
    pub when: StageCondition,

    /// Shell commands (mutually exclusive with `uses`)
    #[serde(default)]
    pub run: Vec<String>,

    /// Builtin action (mutually exclusive with `run`)
    #[serde(default)]
    pub uses: Option<BuiltinAction>,

    /// Artifacts this stage produces
    #[serde(default)]
    pub produces: Vec<String>,

    /// Artifacts this stage needs
    #[serde(default)]
    pub consumes: Vec<String>,

    /// Run even when upstream stages failed (upload/cleanup)
    #[serde(default)]
    pub always_run: bool,

    /// Timeout for this stage (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Builtin stage actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinAction {
    /// Push the release tag and create a draft release
    PublishRelease,
    /// Label the pending change
    Annotate,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.release.tag_prefix.chars().any(|c| !c.is_ascii_graphic()) {
            anyhow::bail!("Tag prefix '{}' must be printable ASCII", self.release.tag_prefix);
        }

        if let Some(pattern) = &self.release.tag_pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                anyhow::bail!("Invalid tag_pattern '{}': {}", pattern, e);
            }
        }

        // Check that all stage IDs are unique
        let mut seen_ids = HashSet::new();
        for stage in &self.stages {
            if !seen_ids.insert(&stage.id) {
                anyhow::bail!("Duplicate stage ID: {}", stage.id);
            }
        }

        for stage in &self.stages {
            for dep in &stage.depends_on {
                if !seen_ids.contains(dep) {
                    anyhow::bail!("Stage '{}' depends on non-existent stage '{}'", stage.id, dep);
                }
            }

            match (stage.uses, stage.run.is_empty()) {
                (Some(action), false) => anyhow::bail!(
                    "Stage '{}' sets both `run` and `uses: {:?}`",
                    stage.id,
                    action
                ),
                (None, true) => anyhow::bail!("Stage '{}' has neither `run` nor `uses`", stage.id),
                _ => {}
            }
        }

        self.check_cycles()?;
        self.check_artifacts()?;

        Ok(())
    }

    /// Check for cycles in the stage dependency graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for stage in &self.stages {
            if !visited.contains(&stage.id) {
                self.dfs_check(&stage.id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        stage_id: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(stage_id.to_string());
        recursion_stack.insert(stage_id.to_string());

        if let Some(stage) = self.stages.iter().find(|s| s.id == stage_id) {
            for dep in &stage.depends_on {
                if recursion_stack.contains(dep) {
                    anyhow::bail!("Cycle detected in dependency graph involving stage '{}'", dep);
                }
                if !visited.contains(dep) {
                    self.dfs_check(dep, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(stage_id);
        Ok(())
    }

    /// Every consumed artifact must come from a (transitive) dependency
    fn check_artifacts(&self) -> Result<()> {
        let by_id: HashMap<&str, &StageConfig> =
            self.stages.iter().map(|s| (s.id.as_str(), s)).collect();

        for stage in &self.stages {
            if stage.consumes.is_empty() {
                continue;
            }

            let mut ancestors = HashSet::new();
            let mut stack: Vec<&str> = stage.depends_on.iter().map(String::as_str).collect();
            while let Some(id) = stack.pop() {
                if ancestors.insert(id) {
                    if let Some(dep) = by_id.get(id) {
                        stack.extend(dep.depends_on.iter().map(String::as_str));
                    }
                }
            }

            for artifact in &stage.consumes {
                let produced_upstream = ancestors.iter().any(|id| {
                    by_id
                        .get(id)
                        .is_some_and(|dep| dep.produces.contains(artifact))
                });
                if !produced_upstream {
                    anyhow::bail!(
                        "Stage '{}' consumes artifact '{}' that no upstream stage produces",
                        stage.id,
                        artifact
                    );
                }
            }
        }

        Ok(())
    }

    /// Convert config to the stage graph
    pub fn to_graph(&self) -> StageGraph {
        StageGraph::from_config(self)
    }
}
