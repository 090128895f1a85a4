//! Stack configuration file parser.
//!
//! The operator describes one stack per document. TOML is the native
//! format; `.yaml`/`.yml` files are accepted as well.
//!
//! ```toml
//! stack_name = "prod"
//! region = "us-west-2"
//! security_groups = ["sg-0123"]
//! subnets = "subnet-a,subnet-b"
//! vpc_id = "vpc-0abc"
//!
//! [[versions]]
//! version = "v1"
//! weight = 90
//! clusters = ["ses_abc"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::naming;
use crate::types::{StackParameters, VersionSpec};

/// Inventory tag that carries cluster identifiers, unless overridden.
pub const DEFAULT_CLUSTER_TAG: &str = "anyscale-session-id";

/// File the rendered template is written to, unless overridden.
pub const DEFAULT_TEMPLATE_OUTPUT: &str = "cf_template.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack_name: String,
    pub region: String,
    #[serde(default)]
    pub security_groups: StringList,
    #[serde(default)]
    pub subnets: StringList,
    pub vpc_id: String,
    pub cluster_tag: Option<String>,
    pub template_output: Option<PathBuf>,
    pub versions: Vec<VersionEntry>,
    pub polling: Option<PollingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    #[serde(alias = "label")]
    pub version: String,
    pub weight: u32,
    #[serde(alias = "cluster_ids")]
    pub clusters: StringList,
}

/// A list given either as a sequence or as one comma-delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    List(Vec<String>),
    Delimited(String),
}

impl Default for StringList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl StringList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Delimited(s) => s
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Optional overrides for convergence polling, per operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingConfig {
    pub create: Option<PollWindow>,
    pub update: Option<PollWindow>,
    pub delete: Option<PollWindow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollWindow {
    pub initial_delay_secs: Option<u64>,
    pub interval_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

impl StackConfig {
    /// Read and validate a stack configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config = match Format::of(path) {
            Format::Yaml => Self::from_yaml_str(&content)?,
            Format::Toml => Self::from_toml_str(&content)?,
        };
        debug!(path = %path.display(), stack = %config.stack_name, "stack config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StackConfig =
            toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: StackConfig =
            serde_yaml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the required fields and naming rules.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::config("region must not be empty"));
        }
        if self.vpc_id.trim().is_empty() {
            return Err(Error::config("vpc_id must not be empty"));
        }
        if self.security_groups.to_vec().is_empty() {
            return Err(Error::config("at least one security group is required"));
        }
        if self.subnets.to_vec().is_empty() {
            return Err(Error::config("at least one subnet is required"));
        }
        for entry in &self.versions {
            if entry.clusters.to_vec().is_empty() {
                return Err(Error::config(format!(
                    "version {:?} lists no clusters",
                    entry.version
                )));
            }
        }
        naming::validate_versions(&self.stack_name, &self.version_specs())
    }

    /// Versions in declaration order.
    pub fn version_specs(&self) -> Vec<VersionSpec> {
        self.versions
            .iter()
            .map(|v| VersionSpec {
                label: v.version.clone(),
                weight: v.weight,
                clusters: v.clusters.to_vec().into_iter().collect::<BTreeSet<_>>(),
            })
            .collect()
    }

    pub fn parameters(&self) -> StackParameters {
        StackParameters {
            security_groups: self.security_groups.to_vec(),
            subnets: self.subnets.to_vec(),
            vpc_id: self.vpc_id.clone(),
        }
    }

    pub fn cluster_tag(&self) -> &str {
        self.cluster_tag.as_deref().unwrap_or(DEFAULT_CLUSTER_TAG)
    }

    pub fn template_output(&self) -> PathBuf {
        self.template_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_OUTPUT))
    }
}
