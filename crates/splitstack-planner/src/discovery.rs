//! Instance directory — resolves cluster identifiers to running instances.
//!
//! The planner only depends on the [`InstanceDirectory`] trait. The EC2
//! implementation lives in `splitstack-aws`; [`StaticDirectory`] serves
//! offline planning from an inventory file and test doubles.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use splitstack_core::{Error, Result};
use tracing::debug;

/// Boxed future alias for discovery results.
pub type DiscoverFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// Source of currently running instances, injected into the planner.
pub trait InstanceDirectory: Send + Sync {
    /// Instance ids in `region` that are running and tagged with any of
    /// `clusters`.
    fn discover<'a>(&'a self, region: &'a str, clusters: &'a [String]) -> DiscoverFuture<'a>;
}

impl<T: InstanceDirectory + ?Sized> InstanceDirectory for &T {
    fn discover<'a>(&'a self, region: &'a str, clusters: &'a [String]) -> DiscoverFuture<'a> {
        (**self).discover(region, clusters)
    }
}

impl<T: InstanceDirectory + ?Sized> InstanceDirectory for Arc<T> {
    fn discover<'a>(&'a self, region: &'a str, clusters: &'a [String]) -> DiscoverFuture<'a> {
        (**self).discover(region, clusters)
    }
}

/// Fixed cluster → instances mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    clusters: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    clusters: HashMap<String, Vec<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the running instances of one cluster.
    pub fn with_cluster<I, S>(mut self, cluster: &str, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clusters.insert(
            cluster.to_string(),
            instances.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Load an inventory file:
    ///
    /// ```toml
    /// [clusters]
    /// c1 = ["i-aaa", "i-bbb"]
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read inventory {}: {e}", path.display())))?;
        let inventory: InventoryFile = toml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid inventory {}: {e}", path.display())))?;
        debug!(path = %path.display(), clusters = inventory.clusters.len(), "inventory loaded");
        Ok(Self {
            clusters: inventory.clusters,
        })
    }

    fn lookup(&self, clusters: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        clusters
            .iter()
            .filter_map(|c| self.clusters.get(c))
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

impl InstanceDirectory for StaticDirectory {
    fn discover<'a>(&'a self, _region: &'a str, clusters: &'a [String]) -> DiscoverFuture<'a> {
        Box::pin(async move { Ok(self.lookup(clusters)) })
    }
}
