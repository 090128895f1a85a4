//! The load balancer configuration graph.
//!
//! A [`LoadBalancerConfig`] is rebuilt from live instance state on every
//! planning cycle and handed to the reconciler as a whole. Nothing in it
//! is diffed incrementally.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Port every backend instance serves on.
pub const SERVICE_PORT: u16 = 8000;

/// Port the load balancer listener accepts traffic on.
pub const LISTENER_PORT: u16 = 80;

// ── Input ─────────────────────────────────────────────────────────

/// One deployed variant of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    /// Unique within a planning call.
    pub label: String,
    /// Relative weight. Not normalized; the control plane does that.
    pub weight: u32,
    /// Cluster identifiers whose running instances back this version.
    pub clusters: BTreeSet<String>,
}

impl VersionSpec {
    pub fn new<I, S>(label: &str, weight: u32, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.to_string(),
            weight,
            clusters: clusters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cluster_list(&self) -> Vec<String> {
        self.clusters.iter().cloned().collect()
    }
}

/// Network placement passed to the control plane alongside the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StackParameters {
    pub security_groups: Vec<String>,
    pub subnets: Vec<String>,
    pub vpc_id: String,
}

impl StackParameters {
    pub const SECURITY_GROUPS: &'static str = "SecurityGroups";
    pub const SUBNETS: &'static str = "Subnets";
    pub const VPC_ID: &'static str = "VPCID";

    /// Key/value pairs as submitted to the control plane. List values
    /// are comma-delimited.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            (Self::SECURITY_GROUPS.to_string(), self.security_groups.join(",")),
            (Self::SUBNETS.to_string(), self.subnets.join(",")),
            (Self::VPC_ID.to_string(), self.vpc_id.clone()),
        ]
    }
}

// ── Graph ─────────────────────────────────────────────────────────

/// One backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub instance_id: String,
    pub port: u16,
}

/// Health check policy applied to every target pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub healthy_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/healthcheck".to_string(),
            interval_secs: 5,
            timeout_secs: 4,
            healthy_threshold: 2,
        }
    }
}

/// Backends for one version, health-checked independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPool {
    /// Template key, referenced from the forwarding rule.
    pub logical_id: String,
    /// Physical name, derived from `(stack_id, version_label)`.
    pub name: String,
    pub version_label: String,
    pub port: u16,
    pub health_check: HealthCheck,
    /// May be empty: the control plane marks such a pool unhealthy.
    pub targets: Vec<Target>,
}

/// A reference to a target pool paired with its raw weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedPool {
    pub pool_ref: String,
    pub weight: u32,
}

/// The stack's single weighted forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub logical_id: String,
    pub load_balancer_ref: String,
    pub port: u16,
    /// In input order. Routing is by weight, not by position.
    pub pools: Vec<WeightedPool>,
}

/// The stack's load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub logical_id: String,
    pub name: String,
}

/// Root of the configuration graph, owned by the environment `stack_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    pub stack_id: String,
    pub parameters: StackParameters,
    pub load_balancer: LoadBalancer,
    pub forwarding_rule: ForwardingRule,
    pub target_pools: Vec<TargetPool>,
}

impl LoadBalancerConfig {
    /// Look up a target pool by logical id.
    pub fn pool(&self, logical_id: &str) -> Option<&TargetPool> {
        self.target_pools.iter().find(|p| p.logical_id == logical_id)
    }

    /// Look up a target pool by version label.
    pub fn pool_for_version(&self, label: &str) -> Option<&TargetPool> {
        self.target_pools.iter().find(|p| p.version_label == label)
    }

    /// Total number of targets across all pools.
    pub fn target_count(&self) -> usize {
        self.target_pools.iter().map(|p| p.targets.len()).sum()
    }

    /// Verify the graph invariants: the forwarding rule references exactly
    /// the pools present, each once, and points at this load balancer.
    pub fn check_integrity(&self) -> Result<()> {
        if self.forwarding_rule.load_balancer_ref != self.load_balancer.logical_id {
            return Err(Error::config(format!(
                "forwarding rule references load balancer {}, expected {}",
                self.forwarding_rule.load_balancer_ref, self.load_balancer.logical_id
            )));
        }

        let pools: HashSet<&str> = self
            .target_pools
            .iter()
            .map(|p| p.logical_id.as_str())
            .collect();
        if pools.len() != self.target_pools.len() {
            return Err(Error::config("duplicate target pool in configuration graph"));
        }

        let mut referenced = HashSet::new();
        for entry in &self.forwarding_rule.pools {
            if !pools.contains(entry.pool_ref.as_str()) {
                return Err(Error::config(format!(
                    "forwarding rule references missing target pool {}",
                    entry.pool_ref
                )));
            }
            if !referenced.insert(entry.pool_ref.as_str()) {
                return Err(Error::config(format!(
                    "forwarding rule references target pool {} twice",
                    entry.pool_ref
                )));
            }
        }
        if referenced.len() != pools.len() {
            return Err(Error::config("configuration graph contains an orphaned target pool"));
        }
        Ok(())
    }
}
