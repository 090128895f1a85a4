//! Template planner — turns weighted versions into a configuration graph.
//!
//! For every version the planner asks the instance directory which
//! instances currently back its clusters and builds one target pool from
//! the answer. A single forwarding rule pairs each pool with its raw
//! weight, in input order.

use std::collections::HashSet;

use futures::future::try_join_all;
use splitstack_core::{
    naming, Error, ForwardingRule, HealthCheck, LoadBalancer, LoadBalancerConfig, Result,
    StackParameters, Target, TargetPool, VersionSpec, WeightedPool, LISTENER_PORT, SERVICE_PORT,
};
use tracing::{debug, info, warn};

use crate::discovery::InstanceDirectory;

/// Builds [`LoadBalancerConfig`]s for stacks in one region.
pub struct Planner<D> {
    directory: D,
    region: String,
}

impl<D: InstanceDirectory> Planner<D> {
    pub fn new(directory: D, region: &str) -> Self {
        Self {
            directory,
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Plan the configuration graph for `stack_id`.
    ///
    /// Input is validated before the first discovery call. Discovery runs
    /// concurrently, one call per version; a version whose clusters have
    /// no running instances still gets an (empty) target pool.
    pub async fn plan(
        &self,
        stack_id: &str,
        versions: &[VersionSpec],
        parameters: StackParameters,
    ) -> Result<LoadBalancerConfig> {
        naming::validate_versions(stack_id, versions)?;

        info!(
            stack = stack_id,
            region = %self.region,
            versions = versions.len(),
            "planning load balancer configuration"
        );

        let load_balancer_id = naming::load_balancer_id(stack_id);
        let load_balancer = LoadBalancer {
            logical_id: load_balancer_id.clone(),
            name: naming::load_balancer_name(stack_id),
        };

        let target_pools =
            try_join_all(versions.iter().map(|v| self.build_pool(stack_id, v))).await?;

        let forwarding_rule = ForwardingRule {
            logical_id: naming::listener_id(stack_id),
            load_balancer_ref: load_balancer_id,
            port: LISTENER_PORT,
            pools: versions
                .iter()
                .zip(&target_pools)
                .map(|(version, pool)| WeightedPool {
                    pool_ref: pool.logical_id.clone(),
                    weight: version.weight,
                })
                .collect(),
        };

        let config = LoadBalancerConfig {
            stack_id: stack_id.to_string(),
            parameters,
            load_balancer,
            forwarding_rule,
            target_pools,
        };
        config.check_integrity()?;

        info!(
            stack = stack_id,
            pools = config.target_pools.len(),
            targets = config.target_count(),
            "planned load balancer configuration"
        );
        Ok(config)
    }

    async fn build_pool(&self, stack_id: &str, version: &VersionSpec) -> Result<TargetPool> {
        let clusters = version.cluster_list();
        let instances = self.directory.discover(&self.region, &clusters).await?;
        let targets = self.to_targets(&clusters, instances)?;

        if targets.is_empty() {
            warn!(
                stack = stack_id,
                version = %version.label,
                ?clusters,
                "no running instances; target pool will be empty"
            );
        } else {
            debug!(
                stack = stack_id,
                version = %version.label,
                targets = targets.len(),
                "discovered targets"
            );
        }

        Ok(TargetPool {
            logical_id: naming::target_pool_id(stack_id, &version.label),
            name: naming::target_pool_name(stack_id, &version.label),
            version_label: version.label.clone(),
            port: SERVICE_PORT,
            health_check: HealthCheck::default(),
            targets,
        })
    }

    /// Reject blank ids; repeated ids collapse to their first occurrence.
    fn to_targets(&self, clusters: &[String], instances: Vec<String>) -> Result<Vec<Target>> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(instances.len());
        for instance_id in instances {
            if instance_id.trim().is_empty() {
                return Err(Error::discovery(
                    &self.region,
                    clusters,
                    "directory returned an empty instance id",
                ));
            }
            if seen.insert(instance_id.clone()) {
                targets.push(Target {
                    instance_id,
                    port: SERVICE_PORT,
                });
            }
        }
        Ok(targets)
    }
}
