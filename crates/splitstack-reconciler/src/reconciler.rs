//! Reconciler — drives an environment to match a configuration graph.
//!
//! `apply` tries to create the environment and falls back to an in-place
//! update when the control plane reports that it already exists. Either
//! way it blocks until convergence, then resolves the load balancer's
//! public address. `delete` tears the environment down and blocks until
//! it is gone. No state is kept between calls; the control plane is the
//! only source of truth.

use splitstack_core::{LoadBalancerConfig, Result};
use splitstack_planner::Template;
use tracing::{info, warn};

use crate::control_plane::{ControlPlane, CreateOutcome, UpdateOutcome};
use crate::poll::PollPolicy;
use crate::status::OperationKind;

/// Which path an apply took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPath {
    /// The environment did not exist and was created.
    Created,
    /// The environment existed and was updated in place.
    Updated,
    /// The environment existed and already matched the template.
    Unchanged,
}

/// Outcome of a converged apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub stack_id: String,
    pub environment_id: String,
    pub path: ApplyPath,
    /// Public DNS name of the load balancer.
    pub address: String,
}

pub struct Reconciler<C> {
    control_plane: C,
    polling: PollPolicy,
}

impl<C: ControlPlane> Reconciler<C> {
    pub fn new(control_plane: C, polling: PollPolicy) -> Self {
        Self {
            control_plane,
            polling,
        }
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Create or update the environment named `config.stack_id` and wait
    /// for it to converge.
    pub async fn apply(&self, config: &LoadBalancerConfig) -> Result<Deployment> {
        let template = Template::render(config)?;
        let stack = config.stack_id.as_str();
        let cp = &self.control_plane;

        info!(stack, digest = %template.digest(), "applying template");

        let (path, created_id) = match cp.create(stack, &template, &config.parameters).await? {
            CreateOutcome::Created { environment_id } => {
                info!(stack, "creating environment");
                (ApplyPath::Created, Some(environment_id))
            }
            CreateOutcome::AlreadyExists => {
                info!(stack, "environment exists, updating in place");
                match cp.update(stack, &template, &config.parameters).await? {
                    UpdateOutcome::Submitted => (ApplyPath::Updated, None),
                    UpdateOutcome::Unchanged => {
                        info!(stack, "environment already matches template");
                        (ApplyPath::Unchanged, None)
                    }
                }
            }
        };

        let described = cp.describe(stack).await?;
        let environment_id = described
            .map(|d| d.environment_id)
            .or(created_id)
            .unwrap_or_else(|| stack.to_string());
        if let Some(url) = cp.console_url(&environment_id) {
            info!(stack, %url, "view environment");
        }

        let operation = match path {
            ApplyPath::Created => Some(OperationKind::Create),
            ApplyPath::Updated => Some(OperationKind::Update),
            ApplyPath::Unchanged => None,
        };
        if let Some(operation) = operation {
            cp.wait_until_terminal(stack, operation, self.polling.for_operation(operation))
                .await?;
        }

        let physical_id = cp
            .describe_resource(stack, &config.load_balancer.logical_id)
            .await?;
        let address = cp.load_balancer_address(&physical_id).await?;
        info!(stack, %address, ?path, "environment converged");

        Ok(Deployment {
            stack_id: stack.to_string(),
            environment_id,
            path,
            address,
        })
    }

    /// Delete the environment `stack_id` and wait until it is absent.
    pub async fn delete(&self, stack_id: &str) -> Result<()> {
        warn!(stack = stack_id, "deleting environment");
        self.control_plane.delete(stack_id).await?;
        self.control_plane
            .wait_until_terminal(stack_id, OperationKind::Delete, self.polling.delete)
            .await?;
        info!(stack = stack_id, "environment deleted");
        Ok(())
    }
}
