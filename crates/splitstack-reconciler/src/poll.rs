//! Convergence polling.
//!
//! After a submission the reconciler waits a grace period, then describes
//! the environment at a fixed interval until its status is terminal for
//! the submitted operation or it runs out of attempts.

use std::time::Duration;

use splitstack_core::{Error, PollWindow, PollingConfig, Result};
use tracing::{debug, info, warn};

use crate::control_plane::{ControlPlane, EnvironmentDescription};
use crate::status::{Convergence, OperationKind, StackStatus};

/// Cadence of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait before the first describe.
    pub initial_delay: Duration,
    /// Wait between describes.
    pub interval: Duration,
    /// Describes before giving up.
    pub max_attempts: u32,
}

impl PollConfig {
    pub const fn from_secs(initial_delay: u64, interval: u64, max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::from_secs(initial_delay),
            interval: Duration::from_secs(interval),
            max_attempts,
        }
    }

    /// Apply the fields set in a config file window.
    pub fn with_window(mut self, window: &PollWindow) -> Self {
        if let Some(secs) = window.initial_delay_secs {
            self.initial_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = window.interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(n) = window.max_attempts {
            self.max_attempts = n;
        }
        self
    }
}

/// Per-operation cadences.
///
/// Updates touch a resource that may already be serving traffic, so the
/// update path waits longer before its first poll than the create path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub create: PollConfig,
    pub update: PollConfig,
    pub delete: PollConfig,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            create: PollConfig::from_secs(5, 5, 120),
            update: PollConfig::from_secs(15, 5, 120),
            delete: PollConfig::from_secs(1, 1, 120),
        }
    }
}

impl PollPolicy {
    /// Defaults overlaid with the config file's `[polling]` section.
    pub fn from_config(config: Option<&PollingConfig>) -> Self {
        let mut policy = Self::default();
        if let Some(config) = config {
            if let Some(w) = &config.create {
                policy.create = policy.create.with_window(w);
            }
            if let Some(w) = &config.update {
                policy.update = policy.update.with_window(w);
            }
            if let Some(w) = &config.delete {
                policy.delete = policy.delete.with_window(w);
            }
        }
        policy
    }

    pub fn for_operation(&self, operation: OperationKind) -> PollConfig {
        match operation {
            OperationKind::Create => self.create,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
        }
    }
}

/// Poll `env` until `operation` is terminal.
///
/// Returns the final description, or `None` when a delete left the
/// environment absent. A terminal failure, or running out of attempts,
/// is [`Error::DeploymentFailed`] with the last observed status.
pub async fn wait_until_terminal<C: ControlPlane + ?Sized>(
    control_plane: &C,
    env: &str,
    operation: OperationKind,
    poll: PollConfig,
) -> Result<Option<EnvironmentDescription>> {
    debug!(env, %operation, ?poll, "waiting for convergence");
    tokio::time::sleep(poll.initial_delay).await;

    let attempts = poll.max_attempts.max(1);
    let mut last: Option<EnvironmentDescription> = None;

    for attempt in 1..=attempts {
        let observed = control_plane.describe(env).await?;
        let convergence = match &observed {
            Some(desc) => desc.status.convergence(operation),
            None => StackStatus::absent(operation),
        };

        match convergence {
            Convergence::Succeeded => {
                info!(env, %operation, attempt, "converged");
                return Ok(observed);
            }
            Convergence::Failed => {
                let err = failure(env, observed.as_ref());
                warn!(env, %operation, error = %err, "convergence failed");
                return Err(err);
            }
            Convergence::Pending => {
                debug!(
                    env,
                    %operation,
                    attempt,
                    status = observed.as_ref().map(|d| d.status.as_str()).unwrap_or("ABSENT"),
                    "still converging"
                );
                last = observed;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    Err(Error::DeploymentFailed {
        environment: env.to_string(),
        status: last
            .as_ref()
            .map(|d| d.status.as_str())
            .unwrap_or("ABSENT")
            .to_string(),
        reason: format!("{operation} did not reach a terminal state after {attempts} polls"),
    })
}

fn failure(env: &str, observed: Option<&EnvironmentDescription>) -> Error {
    match observed {
        Some(desc) => Error::DeploymentFailed {
            environment: env.to_string(),
            status: desc.status.as_str().to_string(),
            reason: desc
                .reason
                .clone()
                .unwrap_or_else(|| "no reason reported".to_string()),
        },
        None => Error::DeploymentFailed {
            environment: env.to_string(),
            status: "ABSENT".to_string(),
            reason: "environment disappeared while converging".to_string(),
        },
    }
}
