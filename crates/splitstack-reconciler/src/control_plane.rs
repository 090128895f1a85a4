//! Control plane seam — stores and converges declarative environments.
//!
//! The reconciler only talks to the control plane through
//! [`ControlPlane`]. The CloudFormation implementation lives in
//! `splitstack-aws`; tests substitute in-memory doubles.

use std::future::Future;
use std::pin::Pin;

use splitstack_core::{Result, StackParameters};
use splitstack_planner::Template;

use crate::poll::{self, PollConfig};
use crate::status::{OperationKind, StackStatus};

/// Boxed future alias for control plane calls.
pub type ControlPlaneFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Result of a creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Creation was accepted; convergence is still pending.
    Created { environment_id: String },
    /// An environment with this name already exists.
    AlreadyExists,
}

/// Result of an in-place update submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was accepted; convergence is still pending.
    Submitted,
    /// The submitted template matches what is deployed.
    Unchanged,
}

/// Point-in-time view of a remote environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDescription {
    /// Control-plane-assigned physical id.
    pub environment_id: String,
    pub status: StackStatus,
    pub reason: Option<String>,
}

/// Remote API that stores and converges environments.
pub trait ControlPlane: Send + Sync {
    /// Submit creation of `env`. Signals [`CreateOutcome::AlreadyExists`]
    /// instead of failing when the name is taken.
    fn create<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, CreateOutcome>;

    /// Submit an in-place update of an existing `env`.
    fn update<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, UpdateOutcome>;

    /// Submit deletion of `env`.
    fn delete<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, ()>;

    /// Current state of `env`, or `None` when it does not exist.
    fn describe<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>>;

    /// Physical id of the resource `logical_id` inside `env`.
    fn describe_resource<'a>(&'a self, env: &'a str, logical_id: &'a str)
    -> ControlPlaneFuture<'a, String>;

    /// Public DNS name assigned to a load balancer.
    fn load_balancer_address<'a>(&'a self, physical_id: &'a str) -> ControlPlaneFuture<'a, String>;

    /// Where an operator can inspect the environment, if anywhere.
    fn console_url(&self, _environment_id: &str) -> Option<String> {
        None
    }

    /// Block until `operation` on `env` reaches a terminal state.
    fn wait_until_terminal<'a>(
        &'a self,
        env: &'a str,
        operation: OperationKind,
        poll: PollConfig,
    ) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        Box::pin(poll::wait_until_terminal(self, env, operation, poll))
    }
}

impl<T: ControlPlane + ?Sized> ControlPlane for &T {
    fn create<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, CreateOutcome> {
        (**self).create(env, template, parameters)
    }

    fn update<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, UpdateOutcome> {
        (**self).update(env, template, parameters)
    }

    fn delete<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, ()> {
        (**self).delete(env)
    }

    fn describe<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        (**self).describe(env)
    }

    fn describe_resource<'a>(
        &'a self,
        env: &'a str,
        logical_id: &'a str,
    ) -> ControlPlaneFuture<'a, String> {
        (**self).describe_resource(env, logical_id)
    }

    fn load_balancer_address<'a>(&'a self, physical_id: &'a str) -> ControlPlaneFuture<'a, String> {
        (**self).load_balancer_address(physical_id)
    }

    fn console_url(&self, environment_id: &str) -> Option<String> {
        (**self).console_url(environment_id)
    }

    fn wait_until_terminal<'a>(
        &'a self,
        env: &'a str,
        operation: OperationKind,
        poll: PollConfig,
    ) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        (**self).wait_until_terminal(env, operation, poll)
    }
}
