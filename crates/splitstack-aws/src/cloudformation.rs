//! CloudFormation-backed control plane.
//!
//! Environments are stacks named after the stack id. Load balancer
//! addresses come from ELBv2 in the same region.

use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Parameter, Stack};
use splitstack_core::{Error, Result, StackParameters};
use splitstack_planner::Template;
use splitstack_reconciler::{
    ControlPlane, ControlPlaneFuture, CreateOutcome, EnvironmentDescription, StackStatus,
    UpdateOutcome,
};
use tracing::{debug, info};

const NO_UPDATES: &str = "No updates are to be performed";
const DOES_NOT_EXIST: &str = "does not exist";

#[derive(Debug, Clone)]
pub struct CloudFormationControlPlane {
    cfn: aws_sdk_cloudformation::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    region: String,
}

impl CloudFormationControlPlane {
    /// Clients for the region configured in `sdk`.
    pub fn new(sdk: &SdkConfig) -> Result<Self> {
        let region = sdk
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| Error::config("no AWS region configured"))?;
        Ok(Self {
            cfn: aws_sdk_cloudformation::Client::new(sdk),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(sdk),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn create_stack(
        &self,
        env: &str,
        template: &Template,
        parameters: &StackParameters,
    ) -> Result<CreateOutcome> {
        let result = self
            .cfn
            .create_stack()
            .stack_name(env)
            .template_body(template.body())
            .set_parameters(Some(stack_parameters(parameters)))
            .send()
            .await;

        match result {
            Ok(output) => {
                let environment_id = output.stack_id().unwrap_or(env).to_string();
                info!(env, %environment_id, "stack creation submitted");
                Ok(CreateOutcome::Created { environment_id })
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_already_exists_exception()) =>
            {
                debug!(env, "stack already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(Error::control_plane(env, DisplayErrorContext(&err))),
        }
    }

    async fn update_stack(
        &self,
        env: &str,
        template: &Template,
        parameters: &StackParameters,
    ) -> Result<UpdateOutcome> {
        let result = self
            .cfn
            .update_stack()
            .stack_name(env)
            .template_body(template.body())
            .set_parameters(Some(stack_parameters(parameters)))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(env, "stack update submitted");
                Ok(UpdateOutcome::Submitted)
            }
            Err(err) => match err.as_service_error().and_then(|e| e.message()) {
                Some(message) if is_no_op_update(message) => Ok(UpdateOutcome::Unchanged),
                Some(message) if is_missing_stack(message) => Err(Error::NotFound(env.to_string())),
                _ => Err(Error::control_plane(env, DisplayErrorContext(&err))),
            },
        }
    }

    async fn delete_stack(&self, env: &str) -> Result<()> {
        // DeleteStack succeeds silently on unknown names.
        if self.describe_stack(env).await?.is_none() {
            return Err(Error::NotFound(env.to_string()));
        }
        self.cfn
            .delete_stack()
            .stack_name(env)
            .send()
            .await
            .map_err(|e| Error::control_plane(env, DisplayErrorContext(&e)))?;
        info!(env, "stack deletion submitted");
        Ok(())
    }

    async fn describe_stack(&self, env: &str) -> Result<Option<EnvironmentDescription>> {
        let output = match self.cfn.describe_stacks().stack_name(env).send().await {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .is_some_and(is_missing_stack) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(Error::control_plane(env, DisplayErrorContext(&err))),
        };

        output
            .stacks()
            .first()
            .map(|stack| describe(env, stack))
            .transpose()
    }

    async fn physical_id(&self, env: &str, logical_id: &str) -> Result<String> {
        let output = self
            .cfn
            .describe_stack_resource()
            .stack_name(env)
            .logical_resource_id(logical_id)
            .send()
            .await
            .map_err(|e| Error::control_plane(env, DisplayErrorContext(&e)))?;

        output
            .stack_resource_detail()
            .and_then(|detail| detail.physical_resource_id())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::control_plane(env, format!("resource {logical_id} has no physical id"))
            })
    }

    async fn dns_name(&self, load_balancer_arn: &str) -> Result<String> {
        let output = self
            .elb
            .describe_load_balancers()
            .load_balancer_arns(load_balancer_arn)
            .send()
            .await
            .map_err(|e| Error::control_plane(load_balancer_arn, DisplayErrorContext(&e)))?;

        output
            .load_balancers()
            .first()
            .and_then(|lb| lb.dns_name())
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(load_balancer_arn.to_string()))
    }
}

impl ControlPlane for CloudFormationControlPlane {
    fn create<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, CreateOutcome> {
        Box::pin(self.create_stack(env, template, parameters))
    }

    fn update<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, UpdateOutcome> {
        Box::pin(self.update_stack(env, template, parameters))
    }

    fn delete<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, ()> {
        Box::pin(self.delete_stack(env))
    }

    fn describe<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        Box::pin(self.describe_stack(env))
    }

    fn describe_resource<'a>(
        &'a self,
        env: &'a str,
        logical_id: &'a str,
    ) -> ControlPlaneFuture<'a, String> {
        Box::pin(self.physical_id(env, logical_id))
    }

    fn load_balancer_address<'a>(&'a self, physical_id: &'a str) -> ControlPlaneFuture<'a, String> {
        Box::pin(self.dns_name(physical_id))
    }

    fn console_url(&self, environment_id: &str) -> Option<String> {
        Some(console_url(&self.region, environment_id))
    }
}

fn describe(env: &str, stack: &Stack) -> Result<EnvironmentDescription> {
    let status = stack
        .stack_status()
        .as_str()
        .parse::<StackStatus>()
        .map_err(|e| Error::control_plane(env, e))?;
    Ok(EnvironmentDescription {
        environment_id: stack.stack_id().unwrap_or(env).to_string(),
        status,
        reason: stack.stack_status_reason().map(str::to_string),
    })
}

fn stack_parameters(parameters: &StackParameters) -> Vec<Parameter> {
    parameters
        .to_pairs()
        .into_iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

/// Stack detail page in the CloudFormation console.
pub fn console_url(region: &str, stack_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}#stacks/stackinfo?stackId={stack_id}"
    )
}

fn is_no_op_update(message: &str) -> bool {
    message.contains(NO_UPDATES)
}

fn is_missing_stack(message: &str) -> bool {
    message.contains(DOES_NOT_EXIST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_comma_joined() {
        let params = stack_parameters(&StackParameters {
            security_groups: vec!["sg-1".into(), "sg-2".into()],
            subnets: vec!["subnet-a".into()],
            vpc_id: "vpc-1".into(),
        });
        let pairs: Vec<(Option<&str>, Option<&str>)> = params
            .iter()
            .map(|p| (p.parameter_key(), p.parameter_value()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Some("SecurityGroups"), Some("sg-1,sg-2")),
                (Some("Subnets"), Some("subnet-a")),
                (Some("VPCID"), Some("vpc-1")),
            ]
        );
    }

    #[test]
    fn console_link_points_at_region() {
        let url = console_url("us-west-2", "arn:aws:cloudformation:us-west-2:1:stack/prod/abc");
        assert!(url.starts_with("https://us-west-2.console.aws.amazon.com/cloudformation/home?region=us-west-2"));
        assert!(url.ends_with("stackId=arn:aws:cloudformation:us-west-2:1:stack/prod/abc"));
    }

    #[test]
    fn classifies_service_messages() {
        assert!(is_no_op_update("No updates are to be performed."));
        assert!(!is_no_op_update("Template format error"));
        assert!(is_missing_stack("Stack with id prod does not exist"));
        assert!(!is_missing_stack("Rate exceeded"));
    }

    #[test]
    fn region_is_required() {
        let sdk = SdkConfig::builder().build();
        assert!(matches!(
            CloudFormationControlPlane::new(&sdk),
            Err(Error::Configuration(_))
        ));
    }
}
