//! splitstack-aws — AWS implementations of the planner and reconciler seams.
//!
//! - [`Ec2Directory`] resolves cluster tags to running EC2 instances.
//! - [`CloudFormationControlPlane`] stores environments as CloudFormation
//!   stacks and resolves load balancer addresses through ELBv2.

pub mod cloudformation;
pub mod ec2;

pub use cloudformation::CloudFormationControlPlane;
pub use ec2::Ec2Directory;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Shared SDK configuration for `region`, credentials from the default chain.
pub async fn load_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
