use std::path::Path;

use splitstack_aws::CloudFormationControlPlane;
use splitstack_reconciler::{PollPolicy, Reconciler};

use super::load_config;

pub async fn delete(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let sdk = splitstack_aws::load_config(&config.region).await;

    let reconciler = Reconciler::new(
        CloudFormationControlPlane::new(&sdk)?,
        PollPolicy::from_config(config.polling.as_ref()),
    );
    reconciler.delete(&config.stack_name).await?;

    println!("✓ Stack {} deleted", config.stack_name);
    Ok(())
}
