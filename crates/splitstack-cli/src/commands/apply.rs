use std::path::Path;

use splitstack_aws::{CloudFormationControlPlane, Ec2Directory};
use splitstack_reconciler::{ApplyPath, PollPolicy, Reconciler};

use super::{load_config, render};

pub async fn apply(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let sdk = splitstack_aws::load_config(&config.region).await;

    let directory = Ec2Directory::new(sdk.clone(), config.cluster_tag());
    let (graph, template) = render(&config, directory).await?;
    template.write_to(&config.template_output())?;

    let control_plane = CloudFormationControlPlane::new(&sdk)?;
    let reconciler = Reconciler::new(
        control_plane,
        PollPolicy::from_config(config.polling.as_ref()),
    );
    let deployment = reconciler.apply(&graph).await?;

    let verb = match deployment.path {
        ApplyPath::Created => "created",
        ApplyPath::Updated => "updated",
        ApplyPath::Unchanged => "unchanged",
    };
    println!("✓ Stack {} {verb}", deployment.stack_id);
    println!("  Targets: {}", graph.target_count());
    println!("  DNS:     {}", deployment.address);
    Ok(())
}
