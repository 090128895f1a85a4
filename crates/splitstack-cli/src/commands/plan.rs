use std::path::{Path, PathBuf};

use splitstack_aws::Ec2Directory;
use splitstack_planner::{StaticDirectory, Template};

use super::{load_config, render};

/// Render the template for a config and write it out. Returns the path
/// written and the rendered template.
pub async fn plan(
    path: &Path,
    inventory: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<(PathBuf, Template)> {
    let config = load_config(path)?;

    let (graph, template) = match inventory {
        Some(inventory) => render(&config, StaticDirectory::from_file(inventory)?).await?,
        None => {
            let sdk = splitstack_aws::load_config(&config.region).await;
            render(&config, Ec2Directory::new(sdk, config.cluster_tag())).await?
        }
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.template_output());
    template.write_to(&output)?;

    println!("✓ Planned stack {}", graph.stack_id);
    for pool in &graph.target_pools {
        println!("  {:<24} {} targets", pool.name, pool.targets.len());
    }
    println!("  Output: {}", output.display());
    println!("  SHA256: {}", template.digest());
    Ok((output, template))
}
