pub mod apply;
pub mod delete;
pub mod plan;

use std::path::Path;

use anyhow::bail;
use splitstack_core::{LoadBalancerConfig, StackConfig};
use splitstack_planner::{InstanceDirectory, Planner, Template};

/// Load and validate a stack config. A missing file is reported before
/// anything else runs.
pub fn load_config(path: &Path) -> anyhow::Result<StackConfig> {
    if !path.exists() {
        bail!("config file {} does not exist", path.display());
    }
    Ok(StackConfig::from_file(path)?)
}

/// Plan the configuration graph and render its template.
pub async fn render<D: InstanceDirectory>(
    config: &StackConfig,
    directory: D,
) -> splitstack_core::Result<(LoadBalancerConfig, Template)> {
    let planner = Planner::new(directory, &config.region);
    let graph = planner
        .plan(&config.stack_name, &config.version_specs(), config.parameters())
        .await?;
    let template = Template::render(&graph)?;
    Ok((graph, template))
}
