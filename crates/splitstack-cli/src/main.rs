use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "splitstack",
    about = "Weighted multi-version load balancer stacks",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, render and converge the stack described by a config file.
    ///
    /// Creates the stack if it does not exist, otherwise updates it in
    /// place, then prints the load balancer's DNS name.
    Apply {
        /// Stack config (.toml, .yaml or .yml)
        config: PathBuf,
    },
    /// Delete the stack named in a config file and wait until it is gone
    Delete {
        /// Stack config (.toml, .yaml or .yml)
        config: PathBuf,
    },
    /// Render the template without touching the control plane
    Plan {
        /// Stack config (.toml, .yaml or .yml)
        config: PathBuf,
        /// Resolve clusters from an inventory file instead of EC2
        #[arg(short, long)]
        inventory: Option<PathBuf>,
        /// Where to write the template (default: the config's template_output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let result = match cli.command {
        Commands::Apply { config } => commands::apply::apply(&config).await,
        Commands::Delete { config } => commands::delete::delete(&config).await,
        Commands::Plan {
            config,
            inventory,
            output,
        } => commands::plan::plan(&config, inventory.as_deref(), output.as_deref())
            .await
            .map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}

/// The single line printed for a failed command.
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<splitstack_core::Error>() {
        Some(e) => format!("{}: {e}", e.kind()),
        None => format!("Error: {err:#}"),
    }
}
