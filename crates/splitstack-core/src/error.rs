//! Error taxonomy shared by the planner and the reconciler.

use thiserror::Error;

/// Result type alias for splitstack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or reconciling a stack.
///
/// Every variant crosses crate boundaries unchanged. The control plane's
/// "already exists" signal is not an error here; it is the tagged
/// `CreateOutcome::AlreadyExists` returned by the create call.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or semantically invalid input. Raised before any remote call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The instance directory failed or returned an inconsistent result.
    #[error("instance discovery failed in {region} for clusters {clusters:?}: {message}")]
    Discovery {
        region: String,
        clusters: Vec<String>,
        message: String,
    },

    /// The control plane reported a terminal failure during convergence.
    #[error("deployment of {environment} failed with status {status}: {reason}")]
    DeploymentFailed {
        environment: String,
        status: String,
        reason: String,
    },

    /// The named environment does not exist.
    #[error("environment not found: {0}")]
    NotFound(String),

    /// A control plane call failed before convergence could be observed.
    #[error("control plane request for {environment} failed: {message}")]
    ControlPlane { environment: String, message: String },

    /// The template artifact could not be written.
    #[error("failed to write template artifact: {0}")]
    Artifact(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn discovery(region: &str, clusters: &[String], message: impl ToString) -> Self {
        Self::Discovery {
            region: region.to_string(),
            clusters: clusters.to_vec(),
            message: message.to_string(),
        }
    }

    pub fn control_plane(environment: &str, message: impl ToString) -> Self {
        Self::ControlPlane {
            environment: environment.to_string(),
            message: message.to_string(),
        }
    }

    /// Short machine-friendly name of the error kind, used in operator output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Discovery { .. } => "DiscoveryError",
            Self::DeploymentFailed { .. } => "DeploymentFailed",
            Self::NotFound(_) => "NotFound",
            Self::ControlPlane { .. } => "ControlPlaneError",
            Self::Artifact(_) => "ArtifactError",
        }
    }
}
