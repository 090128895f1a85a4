//! Remote environment lifecycle.
//!
//! The control plane reports an environment's state as one of a fixed set
//! of lifecycle statuses. Whether a status means "keep waiting", "done" or
//! "failed" depends on which operation the caller submitted, so the
//! classification takes the [`OperationKind`] into account.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The operation whose completion is being awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Classification of one status observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Not terminal yet.
    Pending,
    /// Terminal success for the awaited operation.
    Succeeded,
    /// Terminal failure for the awaited operation.
    Failed,
}

#[derive(Debug, Error)]
#[error("unknown stack status: {0}")]
pub struct UnknownStatus(pub String);

macro_rules! stack_statuses {
    ($($variant:ident => $wire:literal,)+) => {
        /// Lifecycle status of a remote environment.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StackStatus {
            $($variant,)+
        }

        impl StackStatus {
            /// Wire name, e.g. `CREATE_COMPLETE`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for StackStatus {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

stack_statuses! {
    CreateInProgress => "CREATE_IN_PROGRESS",
    CreateFailed => "CREATE_FAILED",
    CreateComplete => "CREATE_COMPLETE",
    RollbackInProgress => "ROLLBACK_IN_PROGRESS",
    RollbackFailed => "ROLLBACK_FAILED",
    RollbackComplete => "ROLLBACK_COMPLETE",
    DeleteInProgress => "DELETE_IN_PROGRESS",
    DeleteFailed => "DELETE_FAILED",
    DeleteComplete => "DELETE_COMPLETE",
    UpdateInProgress => "UPDATE_IN_PROGRESS",
    UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
    UpdateComplete => "UPDATE_COMPLETE",
    UpdateFailed => "UPDATE_FAILED",
    UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
    UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
    UpdateRollbackCompleteCleanupInProgress => "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
    UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
    ReviewInProgress => "REVIEW_IN_PROGRESS",
    ImportInProgress => "IMPORT_IN_PROGRESS",
    ImportComplete => "IMPORT_COMPLETE",
    ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
    ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
    ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StackStatus {
    /// Classify this status for the awaited operation.
    ///
    /// Rollbacks in progress count as pending: the failure is reported once
    /// the rollback settles, together with its final reason.
    pub fn convergence(self, operation: OperationKind) -> Convergence {
        use Convergence::*;
        use StackStatus::*;

        match operation {
            OperationKind::Create => match self {
                CreateComplete => Succeeded,
                CreateInProgress | ReviewInProgress | RollbackInProgress => Pending,
                _ => Failed,
            },
            OperationKind::Update => match self {
                UpdateComplete => Succeeded,
                UpdateInProgress
                | UpdateCompleteCleanupInProgress
                | UpdateRollbackInProgress
                | UpdateRollbackCompleteCleanupInProgress => Pending,
                _ => Failed,
            },
            OperationKind::Delete => match self {
                DeleteComplete => Succeeded,
                DeleteFailed => Failed,
                _ => Pending,
            },
        }
    }

    /// Classification when the environment cannot be found at all.
    pub fn absent(operation: OperationKind) -> Convergence {
        match operation {
            OperationKind::Delete => Convergence::Succeeded,
            OperationKind::Create | OperationKind::Update => Convergence::Failed,
        }
    }
}
