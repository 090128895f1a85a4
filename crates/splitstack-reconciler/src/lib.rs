//! splitstack-reconciler — create-or-update against a remote control plane.
//!
//! The reconciler holds no state of its own. Each environment moves
//! through the control plane's lifecycle:
//!
//! ```text
//! Absent ──apply──▶ Creating ──▶ Converging ──▶ Ready
//! Ready  ──apply──▶ Updating ──▶ Converging ──▶ Ready
//! Ready  ──delete─▶ Deleting ──▶ Converging ──▶ Absent
//! ```
//!
//! # Components
//!
//! - **`control_plane`** — Control plane seam and its outcome types
//! - **`status`** — Lifecycle statuses and their classification per operation
//! - **`poll`** — Per-operation polling cadence and the convergence wait
//! - **`reconciler`** — `apply` / `delete`

pub mod control_plane;
pub mod poll;
pub mod reconciler;
pub mod status;

pub use control_plane::{
    ControlPlane, ControlPlaneFuture, CreateOutcome, EnvironmentDescription, UpdateOutcome,
};
pub use poll::{wait_until_terminal, PollConfig, PollPolicy};
pub use reconciler::{ApplyPath, Deployment, Reconciler};
pub use status::{Convergence, OperationKind, StackStatus};
