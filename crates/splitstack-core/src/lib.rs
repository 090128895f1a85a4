//! splitstack-core — shared types for weighted multi-version load balancing.
//!
//! Holds the configuration graph that the planner builds and the
//! reconciler submits, the error taxonomy both of them speak, the stack
//! config file parser, and the deterministic naming scheme.

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::{PollWindow, PollingConfig, StackConfig};
pub use error::{Error, Result};
pub use types::*;
