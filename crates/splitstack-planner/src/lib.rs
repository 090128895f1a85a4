//! splitstack-planner — builds the weighted load balancer configuration.
//!
//! # Components
//!
//! - **`discovery`** — Instance directory seam and a static implementation
//! - **`planner`** — Version list → configuration graph
//! - **`template`** — Graph → declarative template artifact

pub mod discovery;
pub mod planner;
pub mod template;

pub use discovery::{DiscoverFuture, InstanceDirectory, StaticDirectory};
pub use planner::Planner;
pub use template::Template;
