//! Placement planning and execution.
//!
//! The planner turns duplicate groups, orphaned sidecars and non-media files
//! into a plan of copy/move/rename actions with unique destinations; the
//! executor carries the plan out (or logs it, in a dry run).

mod executor;
mod planner;
mod types;

pub use executor::OrganizeExecutor;
pub use planner::{is_orphan_sidecar, OrganizePlanner};
pub use types::*;
