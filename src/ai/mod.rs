//! Rule-based players. A seat sees a [`Snapshot`] of what it may know and
//! the [`Planner`] turns it into actions for the session to apply.

pub mod planner;
pub mod snapshot;

pub use planner::{Planner, PlannerParams};
pub use snapshot::Snapshot;
