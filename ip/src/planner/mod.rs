//! Action capacity planning
//!
//! Runs once the narrative pipeline completes: derive remediation candidates
//! from the diagnostic, resolve the capacity band, and build the bounded
//! plan embedded in the final report.

mod candidates;
mod capacity;

pub use candidates::derive_candidates;
pub use capacity::ActionCapacityPlanner;
