// Business logic services layer
//
// Reconciliation, update planning and reporting. Each service takes the
// target channel by reference and never opens connections of its own.

pub mod pipeline;
pub mod planner;
pub mod reconcile;
pub mod report;
