// Batch update planning and execution
//
// A value map is cut into fixed-size batches, each rendered as one
// conditional ALTER TABLE ... UPDATE. Execution is sequential and
// continues past failed batches; re-running a plan is a no-op for rows
// that already hold their value.

pub mod builder;
pub mod execution;
pub mod scripts;

pub use builder::{DEFAULT_BATCH_SIZE, UpdatePlan, plan};
pub use execution::{BatchOutcome, BatchStatus, ExecutionOutcome, execute};
pub use scripts::write_scripts;
