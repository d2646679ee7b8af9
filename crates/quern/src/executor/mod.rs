mod cancel;
mod memory;

pub use cancel::CancelToken;
pub use memory::MemoryExecutor;

use crate::{
    compile::{CountPlan, MutationPlan, SelectPlan},
    row::Row,
};
use thiserror::Error as ThisError;

///
/// ExecuteError
///
/// Failures crossing the storage boundary. `Storage` carries the
/// statement shape for diagnostics, never bind values.
///

#[derive(Debug, ThisError)]
pub enum ExecuteError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("storage failure executing [{shape}]: {message}")]
    Storage { shape: String, message: String },
}

impl ExecuteError {
    #[must_use]
    pub fn storage(shape: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            shape: shape.into(),
            message: message.into(),
        }
    }
}

///
/// QueryExecutor
///
/// The storage seam. Implementations consume compiled plans; SQL-backed
/// adapters render them through [`crate::compile::sql`], the in-memory
/// executor interprets them directly. Implementations must honor
/// cancellation checkpoints and must not leave partial state behind on
/// a cancelled mutation.
///

pub trait QueryExecutor {
    /// Fetch the rows a select plan describes, sorted and windowed.
    fn fetch(&self, plan: &SelectPlan, cancel: &CancelToken) -> Result<Vec<Row>, ExecuteError>;

    /// Count the rows a count plan matches.
    fn fetch_count(&self, plan: &CountPlan, cancel: &CancelToken) -> Result<u64, ExecuteError>;

    /// Apply a mutation plan, returning the number of rows affected.
    fn execute(&self, plan: &MutationPlan, cancel: &CancelToken) -> Result<u64, ExecuteError>;
}
