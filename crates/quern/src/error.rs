use crate::{
    compile::CompileError,
    criteria::ValidateError,
    descriptor::{DescriptorError, ParseError},
    executor::ExecuteError,
    page::PageError,
    project::ProjectError,
    schema::SchemaError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-level facade over the per-module error enums. Parser, validator,
/// and compiler errors always fire before anything executes; only
/// `Execute` can surface mid-flight. An empty page is a result, never an
/// error.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Criteria(#[from] ValidateError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::Parse(parse) => Self::Parse(parse),
            DescriptorError::Invalid(invalid) => Self::Criteria(invalid),
        }
    }
}

impl Error {
    /// Whether the failure was detected before any storage work started.
    #[must_use]
    pub const fn is_pre_execution(&self) -> bool {
        !matches!(self, Self::Execute(_))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_errors_flatten_into_the_facade() {
        let err: Error = DescriptorError::Parse(ParseError::MissingBy {
            descriptor: "findUsername".to_string(),
        })
        .into();

        assert!(matches!(err, Error::Parse(ParseError::MissingBy { .. })));
        assert!(err.is_pre_execution());
    }

    #[test]
    fn execution_failures_are_not_pre_execution() {
        let err: Error = ExecuteError::Cancelled.into();
        assert!(!err.is_pre_execution());
    }
}
