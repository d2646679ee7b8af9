//! Quern: a criteria-driven, paginated query engine with derived-query
//! parsing and projection support, exported via the `prelude`.
//!
//! The pipeline is schema-first: criteria are validated against an
//! immutable entity field map, normalized, compiled into backend-neutral
//! plans, and executed through the `QueryExecutor` seam. Descriptors
//! (`findTop3ByUsernameAndAgeGreaterThanOrderByUsernameDesc`) are parsed
//! into the same criteria model and routed on their verb.
#![warn(unreachable_pub)]

pub mod audit;
pub mod compile;
pub mod criteria;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod executor;
pub mod obs;
pub mod page;
pub mod project;
pub mod row;
pub mod schema;
pub mod value;

pub use engine::DEFAULT_MAX_PAGE_SIZE;
pub use error::Error;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, renderers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        audit::Actor,
        criteria::{Criteria, Predicate, SortDirection},
        engine::{DescriptorOutcome, Engine, EngineConfig},
        executor::{CancelToken, MemoryExecutor, QueryExecutor},
        page::{Page, PageRequest, Slice},
        project::{FromRow, Projection, Projector},
        row::Row,
        schema::{EntitySchema, FieldType, SchemaRegistry},
        value::Value,
    };
}
