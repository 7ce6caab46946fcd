//! Query side of the router: a structured query representation, the
//! reporting schema, shape-specific builders and the safety validator every
//! emitted query passes through.

pub mod builders;
pub mod error;
pub mod ir;
pub mod safety;
pub mod schema;

pub use builders::{BuildRequest, BuiltQuery, build_or_list, build_validated, dispatch};
pub use error::{BuildError, SafetyError, SafetyResult};
pub use ir::SelectQuery;
pub use safety::SafetyValidator;
pub use schema::{SchemaDictionary, TableSchema};
