//! Query-side error types.

/// Reasons a query text is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SafetyError {
    #[error("query is empty")]
    Empty,

    #[error("only SELECT statements are allowed, found `{0}`")]
    NotSelect(String),

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("forbidden keyword `{0}`")]
    ForbiddenKeyword(String),

    #[error("comments are not allowed in generated queries")]
    Comment,

    #[error("unbounded cross product: {0}")]
    CrossProduct(String),

    #[error("JOIN without ON or USING condition")]
    UnboundedJoin,

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("column `{0}` is not in any referenced table")]
    UnknownColumn(String),
}

/// Failure to produce a safe query for a question.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("no query builder applies to this question")]
    NoBuilder,

    #[error("builder `{builder}` produced an unsafe query: {source}")]
    Unsafe {
        builder: &'static str,
        #[source]
        source: SafetyError,
    },
}

pub type SafetyResult<T> = Result<T, SafetyError>;
