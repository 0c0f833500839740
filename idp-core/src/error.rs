use std::fmt::{self, Display};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Category of the template operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    Update,
    Insert,
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Query => "query",
            Operation::Update => "update",
            Operation::Insert => "insert",
        })
    }
}

/// What went wrong, so callers can branch without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The SQL text was empty.
    EmptyQuery,
    /// No connection could be acquired from the source.
    Connection,
    /// The driver failed while preparing, binding or executing the statement.
    Statement,
    /// The query filter failed, the statement was not executed.
    Binding,
    /// The row mapper failed.
    Mapping,
    /// A strict single row query matched more than one row.
    MultipleRecords,
    /// A generated key was requested but the database returned none.
    NoGeneratedKey,
}

/// The single error returned by [`DataAccessTemplate`](crate::DataAccessTemplate).
#[derive(Debug, thiserror::Error)]
#[error("Error in performing database {operation}: {query}")]
pub struct DataAccessError {
    operation: Operation,
    kind: ErrorKind,
    query: String,
    #[source]
    source: BoxError,
}

impl DataAccessError {
    pub fn new(
        operation: Operation,
        kind: ErrorKind,
        query: impl Into<String>,
        cause: anyhow::Error,
    ) -> Self {
        Self {
            operation,
            kind,
            query: query.into(),
            source: cause.into(),
        }
    }
    pub fn operation(&self) -> Operation {
        self.operation
    }
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
    /// The offending SQL text.
    pub fn query(&self) -> &str {
        &self.query
    }
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
    pub fn is_multiple_records(&self) -> bool {
        self.kind == ErrorKind::MultipleRecords
    }
    pub fn is_no_generated_key(&self) -> bool {
        self.kind == ErrorKind::NoGeneratedKey
    }
}
