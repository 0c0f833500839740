use crate::{
    Connection, ConnectionSource, DataAccessError, Error, ErrorKind, Operation, Parameters,
    QuerySpec, Result, RowCursor, RowMapper, RowsAffected, Statement,
};
use log::Level;

/// Executes SQL against a [`ConnectionSource`] and maps the results.
///
/// Each call acquires its own connection and prepares its own statement, both
/// released before the call returns whatever the outcome. The template holds
/// nothing else, sharing it between threads is safe.
///
/// ```rust,ignore
/// let template = DataAccessTemplate::new(source);
/// let names = template.query(
///     QuerySpec::new("SELECT name FROM idp WHERE enabled = ?").filter(&|p: &mut Parameters| {
///         p.bind(true)?;
///         Ok(())
///     }),
///     |row: &RowLabeled, _| row.get_as::<String>("name"),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct DataAccessTemplate<S: ConnectionSource> {
    source: S,
}

/// Failure inside one template call, before it is tagged with the operation.
struct Failure {
    kind: ErrorKind,
    error: Error,
}

trait FailureContext<T> {
    fn kind(self, kind: ErrorKind) -> std::result::Result<T, Failure>;
}

impl<T> FailureContext<T> for Result<T> {
    fn kind(self, kind: ErrorKind) -> std::result::Result<T, Failure> {
        self.map_err(|error| Failure { kind, error })
    }
}

impl<S: ConnectionSource> DataAccessTemplate<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Execute a query and map every row, in result set order.
    ///
    /// The mapper is invoked once per row with indexes 0, 1, 2, ... An empty
    /// result set produces an empty vector.
    pub fn query<'q, T>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
        mapper: impl RowMapper<T>,
    ) -> std::result::Result<Vec<T>, DataAccessError> {
        let spec = spec.into();
        self.run(Operation::Query, spec, |statement| {
            let mut rows = statement.execute_query().kind(ErrorKind::Statement)?;
            let mut result = Vec::new();
            while let Some(row) = rows.next_row().kind(ErrorKind::Statement)? {
                let index = result.len();
                result.push(mapper.map_row(&row, index).kind(ErrorKind::Mapping)?);
            }
            Ok(result)
        })
    }

    /// Execute a query expected to match at most one row.
    ///
    /// Returns `None` when there are no rows. A second row fails the call with
    /// [`ErrorKind::MultipleRecords`] without mapping anything.
    pub fn fetch_single<'q, T>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
        mapper: impl RowMapper<T>,
    ) -> std::result::Result<Option<T>, DataAccessError> {
        let spec = spec.into();
        self.run(Operation::Query, spec, |statement| {
            let mut rows = statement.execute_query().kind(ErrorKind::Statement)?;
            let Some(first) = rows.next_row().kind(ErrorKind::Statement)? else {
                return Ok(None);
            };
            if rows.next_row().kind(ErrorKind::Statement)?.is_some() {
                return Err(Failure {
                    kind: ErrorKind::MultipleRecords,
                    error: Error::msg(format!(
                        "There are more records than one found for query: {}",
                        spec
                    )),
                });
            }
            mapper
                .map_row(&first, 0)
                .map(Some)
                .kind(ErrorKind::Mapping)
        })
    }

    /// Execute an update statement discarding the result.
    pub fn execute_update<'q>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
    ) -> std::result::Result<(), DataAccessError> {
        self.execute(spec).map(|_| ())
    }

    /// Execute an update statement returning the affected rows.
    pub fn execute<'q>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
    ) -> std::result::Result<RowsAffected, DataAccessError> {
        self.run(Operation::Update, spec.into(), |statement| {
            statement.execute_update().kind(ErrorKind::Statement)
        })
    }

    /// Execute an insert statement.
    ///
    /// When `fetch_generated_id` is set, behaves like
    /// [`insert_returning_id`](Self::insert_returning_id). Otherwise returns
    /// `None`, even if the database did generate a key.
    pub fn execute_insert<'q>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
        fetch_generated_id: bool,
    ) -> std::result::Result<Option<i64>, DataAccessError> {
        if fetch_generated_id {
            return self.insert_returning_id(spec).map(Some);
        }
        self.run(Operation::Insert, spec.into(), |statement| {
            statement.execute_update().kind(ErrorKind::Statement)?;
            Ok(None)
        })
    }

    /// Execute an insert statement and return the first generated key.
    ///
    /// Fails with [`ErrorKind::NoGeneratedKey`] if the database produced none,
    /// or a NULL one.
    pub fn insert_returning_id<'q>(
        &self,
        spec: impl Into<QuerySpec<'q>>,
    ) -> std::result::Result<i64, DataAccessError> {
        self.run(Operation::Insert, spec.into(), |statement| {
            statement.execute_update().kind(ErrorKind::Statement)?;
            log::debug!("Mapping generated key (auto increment id) of the inserted row");
            let mut keys = statement.generated_keys().kind(ErrorKind::Statement)?;
            let id = match keys.next_row().kind(ErrorKind::Statement)? {
                Some(row) => row.get_as::<Option<i64>>(0).kind(ErrorKind::Statement)?,
                None => None,
            };
            let Some(id) = id else {
                return Err(Failure {
                    kind: ErrorKind::NoGeneratedKey,
                    error: Error::msg(
                        "Creating the record failed with auto generated id, no id obtained",
                    ),
                });
            };
            log::debug!("Newly inserted id (auto increment id) is {id}");
            Ok(id)
        })
    }

    /// Acquire, prepare, bind and hand the statement to `body`.
    ///
    /// The statement is dropped before the lease, the lease before returning.
    fn run<T, F>(
        &self,
        operation: Operation,
        spec: QuerySpec<'_>,
        body: F,
    ) -> std::result::Result<T, DataAccessError>
    where
        F: FnOnce(
            &mut <S::Connection as Connection>::Statement,
        ) -> std::result::Result<T, Failure>,
    {
        let mut parameters = Parameters::new();
        let result = self.scoped(spec, &mut parameters, body);
        result.map_err(|Failure { kind, error }| {
            if log::log_enabled!(Level::Debug) {
                log::debug!(
                    "There has been an error performing the database {}. The query is {}, and the parameters are {}: {:#}",
                    operation,
                    spec,
                    parameters,
                    error,
                );
            }
            DataAccessError::new(operation, kind, spec.sql(), error)
        })
    }

    fn scoped<T, F>(
        &self,
        spec: QuerySpec<'_>,
        parameters: &mut Parameters,
        body: F,
    ) -> std::result::Result<T, Failure>
    where
        F: FnOnce(
            &mut <S::Connection as Connection>::Statement,
        ) -> std::result::Result<T, Failure>,
    {
        if spec.sql().trim().is_empty() {
            return Err(Failure {
                kind: ErrorKind::EmptyQuery,
                error: Error::msg("The SQL text of the query is empty"),
            });
        }
        let mut connection = self.source.lease().kind(ErrorKind::Connection)?;
        let mut statement = connection
            .prepare(spec.sql())
            .kind(ErrorKind::Statement)?;
        if let Some(filter) = spec.query_filter() {
            filter.filter(parameters).kind(ErrorKind::Binding)?;
            parameters
                .apply_to(&mut statement)
                .kind(ErrorKind::Statement)?;
        }
        body(&mut statement)
    }
}
