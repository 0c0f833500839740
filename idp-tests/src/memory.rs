use idp::{
    Connection, ConnectionSource, Error, Prepared, Result, RowCursor, RowLabeled, RowNames,
    RowsAffected, Statement, Value,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Where a scripted statement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Bind,
    Execute,
    /// While reading the row at this zero-based position.
    Row(usize),
    GeneratedKeys,
}

/// What a statement returns when executed.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
    pub generated_key: Option<i64>,
    /// Generated keys yield a row holding NULL instead of `generated_key`.
    pub null_generated_key: bool,
    pub fail_at: Option<Stage>,
}

impl Response {
    pub fn rows<L, R, V>(labels: L, rows: impl IntoIterator<Item = R>) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
            ..Default::default()
        }
    }
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }
    pub fn generated_key(mut self, key: i64) -> Self {
        self.generated_key = Some(key);
        self
    }
    pub fn null_generated_key(mut self) -> Self {
        self.null_generated_key = true;
        self
    }
    pub fn fail_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }
}

type Responder = dyn Fn(&str, &[(u64, Value)]) -> Response + Send + Sync;

#[derive(Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    statements_opened: AtomicUsize,
    statements_closed: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursors_closed: AtomicUsize,
    executions: AtomicUsize,
}

#[derive(Default)]
struct Shared {
    responses: Mutex<HashMap<String, Response>>,
    responder: Option<Box<Responder>>,
    fail_acquire: AtomicBool,
    counters: Counters,
    executed: Mutex<Vec<(String, Vec<(u64, Value)>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn respond(&self, sql: &str, bound: &[(u64, Value)]) -> Response {
        if let Some(response) = lock(&self.responses).get(sql.trim()) {
            return response.clone();
        }
        match &self.responder {
            Some(responder) => responder(sql, bound),
            None => Response::default(),
        }
    }
}

/// Scripted in-memory [`ConnectionSource`] that keeps track of every resource it hands out.
///
/// Responses are looked up by the exact (trimmed) SQL text first, then the
/// responder closure is asked, otherwise an empty result is returned.
#[derive(Clone, Default)]
pub struct MemorySource {
    shared: Arc<Shared>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source computing every response from the SQL text and the bound values.
    pub fn with_responder(
        responder: impl Fn(&str, &[(u64, Value)]) -> Response + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                responder: Some(Box::new(responder)),
                ..Default::default()
            }),
        }
    }

    /// Script the response of `sql`.
    pub fn on(self, sql: &str, response: Response) -> Self {
        lock(&self.shared.responses).insert(sql.trim().to_string(), response);
        self
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.shared.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.shared.counters.acquired.load(Ordering::SeqCst)
    }
    pub fn open_connections(&self) -> usize {
        let counters = &self.shared.counters;
        counters.acquired.load(Ordering::SeqCst) - counters.released.load(Ordering::SeqCst)
    }
    pub fn open_statements(&self) -> usize {
        let counters = &self.shared.counters;
        counters.statements_opened.load(Ordering::SeqCst)
            - counters.statements_closed.load(Ordering::SeqCst)
    }
    pub fn open_cursors(&self) -> usize {
        let counters = &self.shared.counters;
        counters.cursors_opened.load(Ordering::SeqCst)
            - counters.cursors_closed.load(Ordering::SeqCst)
    }
    /// Number of statements that reached execution.
    pub fn executions(&self) -> usize {
        self.shared.counters.executions.load(Ordering::SeqCst)
    }
    /// SQL text and bound parameters of every executed statement, in order.
    pub fn executed(&self) -> Vec<(String, Vec<(u64, Value)>)> {
        lock(&self.shared.executed).clone()
    }

    /// Panics if any connection, statement or cursor is still open.
    pub fn assert_released(&self) {
        assert_eq!(self.open_cursors(), 0, "A cursor was not closed");
        assert_eq!(self.open_statements(), 0, "A statement was not closed");
        assert_eq!(self.open_connections(), 0, "A connection was not released");
    }
}

impl ConnectionSource for MemorySource {
    type Connection = MemoryConnection;

    fn acquire(&self) -> Result<MemoryConnection> {
        if self.shared.fail_acquire.load(Ordering::SeqCst) {
            return Err(Error::msg("Connection refused"));
        }
        self.shared.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            shared: self.shared.clone(),
        })
    }

    fn release(&self, connection: MemoryConnection) {
        drop(connection);
        self.shared.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MemoryConnection {
    shared: Arc<Shared>,
}

impl Connection for MemoryConnection {
    type Statement = MemoryStatement;

    fn prepare(&mut self, sql: &str) -> Result<MemoryStatement> {
        if self.shared.respond(sql, &[]).fail_at == Some(Stage::Prepare) {
            return Err(Error::msg(format!("Syntax error near `{}`", sql.trim())));
        }
        self.shared
            .counters
            .statements_opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStatement {
            shared: self.shared.clone(),
            sql: sql.to_string(),
            bound: Vec::new(),
            response: None,
        })
    }
}

pub struct MemoryStatement {
    shared: Arc<Shared>,
    sql: String,
    bound: Vec<(u64, Value)>,
    response: Option<Response>,
}

impl MemoryStatement {
    fn execute(&mut self) -> Result<Response> {
        let response = self.shared.respond(&self.sql, &self.bound);
        if response.fail_at == Some(Stage::Execute) {
            return Err(Error::msg("Constraint violation"));
        }
        self.shared.counters.executions.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.executed).push((self.sql.clone(), self.bound.clone()));
        self.response = Some(response.clone());
        Ok(response)
    }

    fn cursor(&self, labels: RowNames, rows: VecDeque<Vec<Value>>, fail_at: Option<usize>) -> MemoryRows {
        self.shared
            .counters
            .cursors_opened
            .fetch_add(1, Ordering::SeqCst);
        MemoryRows {
            shared: self.shared.clone(),
            labels,
            rows,
            position: 0,
            fail_at,
        }
    }
}

impl Prepared for MemoryStatement {
    fn bind_value(&mut self, value: Value, index: u64) -> Result<()> {
        if self.shared.respond(&self.sql, &self.bound).fail_at == Some(Stage::Bind) {
            return Err(Error::msg(format!("Cannot bind parameter {index}")));
        }
        self.bound.retain(|(i, _)| *i != index);
        self.bound.push((index, value));
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        self.bound.clear();
        Ok(())
    }
}

impl Statement for MemoryStatement {
    type Rows<'s> = MemoryRows;
    type GeneratedKeys<'s> = MemoryRows;

    fn execute_query(&mut self) -> Result<MemoryRows> {
        let response = self.execute()?;
        let fail_at = match response.fail_at {
            Some(Stage::Row(i)) => Some(i),
            _ => None,
        };
        Ok(self.cursor(
            response.labels.into(),
            response.rows.into(),
            fail_at,
        ))
    }

    fn execute_update(&mut self) -> Result<RowsAffected> {
        let response = self.execute()?;
        Ok(RowsAffected {
            rows_affected: response.rows_affected,
            last_affected_id: response.generated_key,
        })
    }

    fn generated_keys(&mut self) -> Result<MemoryRows> {
        let Some(response) = &self.response else {
            return Err(Error::msg("The statement was not executed"));
        };
        if response.fail_at == Some(Stage::GeneratedKeys) {
            return Err(Error::msg("Generated keys are not supported"));
        }
        let key = match response.null_generated_key {
            true => Some(Value::Int64(None)),
            false => response.generated_key.map(|key| Value::Int64(Some(key))),
        };
        let rows = key.map(|key| vec![key]).into_iter().collect();
        Ok(self.cursor(Arc::from(["GENERATED_KEY".to_string()]), rows, None))
    }
}

impl Drop for MemoryStatement {
    fn drop(&mut self) {
        self.shared
            .counters
            .statements_closed
            .fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MemoryRows {
    shared: Arc<Shared>,
    labels: RowNames,
    rows: VecDeque<Vec<Value>>,
    position: usize,
    fail_at: Option<usize>,
}

impl RowCursor for MemoryRows {
    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        if self.fail_at == Some(self.position) {
            return Err(Error::msg(format!(
                "Connection lost while reading row {}",
                self.position
            )));
        }
        let Some(values) = self.rows.pop_front() else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(RowLabeled::new(self.labels.clone(), values.into())))
    }
}

impl Drop for MemoryRows {
    fn drop(&mut self) {
        self.shared
            .counters
            .cursors_closed
            .fetch_add(1, Ordering::SeqCst);
    }
}
