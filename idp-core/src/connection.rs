use crate::{Prepared, Result, RowLabeled, RowsAffected};
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

/// Provides independently usable database connections on demand.
///
/// Every successful `acquire` is paired with exactly one `release`. Pooling,
/// if any, is up to the implementation.
pub trait ConnectionSource: Send + Sync {
    type Connection: Connection;

    /// Open (or borrow) a connection.
    fn acquire(&self) -> Result<Self::Connection>;
    /// Give the connection back, it won't be used anymore.
    fn release(&self, connection: Self::Connection);

    /// Acquire a connection that is released when the returned guard drops.
    fn lease(&self) -> Result<Lease<'_, Self>>
    where
        Self: Sized,
    {
        Ok(Lease {
            source: self,
            connection: Some(self.acquire()?),
        })
    }
}

impl<S: ConnectionSource> ConnectionSource for &S {
    type Connection = S::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        S::acquire(self)
    }
    fn release(&self, connection: Self::Connection) {
        S::release(self, connection)
    }
}

impl<S: ConnectionSource> ConnectionSource for Arc<S> {
    type Connection = S::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        S::acquire(self)
    }
    fn release(&self, connection: Self::Connection) {
        S::release(self, connection)
    }
}

pub trait Connection {
    type Statement: Statement;

    /// Prepare a single SQL statement.
    ///
    /// The statement may outlive this handle, the backend must keep the
    /// underlying connection alive until the statement is dropped.
    fn prepare(&mut self, sql: &str) -> Result<Self::Statement>;
}

/// A prepared statement, finalized when dropped.
pub trait Statement: Prepared {
    type Rows<'s>: RowCursor
    where
        Self: 's;
    type GeneratedKeys<'s>: RowCursor
    where
        Self: 's;

    /// Execute the statement and return a cursor positioned before the first row.
    fn execute_query(&mut self) -> Result<Self::Rows<'_>>;
    /// Execute the statement returning the number of rows changed.
    fn execute_update(&mut self) -> Result<RowsAffected>;
    /// Keys generated by the last `execute_update`, one row per key.
    fn generated_keys(&mut self) -> Result<Self::GeneratedKeys<'_>>;
}

/// Forward only cursor over result rows, closed when dropped.
pub trait RowCursor {
    /// Advance to the next row, `None` once the rows are exhausted.
    fn next_row(&mut self) -> Result<Option<RowLabeled>>;
}

/// A connection scoped to the lifetime of the guard.
pub struct Lease<'s, S: ConnectionSource> {
    source: &'s S,
    connection: Option<S::Connection>,
}

impl<S: ConnectionSource> Deref for Lease<'_, S> {
    type Target = S::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl<S: ConnectionSource> DerefMut for Lease<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl<S: ConnectionSource> Drop for Lease<'_, S> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.source.release(connection);
        }
    }
}
