use crate::{
    CBox, error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use idp_core::{
    Error, Prepared, Result, RowCursor, RowLabeled, RowNames, RowsAffected, Statement, Value,
    truncate_long,
};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_char, c_int, c_void},
    fmt::{self, Display},
    sync::Arc,
};

/// A prepared sqlite statement, finalized on drop.
pub struct SqliteStatement {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
    /// Keeps the database handle alive as long as the statement.
    pub(crate) connection: Arc<CBox<*mut sqlite3>>,
    pub(crate) affected: Option<RowsAffected>,
}

impl SqliteStatement {
    pub(crate) fn new(
        statement: CBox<*mut sqlite3_stmt>,
        connection: Arc<CBox<*mut sqlite3>>,
    ) -> Self {
        unsafe {
            sqlite3_clear_bindings(*statement);
        }
        Self {
            statement,
            connection,
            affected: None,
        }
    }

    fn error(&self) -> Error {
        unsafe {
            Error::msg(error_message_from_ptr(&sqlite3_errmsg(**self.connection)).to_string())
        }
    }

    fn sql(&self) -> String {
        unsafe {
            let sql = sqlite3_sql(*self.statement);
            if sql.is_null() {
                return String::new();
            }
            CStr::from_ptr(sql).to_string_lossy().into_owned()
        }
    }

    /// One step of the virtual machine.
    ///
    /// A locked database is waited on for the configured busy timeout, after
    /// which `SQLITE_BUSY` is an error like any other.
    fn step(&mut self) -> Result<bool> {
        match unsafe { sqlite3_step(*self.statement) } {
            SQLITE_ROW => Ok(true),
            SQLITE_DONE => Ok(false),
            _ => {
                let sql = self.sql();
                let error = self.error().context(format!(
                    "While executing the query:\n{}",
                    truncate_long!(sql)
                ));
                log::error!("{:#}", error);
                Err(error)
            }
        }
    }

    fn reset(&mut self) {
        unsafe {
            sqlite3_reset(*self.statement);
        }
    }

    fn text(&mut self, index: c_int, v: &str, len: c_int) -> c_int {
        unsafe {
            sqlite3_bind_text(
                *self.statement,
                index,
                v.as_ptr() as *const c_char,
                len,
                SQLITE_TRANSIENT(),
            )
        }
    }
}

impl Prepared for SqliteStatement {
    fn bind_value(&mut self, value: Value, index: u64) -> Result<()> {
        let Ok(index) = c_int::try_from(index) else {
            return Err(Error::msg(format!("Parameter index {index} is out of range")));
        };
        let len = match &value {
            Value::Varchar(Some(v)) => bind_length(v.len()),
            Value::Blob(Some(v)) => bind_length(v.len()),
            _ => Ok(0),
        };
        let len = match len {
            Ok(len) => len,
            Err(error) => {
                let error = error.context(format!("Cannot bind parameter {index}"));
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        let rc = unsafe {
            match &value {
                v if v.is_null() => sqlite3_bind_null(*self.statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(*self.statement, index, *v as c_int),
                Value::Int32(Some(v)) => sqlite3_bind_int(*self.statement, index, *v),
                Value::Int64(Some(v)) => sqlite3_bind_int64(*self.statement, index, *v),
                Value::Float64(Some(v)) => sqlite3_bind_double(*self.statement, index, *v),
                Value::Varchar(Some(v)) => self.text(index, v, len),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    *self.statement,
                    index,
                    v.as_ptr() as *const c_void,
                    len,
                    SQLITE_TRANSIENT(),
                ),
                _ => {
                    let error =
                        Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        };
        if rc != SQLITE_OK {
            let sql = self.sql();
            let error = self.error().context(format!(
                "Cannot bind parameter {} to query:\n{}",
                index,
                truncate_long!(sql)
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        unsafe {
            sqlite3_clear_bindings(*self.statement);
        }
        Ok(())
    }
}

/// Byte length of a text or blob parameter as sqlite expects it.
fn bind_length(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| {
        Error::msg(format!(
            "A parameter of {len} bytes exceeds the sqlite limit of {} bytes",
            c_int::MAX
        ))
    })
}

impl Statement for SqliteStatement {
    type Rows<'s> = SqliteRows<'s>;
    type GeneratedKeys<'s> = SqliteGeneratedKeys;

    fn execute_query(&mut self) -> Result<SqliteRows<'_>> {
        self.reset();
        let count = unsafe { sqlite3_column_count(*self.statement) };
        let labels = (0..count)
            .map(|i| extract_name(*self.statement, i))
            .collect::<Result<RowNames>>()?;
        Ok(SqliteRows {
            statement: self,
            labels,
            count,
            done: false,
        })
    }

    fn execute_update(&mut self) -> Result<RowsAffected> {
        self.reset();
        let db = **self.connection;
        let before = unsafe { sqlite3_last_insert_rowid(db) };
        let result = loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.reset();
        result?;
        let (changes, after) = unsafe { (sqlite3_changes(db), sqlite3_last_insert_rowid(db)) };
        let affected = RowsAffected {
            rows_affected: changes.max(0) as u64,
            last_affected_id: (changes > 0 && after != before).then_some(after),
        };
        self.affected = Some(affected);
        Ok(affected)
    }

    fn generated_keys(&mut self) -> Result<SqliteGeneratedKeys> {
        let Some(affected) = self.affected else {
            return Err(Error::msg(
                "The generated keys are available only after executing the statement",
            ));
        };
        Ok(SqliteGeneratedKeys {
            key: affected.last_affected_id,
        })
    }
}

impl Display for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", *self.statement)
    }
}

/// Rows of a running query, the statement is reset on drop.
pub struct SqliteRows<'s> {
    statement: &'s mut SqliteStatement,
    labels: RowNames,
    count: c_int,
    done: bool,
}

impl RowCursor for SqliteRows<'_> {
    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        if self.done {
            return Ok(None);
        }
        if !self.statement.step()? {
            self.done = true;
            return Ok(None);
        }
        let values = (0..self.count)
            .map(|i| extract_value(*self.statement.statement, i))
            .collect::<Result<_>>()?;
        Ok(Some(RowLabeled::new(self.labels.clone(), values)))
    }
}

impl Drop for SqliteRows<'_> {
    fn drop(&mut self) {
        self.statement.reset();
    }
}

/// The rowid assigned by the last insert, if it inserted anything.
pub struct SqliteGeneratedKeys {
    key: Option<i64>,
}

impl RowCursor for SqliteGeneratedKeys {
    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        Ok(self.key.take().map(|key| {
            RowLabeled::new(
                Arc::from(["last_insert_rowid".to_string()]),
                Box::new([Value::Int64(Some(key))]),
            )
        }))
    }
}
