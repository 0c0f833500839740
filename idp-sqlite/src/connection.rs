use crate::{CBox, SqliteStatement, error_message_from_ptr};
use idp_core::{Connection, Context, Error, Result, truncate_long};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, sqlite3,
    sqlite3_busy_timeout, sqlite3_errmsg, sqlite3_finalize, sqlite3_open_v2,
    sqlite3_prepare_v2,
};
use std::{
    ffi::{CStr, CString, c_int},
    ptr,
    sync::Arc,
    time::Duration,
};

// The bundled bindings of libsqlite3-sys omit `sqlite3_close_v2`, but the
// bundled sqlite library still exports it.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// One open sqlite database handle.
///
/// Closed with `sqlite3_close_v2`, the handle stays alive until every
/// statement prepared from it is finalized.
pub struct SqliteConnection {
    pub(crate) connection: Arc<CBox<*mut sqlite3>>,
}

impl SqliteConnection {
    pub fn open(uri: &CString, busy_timeout: Duration) -> Result<Self> {
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close_v2(p);
        });
        unsafe {
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let error = Error::msg(if connection.is_null() {
                    "Out of memory".to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                })
                .context(format!(
                    "Could not open the sqlite database `{}`",
                    uri.to_string_lossy()
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
            let millis = busy_timeout.as_millis().min(c_int::MAX as u128) as c_int;
            sqlite3_busy_timeout(*connection, millis);
        }
        Ok(Self {
            connection: Arc::new(connection),
        })
    }
}

impl Connection for SqliteConnection {
    type Statement = SqliteStatement;

    fn prepare(&mut self, query: &str) -> Result<SqliteStatement> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(query));
        let sql = CString::new(query.as_bytes())
            .context("Could not create a CString from the query String")
            .with_context(context)?;
        let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        unsafe {
            let mut tail = ptr::null();
            let rc = sqlite3_prepare_v2(
                **self.connection,
                sql.as_ptr(),
                -1,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(**self.connection)).to_string(),
                )
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if statement.is_null() {
                let error = Error::msg("The query does not contain any statement").context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if !tail.is_null() && !CStr::from_ptr(tail).to_bytes().trim_ascii().is_empty() {
                let error =
                    Error::msg("Cannot prepare more than one statement at a time").context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(SqliteStatement::new(statement, self.connection.clone()))
    }
}
