use crate::{SqliteConfig, SqliteConnection};
use idp_core::{ConnectionSource, Result};
use std::ffi::CString;

/// Opens a fresh sqlite connection on every acquire and closes it on release.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    config: SqliteConfig,
    uri: CString,
}

impl SqliteSource {
    /// Create a source from a `sqlite://<path>?mode=<mode>&busy_timeout=<ms>` URL.
    pub fn new(url: &str) -> Result<Self> {
        Self::from_config(SqliteConfig::from_url(url)?)
    }

    pub fn from_config(config: SqliteConfig) -> Result<Self> {
        let uri = config.uri()?;
        Ok(Self { config, uri })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl ConnectionSource for SqliteSource {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection> {
        SqliteConnection::open(&self.uri, self.config.busy_timeout)
    }

    fn release(&self, connection: SqliteConnection) {
        drop(connection);
    }
}
