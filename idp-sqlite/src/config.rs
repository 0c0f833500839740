use idp_core::{Context, Error, Result};
use std::{borrow::Cow, ffi::CString, fmt::Write, time::Duration};

pub const SCHEME: &str = "sqlite://";

/// How the database file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    #[default]
    ReadWriteCreate,
    Memory,
}

impl OpenMode {
    fn as_str(&self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "ro",
            OpenMode::ReadWrite => "rw",
            OpenMode::ReadWriteCreate => "rwc",
            OpenMode::Memory => "memory",
        }
    }
}

/// Connection settings of a [`SqliteSource`](crate::SqliteSource).
///
/// Usually decoded from a URL:
/// ```rust
/// use idp_sqlite::{OpenMode, SqliteConfig};
/// use std::time::Duration;
/// let config = SqliteConfig::from_url("sqlite://data/idp.sqlite?mode=rw&busy_timeout=250").unwrap();
/// assert_eq!(config.path, "data/idp.sqlite");
/// assert_eq!(config.mode, OpenMode::ReadWrite);
/// assert_eq!(config.busy_timeout, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: String,
    pub mode: OpenMode,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub shared_cache: bool,
}

impl SqliteConfig {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: OpenMode::default(),
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            shared_cache: false,
        }
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let Some(rest) = url.strip_prefix(SCHEME) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                SCHEME
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if path.is_empty() {
            let error = Error::msg("The database path is empty").context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        let mut config = Self::new(urlencoding::decode(path).with_context(context)?);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "mode" => {
                    config.mode = match value.as_ref() {
                        "ro" => OpenMode::ReadOnly,
                        "rw" => OpenMode::ReadWrite,
                        "rwc" => OpenMode::ReadWriteCreate,
                        "memory" => OpenMode::Memory,
                        _ => {
                            return Err(Error::msg(format!("Unknown sqlite open mode `{value}`"))
                                .context(context()));
                        }
                    }
                }
                "busy_timeout" => {
                    let millis = value
                        .parse::<u64>()
                        .with_context(|| format!("Invalid busy_timeout `{value}`"))
                        .with_context(context)?;
                    config.busy_timeout = Duration::from_millis(millis);
                }
                "cache" => config.shared_cache = value == "shared",
                _ => log::warn!("Ignoring unknown sqlite connection parameter `{key}`"),
            }
        }
        Ok(config)
    }

    /// The `file:` URI handed to `sqlite3_open_v2`.
    pub(crate) fn uri(&self) -> Result<CString> {
        let mut uri = String::from("file:");
        uri.push_str(&encode_path(&self.path));
        let _ = write!(uri, "?mode={}", self.mode.as_str());
        if self.shared_cache {
            uri.push_str("&cache=shared");
        }
        CString::new(uri).context("The sqlite database path contains a NUL character")
    }
}

/// Percent-encode the characters that carry meaning inside a `file:` URI.
fn encode_path(path: &str) -> Cow<'_, str> {
    if !path.contains(['?', '#', '%']) {
        return Cow::Borrowed(path);
    }
    Cow::Owned(
        path.replace('%', "%25")
            .replace('?', "%3f")
            .replace('#', "%23"),
    )
}
