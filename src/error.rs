use thiserror::Error;

/// Failure talking to the remote sports-data API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with anything other than 200 OK.
    #[error("{call}: API did not respond OK (http {status})")]
    Status { call: String, status: u16 },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("{call}: request failed: {source}")]
    Transport {
        call: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body of a 200 response was not valid JSON.
    #[error("{call}: invalid json body: {source}")]
    InvalidBody {
        call: String,
        #[source]
        source: serde_json::Error,
    },

    /// A failure recorded by the response cache and replayed without a request.
    #[error("{call}: cached failure: {message}")]
    Cached {
        call: String,
        status: Option<u16>,
        message: String,
    },
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            RemoteError::InvalidBody { .. } => None,
            RemoteError::Cached { status, .. } => *status,
        }
    }
}

/// The raw JSON did not have the shape a normalizer expects.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizationError {
    #[error("missing key `{key}` in {context} payload")]
    MissingKey { context: &'static str, key: &'static str },

    #[error("unexpected shape for `{key}` in {context} payload: expected {expected}")]
    UnexpectedShape {
        context: &'static str,
        key: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{table}: referenced {parent} {id} is not stored")]
    MissingParent {
        table: &'static str,
        parent: &'static str,
        id: i64,
    },

    #[error("{table} has no column `{column}`")]
    UnknownColumn { table: &'static str, column: String },
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: http {status}")]
    Status { url: String, status: u16 },

    #[error("invalid selector `{0}`")]
    Selector(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {key} has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },

    #[error("unable to resolve a cache directory (set XDG_CACHE_HOME or HOME)")]
    NoCacheDir,
}

/// Any failure inside one unit of sync work.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Normalize(#[from] NormalizationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
