use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a trend scan.
///
/// A tile or a whole year without a usable score is *not* an error: absence
/// is carried as `None` in the result series.
#[derive(Debug, Error)]
pub enum TrendError {
    /// Requested ground area is zero, negative or not a number.
    #[error("requested area must be positive, got {0} m^2")]
    InvalidArea(f64),

    /// Center coordinate is outside the valid lat/lon ranges.
    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Scan window reaches outside the supported calendar.
    #[error("no calendar dates for year {0}")]
    InvalidWindow(i32),

    /// The imagery provider could not be reached or failed a call.
    /// Always fatal for the whole request.
    #[error("imagery provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    /// The scan's cancellation token was fired.
    #[error("scan cancelled")]
    Cancelled,
}

/// Failures talking to the remote imagery provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("request to the imagery provider failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("imagery provider returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The provider answered but the payload did not parse.
    #[error("could not decode imagery provider response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading a streamed thumbnail body failed.
    #[error("failed to read thumbnail stream: {0}")]
    Io(#[from] std::io::Error),

    /// A configured endpoint URL did not parse or join.
    #[error("invalid provider endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Credentials are missing or were rejected.
    #[error("imagery provider credentials missing or rejected: {0}")]
    Auth(String),
}

/// Failures rendering or persisting a yearly composite image.
///
/// Never fatal for a scan: the numeric series does not depend on the
/// visual artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render composite for {year}: {source}")]
    Render {
        year: i32,
        #[source]
        source: ProviderError,
    },
}
