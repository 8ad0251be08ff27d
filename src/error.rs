//! Crate-wide error type.

use thiserror::Error;

/// Raised when reveal state is read or written without a live provider.
///
/// This is the one failure the controller never degrades around: a consumer
/// wired outside its provider is an integration mistake.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealScopeError {
    #[error("reveal state must be used within a RevealProvider")]
    OutsideProvider,

    #[error("reveal state provider was dropped (page was torn down)")]
    ProviderDropped,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} timed out after {millis}ms")]
    Timeout { url: String, millis: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid root margin: {0:?}")]
    InvalidRootMargin(String),

    #[error("no usable article in response for id {id}")]
    EmptyResponse { id: String },

    #[error(transparent)]
    RevealScope(#[from] RevealScopeError),
}

pub type Result<T> = std::result::Result<T, Error>;
