use thiserror::Error;

/// Errors surfaced by the bridge and its hosts.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported endpoint scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection is not open")]
    NotOpen,

    #[error("connection closed")]
    Closed,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("platform error: {0}")]
    Platform(String),
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
