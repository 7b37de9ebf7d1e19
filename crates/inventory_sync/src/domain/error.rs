use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Which failure path a [`SyncError`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// The event or the endpoint configuration is unusable; no API call was attempted
    Validation,
    /// A message or response body could not be decoded
    Parse,
    /// An outbound call failed: connection, timeout or non-success status
    Transport,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Parse => "parse",
            Self::Transport => "transport",
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("change event has no external_tenant")]
    MissingTenant,

    #[error("change event has no source to write linkages back to")]
    MissingSource,

    #[error("invalid endpoint url {url:?}: {detail}")]
    InvalidEndpoint { url: String, detail: String },

    #[error("invalid change event message: {0}")]
    InvalidMessage(String),

    #[error("malformed {operation} response: {detail}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
    },

    #[error("{operation} request failed: {detail}")]
    Transport {
        operation: &'static str,
        detail: String,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("host for {external_id} rejected with status {status}: {detail}")]
    HostRejected {
        external_id: String,
        status: u16,
        detail: String,
    },
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::MissingTenant | Self::MissingSource | Self::InvalidEndpoint { .. } => {
                SyncErrorKind::Validation
            }
            Self::InvalidMessage(_) | Self::MalformedResponse { .. } => SyncErrorKind::Parse,
            Self::Transport { .. } | Self::Api { .. } | Self::HostRejected { .. } => {
                SyncErrorKind::Transport
            }
        }
    }
}
