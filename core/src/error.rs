use thiserror::Error;

/// Debuglet error types
#[derive(Error, Debug)]
pub enum DebugletError {
    /// Control-plane RPC failed (the only retryable kind)
    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    /// The control plane reports the debuggee as disabled
    #[error("Debuggee is disabled: {0}")]
    DebuggeeDisabled(String),

    /// Corrupted or incompatible IPC frame stream
    #[error("Framing error: {0}")]
    Framing(String),

    /// An operation was called in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The IPC peer went away
    #[error("IPC channel closed: {0}")]
    ChannelClosed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Protobuf payload could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Native debugger engine failed to start or died
    #[error("Engine error: {message}")]
    EngineError {
        message: String,
        hint: Option<String>,
    },

    /// Credentials could not be obtained
    #[error("Auth error: {0}")]
    AuthError(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DebugletError {
    /// Whether the retrying action loop should back off and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DebugletError::Rpc(_))
    }

    /// Whether the control plane no longer knows the debuggee.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DebugletError::Rpc(status) if status.code() == tonic::Code::NotFound)
    }
}

impl From<serde_json::Error> for DebugletError {
    fn from(err: serde_json::Error) -> Self {
        DebugletError::SerializationError(err.to_string())
    }
}

/// Result type alias for Debuglet operations
pub type Result<T> = std::result::Result<T, DebugletError>;
