use thiserror::Error;

/// Reasons a connection is refused membership of a session.
///
/// The `Display` text is sent to the client verbatim as `error{reason}`
/// right before its connection is closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("missing session code")]
    MissingSessionCode,
    #[error("session {0} does not exist")]
    SessionNotFound(String),
    #[error("game already in progress")]
    GameInProgress,
    #[error("username must be 1 to {max} characters")]
    InvalidUsername { max: usize },
    #[error("session is closing")]
    SessionClosed,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
}
