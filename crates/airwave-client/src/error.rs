//! Client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Not in a station")]
    NotInStation,

    #[error("Join refused: {0}")]
    JoinRefused(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] airwave_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] airwave_transport::TransportError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
