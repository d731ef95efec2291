//! Server error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("station not found: {0}")]
    StationNotFound(String),

    #[error("server full: {0} sessions")]
    ServerFull(usize),

    #[error("transport error: {0}")]
    Transport(#[from] airwave_transport::TransportError),

    #[error("core protocol error: {0}")]
    Core(#[from] airwave_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
