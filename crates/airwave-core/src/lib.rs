//! Airwave Core
//!
//! Shared types and wire protocol for the Airwave station sync system.
//!
//! This crate provides:
//! - Protocol message types ([`Message`], [`PlayerAction`])
//! - The station data model ([`Station`], [`PlaybackState`])
//! - JSON frame encoding/decoding ([`codec`])
//! - Timing utilities ([`time`])

pub mod codec;
pub mod error;
pub mod station;
pub mod time;
pub mod types;

pub use codec::{decode, encode};
pub use error::{Error, ErrorCode, Result};
pub use station::{MemberRemoved, PlaybackState, Station};
pub use types::*;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 7410;

/// WebSocket subprotocol identifier
pub const WS_SUBPROTOCOL: &str = "airwave.v1";
