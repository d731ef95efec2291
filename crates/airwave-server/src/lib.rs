//! Airwave server
//!
//! The authoritative side of station sync:
//! - Owns every station's state and serializes its mutations
//! - Assigns and reassigns hosts
//! - Fans out full snapshots and the redacted public listing
//!
//! Sessions are ephemeral, in-memory, single-process state; a restart
//! is equivalent to "all stations destroyed".
//!
//! # Example
//!
//! ```no_run
//! use airwave_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default());
//!     server.serve_websocket("0.0.0.0:7410").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod multicast;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{Result, ServerError};
pub use multicast::{Multicast, TopicSubscription};
pub use registry::{JoinOutcome, LeaveOutcome, StationRegistry};
pub use server::{Server, ServerConfig};
pub use session::{Session, SessionId};
