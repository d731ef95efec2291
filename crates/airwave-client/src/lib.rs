//! Airwave client library
//!
//! Connects to an Airwave server, tracks the station the client is in,
//! and reconciles a local playback engine against authoritative station
//! snapshots.
//!
//! # Example
//!
//! ```no_run
//! use airwave_client::Airwave;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Airwave::builder("ws://localhost:7410")
//!         .name("Living Room")
//!         .connect()
//!         .await?;
//!
//!     let station = client.create_station("Friday Night").await?;
//!     println!("hosting {}", station.name);
//!     client.pause().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod catalog;
pub mod client;
pub mod error;
pub mod reconciler;

pub use builder::AirwaveBuilder;
pub use catalog::Catalog;
pub use client::{Airwave, StationEvent};
pub use error::{ClientError, Result};
pub use reconciler::{PlaybackEngine, Reconciler};

// Re-export core types users need
pub use airwave_core::{PlayerAction, PlaybackState, Station, StationSummary, Track};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Airwave, AirwaveBuilder, Catalog, PlaybackEngine, Reconciler, StationEvent};
    pub use airwave_core::{PlayerAction, Station, StationSummary, Track};
}
