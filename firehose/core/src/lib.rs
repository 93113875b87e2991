//! Firehose Core - Resilient Streaming Client
//!
//! Keeps one long-lived HTTP connection open against a push-style endpoint
//! that emits one JSON record per line, forever. Records are decoded and
//! delivered through a local queue; dropped connections are re-established
//! behind the consumer's back with a fixed delay.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          StreamClient                            │
//! │  credentials · swap lock · active slot · record queue (tx)       │
//! │                                                                  │
//! │   follow / track / sample ──► connect ──► handshake (new conn)   │
//! │                                   │                              │
//! │                          2xx: retire previous, install, spawn    │
//! └───────────────────────────────────┼──────────────────────────────┘
//!                                     │
//! ┌───────────────────────────────────┼──────────────────────────────┐
//! │                       StreamConnection (task)                    │
//! │   body bytes ──► LineDecoder ──► decode_line ──► queue (tx)      │
//! │        ▲                                                         │
//! │        └──── reconnect every retry delay until 2xx or retired    │
//! └───────────────────────────────────┼──────────────────────────────┘
//!                                     ▼
//!                           RecordReceiver (consumer)
//! ```
//!
//! # Key Types
//!
//! - [`StreamClient`]: owns the active connection and the record queue
//! - [`StreamConnection`]: one session plus its read/reconnect loop
//! - [`StreamConfig`]: endpoints, retry delay, queue capacity
//! - [`StreamError`]: what a filter change can fail with
//! - [`Post`]: typed record shape for the default endpoints
//!
//! # Quick Start
//!
//! ```ignore
//! use firehose_core::{Credentials, StreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), firehose_core::StreamError> {
//!     let (client, mut records) =
//!         StreamClient::<serde_json::Value>::new(Credentials::new("user", "pass"));
//!
//!     client.track(&["golang", "rust"]).await?;
//!
//!     while let Some(record) = records.recv().await {
//!         println!("{record}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`client`]: connection manager and filter-changing operations
//! - [`connection`]: handshake, read loop and reconnects
//! - [`config`]: configuration from defaults, environment or TOML
//! - [`credentials`]: basic-auth credentials
//! - [`endpoint`]: fixed endpoints and filter bodies
//! - [`line`]: newline framing and per-line decoding
//! - [`liveness`]: Active/Retiring state of a connection
//! - [`record`]: typed post records
//! - [`stats`]: counters for reconnects and dropped lines

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod line;
pub mod liveness;
pub mod record;
pub mod stats;

// Re-exports for convenience
pub use client::{RecordReceiver, StreamClient};
pub use config::{ConfigError, StreamConfig};
pub use connection::StreamConnection;
pub use credentials::Credentials;
pub use endpoint::{follow_body, track_body, Endpoint};
pub use error::StreamError;
pub use line::{decode_line, FramingError, LineDecoder, LineOutcome};
pub use liveness::{Liveness, LivenessState};
pub use record::{Post, User};
pub use stats::{StatsSnapshot, StreamStats};
