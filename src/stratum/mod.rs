//! Stratum mining-pool client.
//!
//! A reusable client for the three JSON-over-TCP dialects Ethash pools
//! speak: classic stratum, the eth-proxy flavor, and EthereumStratum/1.0.0.
//! Messages are newline-delimited JSON; requests carry a fixed integer id
//! per purpose, responses echo it, and server notifications carry a
//! `method` instead.
//!
//! # Architecture
//!
//! The client is an active async task owning the connection. Consumers
//! receive [`ClientEvent`]s over a channel and enqueue [`ClientCommand`]s
//! (solution and hashrate submissions) over another; the commands never
//! touch the transport directly, so submitters can live on any task.
//!
//! # Usage
//!
//! ```rust,ignore
//! let (event_tx, mut event_rx) = mpsc::channel(64);
//! let (command_tx, command_rx) = mpsc::channel(64);
//! let config = SessionConfig {
//!     spec: ConnectionSpec { /* from the pool URI */ ..Default::default() },
//!     ..Default::default()
//! };
//!
//! let client = StratumClient::new(config, event_tx, command_rx, shutdown_token);
//! tokio::spawn(client.run());
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         ClientEvent::WorkReceived(work) => { /* retarget the miners */ }
//!         ClientEvent::SolutionAccepted { stale } => { /* bookkeeping */ }
//!         // ...
//!     }
//! }
//! ```

pub mod codec;
mod client;
mod connection;
mod error;
mod messages;

pub use client::{SessionConfig, StratumClient};
pub use connection::{Connection, Stream, Transport};
pub use error::{StratumError, StratumResult};
pub use messages::{ClientCommand, ClientEvent, SessionState, Solution, Work};
