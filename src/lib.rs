//! mdht - a BitTorrent Mainline DHT protocol engine
//!
//! This crate implements the node side of the Mainline DHT ([BEP-5]): it
//! decodes KRPC datagrams, answers `ping`/`find_node`/`get_peers`/
//! `announce_peer` queries, correlates replies to outstanding transactions,
//! and drives the iterative Kademlia lookup that walks the network toward a
//! target info hash.
//!
//! # Getting started
//!
//! ```no_run
//! use mdht::{Config, Dht};
//!
//! # async fn example() -> Result<(), mdht::DhtError> {
//! let dht = Dht::bind(Config::default()).await?;
//!
//! let engine = dht.clone();
//! tokio::spawn(async move { engine.run().await });
//!
//! dht.bootstrap(&["67.215.246.10:6881".parse().unwrap()]).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 wire encoding
//! - `message` - KRPC envelope validation and builders
//! - `transaction` - the outstanding-query registry
//! - `query` - outbound query dispatch and the retry runner
//! - `handler` / `lookup` - inbound traffic and the iterative walk
//! - `routing` / `peers` / `token` - node, peer, and token state
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

pub mod bencode;

mod config;
mod constants;
mod engine;
mod error;
mod handler;
mod lookup;
mod message;
mod node;
mod peers;
mod query;
mod routing;
mod token;
mod transaction;

pub use config::{Config, PeerEventHook};
pub use engine::Dht;
pub use error::DhtError;
pub use message::{GENERIC_ERROR, METHOD_UNKNOWN_ERROR, PROTOCOL_ERROR, SERVER_ERROR};
pub use node::{Contact, NodeId, Peer};
pub use peers::PeerStore;
pub use routing::RoutingTable;
pub use token::TokenStore;
