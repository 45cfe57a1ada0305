//! kea-fleet - Distributed DHCP lease search across a fleet of Kea servers.
//!
//! This crate resolves lease queries against every Kea DHCP server in a
//! monitored fleet. A single piece of search text (an IP address, a
//! hexadecimal client identifier, or a hostname) is classified, turned
//! into the matching Kea control channel commands per capable daemon,
//! fanned out to the fleet, and the answers are folded into one
//! combined result.
//!
//! ## Features
//!
//! - Free-text lease search: IPv4/IPv6 address, MAC address, client
//!   identifier, DUID, or hostname
//! - Declined-lease sweep across the whole fleet
//! - Lease lookup for a host's reserved addresses and delegated
//!   prefixes
//! - Partial results: one failing server never hides leases found on
//!   the rest of the fleet
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          kea-fleet                            │
//! │                                                               │
//! │  ┌─────────────┐   classify    ┌──────────────────┐           │
//! │  │ search text │──────────────▶│    query plan    │           │
//! │  └─────────────┘               └────────┬─────────┘           │
//! │                                         │ per capable daemon  │
//! │  ┌─────────────┐   list apps            ▼                     │
//! │  │  Inventory  │──────────────▶┌──────────────────┐  HTTP     │
//! │  └─────────────┘               │ bounded fan-out  │─────────▶ │
//! │                                │ (AgentTransport) │  Kea CA   │
//! │                                └────────┬─────────┘           │
//! │                                         ▼                     │
//! │                              leases + erred apps              │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kea_fleet::{HttpAgentTransport, LeaseSearch, StaticInventory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let inventory = Arc::new(StaticInventory::from_config(&fleet_config));
//!     let transport = Arc::new(HttpAgentTransport::new(Duration::from_secs(10)).unwrap());
//!     let engine = LeaseSearch::new(inventory, transport);
//!
//!     let result = engine.find_leases("01:02:03:04:05:06").await.unwrap();
//!     for lease in result.leases {
//!         println!("{} on {}", lease.ip_address, lease.app_name);
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod model;
pub mod query;
pub mod response;
pub mod search;
pub mod telemetry;
pub mod transport;

// Re-export main types
pub use config::{Config, FleetConfig, SearchConfig, TelemetryConfig};
pub use error::SearchError;
pub use inventory::{Inventory, StaticInventory};
pub use model::{App, Host, Lease, LeaseType};
pub use search::{LeaseSearch, LeaseSearchResult};
pub use transport::{AgentTransport, HttpAgentTransport};
