//! Fleet inventory reads.
//!
//! The engine reads the fleet (apps and host reservations) through the
//! [`Inventory`] trait. Persistence lives elsewhere; a failed inventory
//! read is the one hard error that aborts a fleet query, because there
//! is no fleet to query at all.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::FleetConfig;
use crate::model::{App, Daemon, DaemonConfig, Host, IpReservation};

/// A fleet inventory read failure.
#[derive(Debug, Error)]
#[error("inventory read failed: {0}")]
pub struct InventoryError(pub String);

/// Inventory contract consumed by the lease engine.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// List the Kea apps in the fleet.
    async fn list_apps(&self) -> Result<Vec<App>, InventoryError>;

    /// Fetch a host reservation record by ID. A missing host is not an
    /// error.
    async fn get_host(&self, host_id: i64) -> Result<Option<Host>, InventoryError>;
}

/// In-memory inventory loaded from the fleet configuration file.
#[derive(Debug, Default)]
pub struct StaticInventory {
    apps: Vec<App>,
    hosts: HashMap<i64, Host>,
}

impl StaticInventory {
    /// Build the inventory from the fleet configuration.
    pub fn from_config(fleet: &FleetConfig) -> Self {
        let apps = fleet
            .apps
            .iter()
            .map(|app| App {
                id: app.id,
                name: app.name.clone(),
                control_url: app.control_url.clone(),
                daemons: app
                    .daemons
                    .iter()
                    .map(|daemon| Daemon {
                        name: daemon.name,
                        config: Some(DaemonConfig {
                            hook_libraries: daemon.hook_libraries.clone(),
                        }),
                    })
                    .collect(),
            })
            .collect();
        let hosts = fleet
            .hosts
            .iter()
            .map(|host| {
                (
                    host.id,
                    Host {
                        id: host.id,
                        hostname: host.hostname.clone(),
                        ip_reservations: host
                            .ip_reservations
                            .iter()
                            .map(|address| IpReservation {
                                address: address.clone(),
                            })
                            .collect(),
                    },
                )
            })
            .collect();
        Self { apps, hosts }
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn list_apps(&self) -> Result<Vec<App>, InventoryError> {
        Ok(self.apps.clone())
    }

    async fn get_host(&self, host_id: i64) -> Result<Option<Host>, InventoryError> {
        Ok(self.hosts.get(&host_id).cloned())
    }
}
