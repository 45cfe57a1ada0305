//! Data model for the monitored Kea fleet.
//!
//! These types mirror what the inventory knows about each fleet member
//! and what the Kea control channel puts on the wire. Lease fields use
//! the exact hyphenated names from the lease-cmds hook responses.

use serde::{Deserialize, Serialize};

/// Hook library gating the lease-query capability.
pub const LEASE_CMDS_HOOK: &str = "libdhcp_lease_cmds";

/// Lease state values used by Kea.
pub const LEASE_STATE_DEFAULT: u32 = 0;
/// A declined lease has this state and its owning identifiers wiped.
pub const LEASE_STATE_DECLINED: u32 = 1;

/// Name of a DHCP daemon running within an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DaemonName {
    /// The DHCPv4 server process.
    #[serde(rename = "dhcp4")]
    Dhcp4,
    /// The DHCPv6 server process.
    #[serde(rename = "dhcp6")]
    Dhcp6,
}

impl DaemonName {
    /// Wire name used in the command envelope's `service` list.
    pub fn as_str(self) -> &'static str {
        match self {
            DaemonName::Dhcp4 => "dhcp4",
            DaemonName::Dhcp6 => "dhcp6",
        }
    }
}

impl std::fmt::Display for DaemonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed configuration of a daemon, as far as the lease engine cares.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Paths of the hook libraries the daemon has loaded.
    #[serde(default)]
    pub hook_libraries: Vec<String>,
}

impl DaemonConfig {
    /// Check whether a hook library is loaded. Entries are full library
    /// paths, so this matches by containment like the inventory sync does.
    pub fn has_hook(&self, name: &str) -> bool {
        self.hook_libraries.iter().any(|lib| lib.contains(name))
    }
}

/// One DHCP daemon belonging to an app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Daemon {
    /// Daemon name (`dhcp4` or `dhcp6`).
    pub name: DaemonName,
    /// Parsed daemon configuration, if the inventory has one.
    #[serde(default)]
    pub config: Option<DaemonConfig>,
}

/// A fleet member: one Kea server instance reachable through its agent.
///
/// Read-only to the lease engine; created and updated by the inventory
/// sync process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    /// Inventory identifier.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Control channel endpoint the transport should talk to.
    pub control_url: String,
    /// Daemons running within this app.
    #[serde(default)]
    pub daemons: Vec<Daemon>,
}

impl App {
    /// Look up a daemon by name.
    pub fn daemon(&self, name: DaemonName) -> Option<&Daemon> {
        self.daemons.iter().find(|d| d.name == name)
    }
}

/// A single IP address or delegated prefix reserved for a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpReservation {
    /// Address literal, optionally in CIDR form for delegated prefixes.
    pub address: String,
}

/// A host reservation record, resolved by ID from the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Inventory identifier.
    pub id: i64,
    /// Reserved hostname, if any.
    #[serde(default)]
    pub hostname: String,
    /// Addresses and delegated prefixes reserved for this host.
    #[serde(default)]
    pub ip_reservations: Vec<IpReservation>,
}

/// DHCPv6 lease categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseType {
    /// A plain (non-temporary) address lease.
    #[serde(rename = "IA_NA")]
    IaNa,
    /// A delegated prefix lease.
    #[serde(rename = "IA_PD")]
    IaPd,
}

impl LeaseType {
    /// Wire value used in `lease6-get` arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            LeaseType::IaNa => "IA_NA",
            LeaseType::IaPd => "IA_PD",
        }
    }
}

/// A DHCP lease returned by a Kea daemon.
///
/// Field names match the lease-cmds hook JSON. The `app_id`/`app_name`
/// provenance is attached by the engine after parsing; the wire payload
/// carries no notion of which app answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// Leased address, or the prefix for IA_PD leases.
    #[serde(rename = "ip-address")]
    pub ip_address: String,
    /// Hardware address of the owning client, if known.
    #[serde(rename = "hw-address", default, skip_serializing_if = "Option::is_none")]
    pub hw_address: Option<String>,
    /// DHCPv4 client identifier, if known.
    #[serde(rename = "client-id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// DHCPv6 client DUID, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duid: Option<String>,
    /// Client last transmission time (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cltt: Option<u64>,
    /// Valid lifetime in seconds.
    #[serde(rename = "valid-lft", default)]
    pub valid_lifetime: u32,
    /// Preferred lifetime in seconds (DHCPv6 only).
    #[serde(rename = "preferred-lft", default, skip_serializing_if = "Option::is_none")]
    pub preferred_lifetime: Option<u32>,
    /// Identifier of the subnet the lease belongs to.
    #[serde(rename = "subnet-id", default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<u32>,
    /// Identity association identifier (DHCPv6 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iaid: Option<u32>,
    /// Prefix length for IA_PD leases.
    #[serde(rename = "prefix-len", default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u8>,
    /// Hostname recorded for the lease.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Forward DNS update flag.
    #[serde(rename = "fqdn-fwd", default)]
    pub fqdn_fwd: bool,
    /// Reverse DNS update flag.
    #[serde(rename = "fqdn-rev", default)]
    pub fqdn_rev: bool,
    /// Numeric lease state; see [`LEASE_STATE_DECLINED`].
    #[serde(default)]
    pub state: u32,
    /// Lease type (DHCPv6 only).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub lease_type: Option<LeaseType>,
    /// Identifier of the app that returned this lease.
    #[serde(rename = "app-id", default)]
    pub app_id: i64,
    /// Name of the app that returned this lease.
    #[serde(rename = "app-name", default)]
    pub app_name: String,
}

/// Reference to an app that failed to answer at least one command
/// during a query. An app appears at most once per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErredApp {
    /// Inventory identifier of the app.
    pub app_id: i64,
    /// Name of the app.
    pub app_name: String,
}

impl From<&App> for ErredApp {
    fn from(app: &App) -> Self {
        Self {
            app_id: app.id,
            app_name: app.name.clone(),
        }
    }
}
