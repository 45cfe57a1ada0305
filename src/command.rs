//! Control-channel command construction.
//!
//! Commands are built fresh per query and never persisted. Each command
//! knows its target daemon and the shape of the response it expects, so
//! the dispatcher and validator never inspect payloads at runtime.
//!
//! The wire envelope is `{"command": <name>, "service": [<daemons>],
//! "arguments": {...}}` with `arguments` omitted when absent.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SearchError;
use crate::model::{DaemonName, LeaseType};
use crate::query::format_mac_address;

/// Expected shape of a command's response arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Arguments hold a single lease object (`lease4-get`, `lease6-get`).
    SingleLease,
    /// Arguments hold a `leases` list (`lease4-get-by-*`, `lease6-get-by-*`).
    LeaseList,
}

/// Lease lookups keyed by a client property. These are the commands the
/// engine batches per app; the set is closed, so an unknown command name
/// is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyCommand {
    /// `lease4-get-by-hw-address`
    HwAddress,
    /// `lease4-get-by-client-id`
    ClientId,
    /// `lease6-get-by-duid`
    Duid,
    /// `lease4-get-by-hostname`
    Hostname4,
    /// `lease6-get-by-hostname`
    Hostname6,
}

impl PropertyCommand {
    /// Wire command name.
    pub fn name(self) -> &'static str {
        match self {
            PropertyCommand::HwAddress => "lease4-get-by-hw-address",
            PropertyCommand::ClientId => "lease4-get-by-client-id",
            PropertyCommand::Duid => "lease6-get-by-duid",
            PropertyCommand::Hostname4 => "lease4-get-by-hostname",
            PropertyCommand::Hostname6 => "lease6-get-by-hostname",
        }
    }

    /// Daemon the command is addressed to.
    pub fn daemon(self) -> DaemonName {
        match self {
            PropertyCommand::HwAddress
            | PropertyCommand::ClientId
            | PropertyCommand::Hostname4 => DaemonName::Dhcp4,
            PropertyCommand::Duid | PropertyCommand::Hostname6 => DaemonName::Dhcp6,
        }
    }

    /// Name of the argument carrying the property value.
    fn property_name(self) -> &'static str {
        match self {
            PropertyCommand::HwAddress => "hw-address",
            PropertyCommand::ClientId => "client-id",
            PropertyCommand::Duid => "duid",
            PropertyCommand::Hostname4 | PropertyCommand::Hostname6 => "hostname",
        }
    }
}

/// A protocol command bound to one target daemon.
#[derive(Debug, Clone)]
pub struct Command {
    name: &'static str,
    daemon: DaemonName,
    response_kind: ResponseKind,
    arguments: Option<Map<String, Value>>,
}

impl Command {
    /// Build a `lease4-get` command searching by IPv4 address.
    pub fn lease4_get(ip_address: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert("ip-address".to_string(), Value::from(ip_address));
        Self {
            name: "lease4-get",
            daemon: DaemonName::Dhcp4,
            response_kind: ResponseKind::SingleLease,
            arguments: Some(arguments),
        }
    }

    /// Build a `lease6-get` command searching by IPv6 address or prefix.
    /// The lease type distinguishes plain addresses from delegated
    /// prefixes; Kea requires it.
    pub fn lease6_get(lease_type: LeaseType, ip_address: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert("ip-address".to_string(), Value::from(ip_address));
        arguments.insert("type".to_string(), Value::from(lease_type.as_str()));
        Self {
            name: "lease6-get",
            daemon: DaemonName::Dhcp6,
            response_kind: ResponseKind::SingleLease,
            arguments: Some(arguments),
        }
    }

    /// Build a lease lookup by client property.
    ///
    /// Formatting rules per command:
    /// - hw-address: canonicalized to colon-separated hex pairs; an
    ///   empty value passes through (used for the declined-lease
    ///   search); a malformed non-empty value is a hard
    ///   [`SearchError::InvalidIdentifier`].
    /// - duid: an empty value is replaced with `"0"`, Kea's sentinel
    ///   for an empty DUID (it rejects truly empty ones).
    /// - client-id and hostname: passed through unchanged.
    pub fn by_property(command: PropertyCommand, value: &str) -> Result<Self, SearchError> {
        let sent_value = match command {
            PropertyCommand::HwAddress if !value.is_empty() => format_mac_address(value)
                .ok_or_else(|| SearchError::InvalidIdentifier(value.to_string()))?,
            PropertyCommand::Duid if value.is_empty() => "0".to_string(),
            _ => value.to_string(),
        };
        let mut arguments = Map::new();
        arguments.insert(command.property_name().to_string(), Value::from(sent_value));
        Ok(Self {
            name: command.name(),
            daemon: command.daemon(),
            response_kind: ResponseKind::LeaseList,
            arguments: Some(arguments),
        })
    }

    /// Wire command name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Daemon the command is addressed to.
    pub fn daemon(&self) -> DaemonName {
        self.daemon
    }

    /// Shape of the response arguments this command expects.
    pub fn response_kind(&self) -> ResponseKind {
        self.response_kind
    }

    /// Command arguments, if any.
    pub fn arguments(&self) -> Option<&Map<String, Value>> {
        self.arguments.as_ref()
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.arguments.is_some() { 3 } else { 2 };
        let mut envelope = serializer.serialize_struct("Command", fields)?;
        envelope.serialize_field("command", self.name)?;
        envelope.serialize_field("service", &[self.daemon.as_str()])?;
        if let Some(ref arguments) = self.arguments {
            envelope.serialize_field("arguments", arguments)?;
        }
        envelope.end()
    }
}
