//! Shared test infrastructure for lease search integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use kea_fleet::command::Command;
use kea_fleet::inventory::{Inventory, InventoryError};
use kea_fleet::model::{App, Daemon, DaemonConfig, DaemonName, Host, IpReservation};
use kea_fleet::response::CommandResponse;
use kea_fleet::search::LeaseSearch;
use kea_fleet::transport::{AgentTransport, TransportError};

// --- Constants ---

pub const HOOK_PATH: &str = "/usr/lib/kea/hooks/libdhcp_lease_cmds.so";

// --- MockTransport ---

/// One command the engine actually put on the wire, captured as its
/// serialized envelope so tests can assert the exact JSON sent.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub app_id: i64,
    pub envelope: Value,
}

impl RecordedCall {
    pub fn command_name(&self) -> &str {
        self.envelope["command"].as_str().unwrap()
    }

    pub fn argument(&self, name: &str) -> &Value {
        &self.envelope["arguments"][name]
    }
}

type Responder = dyn Fn(&App, &Command) -> Result<CommandResponse, TransportError> + Send + Sync;

/// Scripted transport. Every dispatched command is recorded before the
/// responder decides the answer, so calls are observable even when the
/// dispatch fails.
pub struct MockTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&App, &Command) -> Result<CommandResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A transport answering every command with the `Empty` result.
    pub fn empty() -> Arc<Self> {
        Self::new(|_, _| Ok(empty_response()))
    }

    /// A transport failing every dispatch at the connection level.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|_, command| {
            Err(TransportError::EmptyResponse {
                command: command.name(),
            })
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The commands dispatched to one app, in order.
    pub fn calls_for(&self, app_id: i64) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.app_id == app_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AgentTransport for MockTransport {
    async fn forward_commands(
        &self,
        app: &App,
        commands: &[Command],
    ) -> Result<Vec<CommandResponse>, TransportError> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            self.calls.lock().unwrap().push(RecordedCall {
                app_id: app.id,
                envelope: serde_json::to_value(command).unwrap(),
            });
            responses.push((self.responder)(app, command)?);
        }
        Ok(responses)
    }
}

// --- MockInventory ---

#[derive(Default)]
pub struct MockInventory {
    apps: Vec<App>,
    hosts: HashMap<i64, Host>,
    fail: bool,
}

impl MockInventory {
    pub fn with_apps(apps: Vec<App>) -> Arc<Self> {
        Arc::new(Self {
            apps,
            ..Self::default()
        })
    }

    pub fn with_apps_and_hosts(apps: Vec<App>, hosts: Vec<Host>) -> Arc<Self> {
        Arc::new(Self {
            apps,
            hosts: hosts.into_iter().map(|host| (host.id, host)).collect(),
            fail: false,
        })
    }

    /// An inventory whose every read fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl Inventory for MockInventory {
    async fn list_apps(&self) -> Result<Vec<App>, InventoryError> {
        if self.fail {
            return Err(InventoryError("connection refused".to_string()));
        }
        Ok(self.apps.clone())
    }

    async fn get_host(&self, host_id: i64) -> Result<Option<Host>, InventoryError> {
        if self.fail {
            return Err(InventoryError("connection refused".to_string()));
        }
        Ok(self.hosts.get(&host_id).cloned())
    }
}

// --- Fleet builders ---

/// Build an app whose listed daemons all have the lease-cmds hook.
pub fn app(id: i64, name: &str, daemons: &[DaemonName]) -> App {
    App {
        id,
        name: name.to_string(),
        control_url: format!("http://{}:8000/", name),
        daemons: daemons
            .iter()
            .map(|&name| Daemon {
                name,
                config: Some(DaemonConfig {
                    hook_libraries: vec![HOOK_PATH.to_string()],
                }),
            })
            .collect(),
    }
}

/// Build an app whose daemons run without the lease-cmds hook.
pub fn app_without_hook(id: i64, name: &str, daemons: &[DaemonName]) -> App {
    App {
        id,
        name: name.to_string(),
        control_url: format!("http://{}:8000/", name),
        daemons: daemons
            .iter()
            .map(|&name| Daemon {
                name,
                config: Some(DaemonConfig::default()),
            })
            .collect(),
    }
}

pub fn host(id: i64, hostname: &str, reservations: &[&str]) -> Host {
    Host {
        id,
        hostname: hostname.to_string(),
        ip_reservations: reservations
            .iter()
            .map(|address| IpReservation {
                address: address.to_string(),
            })
            .collect(),
    }
}

pub fn engine(inventory: Arc<MockInventory>, transport: Arc<MockTransport>) -> LeaseSearch {
    LeaseSearch::new(inventory, transport)
}

// --- Kea payload builders ---

/// A DHCPv4 lease payload as the lease-cmds hook emits it.
pub fn lease4_json(ip: &str) -> Value {
    json!({
        "client-id": "42:42:42:42:42:42:42:42",
        "cltt": 12345678,
        "fqdn-fwd": false,
        "fqdn-rev": true,
        "hostname": "myhost.example.com.",
        "hw-address": "08:08:08:08:08:08",
        "ip-address": ip,
        "state": 0,
        "subnet-id": 44,
        "valid-lft": 3600
    })
}

/// A DHCPv6 address lease payload.
pub fn lease6_json(ip: &str) -> Value {
    json!({
        "cltt": 12345678,
        "duid": "42:42:42:42:42:42:42:42",
        "fqdn-fwd": false,
        "fqdn-rev": true,
        "hostname": "myhost.example.com.",
        "iaid": 1,
        "ip-address": ip,
        "preferred-lft": 500,
        "state": 0,
        "subnet-id": 44,
        "type": "IA_NA",
        "valid-lft": 3600
    })
}

/// A DHCPv6 delegated prefix lease payload.
pub fn lease6_prefix_json(prefix: &str, prefix_len: u8) -> Value {
    let mut lease = lease6_json(prefix);
    lease["type"] = json!("IA_PD");
    lease["prefix-len"] = json!(prefix_len);
    lease
}

pub fn with_state(mut lease: Value, state: u32) -> Value {
    lease["state"] = json!(state);
    lease
}

// --- Response builders ---

/// Success response to a single-lease command (`lease4-get`,
/// `lease6-get`).
pub fn single_lease_response(lease: Value) -> CommandResponse {
    CommandResponse {
        result: 0,
        text: Some("IPv4 lease found.".to_string()),
        arguments: Some(lease),
    }
}

/// Success response to a by-property command, wrapping the lease list.
pub fn lease_list_response(leases: Vec<Value>) -> CommandResponse {
    CommandResponse {
        result: 0,
        text: Some("leases found".to_string()),
        arguments: Some(json!({ "leases": leases })),
    }
}

/// The `Empty` result: the command matched nothing.
pub fn empty_response() -> CommandResponse {
    CommandResponse {
        result: 3,
        text: Some("no lease found".to_string()),
        arguments: None,
    }
}

/// The `Error` result: the daemon failed to process the command.
pub fn error_response() -> CommandResponse {
    CommandResponse {
        result: 1,
        text: Some("unable to communicate with the daemon".to_string()),
        arguments: None,
    }
}

/// The `CommandUnsupported` result.
pub fn unsupported_response() -> CommandResponse {
    CommandResponse {
        result: 2,
        text: Some("command unsupported".to_string()),
        arguments: None,
    }
}
