//! The distributed lease-resolution engine.
//!
//! A fleet query classifies the search text, builds the matching
//! commands per capable daemon, batches everything destined for one
//! app into a single transport call, validates each response, and
//! folds the results into a combined lease list plus the list of apps
//! that had trouble answering.
//!
//! Failure policy favors availability over completeness: a single
//! unreachable or misbehaving fleet member never hides leases found on
//! the rest of the fleet. Only an inventory read failure aborts a
//! query, because then there is no fleet to query at all.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::command::{Command, PropertyCommand};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::inventory::Inventory;
use crate::metrics::{self, Timer};
use crate::model::{
    App, DaemonName, ErredApp, Host, Lease, LeaseType, LEASE_CMDS_HOOK, LEASE_STATE_DECLINED,
};
use crate::query::{classify, SearchKind};
use crate::response::{extract_leases, CommandResponse};
use crate::transport::{AgentTransport, TransportError};

/// Outcome of a fleet query: the leases found and the apps that failed
/// to answer at least one command. The two are not mutually exclusive;
/// an erred app may still have contributed leases from its other
/// commands in the same batch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LeaseSearchResult {
    /// Leases found across the fleet, with app provenance attached.
    pub leases: Vec<Lease>,
    /// Apps that produced at least one soft error; each appears once.
    pub erred_apps: Vec<ErredApp>,
}

/// Check whether a daemon of the app has the lease-commands hook
/// library configured. A daemon without it cannot answer lease
/// queries; that is not a failure, it just receives no commands.
pub fn has_lease_cmds_hook(app: &App, daemon: DaemonName) -> bool {
    app.daemon(daemon)
        .and_then(|d| d.config.as_ref())
        .is_some_and(|config| config.has_hook(LEASE_CMDS_HOOK))
}

/// Per-classification dispatch plan, built once per query so a
/// malformed caller value fails before anything is sent.
enum QueryPlan {
    /// One `lease4-get` per dhcp4-capable app.
    Address4(String),
    /// `lease6-get` by IA_NA, then IA_PD if nothing matched.
    Address6(String),
    /// A batch of property lookups per capable daemon.
    Properties {
        dhcp4: Vec<Command>,
        dhcp6: Vec<Command>,
        declined_only: bool,
    },
}

impl QueryPlan {
    fn for_text(kind: SearchKind, text: &str) -> Result<Self, SearchError> {
        match kind {
            SearchKind::Ipv4 => Ok(QueryPlan::Address4(text.trim().to_string())),
            SearchKind::Ipv6 => Ok(QueryPlan::Address6(text.trim().to_string())),
            SearchKind::Identifier => Ok(QueryPlan::Properties {
                dhcp4: vec![
                    Command::by_property(PropertyCommand::HwAddress, text)?,
                    Command::by_property(PropertyCommand::ClientId, text)?,
                ],
                dhcp6: vec![Command::by_property(PropertyCommand::Duid, text)?],
                declined_only: false,
            }),
            SearchKind::Hostname => Ok(QueryPlan::Properties {
                dhcp4: vec![Command::by_property(PropertyCommand::Hostname4, text)?],
                dhcp6: vec![Command::by_property(PropertyCommand::Hostname6, text)?],
                declined_only: false,
            }),
        }
    }

    /// Kea has no "list declined leases" command; declined leases have
    /// their owning identifiers wiped, so they are found by searching
    /// for the empty hw-address and the empty-DUID sentinel.
    fn declined() -> Result<Self, SearchError> {
        Ok(QueryPlan::Properties {
            dhcp4: vec![Command::by_property(PropertyCommand::HwAddress, "")?],
            dhcp6: vec![Command::by_property(PropertyCommand::Duid, "")?],
            declined_only: true,
        })
    }
}

/// What one app contributed to a fleet query.
struct AppOutcome {
    app: App,
    leases: Vec<Lease>,
    erred: bool,
}

/// How a host reservation is looked up.
enum ReservationKind {
    V4(String),
    V6 { address: String, prefix: bool },
}

/// Classify a reservation by CIDR inspection: IPv4 address, IPv6
/// address, or IPv6 delegated prefix. Unparseable reservations are
/// skipped by the caller.
fn classify_reservation(address: &str) -> Option<ReservationKind> {
    let (literal, prefix_length) = match address.split_once('/') {
        Some((literal, length)) => (literal.trim(), Some(length.trim().parse::<u8>().ok()?)),
        None => (address.trim(), None),
    };
    match literal.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(ReservationKind::V4(v4.to_string())),
        IpAddr::V6(v6) => Some(ReservationKind::V6 {
            address: v6.to_string(),
            prefix: prefix_length.is_some_and(|length| length < 128),
        }),
    }
}

fn stamp_provenance(lease: &mut Lease, app: &App) {
    lease.app_id = app.id;
    lease.app_name = app.name.clone();
}

/// The lease search engine. Holds the inventory and transport seams
/// plus the fan-out and timeout tuning.
pub struct LeaseSearch {
    inventory: Arc<dyn Inventory>,
    transport: Arc<dyn AgentTransport>,
    app_timeout: Duration,
    fanout: usize,
}

impl LeaseSearch {
    /// Create an engine with default search tuning.
    pub fn new(inventory: Arc<dyn Inventory>, transport: Arc<dyn AgentTransport>) -> Self {
        Self::with_config(inventory, transport, &SearchConfig::default())
    }

    /// Create an engine with explicit search tuning.
    pub fn with_config(
        inventory: Arc<dyn Inventory>,
        transport: Arc<dyn AgentTransport>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            inventory,
            transport,
            app_timeout: config.app_timeout(),
            fanout: config.fanout.max(1),
        }
    }

    /// Find leases matching free-form search text: an IP address, a
    /// hexadecimal identifier (hardware address, client identifier or
    /// DUID), or a hostname.
    ///
    /// Every capable app is queried; apps that fail to answer are
    /// returned in `erred_apps` without suppressing leases found
    /// elsewhere. Cancellation is dropping the returned future; a
    /// whole-call deadline composes as `tokio::time::timeout` around
    /// it, and the configured per-app timeout bounds the damage of one
    /// unresponsive app either way.
    pub async fn find_leases(&self, text: &str) -> Result<LeaseSearchResult, SearchError> {
        let timer = Timer::start();
        let kind = classify(text);
        debug!(text, kind = kind_label(kind), "classified lease search");
        let plan = QueryPlan::for_text(kind, text)?;
        let apps = match self.inventory.list_apps().await {
            Ok(apps) => apps,
            Err(err) => {
                metrics::record_query(
                    kind_label(kind),
                    metrics::QueryOutcome::InventoryError,
                    timer.elapsed(),
                );
                return Err(err.into());
            }
        };
        let result = self.run_plan(apps, &plan).await;
        metrics::record_query(kind_label(kind), metrics::QueryOutcome::Success, timer.elapsed());
        metrics::record_result_counts(result.leases.len(), result.erred_apps.len());
        Ok(result)
    }

    /// Find declined leases across the fleet.
    ///
    /// Sends the fixed synthetic query (empty hw-address, the `"0"`
    /// DUID sentinel) to every capable app, then drops any returned
    /// lease whose state is not declined; the servers are not trusted
    /// to enforce that.
    pub async fn find_declined_leases(&self) -> Result<LeaseSearchResult, SearchError> {
        let timer = Timer::start();
        let plan = QueryPlan::declined()?;
        let apps = match self.inventory.list_apps().await {
            Ok(apps) => apps,
            Err(err) => {
                metrics::record_query(
                    "declined",
                    metrics::QueryOutcome::InventoryError,
                    timer.elapsed(),
                );
                return Err(err.into());
            }
        };
        let result = self.run_plan(apps, &plan).await;
        metrics::record_query("declined", metrics::QueryOutcome::Success, timer.elapsed());
        metrics::record_result_counts(result.leases.len(), result.erred_apps.len());
        Ok(result)
    }

    /// Find leases assigned to the addresses and delegated prefixes
    /// reserved for a host. A non-existent host yields an empty result
    /// with no network calls; it is not an error.
    ///
    /// Each reservation needs a distinctly-typed single command, so
    /// this path does not batch. Once a protocol (dhcp4 or dhcp6)
    /// fails for an app, no further commands for that protocol are
    /// sent to it; when both have failed the app's remaining
    /// reservations are skipped entirely.
    pub async fn find_leases_by_host_id(
        &self,
        host_id: i64,
    ) -> Result<LeaseSearchResult, SearchError> {
        let timer = Timer::start();
        let host = match self.inventory.get_host(host_id).await {
            Ok(Some(host)) => host,
            Ok(None) => {
                debug!(host_id, "host not found, nothing to search");
                return Ok(LeaseSearchResult::default());
            }
            Err(err) => {
                metrics::record_query(
                    "host",
                    metrics::QueryOutcome::InventoryError,
                    timer.elapsed(),
                );
                return Err(err.into());
            }
        };
        let apps = match self.inventory.list_apps().await {
            Ok(apps) => apps,
            Err(err) => {
                metrics::record_query(
                    "host",
                    metrics::QueryOutcome::InventoryError,
                    timer.elapsed(),
                );
                return Err(err.into());
            }
        };
        let outcomes: Vec<AppOutcome> = stream::iter(
            apps.into_iter()
                .map(|app| self.walk_host_reservations(app, &host)),
        )
        .buffered(self.fanout)
        .collect()
        .await;
        let result = merge_outcomes(outcomes);
        metrics::record_query("host", metrics::QueryOutcome::Success, timer.elapsed());
        metrics::record_result_counts(result.leases.len(), result.erred_apps.len());
        Ok(result)
    }

    /// Send `lease4-get` searching by IPv4 address. Returns `None`
    /// when the lease does not exist.
    pub async fn lease4_by_ip_address(
        &self,
        app: &App,
        ip_address: &str,
    ) -> Result<Option<Lease>, SearchError> {
        let command = Command::lease4_get(ip_address);
        let responses = self.dispatch(app, std::slice::from_ref(&command)).await?;
        let mut leases = extract_leases(&command, &responses[0])?;
        Ok(leases.pop().map(|mut lease| {
            stamp_provenance(&mut lease, app);
            lease
        }))
    }

    /// Send `lease6-get` searching by IPv6 address or delegated
    /// prefix; the lease type distinguishes the two. Returns `None`
    /// when the lease does not exist.
    pub async fn lease6_by_ip_address(
        &self,
        app: &App,
        lease_type: LeaseType,
        ip_address: &str,
    ) -> Result<Option<Lease>, SearchError> {
        let command = Command::lease6_get(lease_type, ip_address);
        let responses = self.dispatch(app, std::slice::from_ref(&command)).await?;
        let mut leases = extract_leases(&command, &responses[0])?;
        Ok(leases.pop().map(|mut lease| {
            stamp_provenance(&mut lease, app);
            lease
        }))
    }

    /// Send `lease4-get-by-hw-address` to one app.
    pub async fn leases4_by_hw_address(
        &self,
        app: &App,
        hw_address: &str,
    ) -> Result<Vec<Lease>, SearchError> {
        let command = Command::by_property(PropertyCommand::HwAddress, hw_address)?;
        let (leases, _) = self.leases_by_properties(app, vec![command]).await?;
        Ok(leases)
    }

    /// Send `lease4-get-by-client-id` to one app.
    pub async fn leases4_by_client_id(
        &self,
        app: &App,
        client_id: &str,
    ) -> Result<Vec<Lease>, SearchError> {
        let command = Command::by_property(PropertyCommand::ClientId, client_id)?;
        let (leases, _) = self.leases_by_properties(app, vec![command]).await?;
        Ok(leases)
    }

    /// Send `lease4-get-by-hostname` to one app.
    pub async fn leases4_by_hostname(
        &self,
        app: &App,
        hostname: &str,
    ) -> Result<Vec<Lease>, SearchError> {
        let command = Command::by_property(PropertyCommand::Hostname4, hostname)?;
        let (leases, _) = self.leases_by_properties(app, vec![command]).await?;
        Ok(leases)
    }

    /// Send `lease6-get-by-duid` to one app.
    pub async fn leases6_by_duid(&self, app: &App, duid: &str) -> Result<Vec<Lease>, SearchError> {
        let command = Command::by_property(PropertyCommand::Duid, duid)?;
        let (leases, _) = self.leases_by_properties(app, vec![command]).await?;
        Ok(leases)
    }

    /// Send `lease6-get-by-hostname` to one app.
    pub async fn leases6_by_hostname(
        &self,
        app: &App,
        hostname: &str,
    ) -> Result<Vec<Lease>, SearchError> {
        let command = Command::by_property(PropertyCommand::Hostname6, hostname)?;
        let (leases, _) = self.leases_by_properties(app, vec![command]).await?;
        Ok(leases)
    }

    /// Run a query plan against the fleet with bounded fan-out. Apps
    /// are queried up to `fanout` at a time; outcomes merge at an
    /// ordered join so the final lease list follows app-iteration
    /// order (determinism only, never semantics).
    async fn run_plan(&self, apps: Vec<App>, plan: &QueryPlan) -> LeaseSearchResult {
        let outcomes: Vec<AppOutcome> =
            stream::iter(apps.into_iter().map(|app| self.query_app(app, plan)))
                .buffered(self.fanout)
                .collect()
                .await;
        merge_outcomes(outcomes)
    }

    /// Run one app's share of the plan. Soft failures only; they mark
    /// the app as erred without aborting anything.
    async fn query_app(&self, app: App, plan: &QueryPlan) -> AppOutcome {
        let mut leases = Vec::new();
        let mut erred = false;
        match plan {
            QueryPlan::Address4(address) => {
                if has_lease_cmds_hook(&app, DaemonName::Dhcp4) {
                    match self.lease4_by_ip_address(&app, address).await {
                        Ok(Some(lease)) => leases.push(lease),
                        Ok(None) => {}
                        Err(err) => {
                            warn!(app = %app.name, error = %err, "lease4-get failed");
                            erred = true;
                        }
                    }
                }
            }
            QueryPlan::Address6(address) => {
                if has_lease_cmds_hook(&app, DaemonName::Dhcp6) {
                    // An address or prefix is unique across the fleet,
                    // so a match by IA_NA makes the IA_PD lookup
                    // pointless.
                    for lease_type in [LeaseType::IaNa, LeaseType::IaPd] {
                        match self.lease6_by_ip_address(&app, lease_type, address).await {
                            Ok(Some(lease)) => {
                                leases.push(lease);
                                break;
                            }
                            Ok(None) => {}
                            Err(err) => {
                                warn!(
                                    app = %app.name,
                                    lease_type = lease_type.as_str(),
                                    error = %err,
                                    "lease6-get failed"
                                );
                                erred = true;
                            }
                        }
                    }
                }
            }
            QueryPlan::Properties {
                dhcp4,
                dhcp6,
                declined_only,
            } => {
                let mut commands = Vec::new();
                if has_lease_cmds_hook(&app, DaemonName::Dhcp4) {
                    commands.extend(dhcp4.iter().cloned());
                }
                if has_lease_cmds_hook(&app, DaemonName::Dhcp6) {
                    commands.extend(dhcp6.iter().cloned());
                }
                match self.leases_by_properties(&app, commands).await {
                    Ok((mut found, warns)) => {
                        erred = warns;
                        if *declined_only {
                            found.retain(|lease| lease.state == LEASE_STATE_DECLINED);
                        }
                        leases.extend(found);
                    }
                    Err(err) => {
                        warn!(app = %app.name, error = %err, "lease query dispatch failed");
                        erred = true;
                    }
                }
            }
        }
        metrics::record_app_queried(erred);
        AppOutcome { app, leases, erred }
    }

    /// Walk a host's reservations against one app, one single-lease
    /// getter per reservation, with the per-protocol circuit breaker.
    async fn walk_host_reservations(&self, app: App, host: &Host) -> AppOutcome {
        let mut leases = Vec::new();
        let mut dhcp4_failed = false;
        let mut dhcp6_failed = false;
        for reservation in &host.ip_reservations {
            let Some(kind) = classify_reservation(&reservation.address) else {
                // The inventory should never hold an unparseable
                // reservation, but skipping is safer than guessing.
                continue;
            };
            match kind {
                ReservationKind::V4(address) => {
                    if !dhcp4_failed && has_lease_cmds_hook(&app, DaemonName::Dhcp4) {
                        match self.lease4_by_ip_address(&app, &address).await {
                            Ok(Some(lease)) => leases.push(lease),
                            Ok(None) => {}
                            Err(err) => {
                                warn!(app = %app.name, host_id = host.id, error = %err, "lease4-get failed");
                                dhcp4_failed = true;
                            }
                        }
                    }
                }
                ReservationKind::V6 { address, prefix } => {
                    if !dhcp6_failed && has_lease_cmds_hook(&app, DaemonName::Dhcp6) {
                        let lease_type = if prefix {
                            LeaseType::IaPd
                        } else {
                            LeaseType::IaNa
                        };
                        match self.lease6_by_ip_address(&app, lease_type, &address).await {
                            Ok(Some(lease)) => leases.push(lease),
                            Ok(None) => {}
                            Err(err) => {
                                warn!(app = %app.name, host_id = host.id, error = %err, "lease6-get failed");
                                dhcp6_failed = true;
                            }
                        }
                    }
                }
            }
            // An app that cannot answer either protocol is unlikely to
            // answer the remaining reservations.
            if dhcp4_failed && dhcp6_failed {
                break;
            }
        }
        let erred = dhcp4_failed || dhcp6_failed;
        metrics::record_app_queried(erred);
        AppOutcome { app, leases, erred }
    }

    /// Batch property lookups to one app. Per-command soft errors are
    /// logged and reported through the `warns` flag; leases returned
    /// by sibling commands in the same batch are kept.
    async fn leases_by_properties(
        &self,
        app: &App,
        commands: Vec<Command>,
    ) -> Result<(Vec<Lease>, bool), TransportError> {
        // Nothing gated in means no network call at all.
        if commands.is_empty() {
            return Ok((Vec::new(), false));
        }
        let responses = self.dispatch(app, &commands).await?;
        let mut leases = Vec::new();
        let mut warns = false;
        for (command, response) in commands.iter().zip(&responses) {
            match extract_leases(command, response) {
                Ok(mut found) => leases.append(&mut found),
                Err(err) => {
                    // One daemon may be failing while its sibling still
                    // answers; keep what the others returned.
                    warn!(app = %app.name, command = command.name(), error = %err, "lease command failed");
                    warns = true;
                }
            }
        }
        for lease in &mut leases {
            stamp_provenance(lease, app);
        }
        Ok((leases, warns))
    }

    /// One dispatch to one app, bounded by the per-app timeout. A
    /// timeout counts as any other transport failure.
    async fn dispatch(
        &self,
        app: &App,
        commands: &[Command],
    ) -> Result<Vec<CommandResponse>, TransportError> {
        let responses = tokio::time::timeout(
            self.app_timeout,
            self.transport.forward_commands(app, commands),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;
        if responses.len() != commands.len() {
            return Err(TransportError::ResponseCountMismatch {
                sent: commands.len(),
                received: responses.len(),
            });
        }
        Ok(responses)
    }
}

fn merge_outcomes(outcomes: Vec<AppOutcome>) -> LeaseSearchResult {
    let mut result = LeaseSearchResult::default();
    for outcome in outcomes {
        result.leases.extend(outcome.leases);
        // One outcome per app keeps the erred list deduplicated.
        if outcome.erred {
            result.erred_apps.push(ErredApp::from(&outcome.app));
        }
    }
    result
}

fn kind_label(kind: SearchKind) -> &'static str {
    match kind {
        SearchKind::Ipv4 => "ipv4",
        SearchKind::Ipv6 => "ipv6",
        SearchKind::Identifier => "identifier",
        SearchKind::Hostname => "hostname",
    }
}
