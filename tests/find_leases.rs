//! Integration tests for free-text lease search across the fleet.

mod common;

use common::*;
use kea_fleet::model::DaemonName;
use kea_fleet::SearchError;
use serde_json::json;

fn dual_stack_fleet() -> Vec<kea_fleet::App> {
    vec![
        app(1, "kea@host1", &[DaemonName::Dhcp4, DaemonName::Dhcp6]),
        app(2, "kea@host2", &[DaemonName::Dhcp4, DaemonName::Dhcp6]),
    ]
}

#[tokio::test]
async fn test_find_by_ipv4_address() {
    let inventory = MockInventory::with_apps(dual_stack_fleet());
    let transport = MockTransport::new(|app, command| {
        assert_eq!(command.name(), "lease4-get");
        if app.id == 2 {
            Ok(single_lease_response(lease4_json("192.0.2.1")))
        } else {
            Ok(empty_response())
        }
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("192.0.2.1").await.unwrap();

    assert_eq!(result.leases.len(), 1);
    assert_eq!(result.leases[0].ip_address, "192.0.2.1");
    assert!(result.erred_apps.is_empty());
    // One lease4-get per dhcp4-capable app, nothing for dhcp6.
    assert_eq!(transport.call_count(), 2);
    let call = &transport.calls_for(2)[0];
    assert_eq!(call.argument("ip-address"), &json!("192.0.2.1"));
    // Provenance points at the answering app.
    assert_eq!(result.leases[0].app_id, 2);
    assert_eq!(result.leases[0].app_name, "kea@host2");
}

#[tokio::test]
async fn test_find_by_ipv6_address_tries_ia_na_then_ia_pd() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, command| {
        assert_eq!(command.name(), "lease6-get");
        if command.arguments().unwrap()["type"] == json!("IA_PD") {
            Ok(single_lease_response(lease6_prefix_json("2001:db8:1::", 64)))
        } else {
            Ok(empty_response())
        }
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("2001:db8:1::").await.unwrap();

    assert_eq!(result.leases.len(), 1);
    assert!(result.erred_apps.is_empty());
    // IA_NA first, IA_PD only because IA_NA matched nothing.
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].argument("type"), &json!("IA_NA"));
    assert_eq!(calls[1].argument("type"), &json!("IA_PD"));
}

#[tokio::test]
async fn test_find_by_ipv6_address_with_no_match_tries_both_types() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::empty();
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("2001:db8:1::").await.unwrap();

    assert!(result.leases.is_empty());
    assert!(result.erred_apps.is_empty());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_identifier_commands_split_across_single_stack_apps() {
    let inventory = MockInventory::with_apps(vec![
        app(1, "kea@host1", &[DaemonName::Dhcp4]),
        app(2, "kea@host2", &[DaemonName::Dhcp6]),
    ]);
    let transport = MockTransport::new(|_, _| Ok(empty_response()));
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("010203040506").await.unwrap();

    assert!(result.leases.is_empty());
    assert!(result.erred_apps.is_empty());
    // Three commands across the fleet: the dhcp4-only app gets the
    // hw-address and client-id lookups, the dhcp6-only app the duid.
    assert_eq!(transport.call_count(), 3);
    let dhcp4_calls = transport.calls_for(1);
    assert_eq!(dhcp4_calls.len(), 2);
    assert_eq!(dhcp4_calls[0].command_name(), "lease4-get-by-hw-address");
    assert_eq!(dhcp4_calls[0].argument("hw-address"), &json!("01:02:03:04:05:06"));
    assert_eq!(dhcp4_calls[1].command_name(), "lease4-get-by-client-id");
    let dhcp6_calls = transport.calls_for(2);
    assert_eq!(dhcp6_calls.len(), 1);
    assert_eq!(dhcp6_calls[0].command_name(), "lease6-get-by-duid");
}

#[tokio::test]
async fn test_find_by_ipv6_address_stops_after_ia_na_match() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, _| {
        Ok(single_lease_response(lease6_json("2001:db8:2::1")))
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("2001:db8:2::1").await.unwrap();

    assert_eq!(result.leases.len(), 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_find_by_ipv6_error_still_tries_ia_pd_and_marks_erred() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, command| {
        if command.arguments().unwrap()["type"] == json!("IA_NA") {
            Ok(error_response())
        } else {
            Ok(single_lease_response(lease6_prefix_json("2001:db8:1::", 64)))
        }
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("2001:db8:1::").await.unwrap();

    // The IA_NA failure does not suppress the IA_PD match, but the app
    // is still reported as erred.
    assert_eq!(result.leases.len(), 1);
    assert_eq!(result.erred_apps.len(), 1);
    assert_eq!(result.erred_apps[0].app_id, 1);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_find_by_mac_address_batches_identifier_commands() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp4, DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, command| match command.name() {
        "lease4-get-by-hw-address" => Ok(lease_list_response(vec![lease4_json("192.0.2.1")])),
        "lease4-get-by-client-id" => Ok(lease_list_response(vec![])),
        "lease6-get-by-duid" => Ok(lease_list_response(vec![lease6_json("2001:db8:2::1")])),
        other => panic!("unexpected command {other}"),
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("010203040506").await.unwrap();

    assert_eq!(result.leases.len(), 2);
    assert!(result.erred_apps.is_empty());
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].command_name(), "lease4-get-by-hw-address");
    // The bare hex string is canonicalized before hitting the wire.
    assert_eq!(calls[0].argument("hw-address"), &json!("01:02:03:04:05:06"));
    // The identifier is passed verbatim to the other lookups.
    assert_eq!(calls[1].argument("client-id"), &json!("010203040506"));
    assert_eq!(calls[2].argument("duid"), &json!("010203040506"));
}

#[tokio::test]
async fn test_find_by_hostname() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp4, DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, command| match command.name() {
        "lease4-get-by-hostname" => Ok(lease_list_response(vec![lease4_json("192.0.2.1")])),
        "lease6-get-by-hostname" => Ok(empty_response()),
        other => panic!("unexpected command {other}"),
    });
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("myhost.example.com.").await.unwrap();

    assert_eq!(result.leases.len(), 1);
    assert!(result.erred_apps.is_empty());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(
        transport.calls()[0].argument("hostname"),
        &json!("myhost.example.com.")
    );
}

#[tokio::test]
async fn test_partial_success_with_erred_app() {
    let inventory = MockInventory::with_apps(dual_stack_fleet());
    let transport = MockTransport::new(|app, command| {
        if app.id == 2 {
            return Err(kea_fleet::transport::TransportError::EmptyResponse {
                command: command.name(),
            });
        }
        match command.name() {
            "lease4-get-by-hostname" => Ok(lease_list_response(vec![lease4_json("192.0.2.1")])),
            _ => Ok(empty_response()),
        }
    });
    let engine = engine(inventory, transport);

    let result = engine.find_leases("myhost").await.unwrap();

    // Leases found and erred apps coexist in one result.
    assert_eq!(result.leases.len(), 1);
    assert_eq!(result.erred_apps.len(), 1);
    assert_eq!(result.erred_apps[0].app_id, 2);
}

#[tokio::test]
async fn test_failed_sibling_command_keeps_batch_results_and_erred_once() {
    let inventory = MockInventory::with_apps(vec![app(
        1,
        "kea@host1",
        &[DaemonName::Dhcp4, DaemonName::Dhcp6],
    )]);
    let transport = MockTransport::new(|_, command| match command.name() {
        "lease4-get-by-hw-address" => Ok(error_response()),
        "lease4-get-by-client-id" => Ok(unsupported_response()),
        "lease6-get-by-duid" => Ok(lease_list_response(vec![lease6_json("2001:db8:2::1")])),
        other => panic!("unexpected command {other}"),
    });
    let engine = engine(inventory, transport);

    let result = engine.find_leases("0102030405").await.unwrap();

    // Two failed commands in the batch, one erred entry for the app.
    assert_eq!(result.leases.len(), 1);
    assert_eq!(result.erred_apps.len(), 1);
}

#[tokio::test]
async fn test_app_without_hook_receives_no_commands() {
    let inventory = MockInventory::with_apps(vec![
        app_without_hook(1, "kea@host1", &[DaemonName::Dhcp4, DaemonName::Dhcp6]),
        app(2, "kea@host2", &[DaemonName::Dhcp4]),
    ]);
    let transport = MockTransport::empty();
    let engine = engine(inventory, transport.clone());

    let result = engine.find_leases("myhost").await.unwrap();

    assert!(result.leases.is_empty());
    // Gating is not an error.
    assert!(result.erred_apps.is_empty());
    // Only the capable dhcp4 daemon of app 2 was queried.
    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.calls()[0].app_id, 2);
}

#[tokio::test]
async fn test_inventory_failure_aborts_the_query() {
    let engine = engine(MockInventory::failing(), MockTransport::empty());

    let err = engine.find_leases("192.0.2.1").await.unwrap_err();
    assert!(matches!(err, SearchError::Inventory(_)));
}

#[tokio::test]
async fn test_repeated_queries_build_commands_fresh() {
    let inventory = MockInventory::with_apps(vec![app(1, "kea@host1", &[DaemonName::Dhcp4])]);
    let transport = MockTransport::new(|_, _| {
        Ok(single_lease_response(lease4_json("192.0.2.1")))
    });
    let engine = engine(inventory, transport.clone());

    let first = engine.find_leases("192.0.2.1").await.unwrap();
    let second = engine.find_leases("192.0.2.1").await.unwrap();

    assert_eq!(first.leases, second.leases);
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].envelope, calls[1].envelope);
}

/// Transport whose dispatch to app 1 never completes.
struct HalfStuckTransport;

#[async_trait::async_trait]
impl kea_fleet::AgentTransport for HalfStuckTransport {
    async fn forward_commands(
        &self,
        app: &kea_fleet::App,
        commands: &[kea_fleet::command::Command],
    ) -> Result<
        Vec<kea_fleet::response::CommandResponse>,
        kea_fleet::transport::TransportError,
    > {
        if app.id == 1 {
            std::future::pending().await
        } else {
            Ok(commands
                .iter()
                .map(|_| lease_list_response(vec![lease4_json("192.0.2.1")]))
                .collect())
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_app_timeout_is_a_soft_error() {
    let inventory = MockInventory::with_apps(vec![
        app(1, "kea@host1", &[DaemonName::Dhcp4]),
        app(2, "kea@host2", &[DaemonName::Dhcp4]),
    ]);
    let engine = kea_fleet::LeaseSearch::with_config(
        inventory,
        std::sync::Arc::new(HalfStuckTransport),
        &kea_fleet::SearchConfig {
            app_timeout_secs: 1,
            fanout: 4,
        },
    );

    let result = engine.find_leases("myhost").await.unwrap();

    // The stuck app times out and is reported like any other failing
    // app; the healthy app's leases still come back.
    assert_eq!(result.leases.len(), 1);
    assert_eq!(result.leases[0].app_id, 2);
    assert_eq!(result.erred_apps.len(), 1);
    assert_eq!(result.erred_apps[0].app_id, 1);
}

#[tokio::test]
async fn test_single_app_getter_rejects_malformed_mac() {
    let inventory = MockInventory::with_apps(vec![app(1, "kea@host1", &[DaemonName::Dhcp4])]);
    let transport = MockTransport::empty();
    let target = app(1, "kea@host1", &[DaemonName::Dhcp4]);
    let engine = engine(inventory, transport.clone());

    let err = engine
        .leases4_by_hw_address(&target, "not-a-mac")
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::InvalidIdentifier(_)));
    // Rejected before anything hits the wire.
    assert_eq!(transport.call_count(), 0);
}
