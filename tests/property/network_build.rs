// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Network Builds
//!
//! Generated networks carry a random mix of enabled and disabled subnet
//! definitions, route tables and security groups.

use cim_landing_zone::domain::ResourceKind;
use cim_landing_zone::phase::Phase;
use cim_landing_zone::topology::build;
use cim_landing_zone::NetworkHandle;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::fixtures::{single_network, Harness, REGION};

const AZS: [&str; 3] = ["a", "b", "d"];

#[derive(Debug, Clone)]
struct GroupSpec {
    /// `disabled` flag per AZ
    definitions: Vec<bool>,
    route_table: bool,
}

fn group_spec() -> impl Strategy<Value = GroupSpec> {
    (prop::collection::vec(any::<bool>(), 1..=3), any::<bool>()).prop_map(|(definitions, route_table)| {
        GroupSpec {
            definitions,
            route_table,
        }
    })
}

fn network(groups: &[GroupSpec], security_groups: usize) -> Value {
    let mut subnets = Vec::new();
    let mut route_tables = vec![json!({"name": "default"})];
    for (g, spec) in groups.iter().enumerate() {
        let table = if spec.route_table {
            let name = format!("Group{}_Shared", g);
            route_tables.push(json!({"name": name}));
            name
        } else {
            "default".to_string()
        };
        let definitions: Vec<Value> = spec
            .definitions
            .iter()
            .enumerate()
            .map(|(d, disabled)| {
                json!({
                    "az": AZS[d],
                    "cidr": format!("10.2.{}.0/24", g * AZS.len() + d),
                    "route-table": table,
                    "disabled": disabled
                })
            })
            .collect();
        subnets.push(json!({"name": format!("Group{}", g), "definitions": definitions}));
    }
    let security_groups: Vec<Value> = (0..security_groups)
        .map(|i| {
            json!({
                "name": format!("Sg{}", i),
                "inbound-rules": [{"description": "tls", "tcp-ports": [443], "source": ["10.0.0.0/8"]}]
            })
        })
        .collect();

    json!({
        "name": "Central",
        "region": REGION,
        "deploy": "local",
        "cidr": "10.2.0.0/16",
        "route-tables": route_tables,
        "subnets": subnets,
        "security-groups": security_groups
    })
}

fn build_once(network: &Value) -> NetworkHandle {
    let config = single_network(network.clone());
    let harness = Harness::new(&config);
    build(harness.network("shared-network", "Central"), &harness.context(Phase::Networks)).unwrap()
}

fn names(handle: &NetworkHandle, kind: ResourceKind) -> BTreeSet<String> {
    handle
        .graph
        .of_kind(kind)
        .map(|r| r.logical_id.to_string())
        .collect()
}

proptest! {
    /// N enabled definitions give exactly N subnets and N registry records
    #[test]
    fn prop_subnet_count_matches_enabled_definitions(
        groups in prop::collection::vec(group_spec(), 1..5),
    ) {
        let enabled = groups
            .iter()
            .flat_map(|g| g.definitions.iter())
            .filter(|disabled| !**disabled)
            .count();

        let handle = build_once(&network(&groups, 0));
        prop_assert_eq!(handle.graph.count(ResourceKind::Subnet), enabled);
        prop_assert_eq!(handle.registry.len(), enabled);
    }

    /// The default table is never created and nothing associates to it
    #[test]
    fn prop_default_route_table_never_materialized(
        groups in prop::collection::vec(group_spec(), 1..5),
    ) {
        let associated = groups
            .iter()
            .filter(|g| g.route_table)
            .flat_map(|g| g.definitions.iter())
            .filter(|disabled| !**disabled)
            .count();

        let handle = build_once(&network(&groups, 0));
        prop_assert!(!handle.graph.contains("default"));
        prop_assert_eq!(
            handle.graph.count(ResourceKind::RouteTable),
            groups.iter().filter(|g| g.route_table).count()
        );
        prop_assert_eq!(handle.graph.count(ResourceKind::SubnetRouteTableAssociation), associated);
    }

    /// Rebuilding an unchanged configuration reproduces every name
    #[test]
    fn prop_rebuild_is_idempotent(
        groups in prop::collection::vec(group_spec(), 1..5),
        security_groups in 0usize..4,
    ) {
        let network = network(&groups, security_groups);
        let first = build_once(&network);
        let second = build_once(&network);

        for kind in [ResourceKind::Subnet, ResourceKind::RouteTable, ResourceKind::SecurityGroup] {
            prop_assert_eq!(names(&first, kind), names(&second, kind));
        }
        prop_assert_eq!(names(&first, ResourceKind::SecurityGroup).len(), security_groups);
        prop_assert_eq!(first.outputs, second.outputs);
    }
}
