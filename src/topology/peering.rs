// Copyright (c) 2025 - Cowboy AI, Inc.
//! Peering Resolver
//!
//! Peering spans two networks that are built independently, so it runs in
//! two later phases and resolves everything through the output bus:
//!
//! 1. cross-account phase: `create_connection` needs the network outputs of
//!    both sides and records a [`PeeringOutput`]
//! 2. peering-routes phase: `create_routes` adds, for every route with a
//!    subnet destination, one route per enabled definition of that subnet
//!    through the connection joining the two networks

use std::collections::HashMap;

use tracing::info;

use super::graph::{Resource, ResourceGraph};
use super::report::{NetworkReport, Subsystem};
use super::{naming, with_destination, BuildContext, UnitOutcome};
use crate::domain::{PeeringDestination, ResourceKind, RouteDestination, RouteTarget};
use crate::errors::LandingZoneResult;
use crate::output_bus::{NetworkOutput, OutputFilter, PeeringOutput, PeeringVpc};
use crate::resolve::{self, ResolvedNetwork};

fn network_output(ctx: &BuildContext<'_>, account_key: &str, vpc_name: &str) -> Option<NetworkOutput> {
    ctx.bus.find_latest(&OutputFilter::new().account(account_key), |output: &NetworkOutput| {
        output.vpc_name == vpc_name
    })
}

/// Create the peering connection requested by the network's `pcx` settings
pub fn create_connection(resolved: &ResolvedNetwork, ctx: &BuildContext<'_>) -> LandingZoneResult<UnitOutcome> {
    let network = &resolved.network;
    let account_key = resolved.account_key.as_str();
    let mut outcome = UnitOutcome::new(NetworkReport::new(account_key, &network.region, &network.name));

    let Some(pcx) = &network.pcx else {
        outcome.report.skipped(Subsystem::Peering, "not configured");
        return Ok(outcome);
    };

    let local = network_output(ctx, account_key, &network.name);
    let peer = network_output(ctx, &pcx.source, &pcx.source_vpc);
    let (Some(local), Some(peer)) = (local, peer) else {
        outcome.report.warn(
            Subsystem::Peering,
            format!(
                "network outputs of '{}' and '{}' of account '{}' are required, peering skipped",
                network.name, pcx.source_vpc, pcx.source
            ),
        );
        outcome.report.skipped(Subsystem::Peering, "network outputs unavailable");
        return Ok(outcome);
    };
    let Some(peer_owner_id) = ctx.accounts.id_of(&pcx.source) else {
        outcome.report.warn(
            Subsystem::Peering,
            format!("account id of '{}' unknown, peering skipped", pcx.source),
        );
        outcome.report.skipped(Subsystem::Peering, "peer account unknown");
        return Ok(outcome);
    };
    let peer_region = resolve::find(ctx.resolved, &pcx.source, &pcx.source_vpc)
        .map(|r| r.region().to_string())
        .unwrap_or_else(|| network.region.clone());

    let mut graph = ResourceGraph::new(account_key, &network.region, &network.name);
    let connection = graph.add(
        Resource::new(naming::peering_connection(&network.name, &pcx.source_vpc), ResourceKind::PeeringConnection)
            .property("vpcId", local.vpc_id.as_str())
            .property("peerVpcId", peer.vpc_id.as_str())
            .property("peerOwnerId", peer_owner_id)
            .property("peerRegion", peer_region)
            .tag("Name", format!("{}-{}_pcx", network.name, pcx.source_vpc)),
    )?;

    let output = PeeringOutput {
        pcx_id: connection.token(),
        vpcs: vec![
            PeeringVpc {
                account_key: account_key.to_string(),
                vpc_id: local.vpc_id,
                vpc_name: network.name.clone(),
            },
            PeeringVpc {
                account_key: pcx.source.clone(),
                vpc_id: peer.vpc_id,
                vpc_name: pcx.source_vpc.clone(),
            },
        ],
    };
    outcome.outputs.push(ctx.record(account_key, &network.region, &output)?);
    outcome.report.succeeded(Subsystem::Peering);
    info!(
        account = %account_key,
        network = %network.name,
        peer_account = %pcx.source,
        peer_network = %pcx.source_vpc,
        "Peering connection created"
    );
    outcome.graphs.push(graph);
    Ok(outcome)
}

/// Routes to peered subnets, one per enabled definition of the subnet
pub fn create_routes(resolved: &ResolvedNetwork, ctx: &BuildContext<'_>) -> LandingZoneResult<UnitOutcome> {
    let network = &resolved.network;
    let account_key = resolved.account_key.as_str();
    let mut outcome = UnitOutcome::new(NetworkReport::new(account_key, &network.region, &network.name));

    let peering_routes: Vec<(&str, &RouteDestination)> = network
        .route_tables
        .iter()
        .filter(|table| !table.is_default())
        .flat_map(|table| {
            table
                .routes
                .iter()
                .filter(|route| route.target == RouteTarget::Peering)
                .map(move |route| (table.name.as_str(), &route.destination))
        })
        .collect();
    if peering_routes.is_empty() {
        outcome.report.skipped(Subsystem::PeeringRoutes, "no peering routes");
        return Ok(outcome);
    }

    let Some(local) = network_output(ctx, account_key, &network.name) else {
        outcome.report.warn(
            Subsystem::PeeringRoutes,
            format!("network output of '{}' not found, peering routes skipped", network.name),
        );
        outcome.report.skipped(Subsystem::PeeringRoutes, "network output unavailable");
        return Ok(outcome);
    };

    let mut graph = ResourceGraph::new(account_key, &network.region, format!("{}_PeeringRoutes", network.name));
    let mut counters: HashMap<(String, String), usize> = HashMap::new();

    for (table_name, destination) in peering_routes {
        let RouteDestination::Peering(PeeringDestination { account, vpc, subnet }) = destination else {
            outcome.report.warn(
                Subsystem::PeeringRoutes,
                format!("pcx route in '{}' needs a subnet destination", table_name),
            );
            continue;
        };
        let Some(table_id) = local.route_tables.get(table_name) else {
            outcome.report.warn(
                Subsystem::PeeringRoutes,
                format!("route table '{}' not found in network output", table_name),
            );
            continue;
        };
        let Some(connection) = ctx.bus.find_latest(&OutputFilter::new(), |output: &PeeringOutput| {
            output.connects(account_key, &network.name) && output.connects(account, vpc)
        }) else {
            outcome.report.warn(
                Subsystem::PeeringRoutes,
                format!("no peering connection between '{}' and '{}'", network.name, vpc),
            );
            continue;
        };
        let Some(target) = network_output(ctx, account, vpc) else {
            outcome.report.warn(
                Subsystem::PeeringRoutes,
                format!("network output of '{}' in account '{}' not found", vpc, account),
            );
            continue;
        };

        let mut matched = false;
        for peer_subnet in target.subnets_named(subnet) {
            matched = true;
            let counter = counters
                .entry((table_name.to_string(), vpc.clone()))
                .or_insert(0);
            let id = naming::peering_route(table_name, vpc, *counter);
            *counter += 1;
            graph.add(
                with_destination(Resource::new(id, ResourceKind::Route), &peer_subnet.cidr_block)
                    .property("routeTableId", table_id.as_str())
                    .property("vpcPeeringConnectionId", connection.pcx_id.as_str()),
            )?;
        }
        if !matched {
            outcome.report.warn(
                Subsystem::PeeringRoutes,
                format!("subnet '{}' not found in network '{}'", subnet, vpc),
            );
        }
    }

    if graph.is_empty() {
        outcome.report.skipped(Subsystem::PeeringRoutes, "no routes resolved");
    } else {
        outcome.report.succeeded(Subsystem::PeeringRoutes);
        outcome.graphs.push(graph);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LandingZoneConfig;
    use crate::limiter::Limiter;
    use crate::output_bus::OutputBus;
    use crate::phase::Phase;
    use crate::resolve::resolve;
    use crate::topology::tests_support::{at, directory};
    use crate::topology::{build, BuildContext};
    use serde_json::json;

    fn config() -> LandingZoneConfig {
        serde_json::from_value(json!({
            "accounts": [{
                "key": "shared-network",
                "vpc": [{
                    "name": "Central",
                    "region": "ca-central-1",
                    "deploy": "local",
                    "cidr": "10.1.0.0/16",
                    "route-tables": [{"name": "Central_Shared", "routes": [
                        {"destination": {"account": "perimeter", "vpc": "Perimeter", "subnet": "Public"}, "target": "pcx"}
                    ]}],
                    "subnets": [{"name": "App", "definitions": [
                        {"az": "a", "cidr": "10.1.0.0/24", "route-table": "Central_Shared"}
                    ]}],
                    "pcx": {"source": "perimeter", "source-vpc": "Perimeter",
                        "source-subnets": "Public", "local-subnets": "App"}
                }]
            }, {
                "key": "perimeter",
                "vpc": [{
                    "name": "Perimeter",
                    "region": "ca-central-1",
                    "deploy": "local",
                    "cidr": "100.96.250.0/23",
                    "subnets": [{"name": "Public", "definitions": [
                        {"az": "a", "cidr": "100.96.250.0/26", "route-table": "default"},
                        {"az": "b", "cidr": "100.96.250.64/26", "route-table": "default"},
                        {"az": "d", "cidr": "100.96.250.128/26", "route-table": "default", "disabled": true}
                    ]}]
                }]
            }]
        }))
        .unwrap()
    }

    fn context<'a>(
        limiter: &'a Limiter,
        bus: &'a OutputBus,
        accounts: &'a crate::domain::AccountDirectory,
        resolved: &'a [ResolvedNetwork],
        phase: Phase,
    ) -> BuildContext<'a> {
        BuildContext {
            limiter,
            bus,
            accounts,
            resolved,
            phase,
            recorded_at: at(),
        }
    }

    #[test]
    fn test_connection_and_routes() {
        let config = config();
        let accounts = directory();
        let resolved = resolve(&config, &accounts);
        let limiter = Limiter::unbounded();
        let bus = OutputBus::new();

        let networks = context(&limiter, &bus, &accounts, &resolved, Phase::Networks);
        for unit in &resolved {
            bus.append_all(build(unit, &networks).unwrap().outputs);
        }

        let cross = context(&limiter, &bus, &accounts, &resolved, Phase::CrossAccount);
        let connection = create_connection(&resolved[0], &cross).unwrap();
        let pcx = connection.graphs[0].get("Central-Perimeter_pcx").unwrap();
        assert_eq!(pcx.properties["peerOwnerId"], "444444444444");
        assert_eq!(pcx.properties["peerVpcId"], "perimeter/ca-central-1/Perimeter/Perimeter");
        bus.append_all(connection.outputs);

        let routes_phase = context(&limiter, &bus, &accounts, &resolved, Phase::PeeringRoutes);
        let routes = create_routes(&resolved[0], &routes_phase).unwrap();
        let graph = &routes.graphs[0];
        assert_eq!(graph.count(ResourceKind::Route), 2);
        let second = graph.get("Central_Shared_pcx_Perimeter_1").unwrap();
        assert_eq!(second.properties["destinationCidrBlock"], "100.96.250.64/26");
        assert_eq!(
            second.properties["vpcPeeringConnectionId"],
            "shared-network/ca-central-1/Central/Central-Perimeter_pcx"
        );
    }

    #[test]
    fn test_connection_waits_for_both_networks() {
        let config = config();
        let accounts = directory();
        let resolved = resolve(&config, &accounts);
        let limiter = Limiter::unbounded();
        let bus = OutputBus::new();

        let networks = context(&limiter, &bus, &accounts, &resolved, Phase::Networks);
        bus.append_all(build(&resolved[0], &networks).unwrap().outputs);

        let cross = context(&limiter, &bus, &accounts, &resolved, Phase::CrossAccount);
        let outcome = create_connection(&resolved[0], &cross).unwrap();
        assert!(outcome.graphs.is_empty());
        assert!(outcome.outputs.is_empty());
        assert_eq!(outcome.report.warnings_for(Subsystem::Peering).count(), 1);
    }
}
