// Copyright (c) 2025 - Cowboy AI, Inc.
//! Phase Runner Integration Tests
//!
//! Runs the reference landing zone through every phase against one output
//! bus, flushing to an in-memory store between phases the way `lz-phase`
//! does, and checks what each phase can see of the ones before it.

mod fixtures;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

use cim_landing_zone::domain::ResourceKind;
use cim_landing_zone::limiter::QuotaKind;
use cim_landing_zone::output_bus::{
    AttachmentOutput, InMemoryOutputStore, NetworkOutput, OutputBus, OutputFilter, OutputStore,
    PeeringOutput, SecurityGroupIndexOutput, SharedResourceTagRequest, SharedResourceType,
    TransitRouterOutput,
};
use cim_landing_zone::phase::{run_phase, Phase, PhaseContext, PhaseReport};
use cim_landing_zone::state_machine::sharing_lifecycle::SharingState;
use cim_landing_zone::tagging::{apply_shared_resource_tags, TagApplier};
use cim_landing_zone::topology::report::{Subsystem, SubsystemStatus};
use cim_landing_zone::topology::transit_gateway::DEFERRED_ATTACHMENT_SCOPE;
use cim_landing_zone::{LandingZoneResult, Limiter, ResourceGraph};

use fixtures::*;

fn context(limiter: Limiter) -> PhaseContext {
    PhaseContext::new(landing_zone(), accounts(), limiter, fixed_timestamp())
}

async fn run_through(ctx: &PhaseContext, last: Phase) -> (Arc<OutputBus>, InMemoryOutputStore, Vec<PhaseReport>) {
    let store = InMemoryOutputStore::new();
    let bus = Arc::new(OutputBus::new());
    let mut reports = Vec::new();
    for phase in Phase::ALL.into_iter().filter(|p| *p <= last) {
        let report = run_phase(phase, ctx, Arc::clone(&bus)).await.unwrap();
        bus.flush(&store).await.unwrap();
        reports.push(report);
    }
    (bus, store, reports)
}

fn graph<'a>(report: &'a PhaseReport, account: &str, scope: &str) -> &'a ResourceGraph {
    report
        .graphs
        .iter()
        .find(|g| g.account_key() == account && g.scope() == scope)
        .unwrap_or_else(|| panic!("no graph {account}/{scope}"))
}

#[tokio::test]
async fn test_transit_routers_phase_records_router() {
    let ctx = context(Limiter::unbounded());
    let (bus, _, reports) = run_through(&ctx, Phase::TransitRouters).await;

    let router: TransitRouterOutput = bus
        .find_latest(&OutputFilter::new().account("shared-network"), |_: &TransitRouterOutput| true)
        .unwrap();
    assert_eq!(router.tgw_id, "shared-network/ca-central-1/Main/Main");
    assert_eq!(router.route_tables.len(), 4);
    assert_eq!(
        router.route_tables["shared"],
        "shared-network/ca-central-1/Main/Main_shared"
    );
    assert_eq!(graph(&reports[0], "shared-network", "Main").count(ResourceKind::TransitGatewayRouteTable), 4);
    assert!(!reports[0].has_failures());
}

#[tokio::test]
async fn test_networks_phase_attaches_same_and_cross_account() {
    let ctx = context(Limiter::unbounded());
    let (bus, _, reports) = run_through(&ctx, Phase::Networks).await;
    let networks = &reports[1];
    assert!(!networks.has_failures());
    assert_eq!(networks.reports.len(), 3);

    // Same-account attachment: associations and propagations in the network graph
    let central = graph(networks, "shared-network", "Central");
    assert!(central.contains("Central_Main_att"));
    assert_eq!(central.count(ResourceKind::TransitGatewayRouteTableAssociation), 1);
    assert_eq!(central.count(ResourceKind::TransitGatewayRouteTablePropagation), 2);
    let route = central.get("Central_Shared_TGW").unwrap();
    assert_eq!(route.properties["transitGatewayId"], "shared-network/ca-central-1/Main/Main");

    // Cross-account attachment: deferred to the router owner
    let dev = graph(networks, "dev", "Dev");
    assert!(dev.contains("Dev_Main_att"));
    assert_eq!(dev.count(ResourceKind::TransitGatewayRouteTableAssociation), 0);
    let deferred: Vec<AttachmentOutput> = bus.find_typed(&OutputFilter::new().account("shared-network"));
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].account_key, "dev");
    assert_eq!(deferred[0].tgw_route_associates, vec!["shared-network/ca-central-1/Main/Main_standalone"]);
    assert!(deferred[0].blackhole);

    let outputs: Vec<NetworkOutput> = bus.find_typed(&OutputFilter::new());
    let names: Vec<_> = outputs.iter().map(|o| o.vpc_name.as_str()).collect();
    assert_eq!(names, vec!["Perimeter", "Central", "Dev"]);
    assert_eq!(outputs[1].subnets.len(), 4);
}

#[tokio::test]
async fn test_phase_does_not_see_its_own_records() {
    let ctx = context(Limiter::unbounded());
    let bus = Arc::new(OutputBus::new());

    // Networks before the routers: nothing to attach to
    let report = run_phase(Phase::Networks, &ctx, Arc::clone(&bus)).await.unwrap();
    let central = report.report_for("shared-network", "Central").unwrap();
    assert!(matches!(
        central.status(Subsystem::TransitAttachment),
        Some(SubsystemStatus::Skipped(_))
    ));
    assert!(report.graphs.iter().all(|g| g.count(ResourceKind::TransitGatewayAttachment) == 0));
    assert_eq!(report.recorded, bus.len());
}

#[tokio::test]
async fn test_cross_account_phase() {
    let ctx = context(Limiter::unbounded());
    let (bus, _, reports) = run_through(&ctx, Phase::CrossAccount).await;
    let cross = &reports[2];
    assert!(!cross.has_failures());

    let deferred = graph(cross, "shared-network", DEFERRED_ATTACHMENT_SCOPE);
    assert_eq!(deferred.count(ResourceKind::TransitGatewayRouteTableAssociation), 1);
    assert_eq!(deferred.count(ResourceKind::TransitGatewayBlackholeRoute), 1);
    assert_eq!(deferred.count(ResourceKind::TransitGatewayRouteTablePropagation), 1);
    let blackhole = deferred.of_kind(ResourceKind::TransitGatewayBlackholeRoute).next().unwrap();
    assert_eq!(blackhole.properties["destinationCidrBlock"], "10.3.0.0/16");

    let pcx: PeeringOutput = bus
        .find_latest(&OutputFilter::new(), |_: &PeeringOutput| true)
        .unwrap();
    assert!(pcx.connects("shared-network", "Central"));
    assert!(pcx.connects("perimeter", "Perimeter"));

    // Central's security groups copied to both consumers, owner excluded
    for consumer in ["dev", "dev2"] {
        let copy = graph(cross, consumer, "Central_SecurityGroups1");
        assert!(copy.contains("Web_sg"));
        assert_eq!(copy.get("Web_sg").unwrap().properties["vpcId"], "shared-network/ca-central-1/Central/Central");
        let index: Vec<SecurityGroupIndexOutput> = bus.find_typed(&OutputFilter::new().account(consumer));
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].index, 1);
    }
    assert!(cross
        .graphs
        .iter()
        .all(|g| !(g.account_key() == "shared-network" && g.scope().starts_with("Central_SecurityGroups"))));
}

#[tokio::test]
async fn test_security_group_index_is_stable_across_runs() {
    let ctx = context(Limiter::unbounded());
    let (bus, _, _) = run_through(&ctx, Phase::CrossAccount).await;

    let again = run_phase(Phase::CrossAccount, &ctx, Arc::clone(&bus)).await.unwrap();
    assert!(again
        .graphs
        .iter()
        .any(|g| g.account_key() == "dev" && g.scope() == "Central_SecurityGroups1"));
    let index: Vec<SecurityGroupIndexOutput> = bus.find_typed(&OutputFilter::new().account("dev"));
    assert!(index.iter().all(|i| i.index == 1));
}

#[tokio::test]
async fn test_peering_routes_phase() {
    let ctx = context(Limiter::unbounded());
    let (_, _, reports) = run_through(&ctx, Phase::PeeringRoutes).await;
    let routes = graph(&reports[3], "shared-network", "Central_PeeringRoutes");

    assert_eq!(routes.count(ResourceKind::Route), 2);
    let first = routes.get("Central_Shared_pcx_Perimeter_0").unwrap();
    assert_eq!(first.properties["destinationCidrBlock"], "100.96.250.0/26");
    assert_eq!(
        first.properties["routeTableId"],
        "shared-network/ca-central-1/Central/Central_Shared"
    );
}

#[tokio::test]
async fn test_vpc_quota_refuses_admission() {
    let ctx = context(Limiter::new(vec![ceiling("dev", QuotaKind::VpcPerRegion, 0)]));
    let (bus, _, reports) = run_through(&ctx, Phase::Networks).await;
    let networks = &reports[1];

    let dev = networks.report_for("dev", "Dev").unwrap();
    assert!(matches!(dev.status(Subsystem::Admission), Some(SubsystemStatus::Skipped(_))));
    assert!(networks.graphs.iter().all(|g| g.account_key() != "dev"));
    assert!(!networks.has_failures());
    assert!(bus.find(&OutputFilter::new().account("dev")).is_empty());
}

#[tokio::test]
async fn test_configuration_error_does_not_abort_siblings() {
    let mut document = landing_zone_document();
    document["organizational-units"][1]["vpc"][0]["subnets"][0]["definitions"][0]["route-table"] =
        serde_json::json!("Missing_Shared");
    let config = serde_json::from_value(document).unwrap();
    let ctx = PhaseContext::new(config, accounts(), Limiter::unbounded(), fixed_timestamp());

    let (bus, store, reports) = run_through(&ctx, Phase::Networks).await;
    let networks = &reports[1];
    assert!(networks.has_configuration_errors());
    assert_eq!(networks.failures.len(), 1);
    assert_eq!(networks.failures[0].network, "Dev");
    assert!(networks.failures[0].message.contains("Missing_Shared"));

    let outputs: Vec<NetworkOutput> = bus.find_typed(&OutputFilter::new());
    assert_eq!(outputs.len(), 2);
    assert_eq!(store.load_all().await.unwrap().len(), bus.len());
}

#[tokio::test]
async fn test_opt_in_network_built_only_where_requested() {
    let mut document = landing_zone_document();
    document["accounts"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({"key": "dev2", "opt-in-vpcs": ["Sandbox"]}));
    document["organizational-units"][1]["vpc"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({
            "name": "Sandbox",
            "region": REGION,
            "deploy": "local",
            "opt-in": true,
            "cidr": "10.9.0.0/16",
            "route-tables": [{"name": "default"}],
            "subnets": [{"name": "Web", "definitions": [
                {"az": "a", "cidr": "10.9.0.0/24", "route-table": "default"}
            ]}]
        }));
    let config = serde_json::from_value(document).unwrap();
    let ctx = PhaseContext::new(config, accounts(), Limiter::unbounded(), fixed_timestamp());

    let (bus, _, reports) = run_through(&ctx, Phase::Networks).await;
    let networks = &reports[1];
    assert!(!networks.has_failures());
    assert!(networks.report_for("dev", "Sandbox").is_none());
    assert!(networks.report_for("dev2", "Sandbox").is_some());

    let sandboxes: Vec<String> = bus
        .find(&OutputFilter::of_type(cim_landing_zone::OutputType::Network))
        .into_iter()
        .filter(|r| r.value["vpcName"] == "Sandbox")
        .map(|r| r.account_key)
        .collect();
    assert_eq!(sandboxes, vec!["dev2".to_string()]);
}

struct RecordingApplier {
    applied: Mutex<Vec<(String, SharedResourceType)>>,
}

#[async_trait]
impl TagApplier for RecordingApplier {
    async fn apply(&self, _account_id: &str, request: &SharedResourceTagRequest) -> LandingZoneResult<()> {
        self.applied
            .lock()
            .unwrap()
            .push((request.resource_id.clone(), request.resource_type));
        Ok(())
    }
}

#[tokio::test]
async fn test_deferred_tags_after_cross_account_phase() {
    let ctx = context(Limiter::unbounded());
    let (bus, _, _) = run_through(&ctx, Phase::CrossAccount).await;
    let applier = RecordingApplier {
        applied: Mutex::new(Vec::new()),
    };

    let summary = apply_shared_resource_tags(&bus, DEV2_ID, &applier, fixed_timestamp()).await;
    // Central: two Web subnets and the network; Dev: two App subnets and the network
    assert_eq!(summary.applied(), 6);
    assert_eq!(summary.failed(), 0);
    assert!(summary.outcomes.iter().all(|o| o.state == SharingState::TagsApplied));

    let summary = apply_shared_resource_tags(&bus, SHARED_NETWORK_ID, &applier, fixed_timestamp()).await;
    let types: Vec<SharedResourceType> = summary.outcomes.iter().map(|o| o.resource_type).collect();
    assert_eq!(
        types.iter().filter(|t| **t == SharedResourceType::TgwAttachment).count(),
        2
    );
    assert_eq!(
        types.iter().filter(|t| **t == SharedResourceType::SecurityGroup).count(),
        2
    );
}

#[tokio::test]
async fn test_reload_from_store_resumes_later_phase() {
    let ctx = context(Limiter::unbounded());
    let (_, store, _) = run_through(&ctx, Phase::CrossAccount).await;

    // A separate invocation of the last phase hydrates from the store
    let bus = Arc::new(OutputBus::load(&store).await.unwrap());
    let report = run_phase(Phase::PeeringRoutes, &ctx, Arc::clone(&bus)).await.unwrap();
    assert_eq!(report.graphs.len(), 1);
    assert_eq!(report.recorded, 0);
    assert!(bus.pending().is_empty());
}
