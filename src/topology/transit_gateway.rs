// Copyright (c) 2025 - Cowboy AI, Inc.
//! Transit Router, Attachments and Routes
//!
//! ```text
//! phase 0  router owner      create_transit_router ──► TransitRouterOutput
//! phase 1  network account   attach ──► attachment
//!                              ├─ same account:  associations, propagations, blackholes
//!                              └─ other account: AttachmentOutput (under router owner)
//!                            TGW routes (depend on the attachment)
//! phase 2  router owner      apply_deferred_attachments ◄── AttachmentOutput
//! ```
//!
//! A network attaching to a router that has no recorded output is skipped
//! with a warning, together with every route that targets the router.

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use super::graph::{reference, LogicalId, Resource, ResourceGraph};
use super::report::{NetworkReport, Subsystem};
use super::{naming, references, with_destination, BuildContext, NetworkBuilder, UnitOutcome};
use crate::domain::{Cidr, ResourceKind, TransitRouterConfig};
use crate::errors::LandingZoneResult;
use crate::output_bus::{
    AttachmentOutput, OutputFilter, SharedResourceTagRequest, SharedResourceTags,
    SharedResourceType, Tag, TransitRouterOutput,
};

/// Graph scope of the deferred association resources
pub const DEFERRED_ATTACHMENT_SCOPE: &str = "tgw-attachments";

/// Create a transit router and its route tables in the owning account
pub fn create_transit_router(
    owner: &str,
    config: &TransitRouterConfig,
    ctx: &BuildContext<'_>,
) -> LandingZoneResult<UnitOutcome> {
    let mut outcome = UnitOutcome::new(NetworkReport::new(owner, &config.region, &config.name));
    let mut graph = ResourceGraph::new(owner, &config.region, &config.name);

    let router = LogicalId::new(config.name.clone());
    let mut resource = Resource::new(router.clone(), ResourceKind::TransitGateway)
        .property("autoAcceptSharedAttachments", "enable")
        .property("defaultRouteTableAssociation", "disable")
        .property("defaultRouteTablePropagation", "disable")
        .property("dnsSupport", "enable")
        .property("vpnEcmpSupport", "enable")
        .tag("Name", format!("{}_tgw", config.name));
    if let Some(asn) = config.asn {
        resource = resource.property("amazonSideAsn", asn);
    }
    let router_ref = graph.add(resource)?;

    let mut route_tables = std::collections::BTreeMap::new();
    for name in &config.route_tables {
        let id = LogicalId::new(naming::transit_route_table(&config.name, name));
        let table = graph.add(
            Resource::new(id, ResourceKind::TransitGatewayRouteTable)
                .property("transitGatewayId", reference(&router))
                .depends_on(&router)
                .tag("Name", format!("{}_{}_rt", config.name, name)),
        )?;
        route_tables.insert(name.clone(), table.token());
    }

    let output = TransitRouterOutput {
        name: config.name.clone(),
        tgw_id: router_ref.token(),
        route_tables,
    };
    outcome.outputs.push(ctx.record(owner, &config.region, &output)?);
    outcome.report.succeeded(Subsystem::TransitRouter);
    info!(
        account = %owner,
        region = %config.region,
        tgw = %config.name,
        route_tables = config.route_tables.len(),
        "Transit router created"
    );
    outcome.graphs.push(graph);
    Ok(outcome)
}

/// Deterministic index of an attachment record
///
/// A record already written for the same (cidr, vpc), or failing that the
/// same cidr, keeps its index; otherwise a name-based UUID of
/// `owner/region/cidr/vpc` is used.
pub fn construct_index(
    existing: &[AttachmentOutput],
    owner: &str,
    region: &str,
    cidr: &Cidr,
    vpc: &str,
) -> String {
    existing
        .iter()
        .rev()
        .find(|a| a.cidr == *cidr && a.vpc == vpc)
        .or_else(|| existing.iter().rev().find(|a| a.cidr == *cidr))
        .map(|a| a.construct_index.clone())
        .unwrap_or_else(|| {
            let name = format!("{}/{}/{}/{}", owner, region, cidr, vpc);
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
        })
}

/// Attach the network to its transit router and create its TGW routes
pub(crate) fn attach(builder: &mut NetworkBuilder<'_>) -> LandingZoneResult<()> {
    let network = builder.network;
    let ctx = builder.ctx;

    let Some(config) = &network.tgw_attach else {
        skip_pending_routes(builder, "the network has no transit attachment");
        builder.report.skipped(Subsystem::TransitAttachment, "not configured");
        return Ok(());
    };

    let Some(router) = ctx.bus.find_latest(
        &OutputFilter::new().account(&config.account).region(&network.region),
        |output: &TransitRouterOutput| output.name == config.associate_to_tgw,
    ) else {
        builder.report.warn(
            Subsystem::TransitAttachment,
            format!(
                "transit router '{}' of account '{}' not found in outputs, attachment skipped",
                config.associate_to_tgw, config.account
            ),
        );
        skip_pending_routes(builder, "the transit attachment was skipped");
        builder.report.skipped(Subsystem::TransitAttachment, "transit router unavailable");
        return Ok(());
    };

    let subnets: Vec<LogicalId> = config
        .attach_subnets
        .iter()
        .flat_map(|name| builder.registry.by_name(name))
        .map(|record| record.identity.logical_id.clone())
        .collect();
    if subnets.is_empty() {
        builder.report.warn(
            Subsystem::TransitAttachment,
            "no enabled attach subnets, attachment skipped",
        );
        skip_pending_routes(builder, "the transit attachment was skipped");
        builder.report.skipped(Subsystem::TransitAttachment, "no attach subnets");
        return Ok(());
    }

    let attachment = LogicalId::new(naming::transit_attachment(&network.name, &config.associate_to_tgw));
    let mut resource = Resource::new(attachment.clone(), ResourceKind::TransitGatewayAttachment)
        .property("transitGatewayId", router.tgw_id.as_str())
        .property("vpcId", reference(&builder.vpc))
        .property("subnetIds", references(&subnets))
        .depends_on(&builder.vpc)
        .tag("Name", format!("{}_{}_att", network.name, config.associate_to_tgw));
    for subnet in &subnets {
        resource = resource.depends_on(subnet);
    }
    let attachment_ref = builder.graph.add(resource)?;
    builder.transit_attachment = Some((config.associate_to_tgw.clone(), attachment.clone()));

    let associates = route_table_ids(&router, &config.tgw_rt_associate, &mut builder.report);
    let propagates = route_table_ids(&router, &config.tgw_rt_propagate, &mut builder.report);

    if config.account == builder.account_key() {
        for (name, table) in &associates {
            builder.graph.add(
                Resource::new(
                    naming::transit_association(attachment.as_str(), name),
                    ResourceKind::TransitGatewayRouteTableAssociation,
                )
                .property("transitGatewayAttachmentId", reference(&attachment))
                .property("transitGatewayRouteTableId", table.as_str())
                .depends_on(&attachment),
            )?;
        }
        for (name, table) in &propagates {
            builder.graph.add(
                Resource::new(
                    naming::transit_propagation(attachment.as_str(), name),
                    ResourceKind::TransitGatewayRouteTablePropagation,
                )
                .property("transitGatewayAttachmentId", reference(&attachment))
                .property("transitGatewayRouteTableId", table.as_str())
                .depends_on(&attachment),
            )?;
        }
        if config.blackhole_route {
            for (name, table) in &associates {
                builder.graph.add(
                    Resource::new(
                        naming::transit_blackhole(attachment.as_str(), name),
                        ResourceKind::TransitGatewayBlackholeRoute,
                    )
                    .property("transitGatewayRouteTableId", table.as_str())
                    .property("destinationCidrBlock", network.cidr.to_string())
                    .property("blackhole", true)
                    .depends_on(&attachment),
                )?;
            }
        }
    } else {
        let existing: Vec<AttachmentOutput> = ctx
            .bus
            .find_typed(&OutputFilter::new().account(&config.account).region(&network.region));
        let output = AttachmentOutput {
            account_key: builder.account_key().to_string(),
            region: network.region.clone(),
            tgw_attachment_id: attachment_ref.token(),
            tgw_route_associates: associates.iter().map(|(_, id)| id.clone()).collect(),
            tgw_route_propagates: propagates.iter().map(|(_, id)| id.clone()).collect(),
            blackhole: config.blackhole_route,
            cidr: network.cidr,
            vpc: network.name.clone(),
            construct_index: construct_index(
                &existing,
                &config.account,
                &network.region,
                &network.cidr,
                &network.name,
            ),
        };
        let record = ctx.record(&config.account, &network.region, &output)?;
        builder.outputs.push(record);
        debug!(
            account = %builder.account_key(),
            owner = %config.account,
            attachment = %attachment,
            "Attachment deferred to router owner"
        );
    }

    match (ctx.accounts.id_of(&config.account), ctx.accounts.id_of(builder.account_key())) {
        (Some(owner_id), Some(own_id)) => {
            let request = SharedResourceTagRequest {
                resource_id: attachment_ref.token(),
                resource_type: SharedResourceType::TgwAttachment,
                source_account_id: Some(own_id.to_string()),
                target_account_ids: vec![owner_id.to_string()],
                tags: vec![Tag {
                    key: "Name".to_string(),
                    value: format!("{}_{}_att", network.name, config.associate_to_tgw),
                }],
                region: network.region.clone(),
            };
            let record = ctx.record(builder.account_key(), &network.region, &SharedResourceTags(vec![request]))?;
            builder.outputs.push(record);
        }
        _ => builder.report.warn(
            Subsystem::TransitAttachment,
            format!("account id of '{}' unknown, attachment tags not requested", config.account),
        ),
    }

    let pending = std::mem::take(&mut builder.pending_transit_routes);
    for (table, destination) in pending {
        builder.graph.add(
            with_destination(
                Resource::new(naming::transit_route(table.as_str(), &destination), ResourceKind::Route),
                &destination,
            )
            .property("routeTableId", reference(&table))
            .property("transitGatewayId", router.tgw_id.as_str())
            .depends_on(&table)
            .depends_on(&attachment),
        )?;
    }

    Ok(())
}

/// (name, identity) of the named router tables; unknown names warn
fn route_table_ids(
    router: &TransitRouterOutput,
    names: &[String],
    report: &mut NetworkReport,
) -> Vec<(String, String)> {
    let mut ids = Vec::new();
    for name in names {
        match router.route_tables.get(name) {
            Some(id) => ids.push((name.clone(), id.clone())),
            None => report.warn(
                Subsystem::TransitAttachment,
                format!("transit route table '{}' not found on '{}'", name, router.name),
            ),
        }
    }
    ids
}

fn skip_pending_routes(builder: &mut NetworkBuilder<'_>, reason: &str) {
    for (table, destination) in std::mem::take(&mut builder.pending_transit_routes) {
        builder.report.warn(
            Subsystem::Routes,
            format!("TGW route {} in '{}' skipped: {}", destination, table, reason),
        );
    }
}

/// Associations, propagations and blackholes for attachments made from
/// other accounts, created in the router owner's account
pub fn apply_deferred_attachments(
    owner: &str,
    region: &str,
    ctx: &BuildContext<'_>,
) -> LandingZoneResult<UnitOutcome> {
    let mut outcome = UnitOutcome::new(NetworkReport::new(owner, region, DEFERRED_ATTACHMENT_SCOPE));
    let records: Vec<AttachmentOutput> = ctx
        .bus
        .find_typed(&OutputFilter::new().account(owner).region(region));

    // Latest record per construct index, first-seen order
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut attachments: Vec<AttachmentOutput> = Vec::new();
    for record in records {
        match positions.get(&record.construct_index) {
            Some(&i) => attachments[i] = record,
            None => {
                positions.insert(record.construct_index.clone(), attachments.len());
                attachments.push(record);
            }
        }
    }

    if attachments.is_empty() {
        outcome
            .report
            .skipped(Subsystem::DeferredAttachments, "no attachment records");
        return Ok(outcome);
    }

    let mut graph = ResourceGraph::new(owner, region, DEFERRED_ATTACHMENT_SCOPE);
    for attachment in &attachments {
        let index = &attachment.construct_index;
        for (i, table) in attachment.tgw_route_associates.iter().enumerate() {
            graph.add(
                Resource::new(format!("TgwAssociation_{}_{}", index, i), ResourceKind::TransitGatewayRouteTableAssociation)
                    .property("transitGatewayAttachmentId", attachment.tgw_attachment_id.as_str())
                    .property("transitGatewayRouteTableId", table.as_str()),
            )?;
            if attachment.blackhole {
                graph.add(
                    Resource::new(format!("TgwBlackhole_{}_{}", index, i), ResourceKind::TransitGatewayBlackholeRoute)
                        .property("transitGatewayRouteTableId", table.as_str())
                        .property("destinationCidrBlock", attachment.cidr.to_string())
                        .property("blackhole", true),
                )?;
            }
        }
        for (i, table) in attachment.tgw_route_propagates.iter().enumerate() {
            graph.add(
                Resource::new(format!("TgwPropagation_{}_{}", index, i), ResourceKind::TransitGatewayRouteTablePropagation)
                    .property("transitGatewayAttachmentId", attachment.tgw_attachment_id.as_str())
                    .property("transitGatewayRouteTableId", table.as_str()),
            )?;
        }
    }

    info!(
        account = %owner,
        region = %region,
        attachments = attachments.len(),
        "Deferred attachments applied"
    );
    outcome.report.succeeded(Subsystem::DeferredAttachments);
    outcome.graphs.push(graph);
    Ok(outcome)
}
