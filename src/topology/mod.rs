// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology Builder
//!
//! Turns one [`ResolvedNetwork`] into an abstract resource graph, in a fixed
//! order:
//!
//! ```text
//!  0. validate          configuration errors abort before anything is emitted
//!  1. address space     network + extension blocks
//!  2. gateways          internet / virtual-private gateway + attachments
//!  3. route tables      every named table except "default"
//!  4. subnets           create, register, associate
//!  5. NAT gateways      one per AZ (or the pinned AZ), index NAT_<subnet>_<AZ>
//!  6. routes            IGW / VGW / NAT / customer; s3+dynamodb collected; TGW deferred
//!  7. endpoints         gateway endpoints on the collected tables, interface endpoints
//!  8. security groups   Security Rule Compiler, then network ACLs
//!  9. sharing           share grants + deferred tag requests
//! 10. transit           attachment, associations or AttachmentOutput, TGW routes
//! 11. NetworkOutput     staged for later phases
//! ```
//!
//! Output records are staged on the [`NetworkHandle`]; the phase runner
//! appends them to the bus only when the build succeeded.

pub mod endpoints;
pub mod graph;
pub mod nacl;
pub mod naming;
pub mod peering;
pub mod report;
pub mod security_group;
pub mod sharing;
pub mod transit_gateway;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::{
    validate_network, AccountDirectory, Cidr, GatewayService, NetworkConfig, ResourceKind,
    RouteDestination, RouteTarget, DEFAULT_ROUTE_TABLE,
};
use crate::errors::{ConfigurationError, LandingZoneError, LandingZoneResult, MissingReference};
use crate::limiter::{Limiter, QuotaKind};
use crate::output_bus::{
    NetworkOutput, OutputBus, OutputRecord, OutputValue, SecurityGroupOutput, SubnetOutput,
};
use crate::phase::Phase;
use crate::registry::{SubnetRecord, SubnetRegistry};
use crate::resolve::ResolvedNetwork;
use crate::state_machine::sharing_lifecycle::SharingState;

use graph::{reference, LogicalId, Resource, ResourceGraph, ResourceRef};
use report::{NetworkReport, Subsystem};
use security_group::RuleScope;

pub use report::{BuildWarning, SubsystemStatus};

/// Shared, read-mostly inputs of every build in a phase
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub limiter: &'a Limiter,
    pub bus: &'a OutputBus,
    pub accounts: &'a AccountDirectory,
    pub resolved: &'a [ResolvedNetwork],
    pub phase: Phase,
    /// Timestamp stamped on every record of the phase
    pub recorded_at: DateTime<Utc>,
}

impl BuildContext<'_> {
    pub fn record<T: OutputValue>(
        &self,
        account_key: &str,
        region: &str,
        value: &T,
    ) -> LandingZoneResult<OutputRecord> {
        OutputRecord::typed(account_key, region, self.phase, self.recorded_at, value)
    }
}

/// Result of one unit of phase work
#[derive(Debug)]
pub struct UnitOutcome {
    pub report: NetworkReport,
    pub graphs: Vec<ResourceGraph>,
    /// Records to append once the unit is known to have succeeded
    pub outputs: Vec<OutputRecord>,
}

impl UnitOutcome {
    pub fn new(report: NetworkReport) -> Self {
        Self {
            report,
            graphs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

/// A build that hit a configuration or graph error
#[derive(Debug, Error)]
#[error("{error}")]
pub struct BuildFailure {
    pub error: LandingZoneError,
    pub report: NetworkReport,
}

impl BuildFailure {
    pub fn is_configuration_error(&self) -> bool {
        matches!(self.error, LandingZoneError::Configuration(_))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GatewayIds {
    pub gateway: LogicalId,
    pub attachment: LogicalId,
}

/// Everything one network build produced
#[derive(Debug)]
pub struct NetworkHandle {
    pub account_key: String,
    pub region: String,
    pub name: String,
    pub vpc: ResourceRef,
    pub graph: ResourceGraph,
    pub registry: SubnetRegistry,
    pub route_tables: BTreeMap<String, ResourceRef>,
    pub nat_gateways: BTreeMap<String, ResourceRef>,
    pub security_groups: Vec<(String, ResourceRef)>,
    /// Transit router name → attachment
    pub transit_attachment: Option<(String, ResourceRef)>,
    /// Subnet group name → sharing state reached
    pub sharing: Vec<(String, SharingState)>,
    pub outputs: Vec<OutputRecord>,
    pub report: NetworkReport,
}

impl NetworkHandle {
    pub fn into_outcome(self) -> UnitOutcome {
        UnitOutcome {
            report: self.report,
            graphs: vec![self.graph],
            outputs: self.outputs,
        }
    }
}

/// Build one network
pub fn build(resolved: &ResolvedNetwork, ctx: &BuildContext<'_>) -> Result<NetworkHandle, BuildFailure> {
    let mut builder = NetworkBuilder::new(resolved, ctx);
    info!(
        account = %resolved.account_key,
        region = %resolved.region(),
        network = %resolved.name(),
        "Building network"
    );

    match builder.run() {
        Ok(()) => Ok(builder.into_handle()),
        Err(error) => {
            let stage = builder.stage;
            builder.report.failed(stage, error.to_string());
            error!(
                account = %resolved.account_key,
                network = %resolved.name(),
                subsystem = %stage,
                error = %error,
                "Network build failed"
            );
            Err(BuildFailure {
                error,
                report: builder.report,
            })
        }
    }
}

pub(crate) struct NetworkBuilder<'a> {
    pub(crate) resolved: &'a ResolvedNetwork,
    pub(crate) network: &'a NetworkConfig,
    pub(crate) ctx: &'a BuildContext<'a>,
    pub(crate) graph: ResourceGraph,
    pub(crate) registry: SubnetRegistry,
    pub(crate) vpc: LogicalId,
    pub(crate) extension_blocks: Vec<(Cidr, LogicalId)>,
    pub(crate) internet_gateway: Option<GatewayIds>,
    pub(crate) vpn_gateway: Option<GatewayIds>,
    pub(crate) route_tables: BTreeMap<String, LogicalId>,
    pub(crate) nat_gateways: BTreeMap<String, LogicalId>,
    /// NAT keys whose creation the limiter refused
    pub(crate) quota_skipped_nats: HashSet<String>,
    pub(crate) endpoint_route_tables: Vec<(GatewayService, Vec<LogicalId>)>,
    /// (route table, destination) of routes waiting for the attachment
    pub(crate) pending_transit_routes: Vec<(LogicalId, Cidr)>,
    pub(crate) security_groups: Vec<(String, ResourceRef)>,
    pub(crate) transit_attachment: Option<(String, LogicalId)>,
    pub(crate) sharing: Vec<(String, SharingState)>,
    pub(crate) outputs: Vec<OutputRecord>,
    pub(crate) report: NetworkReport,
    stage: Subsystem,
}

impl<'a> NetworkBuilder<'a> {
    fn new(resolved: &'a ResolvedNetwork, ctx: &'a BuildContext<'a>) -> Self {
        let network: &'a NetworkConfig = &resolved.network;
        Self {
            resolved,
            network,
            ctx,
            graph: ResourceGraph::new(&resolved.account_key, &network.region, &network.name),
            registry: SubnetRegistry::new(),
            vpc: LogicalId::new(network.name.clone()),
            extension_blocks: Vec::new(),
            internet_gateway: None,
            vpn_gateway: None,
            route_tables: BTreeMap::new(),
            nat_gateways: BTreeMap::new(),
            quota_skipped_nats: HashSet::new(),
            endpoint_route_tables: Vec::new(),
            pending_transit_routes: Vec::new(),
            security_groups: Vec::new(),
            transit_attachment: None,
            sharing: Vec::new(),
            outputs: Vec::new(),
            report: NetworkReport::new(&resolved.account_key, &network.region, &network.name),
            stage: Subsystem::Validation,
        }
    }

    pub(crate) fn account_key(&self) -> &'a str {
        &self.resolved.account_key
    }

    pub(crate) fn region(&self) -> &'a str {
        &self.network.region
    }

    pub(crate) fn config_error(&self, reference: MissingReference) -> LandingZoneError {
        ConfigurationError::new(self.account_key(), &self.network.name, reference).into()
    }

    fn enter(&mut self, subsystem: Subsystem) {
        self.stage = subsystem;
    }

    /// Mark the current stage succeeded unless it already recorded a status
    fn complete(&mut self) {
        if self.report.status(self.stage).is_none() {
            self.report.succeeded(self.stage);
        }
    }

    fn not_configured(&mut self, subsystem: Subsystem) {
        self.report.skipped(subsystem, "not configured");
    }

    fn run(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::Validation);
        validate_network(self.network).map_err(|r| self.config_error(r))?;
        self.complete();

        self.create_address_space()?;
        self.create_gateways()?;
        self.create_route_tables()?;
        self.create_subnets()?;
        self.create_nat_gateways()?;
        self.apply_routes()?;

        self.enter(Subsystem::GatewayEndpoints);
        endpoints::create_gateway_endpoints(self)?;
        self.complete();

        self.enter(Subsystem::InterfaceEndpoints);
        endpoints::create_interface_endpoints(self)?;
        self.complete();

        self.create_security_groups()?;

        self.enter(Subsystem::NetworkAcls);
        nacl::create_network_acls(self)?;
        self.complete();

        self.enter(Subsystem::Sharing);
        sharing::share_subnets(self)?;
        self.complete();

        self.enter(Subsystem::TransitAttachment);
        transit_gateway::attach(self)?;
        self.complete();

        self.stage_network_output()
    }

    fn create_address_space(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::AddressSpace);
        let network = self.network;

        self.graph.add(
            Resource::new(self.vpc.clone(), ResourceKind::Vpc)
                .property("cidrBlock", network.cidr.to_string())
                .property("enableDnsHostnames", true)
                .property("enableDnsSupport", true)
                .tag("Name", format!("{}_vpc", network.name)),
        )?;

        for (index, cidr) in network.extension_cidrs.iter().enumerate() {
            let id = LogicalId::new(naming::extension_block(index));
            let block_key = if cidr.is_ipv6() { "ipv6CidrBlock" } else { "cidrBlock" };
            self.graph.add(
                Resource::new(id.clone(), ResourceKind::VpcCidrBlock)
                    .property("vpcId", reference(&self.vpc))
                    .property(block_key, cidr.to_string())
                    .depends_on(&self.vpc),
            )?;
            self.extension_blocks.push((*cidr, id));
        }

        self.complete();
        Ok(())
    }

    fn create_gateways(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::Gateways);
        let network = self.network;
        if !network.igw && network.vgw.is_none() {
            self.not_configured(Subsystem::Gateways);
            return Ok(());
        }

        if network.igw {
            let gateway = LogicalId::new(naming::internet_gateway(&network.name));
            let attachment = LogicalId::new(naming::internet_gateway_attachment(&network.name));
            self.graph.add(
                Resource::new(gateway.clone(), ResourceKind::InternetGateway)
                    .tag("Name", gateway.as_str()),
            )?;
            self.graph.add(
                Resource::new(attachment.clone(), ResourceKind::GatewayAttachment)
                    .property("vpcId", reference(&self.vpc))
                    .property("internetGatewayId", reference(&gateway))
                    .depends_on(&self.vpc)
                    .depends_on(&gateway),
            )?;
            self.internet_gateway = Some(GatewayIds {
                gateway,
                attachment,
            });
        }

        if let Some(vgw) = &network.vgw {
            let gateway = LogicalId::new(naming::vpn_gateway(&network.name));
            let attachment = LogicalId::new(naming::vpn_gateway_attachment(&network.name));
            let mut resource = Resource::new(gateway.clone(), ResourceKind::VpnGateway)
                .property("type", "ipsec.1")
                .tag("Name", gateway.as_str());
            if let Some(asn) = vgw.asn {
                resource = resource.property("amazonSideAsn", asn);
            }
            self.graph.add(resource)?;
            self.graph.add(
                Resource::new(attachment.clone(), ResourceKind::GatewayAttachment)
                    .property("vpcId", reference(&self.vpc))
                    .property("vpnGatewayId", reference(&gateway))
                    .depends_on(&self.vpc)
                    .depends_on(&gateway),
            )?;
            self.vpn_gateway = Some(GatewayIds {
                gateway,
                attachment,
            });
        }

        self.complete();
        Ok(())
    }

    fn create_route_tables(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::RouteTables);
        for table in &self.network.route_tables {
            if table.is_default() {
                debug!(network = %self.network.name, "Default route table is implicit");
                continue;
            }
            let id = LogicalId::new(table.name.clone());
            self.graph.add(
                Resource::new(id.clone(), ResourceKind::RouteTable)
                    .property("vpcId", reference(&self.vpc))
                    .depends_on(&self.vpc)
                    .tag("Name", table.name.as_str()),
            )?;
            self.route_tables.insert(table.name.clone(), id);
        }
        self.complete();
        Ok(())
    }

    fn create_subnets(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::Subnets);
        let network = self.network;

        for group in &network.subnets {
            for definition in &group.definitions {
                if definition.disabled {
                    debug!(subnet = %group.name, az = %definition.az, "Skipping disabled subnet");
                    continue;
                }

                let id = LogicalId::new(naming::subnet(&group.name, &network.name, &definition.az));
                let block_key = if definition.cidr.is_ipv6() { "ipv6CidrBlock" } else { "cidrBlock" };
                let mut resource = Resource::new(id.clone(), ResourceKind::Subnet)
                    .property("vpcId", reference(&self.vpc))
                    .property(block_key, definition.cidr.to_string())
                    .property(
                        "availabilityZone",
                        naming::availability_zone(&network.region, &definition.az),
                    )
                    .depends_on(&self.vpc)
                    .tag("Name", format!("{}_az{}_net", group.name, definition.az));
                if let Some((_, block)) = self
                    .extension_blocks
                    .iter()
                    .find(|(cidr, _)| cidr.contains(&definition.cidr))
                {
                    resource = resource.depends_on(block);
                }
                let identity = self.graph.add(resource)?;

                let registered = self
                    .registry
                    .register(SubnetRecord {
                        subnet_name: group.name.clone(),
                        az: definition.az.clone(),
                        identity,
                        cidr: definition.cidr,
                    })
                    .map(|_| ());
                registered.map_err(|r| self.config_error(r))?;

                if definition.route_table == DEFAULT_ROUTE_TABLE {
                    continue;
                }
                let table = self
                    .route_tables
                    .get(&definition.route_table)
                    .cloned()
                    .ok_or_else(|| {
                        self.config_error(MissingReference::RouteTable(definition.route_table.clone()))
                    })?;
                self.graph.add(
                    Resource::new(naming::subnet_association(id.as_str()), ResourceKind::SubnetRouteTableAssociation)
                        .property("subnetId", reference(&id))
                        .property("routeTableId", reference(&table))
                        .depends_on(&id)
                        .depends_on(&table),
                )?;
            }
        }

        self.complete();
        Ok(())
    }

    fn create_nat_gateways(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::NatGateways);
        let network = self.network;
        let Some(nat) = &network.natgw else {
            self.not_configured(Subsystem::NatGateways);
            return Ok(());
        };

        let subnets: Vec<SubnetRecord> = match &nat.subnet.az {
            Some(az) => self
                .registry
                .by_name(&nat.subnet.name)
                .filter(|record| record.az.eq_ignore_ascii_case(az))
                .cloned()
                .collect(),
            None => self.registry.by_name(&nat.subnet.name).cloned().collect(),
        };
        if subnets.is_empty() {
            self.report.warn(
                Subsystem::NatGateways,
                format!("NAT subnet '{}' has no enabled definitions", nat.subnet.name),
            );
            self.report.skipped(Subsystem::NatGateways, "no NAT subnets");
            return Ok(());
        }

        for subnet in subnets {
            let key = naming::nat_key(&subnet.subnet_name, &subnet.az);
            if !self.ctx.limiter.try_reserve(
                self.account_key(),
                QuotaKind::Ec2Eips,
                Some(self.region()),
                None,
            ) {
                self.report.warn(
                    Subsystem::NatGateways,
                    format!("Elastic IP quota reached, NAT gateway {} not created", key),
                );
                self.quota_skipped_nats.insert(key);
                continue;
            }

            let eip = LogicalId::new(naming::elastic_ip(&subnet.az));
            self.graph.add(
                Resource::new(eip.clone(), ResourceKind::ElasticIp).property("domain", "vpc"),
            )?;

            let id = LogicalId::new(naming::nat_gateway(&subnet.subnet_name, &subnet.az));
            let mut resource = Resource::new(id.clone(), ResourceKind::NatGateway)
                .property("allocationId", json!({ "getAtt": [eip.as_str(), "AllocationId"] }))
                .property("subnetId", reference(&subnet.identity.logical_id))
                .depends_on(&eip)
                .depends_on(&subnet.identity.logical_id)
                .tag("Name", id.as_str());
            if let Some(igw) = &self.internet_gateway {
                resource = resource.depends_on(&igw.attachment);
            }
            self.graph.add(resource)?;
            self.nat_gateways.insert(key, id);
        }

        self.complete();
        Ok(())
    }

    fn apply_routes(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::Routes);
        let network = self.network;

        for table in &network.route_tables {
            if table.is_default() {
                if !table.routes.is_empty() {
                    self.report.warn(
                        Subsystem::Routes,
                        "routes declared on the default route table are ignored",
                    );
                }
                continue;
            }
            let Some(table_id) = self.route_tables.get(&table.name).cloned() else {
                continue;
            };

            for route in &table.routes {
                match &route.target {
                    RouteTarget::GatewayEndpoint(service) => {
                        self.collect_endpoint_table(*service, &table_id);
                        continue;
                    }
                    RouteTarget::Peering => continue,
                    _ => {}
                }

                let RouteDestination::Cidr(destination) = &route.destination else {
                    self.report.warn(
                        Subsystem::Routes,
                        format!("route in '{}' has a peering destination but is not a peering route", table.name),
                    );
                    continue;
                };

                match &route.target {
                    RouteTarget::InternetGateway => {
                        let gateway = self
                            .internet_gateway
                            .clone()
                            .ok_or_else(|| self.config_error(MissingReference::InternetGateway))?;
                        self.add_gateway_route(&table_id, "IGW", destination, "gatewayId", &gateway)?;
                    }
                    RouteTarget::VirtualPrivateGateway => {
                        let gateway = self
                            .vpn_gateway
                            .clone()
                            .ok_or_else(|| self.config_error(MissingReference::VirtualPrivateGateway))?;
                        self.add_gateway_route(&table_id, "VGW", destination, "gatewayId", &gateway)?;
                    }
                    RouteTarget::TransitGateway => {
                        self.pending_transit_routes.push((table_id.clone(), *destination));
                    }
                    RouteTarget::NatGateway { subnet, az } => {
                        let key = naming::nat_key(subnet, az);
                        match self.nat_gateways.get(&key).cloned() {
                            Some(nat) => {
                                self.graph.add(
                                    with_destination(
                                        Resource::new(
                                            naming::nat_route(table_id.as_str(), destination),
                                            ResourceKind::Route,
                                        ),
                                        destination,
                                    )
                                    .property("routeTableId", reference(&table_id))
                                    .property("natGatewayId", reference(&nat))
                                    .depends_on(&table_id)
                                    .depends_on(&nat),
                                )?;
                            }
                            None if self.quota_skipped_nats.contains(&key) => {
                                self.report.warn(
                                    Subsystem::Routes,
                                    format!("route in '{}' skipped: NAT gateway {} was not created", table.name, key),
                                );
                            }
                            None => return Err(self.config_error(MissingReference::NatGateway(key))),
                        }
                    }
                    RouteTarget::Customer { kind, target_id } => match (kind, target_id) {
                        (Some(kind), Some(target_id)) => {
                            self.graph.add(
                                with_destination(
                                    Resource::new(
                                        naming::customer_route(table_id.as_str(), kind, target_id),
                                        ResourceKind::Route,
                                    ),
                                    destination,
                                )
                                .property("routeTableId", reference(&table_id))
                                .property(kind.as_str(), target_id.as_str())
                                .depends_on(&table_id),
                            )?;
                        }
                        _ => self.report.warn(
                            Subsystem::Routes,
                            format!("customer route in '{}' needs both type and target-id", table.name),
                        ),
                    },
                    RouteTarget::GatewayEndpoint(_) | RouteTarget::Peering => {}
                }
            }
        }

        self.complete();
        Ok(())
    }

    fn collect_endpoint_table(&mut self, service: GatewayService, table: &LogicalId) {
        match self
            .endpoint_route_tables
            .iter_mut()
            .find(|(s, _)| *s == service)
        {
            Some((_, tables)) => {
                if !tables.contains(table) {
                    tables.push(table.clone());
                }
            }
            None => self
                .endpoint_route_tables
                .push((service, vec![table.clone()])),
        }
    }

    fn add_gateway_route(
        &mut self,
        table: &LogicalId,
        target: &str,
        destination: &Cidr,
        gateway_key: &str,
        gateway: &GatewayIds,
    ) -> LandingZoneResult<()> {
        self.graph.add(
            with_destination(
                Resource::new(
                    naming::gateway_route(table.as_str(), target, destination),
                    ResourceKind::Route,
                ),
                destination,
            )
            .property("routeTableId", reference(table))
            .property(gateway_key, reference(&gateway.gateway))
            .depends_on(table)
            .depends_on(&gateway.attachment),
        )?;
        Ok(())
    }

    fn create_security_groups(&mut self) -> LandingZoneResult<()> {
        self.enter(Subsystem::SecurityGroups);
        let network = self.network;
        if network.security_groups.is_empty() {
            self.not_configured(Subsystem::SecurityGroups);
            return Ok(());
        }

        let account_key = self.account_key();
        let scope = RuleScope {
            account_key,
            region: &network.region,
            vpc_name: &network.name,
            description_account: account_key,
            resolved: self.ctx.resolved,
            bus: self.ctx.bus,
        };
        let compiled = security_group::compile(&network.security_groups, &scope, &mut self.report);
        self.security_groups = security_group::emit(
            &compiled,
            reference(&self.vpc),
            Some(&self.vpc),
            &mut self.graph,
        )?;

        self.complete();
        Ok(())
    }

    fn stage_network_output(&mut self) -> LandingZoneResult<()> {
        let network = self.network;
        let token = |id: &LogicalId| self.graph.reference(id).token();

        let output = NetworkOutput {
            vpc_name: network.name.clone(),
            vpc_id: token(&self.vpc),
            cidr_blocks: network.address_blocks().copied().collect(),
            subnets: self
                .registry
                .all()
                .iter()
                .map(|record| SubnetOutput {
                    subnet_name: record.subnet_name.clone(),
                    az: record.az.clone(),
                    subnet_id: record.identity.token(),
                    cidr_block: record.cidr,
                })
                .collect(),
            route_tables: self
                .route_tables
                .iter()
                .map(|(name, id)| (name.clone(), token(id)))
                .collect(),
            security_groups: self
                .security_groups
                .iter()
                .map(|(name, identity)| SecurityGroupOutput {
                    security_group_name: name.clone(),
                    security_group_id: identity.token(),
                })
                .collect(),
            nat_gateways: self
                .nat_gateways
                .iter()
                .map(|(key, id)| (key.clone(), token(id)))
                .collect(),
            tgw_attachments: self
                .transit_attachment
                .iter()
                .map(|(tgw, id)| (tgw.clone(), token(id)))
                .collect(),
        };

        let record = self.ctx.record(self.account_key(), self.region(), &output)?;
        self.outputs.push(record);
        Ok(())
    }

    fn into_handle(self) -> NetworkHandle {
        let graph = self.graph;
        let qualify = |id: &LogicalId| graph.reference(id);
        NetworkHandle {
            account_key: self.resolved.account_key.clone(),
            region: self.network.region.clone(),
            name: self.network.name.clone(),
            vpc: qualify(&self.vpc),
            route_tables: self
                .route_tables
                .iter()
                .map(|(name, id)| (name.clone(), qualify(id)))
                .collect(),
            nat_gateways: self
                .nat_gateways
                .iter()
                .map(|(key, id)| (key.clone(), qualify(id)))
                .collect(),
            transit_attachment: self
                .transit_attachment
                .as_ref()
                .map(|(tgw, id)| (tgw.clone(), qualify(id))),
            security_groups: self.security_groups,
            registry: self.registry,
            sharing: self.sharing,
            outputs: self.outputs,
            report: self.report,
            graph,
        }
    }
}

/// Set the destination property matching the block's family
pub(crate) fn with_destination(resource: Resource, destination: &Cidr) -> Resource {
    let key = if destination.is_ipv6() {
        "destinationIpv6CidrBlock"
    } else {
        "destinationCidrBlock"
    };
    resource.property(key, destination.to_string())
}

/// Tags of a graph node as tag-request tags
pub(crate) fn resource_tags(graph: &ResourceGraph, id: &LogicalId) -> Vec<crate::output_bus::Tag> {
    graph
        .get(id.as_str())
        .map(|resource| {
            resource
                .tags
                .iter()
                .map(|(key, value)| crate::output_bus::Tag {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Property value for a list of same-graph references
pub(crate) fn references<'i>(ids: impl IntoIterator<Item = &'i LogicalId>) -> Value {
    Value::Array(ids.into_iter().map(reference).collect())
}
