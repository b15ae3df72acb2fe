// Copyright (c) 2025 - Cowboy AI, Inc.
//! Gateway and interface endpoints
//!
//! Gateway endpoints (s3, dynamodb) bind to the route tables whose routes
//! named the service. Interface endpoints get their own security group and
//! are placed in the enabled subnets of one subnet group; each one consumes
//! the per-network interface endpoint quota.

use serde_json::{json, Value};

use super::graph::{reference, LogicalId, Resource};
use super::report::Subsystem;
use super::{naming, references, NetworkBuilder};
use crate::domain::{Cidr, ResourceKind};
use crate::errors::LandingZoneResult;
use crate::limiter::QuotaKind;

const ENDPOINT_PORT: u16 = 443;

pub fn gateway_service_name(region: &str, service: &str) -> String {
    format!("com.amazonaws.{}.{}", region, service)
}

pub fn interface_service_name(region: &str, endpoint: &str) -> String {
    if endpoint == "notebook" {
        format!("aws.sagemaker.{}.{}", region, endpoint)
    } else {
        format!("com.amazonaws.{}.{}", region, endpoint)
    }
}

pub(crate) fn create_gateway_endpoints(builder: &mut NetworkBuilder<'_>) -> LandingZoneResult<()> {
    let network = builder.network;

    for (service, _) in &builder.endpoint_route_tables {
        if !network.gateway_endpoints.contains(service) {
            builder.report.warn(
                Subsystem::GatewayEndpoints,
                format!("routes target '{}' but the network declares no such gateway endpoint", service),
            );
        }
    }

    if network.gateway_endpoints.is_empty() {
        builder.report.skipped(Subsystem::GatewayEndpoints, "not configured");
        return Ok(());
    }

    for service in &network.gateway_endpoints {
        let tables: Vec<LogicalId> = builder
            .endpoint_route_tables
            .iter()
            .find(|(s, _)| s == service)
            .map(|(_, tables)| tables.clone())
            .unwrap_or_default();

        let mut resource = Resource::new(naming::gateway_endpoint(*service), ResourceKind::GatewayEndpoint)
            .property("serviceName", gateway_service_name(&network.region, service.as_str()))
            .property("vpcEndpointType", "Gateway")
            .property("vpcId", reference(&builder.vpc))
            .property("routeTableIds", references(&tables))
            .depends_on(&builder.vpc);
        for table in &tables {
            resource = resource.depends_on(table);
        }
        builder.graph.add(resource)?;
    }

    Ok(())
}

pub(crate) fn create_interface_endpoints(builder: &mut NetworkBuilder<'_>) -> LandingZoneResult<()> {
    let network = builder.network;
    let Some(config) = &network.interface_endpoints else {
        builder.report.skipped(Subsystem::InterfaceEndpoints, "not configured");
        return Ok(());
    };

    let subnets: Vec<LogicalId> = builder
        .registry
        .by_name(&config.subnet)
        .map(|record| record.identity.logical_id.clone())
        .collect();
    if subnets.is_empty() {
        builder.report.warn(
            Subsystem::InterfaceEndpoints,
            format!("endpoint subnet '{}' has no enabled definitions", config.subnet),
        );
        builder.report.skipped(Subsystem::InterfaceEndpoints, "no endpoint subnets");
        return Ok(());
    }

    let default_source = [Cidr::any_ipv4()];
    let allowed: &[Cidr] = if config.allowed_cidrs.is_empty() {
        &default_source
    } else {
        &config.allowed_cidrs
    };
    let ingress: Vec<Value> = allowed
        .iter()
        .map(|cidr| {
            let block_key = if cidr.is_ipv6() { "cidrIpv6" } else { "cidrIp" };
            let mut rule = json!({
                "ipProtocol": "tcp",
                "fromPort": ENDPOINT_PORT,
                "toPort": ENDPOINT_PORT,
            });
            rule[block_key] = json!(cidr.to_string());
            rule
        })
        .collect();

    for endpoint in &config.endpoints {
        if !builder.ctx.limiter.try_reserve(
            builder.account_key(),
            QuotaKind::VpcInterfaceEndpointsPerVpc,
            Some(&network.region),
            Some(&network.name),
        ) {
            builder.report.warn(
                Subsystem::InterfaceEndpoints,
                format!("interface endpoint quota reached, '{}' not created", endpoint),
            );
            continue;
        }

        let group = LogicalId::new(naming::interface_endpoint_security_group(endpoint));
        builder.graph.add(
            Resource::new(group.clone(), ResourceKind::SecurityGroup)
                .property("vpcId", reference(&builder.vpc))
                .property("groupName", format!("ep_{}_sg", endpoint))
                .property("groupDescription", format!("Private Endpoint Zone - {}", endpoint))
                .property("securityGroupIngress", Value::Array(ingress.clone()))
                // Keeps the platform from adding its allow-all egress rule
                .property(
                    "securityGroupEgress",
                    json!([{ "ipProtocol": "-1", "cidrIp": "127.0.0.1/32" }]),
                )
                .depends_on(&builder.vpc),
        )?;

        let mut resource = Resource::new(naming::interface_endpoint(endpoint), ResourceKind::InterfaceEndpoint)
            .property("serviceName", interface_service_name(&network.region, endpoint))
            .property("vpcEndpointType", "Interface")
            .property("vpcId", reference(&builder.vpc))
            .property("subnetIds", references(&subnets))
            .property("securityGroupIds", json!([reference(&group)]))
            .property("privateDnsEnabled", false)
            .depends_on(&group);
        for subnet in &subnets {
            resource = resource.depends_on(subnet);
        }
        builder.graph.add(resource)?;
    }

    Ok(())
}
