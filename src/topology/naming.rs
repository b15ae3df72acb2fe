// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deterministic logical-id naming
//!
//! Every id is derived only from configuration values; re-running a build
//! against an unchanged configuration reproduces the same ids.

use crate::domain::{Cidr, GatewayService};

pub fn extension_block(index: usize) -> String {
    if index == 0 {
        "ExtendVPC".to_string()
    } else {
        format!("ExtendVPC-{}", index)
    }
}

pub fn internet_gateway(vpc: &str) -> String {
    format!("{}_igw", vpc)
}

pub fn internet_gateway_attachment(vpc: &str) -> String {
    format!("{}_attach_igw", vpc)
}

pub fn vpn_gateway(vpc: &str) -> String {
    format!("{}_vpg", vpc)
}

pub fn vpn_gateway_attachment(vpc: &str) -> String {
    format!("{}_attach_vgw", vpc)
}

pub fn subnet(subnet: &str, vpc: &str, az: &str) -> String {
    format!("{}_{}_az{}", subnet, vpc, az)
}

pub fn subnet_association(subnet_id: &str) -> String {
    format!("RouteTable{}", subnet_id)
}

/// Availability zone of the subnet resource: a single letter expands to
/// `<region><letter>`
pub fn availability_zone(region: &str, az: &str) -> String {
    if az.len() == 1 && az.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("{}{}", region, az)
    } else {
        az.to_string()
    }
}

pub fn elastic_ip(az: &str) -> String {
    format!("EIP_natgw_{}", az)
}

pub fn nat_gateway(subnet: &str, az: &str) -> String {
    format!("NATGW_{}_{}_natgw", subnet, az)
}

/// Key of the NAT index used to resolve NAT route targets
pub fn nat_key(subnet: &str, az: &str) -> String {
    format!("NAT_{}_{}", subnet, az.to_uppercase())
}

fn is_default_destination(destination: &Cidr) -> bool {
    destination.prefix_length() == 0
}

/// `<rt>_<target>`, or `<rt>_<target>_<destination>` off the IPv4 default route
pub fn gateway_route(route_table: &str, target: &str, destination: &Cidr) -> String {
    if is_default_destination(destination) && !destination.is_ipv6() {
        format!("{}_{}", route_table, target)
    } else {
        format!("{}_{}_{}", route_table, target, destination)
    }
}

pub fn transit_route(route_table: &str, destination: &Cidr) -> String {
    gateway_route(route_table, "TGW", destination)
}

pub fn nat_route(route_table: &str, destination: &Cidr) -> String {
    if is_default_destination(destination) && !destination.is_ipv6() {
        format!("{}_natgw_route", route_table)
    } else {
        format!("{}_natgw_{}_route", route_table, destination)
    }
}

pub fn customer_route(route_table: &str, kind: &str, target_id: &str) -> String {
    format!("{}_{}_{}", route_table, kind, target_id)
}

pub fn peering_route(route_table: &str, vpc: &str, index: usize) -> String {
    format!("{}_pcx_{}_{}", route_table, vpc, index)
}

pub fn gateway_endpoint(service: GatewayService) -> String {
    format!("Endpoint_{}", service)
}

pub fn security_group_name(name: &str) -> String {
    format!("{}_sg", name)
}

pub fn security_group_rule(group: &str, egress: bool, rule: usize, entry: usize) -> String {
    let direction = if egress { "Egress" } else { "Ingress" };
    format!("{}-{}-{}-{}", group, direction, rule, entry)
}

pub fn nacl(subnet: &str) -> String {
    format!("{}_nacl", subnet)
}

pub fn nacl_association(subnet_id: &str) -> String {
    format!("{}_nacl_association", subnet_id)
}

pub fn nacl_entry(subnet: &str, egress: bool, rule_number: u32) -> String {
    let direction = if egress { "out" } else { "in" };
    format!("{}_nacl_{}_{}", subnet, direction, rule_number)
}

pub fn interface_endpoint(endpoint: &str) -> String {
    format!("{}_endpoint", endpoint)
}

pub fn interface_endpoint_security_group(endpoint: &str) -> String {
    format!("{}_endpoint_sg", endpoint)
}

pub fn transit_attachment(vpc: &str, tgw: &str) -> String {
    format!("{}_{}_att", vpc, tgw)
}

pub fn transit_route_table(tgw: &str, route_table: &str) -> String {
    format!("{}_{}", tgw, route_table)
}

pub fn transit_association(attachment: &str, route_table: &str) -> String {
    format!("{}_association_{}", attachment, route_table)
}

pub fn transit_propagation(attachment: &str, route_table: &str) -> String {
    format!("{}_propagation_{}", attachment, route_table)
}

pub fn transit_blackhole(attachment: &str, route_table: &str) -> String {
    format!("{}_blackhole_{}", attachment, route_table)
}

/// `Share-<PascalVpc>-<PascalSubnet>`
pub fn share(vpc: &str, subnet: &str) -> String {
    format!("Share-{}", share_name(vpc, subnet))
}

pub fn share_name(vpc: &str, subnet: &str) -> String {
    format!("{}-{}", pascal_case(vpc), pascal_case(subnet))
}

pub fn peering_connection(vpc: &str, source_vpc: &str) -> String {
    format!("{}-{}_pcx", vpc, source_vpc)
}

/// Split on `_`, `-` and whitespace and capitalize each word
pub fn pascal_case(value: &str) -> String {
    value
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
