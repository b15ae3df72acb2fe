// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Kind Taxonomy
//!
//! Defines the vocabulary of abstract resources the topology compiler emits
//! into a resource graph. The synthesis collaborator maps each kind onto a
//! concrete template resource; the compiler itself never calls cloud APIs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract resource kinds emitted by the builders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    // Address space
    /// Virtual network with its primary address block
    Vpc,
    /// Additional address block associated with a network
    VpcCidrBlock,
    Subnet,

    // Gateways
    InternetGateway,
    VpnGateway,
    /// Attachment of an internet or virtual-private gateway to a network
    GatewayAttachment,
    ElasticIp,
    NatGateway,
    GatewayEndpoint,
    InterfaceEndpoint,

    // Routing
    RouteTable,
    SubnetRouteTableAssociation,
    Route,

    // Traffic filtering
    SecurityGroup,
    SecurityGroupIngress,
    SecurityGroupEgress,
    NetworkAcl,
    NetworkAclEntry,
    SubnetNetworkAclAssociation,

    // Cross-account
    ResourceShare,
    PeeringConnection,

    // Transit
    TransitGateway,
    TransitGatewayRouteTable,
    TransitGatewayAttachment,
    TransitGatewayRouteTableAssociation,
    TransitGatewayRouteTablePropagation,
    TransitGatewayBlackholeRoute,
}

/// Grouping of resource kinds by concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    AddressSpace,
    Gateway,
    Routing,
    Filtering,
    Sharing,
    Transit,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::VpcCidrBlock => "vpc_cidr_block",
            Self::Subnet => "subnet",
            Self::InternetGateway => "internet_gateway",
            Self::VpnGateway => "vpn_gateway",
            Self::GatewayAttachment => "gateway_attachment",
            Self::ElasticIp => "elastic_ip",
            Self::NatGateway => "nat_gateway",
            Self::GatewayEndpoint => "gateway_endpoint",
            Self::InterfaceEndpoint => "interface_endpoint",
            Self::RouteTable => "route_table",
            Self::SubnetRouteTableAssociation => "subnet_route_table_association",
            Self::Route => "route",
            Self::SecurityGroup => "security_group",
            Self::SecurityGroupIngress => "security_group_ingress",
            Self::SecurityGroupEgress => "security_group_egress",
            Self::NetworkAcl => "network_acl",
            Self::NetworkAclEntry => "network_acl_entry",
            Self::SubnetNetworkAclAssociation => "subnet_network_acl_association",
            Self::ResourceShare => "resource_share",
            Self::PeeringConnection => "peering_connection",
            Self::TransitGateway => "transit_gateway",
            Self::TransitGatewayRouteTable => "transit_gateway_route_table",
            Self::TransitGatewayAttachment => "transit_gateway_attachment",
            Self::TransitGatewayRouteTableAssociation => "transit_gateway_route_table_association",
            Self::TransitGatewayRouteTablePropagation => "transit_gateway_route_table_propagation",
            Self::TransitGatewayBlackholeRoute => "transit_gateway_blackhole_route",
        }
    }

    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Vpc | Self::VpcCidrBlock | Self::Subnet => ResourceCategory::AddressSpace,

            Self::InternetGateway
            | Self::VpnGateway
            | Self::GatewayAttachment
            | Self::ElasticIp
            | Self::NatGateway
            | Self::GatewayEndpoint
            | Self::InterfaceEndpoint => ResourceCategory::Gateway,

            Self::RouteTable | Self::SubnetRouteTableAssociation | Self::Route => {
                ResourceCategory::Routing
            }

            Self::SecurityGroup
            | Self::SecurityGroupIngress
            | Self::SecurityGroupEgress
            | Self::NetworkAcl
            | Self::NetworkAclEntry
            | Self::SubnetNetworkAclAssociation => ResourceCategory::Filtering,

            Self::ResourceShare | Self::PeeringConnection => ResourceCategory::Sharing,

            Self::TransitGateway
            | Self::TransitGatewayRouteTable
            | Self::TransitGatewayAttachment
            | Self::TransitGatewayRouteTableAssociation
            | Self::TransitGatewayRouteTablePropagation
            | Self::TransitGatewayBlackholeRoute => ResourceCategory::Transit,
        }
    }

    /// Resource type name used in tag requests, for kinds that can be shared
    pub fn shared_type_name(&self) -> Option<&'static str> {
        match self {
            Self::Subnet => Some("subnet"),
            Self::SecurityGroup => Some("security-group"),
            Self::Vpc => Some("vpc"),
            Self::TransitGatewayAttachment => Some("tgw-attachment"),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
