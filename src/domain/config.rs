// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Configuration Model
//!
//! In-memory form of the network declarations of a landing-zone
//! configuration document. Field names follow the kebab-case keys of the
//! document so the model deserializes directly with `serde_json`.
//!
//! Symbolic string fields (route targets, route destinations, rule sources)
//! are parsed into tagged unions at load time. Builders match on them
//! exhaustively and never inspect raw strings.
//!
//! ```text
//! NetworkConfig
//!   ├── cidr / cidr2           address blocks
//!   ├── igw / vgw / natgw      gateways
//!   ├── route-tables[]         RouteTableConfig → RouteConfig(destination, target)
//!   ├── subnets[]              SubnetGroupConfig → SubnetDefinition(az, cidr, route-table)
//!   ├── security-groups[]      SecurityGroupConfig → RuleConfig(ports, sources)
//!   ├── tgw-attach             TransitGatewayAttachConfig
//!   ├── pcx                    PeeringConfig
//!   └── gateway-endpoints[] / interface-endpoints
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::network::Cidr;

/// Name of the implicit main route table; never materialized
pub const DEFAULT_ROUTE_TABLE: &str = "default";

/// Errors raised while parsing symbolic configuration fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigParseError {
    #[error("Unknown route target: {0}")]
    UnknownRouteTarget(String),

    #[error("Invalid NAT gateway reference: {0} (expected NATGW_<subnet>_az<zone>)")]
    InvalidNatReference(String),

    #[error("Unknown gateway endpoint service: {0}")]
    UnknownGatewayService(String),
}

/// Where a declared network is instantiated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeployTarget {
    /// Every account of the declaring organizational unit
    Local,
    /// Exactly one named account
    Account(String),
}

impl From<String> for DeployTarget {
    fn from(value: String) -> Self {
        if value == "local" {
            DeployTarget::Local
        } else {
            DeployTarget::Account(value)
        }
    }
}

impl From<DeployTarget> for String {
    fn from(value: DeployTarget) -> Self {
        match value {
            DeployTarget::Local => "local".to_string(),
            DeployTarget::Account(key) => key,
        }
    }
}

/// Gateway endpoint services that are bound to route tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GatewayService {
    S3,
    DynamoDb,
}

impl GatewayService {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayService::S3 => "s3",
            GatewayService::DynamoDb => "dynamodb",
        }
    }
}

impl fmt::Display for GatewayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayService {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(GatewayService::S3),
            "dynamodb" => Ok(GatewayService::DynamoDb),
            _ => Err(ConfigParseError::UnknownGatewayService(s.to_string())),
        }
    }
}

impl TryFrom<String> for GatewayService {
    type Error = ConfigParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GatewayService> for String {
    fn from(value: GatewayService) -> Self {
        value.as_str().to_string()
    }
}

/// Subnet in another (or the same) network, used as a route destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeeringDestination {
    pub account: String,
    pub vpc: String,
    pub subnet: String,
}

/// Route destination: a literal block or a subnet reached over peering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteDestination {
    Cidr(Cidr),
    Peering(PeeringDestination),
}

impl RouteDestination {
    pub fn as_cidr(&self) -> Option<&Cidr> {
        match self {
            RouteDestination::Cidr(cidr) => Some(cidr),
            RouteDestination::Peering(_) => None,
        }
    }
}

/// Route target after symbolic parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    InternetGateway,
    VirtualPrivateGateway,
    TransitGateway,
    NatGateway { subnet: String, az: String },
    GatewayEndpoint(GatewayService),
    Peering,
    /// Arbitrary route property set by the operator (`type` = property name)
    Customer {
        kind: Option<String>,
        target_id: Option<String>,
    },
}

impl RouteTarget {
    fn parse(target: &str, kind: Option<&str>, target_id: Option<&str>) -> Result<Self, ConfigParseError> {
        match target {
            "IGW" => Ok(RouteTarget::InternetGateway),
            "VGW" => Ok(RouteTarget::VirtualPrivateGateway),
            "TGW" => Ok(RouteTarget::TransitGateway),
            "pcx" => Ok(RouteTarget::Peering),
            "customer" => Ok(RouteTarget::Customer {
                kind: kind.filter(|k| !k.is_empty()).map(str::to_string),
                target_id: target_id.filter(|t| !t.is_empty()).map(str::to_string),
            }),
            other if other.starts_with("NATGW_") => parse_nat_reference(other),
            other => other
                .parse::<GatewayService>()
                .map(RouteTarget::GatewayEndpoint)
                .map_err(|_| ConfigParseError::UnknownRouteTarget(other.to_string())),
        }
    }

    fn symbol(&self) -> String {
        match self {
            RouteTarget::InternetGateway => "IGW".to_string(),
            RouteTarget::VirtualPrivateGateway => "VGW".to_string(),
            RouteTarget::TransitGateway => "TGW".to_string(),
            RouteTarget::Peering => "pcx".to_string(),
            RouteTarget::Customer { .. } => "customer".to_string(),
            RouteTarget::NatGateway { subnet, az } => format!("NATGW_{}_az{}", subnet, az.to_uppercase()),
            RouteTarget::GatewayEndpoint(service) => service.as_str().to_string(),
        }
    }
}

/// `NATGW_<subnet>_az<zone>`; subnet names may themselves contain `_`
fn parse_nat_reference(raw: &str) -> Result<RouteTarget, ConfigParseError> {
    let rest = &raw["NATGW_".len()..];
    let lower = rest.to_ascii_lowercase();
    let split = lower
        .rfind("_az")
        .ok_or_else(|| ConfigParseError::InvalidNatReference(raw.to_string()))?;
    let subnet = &rest[..split];
    let az = &rest[split + 3..];
    if subnet.is_empty() || az.is_empty() {
        return Err(ConfigParseError::InvalidNatReference(raw.to_string()));
    }
    Ok(RouteTarget::NatGateway {
        subnet: subnet.to_string(),
        az: az.to_lowercase(),
    })
}

/// Route as written in the configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawRouteConfig {
    pub destination: RouteDestination,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// One route of a route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRouteConfig", into = "RawRouteConfig")]
pub struct RouteConfig {
    pub destination: RouteDestination,
    pub target: RouteTarget,
    pub name: Option<String>,
}

impl TryFrom<RawRouteConfig> for RouteConfig {
    type Error = ConfigParseError;

    fn try_from(raw: RawRouteConfig) -> Result<Self, Self::Error> {
        let target = RouteTarget::parse(&raw.target, raw.kind.as_deref(), raw.target_id.as_deref())?;
        Ok(Self {
            destination: raw.destination,
            target,
            name: raw.name,
        })
    }
}

impl From<RouteConfig> for RawRouteConfig {
    fn from(route: RouteConfig) -> Self {
        let (kind, target_id) = match &route.target {
            RouteTarget::Customer { kind, target_id } => (kind.clone(), target_id.clone()),
            _ => (None, None),
        };
        RawRouteConfig {
            destination: route.destination,
            target: route.target.symbol(),
            name: route.name,
            kind,
            target_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableConfig {
    pub name: String,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouteTableConfig {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ROUTE_TABLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubnetDefinition {
    pub az: String,
    pub cidr: Cidr,
    pub route_table: String,
    #[serde(default)]
    pub disabled: bool,
}

/// NACL rule source: literal block or subnets of a named network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NaclSource {
    Cidr(Cidr),
    Subnets {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
        vpc: String,
        subnet: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaclAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NaclRuleConfig {
    pub rule: u32,
    /// IANA protocol number, `-1` for all
    pub protocol: i32,
    pub ports: u16,
    pub rule_action: NaclAction,
    pub egress: bool,
    pub cidr_blocks: Vec<NaclSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubnetGroupConfig {
    pub name: String,
    #[serde(default)]
    pub share_to_ou_accounts: bool,
    #[serde(default)]
    pub share_to_specific_accounts: Vec<String>,
    pub definitions: Vec<SubnetDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nacls: Vec<NaclRuleConfig>,
}

impl SubnetGroupConfig {
    pub fn enabled_definitions(&self) -> impl Iterator<Item = &SubnetDefinition> {
        self.definitions.iter().filter(|d| !d.disabled)
    }

    pub fn is_shared(&self) -> bool {
        self.share_to_ou_accounts || !self.share_to_specific_accounts.is_empty()
    }
}

/// Source or destination of a security rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSource {
    /// Literal block; `::` in the text selects IPv6
    Cidr(Cidr),
    Subnet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
        vpc: String,
        subnet: Vec<String>,
    },
    SecurityGroup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
        #[serde(rename = "security-group")]
        security_group: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleConfig {
    /// Explicit rule types (`ALL`, well-known names, or a protocol literal)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<Vec<String>>,
    #[serde(default)]
    pub tcp_ports: Vec<u16>,
    #[serde(default)]
    pub udp_ports: Vec<u16>,
    #[serde(default, rename = "fromPort", skip_serializing_if = "Option::is_none")]
    pub from_port: Option<u16>,
    #[serde(default, rename = "toPort", skip_serializing_if = "Option::is_none")]
    pub to_port: Option<u16>,
    pub description: String,
    pub source: Vec<RuleSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityGroupConfig {
    pub name: String,
    #[serde(default)]
    pub inbound_rules: Vec<RuleConfig>,
    #[serde(default)]
    pub outbound_rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransitGatewayAttachConfig {
    /// Name of the transit router to attach to
    pub associate_to_tgw: String,
    /// Account key owning the transit router
    pub account: String,
    #[serde(default)]
    pub tgw_rt_associate: Vec<String>,
    #[serde(default)]
    pub tgw_rt_propagate: Vec<String>,
    #[serde(default)]
    pub blackhole_route: bool,
    #[serde(default)]
    pub attach_subnets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeeringConfig {
    /// Account key of the peer network
    pub source: String,
    pub source_vpc: String,
    pub source_subnets: String,
    pub local_subnets: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatSubnetRef {
    pub name: String,
    /// Pin the gateway to one zone; otherwise one per enabled zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGatewayConfig {
    pub subnet: NatSubnetRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VirtualPrivateGatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceEndpointConfig {
    pub subnet: String,
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub allowed_cidrs: Vec<Cidr>,
}

/// Declarative description of one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    pub name: String,
    pub region: String,
    pub deploy: DeployTarget,
    /// Organizational-unit networks with this set deploy only into members
    /// that list the network under `opt-in-vpcs`
    #[serde(default)]
    pub opt_in: bool,
    pub cidr: Cidr,
    /// Additional address blocks allocated after the primary one
    #[serde(default, rename = "cidr2")]
    pub extension_cidrs: Vec<Cidr>,
    #[serde(default)]
    pub igw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vgw: Option<VirtualPrivateGatewayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natgw: Option<NatGatewayConfig>,
    #[serde(default)]
    pub subnets: Vec<SubnetGroupConfig>,
    #[serde(default)]
    pub route_tables: Vec<RouteTableConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgw_attach: Option<TransitGatewayAttachConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcx: Option<PeeringConfig>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupConfig>,
    #[serde(default)]
    pub gateway_endpoints: Vec<GatewayService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_endpoints: Option<InterfaceEndpointConfig>,
}

impl NetworkConfig {
    pub fn subnet_group(&self, name: &str) -> Option<&SubnetGroupConfig> {
        self.subnets.iter().find(|s| s.name == name)
    }

    pub fn route_table(&self, name: &str) -> Option<&RouteTableConfig> {
        self.route_tables.iter().find(|r| r.name == name)
    }

    pub fn has_shared_subnets(&self) -> bool {
        self.subnets.iter().any(SubnetGroupConfig::is_shared)
    }

    /// Every address block, primary first
    pub fn address_blocks(&self) -> impl Iterator<Item = &Cidr> {
        std::iter::once(&self.cidr).chain(self.extension_cidrs.iter())
    }
}
