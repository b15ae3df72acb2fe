// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed payloads carried on the output bus

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{OutputType, OutputValue};
use crate::domain::Cidr;

/// Transit router created in the router-owning account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitRouterOutput {
    pub name: String,
    pub tgw_id: String,
    /// Route table name → identity
    #[serde(rename = "tgwRouteTableNameToIdMap")]
    pub route_tables: BTreeMap<String, String>,
}

impl OutputValue for TransitRouterOutput {
    const OUTPUT_TYPE: OutputType = OutputType::TransitRouter;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetOutput {
    pub subnet_name: String,
    pub az: String,
    pub subnet_id: String,
    pub cidr_block: Cidr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupOutput {
    pub security_group_name: String,
    pub security_group_id: String,
}

/// Summary of one built network, consumed by later phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOutput {
    pub vpc_name: String,
    pub vpc_id: String,
    pub cidr_blocks: Vec<Cidr>,
    pub subnets: Vec<SubnetOutput>,
    /// Route table name → identity
    pub route_tables: BTreeMap<String, String>,
    pub security_groups: Vec<SecurityGroupOutput>,
    /// NAT index key → identity
    #[serde(default)]
    pub nat_gateways: BTreeMap<String, String>,
    /// Transit router name → attachment identity
    #[serde(default)]
    pub tgw_attachments: BTreeMap<String, String>,
}

impl NetworkOutput {
    pub fn subnets_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SubnetOutput> + 'a {
        self.subnets.iter().filter(move |s| s.subnet_name == name)
    }

    pub fn security_group_id(&self, name: &str) -> Option<&str> {
        self.security_groups
            .iter()
            .find(|g| g.security_group_name == name)
            .map(|g| g.security_group_id.as_str())
    }
}

impl OutputValue for NetworkOutput {
    const OUTPUT_TYPE: OutputType = OutputType::Network;
}

/// Attachment whose association/propagation must run in the router owner's account
///
/// Written under the router owner's account key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentOutput {
    pub account_key: String,
    pub region: String,
    pub tgw_attachment_id: String,
    pub tgw_route_associates: Vec<String>,
    pub tgw_route_propagates: Vec<String>,
    pub blackhole: bool,
    pub cidr: Cidr,
    pub vpc: String,
    /// Stable index used to name the resources created from this record
    pub construct_index: String,
}

impl OutputValue for AttachmentOutput {
    const OUTPUT_TYPE: OutputType = OutputType::Attachment;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringVpc {
    pub account_key: String,
    pub vpc_id: String,
    pub vpc_name: String,
}

/// Peering connection between two networks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringOutput {
    pub pcx_id: String,
    pub vpcs: Vec<PeeringVpc>,
}

impl PeeringOutput {
    pub fn connects(&self, account_key: &str, vpc_name: &str) -> bool {
        self.vpcs
            .iter()
            .any(|v| v.account_key == account_key && v.vpc_name == vpc_name)
    }
}

impl OutputValue for PeeringOutput {
    const OUTPUT_TYPE: OutputType = OutputType::Peering;
}

/// Resource types the deferred tag applier accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SharedResourceType {
    Subnet,
    SecurityGroup,
    Vpc,
    TgwAttachment,
    /// Anything else found in a record; never applied
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Tags to copy onto a shared resource inside the consumer accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedResourceTagRequest {
    pub resource_id: String,
    pub resource_type: SharedResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account_id: Option<String>,
    pub target_account_ids: Vec<String>,
    pub tags: Vec<Tag>,
    pub region: String,
}

/// One output record's worth of tag requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedResourceTags(pub Vec<SharedResourceTagRequest>);

impl OutputValue for SharedResourceTags {
    const OUTPUT_TYPE: OutputType = OutputType::SharedResourceTags;
}

/// Stable index of the security-group copy made for a consumer account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupIndexOutput {
    pub vpc_name: String,
    pub index: usize,
}

impl OutputValue for SecurityGroupIndexOutput {
    const OUTPUT_TYPE: OutputType = OutputType::SecurityGroupIndex;
}
