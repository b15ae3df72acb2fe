// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network ACLs
//!
//! One ACL per subnet group that declares rules, associated with every
//! enabled subnet of the group. A rule expands to one entry per source
//! block; entry numbers start at the rule number and step by 200 so that
//! expansions of neighbouring rules do not collide.

use serde_json::json;

use super::graph::{reference, LogicalId, Resource};
use super::report::Subsystem;
use super::{naming, NetworkBuilder};
use crate::domain::{Cidr, NaclAction, NaclRuleConfig, NaclSource, ResourceKind};
use crate::errors::LandingZoneResult;
use crate::resolve;

/// Gap between entry numbers expanded from one rule
pub const ENTRY_NUMBER_STEP: u32 = 200;

pub(crate) fn create_network_acls(builder: &mut NetworkBuilder<'_>) -> LandingZoneResult<()> {
    let network = builder.network;
    if network.subnets.iter().all(|group| group.nacls.is_empty()) {
        builder.report.skipped(Subsystem::NetworkAcls, "not configured");
        return Ok(());
    }

    for group in network.subnets.iter().filter(|g| !g.nacls.is_empty()) {
        let acl = LogicalId::new(naming::nacl(&group.name));
        builder.graph.add(
            Resource::new(acl.clone(), ResourceKind::NetworkAcl)
                .property("vpcId", reference(&builder.vpc))
                .depends_on(&builder.vpc)
                .tag("Name", format!("{}_nacl", group.name)),
        )?;

        let subnets: Vec<LogicalId> = builder
            .registry
            .by_name(&group.name)
            .map(|record| record.identity.logical_id.clone())
            .collect();
        for subnet in &subnets {
            builder.graph.add(
                Resource::new(naming::nacl_association(subnet.as_str()), ResourceKind::SubnetNetworkAclAssociation)
                    .property("networkAclId", reference(&acl))
                    .property("subnetId", reference(subnet))
                    .depends_on(&acl)
                    .depends_on(subnet),
            )?;
        }

        for rule in &group.nacls {
            let sources = expand_sources(builder, rule);
            for (offset, cidr) in sources.iter().enumerate() {
                let number = rule.rule + ENTRY_NUMBER_STEP * offset as u32;
                let block_key = if cidr.is_ipv6() { "ipv6CidrBlock" } else { "cidrBlock" };
                let action = match rule.rule_action {
                    NaclAction::Allow => "allow",
                    NaclAction::Deny => "deny",
                };
                builder.graph.add(
                    Resource::new(naming::nacl_entry(&group.name, rule.egress, number), ResourceKind::NetworkAclEntry)
                        .property("networkAclId", reference(&acl))
                        .property("ruleNumber", number)
                        .property("protocol", rule.protocol)
                        .property("ruleAction", action)
                        .property("egress", rule.egress)
                        .property(block_key, cidr.to_string())
                        .property("portRange", json!({ "from": rule.ports, "to": rule.ports }))
                        .depends_on(&acl),
                )?;
            }
        }
    }

    Ok(())
}

/// Source blocks of one rule; unresolvable subnet sources warn and drop out
fn expand_sources(builder: &mut NetworkBuilder<'_>, rule: &NaclRuleConfig) -> Vec<Cidr> {
    let mut blocks = Vec::new();
    for source in &rule.cidr_blocks {
        match source {
            NaclSource::Cidr(cidr) => blocks.push(*cidr),
            NaclSource::Subnets {
                account,
                vpc,
                subnet,
            } => {
                let account_key = account.as_deref().unwrap_or(builder.account_key());
                let Some(source_network) = resolve::find(builder.ctx.resolved, account_key, vpc) else {
                    builder.report.warn(
                        Subsystem::NetworkAcls,
                        format!("NACL source network '{}' in account '{}' not found", vpc, account_key),
                    );
                    continue;
                };
                for name in subnet {
                    match source_network.network.subnet_group(name) {
                        Some(group) => blocks.extend(group.enabled_definitions().map(|d| d.cidr)),
                        None => builder.report.warn(
                            Subsystem::NetworkAcls,
                            format!("NACL source subnet '{}' not found in network '{}'", name, vpc),
                        ),
                    }
                }
            }
        }
    }
    blocks
}
