// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cross-Account Sharing and Deferred Tagging
//!
//! Shared subnet groups are granted to their consumer accounts during the
//! networks phase. Tags do not travel with a share, so every grant is
//! followed by a tag request record that the deferred applier replays with
//! authority in the consumer accounts:
//!
//! ```text
//! NotShared ──GrantIssued──► Shared ──TagRequestEmitted──► TagsRequested ──TagsApplied──► TagsApplied
//!              (builder)                 (builder)                           (tag applier)
//! ```
//!
//! The security groups of a network with shared subnets are copied into each
//! consumer account in the cross-account phase, under a per-consumer index
//! that stays stable across runs.

use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

use super::graph::{LogicalId, Resource, ResourceGraph};
use super::report::{NetworkReport, Subsystem};
use super::security_group::{self, RuleScope};
use super::{naming, resource_tags, BuildContext, NetworkBuilder, UnitOutcome};
use crate::domain::{Account, ResourceKind, SubnetGroupConfig};
use crate::errors::LandingZoneResult;
use crate::output_bus::{
    NetworkOutput, OutputFilter, SecurityGroupIndexOutput, SharedResourceTagRequest,
    SharedResourceTags, SharedResourceType, Tag,
};
use crate::resolve::ResolvedNetwork;
use crate::state_machine::sharing_lifecycle::{SharingInput, SharingState};
use crate::state_machine::StateMachineWithHistory;

/// Consumer accounts of one shared subnet group
///
/// Members of the owning organizational unit (when `share-to-ou-accounts` is
/// set) followed by the explicitly named accounts, deduplicated by key.
/// Unknown keys and a missing unit are reported as warnings.
pub fn consumer_accounts<'a>(
    resolved: &'a ResolvedNetwork,
    group: &SubnetGroupConfig,
    ctx: &BuildContext<'a>,
    report: &mut NetworkReport,
) -> Vec<&'a Account> {
    let accounts = ctx.accounts;
    let mut seen = HashSet::new();
    let mut consumers = Vec::new();

    if group.share_to_ou_accounts {
        match resolved.owning_ou(accounts) {
            Some(ou) => {
                for member in accounts.members_of(ou) {
                    if seen.insert(member.key.as_str()) {
                        consumers.push(member);
                    }
                }
            }
            None => report.warn(
                Subsystem::Sharing,
                format!(
                    "subnet '{}' is shared to its organizational unit but account '{}' belongs to none",
                    group.name, resolved.account_key
                ),
            ),
        }
    }

    for key in &group.share_to_specific_accounts {
        match accounts.get(key) {
            Some(account) => {
                if seen.insert(account.key.as_str()) {
                    consumers.push(account);
                }
            }
            None => report.warn(
                Subsystem::Sharing,
                format!("subnet '{}' is shared to unknown account '{}'", group.name, key),
            ),
        }
    }

    consumers
}

fn subnet_arn(region: &str, owner_id: &str, subnet_token: &str) -> String {
    format!("arn:aws:ec2:{}:{}:subnet/{}", region, owner_id, subnet_token)
}

/// Share every shared subnet group of the network and stage its tag request
pub(crate) fn share_subnets(builder: &mut NetworkBuilder<'_>) -> LandingZoneResult<()> {
    let network = builder.network;
    if !network.has_shared_subnets() {
        builder.report.skipped(Subsystem::Sharing, "no shared subnets");
        return Ok(());
    }

    let ctx = builder.ctx;
    let Some(owner_id) = ctx.accounts.id_of(builder.account_key()) else {
        builder.report.warn(
            Subsystem::Sharing,
            format!("account '{}' has no id, subnets not shared", builder.account_key()),
        );
        builder.report.skipped(Subsystem::Sharing, "owner account id unknown");
        return Ok(());
    };

    for group in network.subnets.iter().filter(|g| g.is_shared()) {
        let mut lifecycle = StateMachineWithHistory::new(SharingState::NotShared);
        let consumers = consumer_accounts(builder.resolved, group, ctx, &mut builder.report);
        let subnets: Vec<LogicalId> = builder
            .registry
            .by_name(&group.name)
            .map(|record| record.identity.logical_id.clone())
            .collect();

        if consumers.is_empty() || subnets.is_empty() {
            builder.report.warn(
                Subsystem::Sharing,
                format!("subnet '{}' has no consumers or no enabled subnets, not shared", group.name),
            );
            builder.sharing.push((group.name.clone(), lifecycle.current));
            continue;
        }

        let principals: Vec<&str> = consumers.iter().map(|a| a.id.as_str()).collect();
        let arns: Vec<String> = subnets
            .iter()
            .map(|id| subnet_arn(&network.region, owner_id, &builder.graph.reference(id).token()))
            .collect();
        let mut share = Resource::new(naming::share(&network.name, &group.name), ResourceKind::ResourceShare)
            .property("name", naming::share_name(&network.name, &group.name))
            .property("allowExternalPrincipals", false)
            .property("principals", json!(principals))
            .property("resourceArns", json!(arns));
        for subnet in &subnets {
            share = share.depends_on(subnet);
        }
        builder.graph.add(share)?;

        if let Err(e) = lifecycle.transition_with_history(
            SharingInput::GrantIssued {
                consumers: consumers.len(),
            },
            ctx.recorded_at,
        ) {
            builder.report.warn(Subsystem::Sharing, e.to_string());
            builder.sharing.push((group.name.clone(), lifecycle.current));
            continue;
        }

        let target_account_ids: Vec<String> = consumers.iter().map(|a| a.id.clone()).collect();
        let mut requests: Vec<SharedResourceTagRequest> = subnets
            .iter()
            .map(|id| SharedResourceTagRequest {
                resource_id: builder.graph.reference(id).token(),
                resource_type: SharedResourceType::Subnet,
                source_account_id: Some(owner_id.to_string()),
                target_account_ids: target_account_ids.clone(),
                tags: resource_tags(&builder.graph, id),
                region: network.region.clone(),
            })
            .collect();
        requests.push(SharedResourceTagRequest {
            resource_id: builder.graph.reference(&builder.vpc).token(),
            resource_type: SharedResourceType::Vpc,
            source_account_id: Some(owner_id.to_string()),
            target_account_ids,
            tags: resource_tags(&builder.graph, &builder.vpc),
            region: network.region.clone(),
        });

        let record = ctx.record(builder.account_key(), &network.region, &SharedResourceTags(requests))?;
        builder.outputs.push(record);
        if let Err(e) = lifecycle.transition_with_history(SharingInput::TagRequestEmitted, ctx.recorded_at) {
            builder.report.warn(Subsystem::Sharing, e.to_string());
        }

        debug!(
            account = %builder.account_key(),
            network = %network.name,
            subnet = %group.name,
            consumers = consumers.len(),
            "Subnet shared"
        );
        builder.sharing.push((group.name.clone(), lifecycle.current));
    }

    Ok(())
}

/// Index of the security-group copy for (consumer, region, network)
///
/// Reuses a recorded index; otherwise one past the highest index recorded
/// for the consumer in the region, starting at 1.
pub fn security_group_index(ctx: &BuildContext<'_>, consumer: &str, region: &str, vpc_name: &str) -> usize {
    let recorded: Vec<SecurityGroupIndexOutput> = ctx
        .bus
        .find_typed(&OutputFilter::new().account(consumer).region(region));
    if let Some(existing) = recorded.iter().rev().find(|r| r.vpc_name == vpc_name) {
        return existing.index;
    }
    recorded.iter().map(|r| r.index).max().unwrap_or(0) + 1
}

/// Copy the network's security groups into every consumer of its shared subnets
pub fn share_security_groups(
    resolved: &ResolvedNetwork,
    ctx: &BuildContext<'_>,
) -> LandingZoneResult<UnitOutcome> {
    let network = &resolved.network;
    let owner = resolved.account_key.as_str();
    let mut outcome = UnitOutcome::new(NetworkReport::new(owner, &network.region, &network.name));
    let report = &mut outcome.report;

    if !network.has_shared_subnets() || network.security_groups.is_empty() {
        report.skipped(Subsystem::SharedSecurityGroups, "nothing to share");
        return Ok(outcome);
    }

    let Some(owner_output) = ctx.bus.find_latest(
        &OutputFilter::new().account(owner).region(&network.region),
        |output: &NetworkOutput| output.vpc_name == network.name,
    ) else {
        report.warn(
            Subsystem::SharedSecurityGroups,
            format!("network output of '{}' not found, security groups not shared", network.name),
        );
        report.skipped(Subsystem::SharedSecurityGroups, "network output missing");
        return Ok(outcome);
    };
    let Some(owner_id) = ctx.accounts.id_of(owner) else {
        report.skipped(Subsystem::SharedSecurityGroups, "owner account id unknown");
        return Ok(outcome);
    };

    let mut seen = HashSet::new();
    let mut consumers = Vec::new();
    for group in network.subnets.iter().filter(|g| g.is_shared()) {
        for account in consumer_accounts(resolved, group, ctx, report) {
            if account.key != owner && seen.insert(account.key.as_str()) {
                consumers.push(account);
            }
        }
    }

    for consumer in consumers {
        let index = security_group_index(ctx, &consumer.key, &network.region, &network.name);
        let mut graph = ResourceGraph::new(
            &consumer.key,
            &network.region,
            format!("{}_SecurityGroups{}", network.name, index),
        );
        let scope = RuleScope {
            account_key: owner,
            region: &network.region,
            vpc_name: &network.name,
            description_account: &consumer.key,
            resolved: ctx.resolved,
            bus: ctx.bus,
        };
        let compiled = security_group::compile(&network.security_groups, &scope, report);
        let created = security_group::emit(&compiled, json!(owner_output.vpc_id), None, &mut graph)?;

        outcome.outputs.push(ctx.record(
            &consumer.key,
            &network.region,
            &SecurityGroupIndexOutput {
                vpc_name: network.name.clone(),
                index,
            },
        )?);
        let requests: Vec<SharedResourceTagRequest> = created
            .iter()
            .map(|(name, identity)| SharedResourceTagRequest {
                resource_id: identity.token(),
                resource_type: SharedResourceType::SecurityGroup,
                source_account_id: Some(consumer.id.clone()),
                target_account_ids: vec![owner_id.to_string()],
                tags: vec![Tag {
                    key: "Name".to_string(),
                    value: naming::security_group_name(name),
                }],
                region: network.region.clone(),
            })
            .collect();
        outcome.outputs.push(ctx.record(
            &consumer.key,
            &network.region,
            &SharedResourceTags(requests),
        )?);

        info!(
            owner = %owner,
            consumer = %consumer.key,
            network = %network.name,
            index,
            groups = created.len(),
            "Security groups copied to consumer account"
        );
        outcome.graphs.push(graph);
    }

    if outcome.graphs.is_empty() {
        outcome
            .report
            .skipped(Subsystem::SharedSecurityGroups, "no consumer accounts");
    } else {
        outcome.report.succeeded(Subsystem::SharedSecurityGroups);
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
    use crate::resolve::{self, resolve};
    use crate::topology::tests_support::{at, build_with, directory};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn shared_config() -> Value {
        json!({
            "organizational-units": [{
                "key": "Dev",
                "vpc": [{
                    "name": "Dev",
                    "region": "ca-central-1",
                    "deploy": "shared-network",
                    "cidr": "10.2.0.0/16",
                    "route-tables": [{"name": "Web_Shared"}],
                    "subnets": [{
                        "name": "Web",
                        "share-to-ou-accounts": true,
                        "share-to-specific-accounts": ["perimeter", "dev", "ghost"],
                        "definitions": [
                            {"az": "a", "cidr": "10.2.32.0/20", "route-table": "Web_Shared"},
                            {"az": "b", "cidr": "10.2.128.0/20", "route-table": "Web_Shared"}
                        ]
                    }],
                    "security-groups": [{
                        "name": "Web",
                        "inbound-rules": [{"description": "TLS", "tcp-ports": [443], "source": ["10.0.0.0/8"]}]
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_consumers_union_of_ou_and_explicit_accounts() {
        let handle = build_with(
            shared_config(),
            &OutputBus::new(),
            &Limiter::unbounded(),
            "shared-network",
            "Dev",
        )
        .unwrap();

        let share = handle.graph.get("Share-Dev-Web").unwrap();
        assert_eq!(
            share.properties["principals"],
            json!(["222222222222", "333333333333", "444444444444"])
        );
        assert_eq!(share.properties["resourceArns"].as_array().unwrap().len(), 2);
        assert_eq!(handle.report.warnings_for(Subsystem::Sharing).count(), 1);
        assert_eq!(
            handle.sharing,
            vec![("Web".to_string(), SharingState::TagsRequested)]
        );

        let tags: SharedResourceTags = handle.outputs[0].decode().unwrap();
        assert_eq!(tags.0.len(), 3);
        assert_eq!(tags.0[2].resource_type, SharedResourceType::Vpc);
        assert_eq!(tags.0[0].tags[0].value, "Web_aza_net");
        assert_eq!(handle.outputs[0].account_key, "shared-network");
    }

    #[test]
    fn test_security_groups_copied_with_stable_index() {
        let bus = OutputBus::new();
        let handle = build_with(shared_config(), &bus, &Limiter::unbounded(), "shared-network", "Dev").unwrap();
        bus.append_all(handle.outputs);

        let config: LandingZoneConfig = serde_json::from_value(shared_config()).unwrap();
        let accounts = directory();
        let resolved = resolve(&config, &accounts);
        let limiter = Limiter::unbounded();
        let ctx = BuildContext {
            limiter: &limiter,
            bus: &bus,
            accounts: &accounts,
            resolved: &resolved,
            phase: Phase::CrossAccount,
            recorded_at: at(),
        };
        let target = resolve::find(&resolved, "shared-network", "Dev").unwrap();

        let first = share_security_groups(target, &ctx).unwrap();
        assert_eq!(first.graphs.len(), 3);
        assert_eq!(first.graphs[0].scope(), "Dev_SecurityGroups1");
        let group = first.graphs[0].get("Web_sg").unwrap();
        assert_eq!(group.properties["groupDescription"], "dev Dev Security Group");
        assert_eq!(group.properties["vpcId"], "shared-network/ca-central-1/Dev/Dev");

        bus.append_all(first.outputs);
        let second = share_security_groups(target, &ctx).unwrap();
        assert_eq!(second.graphs[0].scope(), "Dev_SecurityGroups1");
    }
}
