// Copyright (c) 2025 - Cowboy AI, Inc.
//! Security Rule Compiler
//!
//! Expands declarative security-group rules into concrete, ordered entries.
//!
//! ```text
//! pass 1: SecurityGroupConfig[] ──► one group per config (name → logical id)
//! pass 2: for each rule (in order)
//!           (protocol, port range) pairs   tcp-ports/udp-ports, or type list
//!             × sources                     CIDR | subnet reference | group reference
//!           ──► RuleEntry  <group>-Ingress-<rule>-<n> / <group>-Egress-<rule>-<n>
//! ```
//!
//! Missing source networks, subnets and cross-account groups are logged and
//! skipped; a partial group is better than none. Local group references are
//! checked up front by [`crate::domain::invariants`].

use serde_json::{json, Value};

use super::graph::{reference, GraphError, LogicalId, Resource, ResourceGraph, ResourceRef};
use super::naming;
use super::report::{NetworkReport, Subsystem};
use crate::domain::{Cidr, ResourceKind, RuleConfig, RuleSource, SecurityGroupConfig};
use crate::output_bus::{NetworkOutput, OutputBus, OutputFilter};
use crate::resolve::{self, ResolvedNetwork};

/// IP protocol of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpProtocol {
    All,
    Tcp,
    Udp,
    Other(String),
}

impl IpProtocol {
    pub fn as_property(&self) -> &str {
        match self {
            IpProtocol::All => "-1",
            IpProtocol::Tcp => "tcp",
            IpProtocol::Udp => "udp",
            IpProtocol::Other(literal) => literal,
        }
    }
}

/// Fixed port of a well-known rule type
pub fn well_known_port(name: &str) -> Option<u16> {
    match name.to_ascii_uppercase().as_str() {
        "RDP" => Some(3389),
        "SSH" => Some(22),
        "HTTP" => Some(80),
        "HTTPS" => Some(443),
        "MSSQL" => Some(1433),
        "MYSQL/AURORA" => Some(3306),
        "REDSHIFT" => Some(5439),
        "POSTGRESQL" => Some(5432),
        "ORACLE-RDS" => Some(1521),
        _ => None,
    }
}

/// Other side of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePeer {
    Cidr(Cidr),
    /// Group created in the same graph
    Group(LogicalId),
    /// Group created elsewhere, known by its identity token
    ExternalGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub logical_id: String,
    pub group: LogicalId,
    pub egress: bool,
    pub protocol: IpProtocol,
    pub from_port: Option<u16>,
    pub to_port: Option<u16>,
    pub peer: RulePeer,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGroup {
    pub name: String,
    pub logical_id: LogicalId,
    pub group_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSecurityGroups {
    pub groups: Vec<CompiledGroup>,
    pub entries: Vec<RuleEntry>,
}

/// Where the compiled groups live and how sources resolve
#[derive(Debug, Clone)]
pub struct RuleScope<'a> {
    /// Account whose networks unqualified subnet references name
    pub account_key: &'a str,
    pub region: &'a str,
    pub vpc_name: &'a str,
    /// Account named in group descriptions
    pub description_account: &'a str,
    pub resolved: &'a [ResolvedNetwork],
    pub bus: &'a OutputBus,
}

/// Compile every group and its rules
pub fn compile(
    configs: &[SecurityGroupConfig],
    scope: &RuleScope<'_>,
    report: &mut NetworkReport,
) -> CompiledSecurityGroups {
    let groups: Vec<CompiledGroup> = configs
        .iter()
        .map(|config| CompiledGroup {
            name: config.name.clone(),
            logical_id: LogicalId::new(naming::security_group_name(&config.name)),
            group_name: naming::security_group_name(&config.name),
            description: format!("{} {} Security Group", scope.description_account, scope.vpc_name),
        })
        .collect();

    let mut entries = Vec::new();
    for (config, group) in configs.iter().zip(&groups) {
        for (egress, rules) in [(false, &config.inbound_rules), (true, &config.outbound_rules)] {
            for (rule_index, rule) in rules.iter().enumerate() {
                let peers = expand_sources(rule, &groups, scope, report);
                let mut entry_index = 0;
                for (protocol, from_port, to_port) in port_ranges(rule) {
                    for (peer, description) in &peers {
                        entries.push(RuleEntry {
                            logical_id: naming::security_group_rule(
                                &config.name,
                                egress,
                                rule_index,
                                entry_index,
                            ),
                            group: group.logical_id.clone(),
                            egress,
                            protocol: protocol.clone(),
                            from_port,
                            to_port,
                            peer: peer.clone(),
                            description: description.clone(),
                        });
                        entry_index += 1;
                    }
                }
            }
        }
    }

    CompiledSecurityGroups { groups, entries }
}

/// (protocol, from, to) pairs of a rule, in declaration order
pub fn port_ranges(rule: &RuleConfig) -> Vec<(IpProtocol, Option<u16>, Option<u16>)> {
    match rule.rule_type.as_deref() {
        Some(types) if !types.is_empty() => types
            .iter()
            .map(|rule_type| {
                if rule_type.eq_ignore_ascii_case("ALL") {
                    (IpProtocol::All, None, None)
                } else if let Some(port) = well_known_port(rule_type) {
                    (IpProtocol::Tcp, Some(port), Some(port))
                } else {
                    (
                        IpProtocol::Other(rule_type.clone()),
                        rule.from_port,
                        rule.to_port,
                    )
                }
            })
            .collect(),
        _ => rule
            .tcp_ports
            .iter()
            .map(|&p| (IpProtocol::Tcp, Some(p), Some(p)))
            .chain(
                rule.udp_ports
                    .iter()
                    .map(|&p| (IpProtocol::Udp, Some(p), Some(p))),
            )
            .collect(),
    }
}

fn expand_sources(
    rule: &RuleConfig,
    local_groups: &[CompiledGroup],
    scope: &RuleScope<'_>,
    report: &mut NetworkReport,
) -> Vec<(RulePeer, String)> {
    let mut peers = Vec::new();
    for source in &rule.source {
        match source {
            RuleSource::Cidr(cidr) => peers.push((RulePeer::Cidr(*cidr), rule.description.clone())),
            RuleSource::Subnet {
                account,
                vpc,
                subnet,
            } => {
                let account_key = account.as_deref().unwrap_or(scope.account_key);
                let Some(source_network) = resolve::find(scope.resolved, account_key, vpc) else {
                    report.warn(
                        Subsystem::SecurityGroups,
                        format!("source network '{}' in account '{}' not found", vpc, account_key),
                    );
                    continue;
                };
                for name in subnet {
                    let Some(group) = source_network.network.subnet_group(name) else {
                        report.warn(
                            Subsystem::SecurityGroups,
                            format!("source subnet '{}' not found in network '{}'", name, vpc),
                        );
                        continue;
                    };
                    for definition in group.enabled_definitions() {
                        peers.push((
                            RulePeer::Cidr(definition.cidr),
                            format!("{} from {}-{}", rule.description, name, definition.az),
                        ));
                    }
                }
            }
            RuleSource::SecurityGroup {
                account,
                security_group,
            } => {
                for name in security_group {
                    match account {
                        None => match local_groups.iter().find(|g| &g.name == name) {
                            Some(group) => peers.push((
                                RulePeer::Group(group.logical_id.clone()),
                                rule.description.clone(),
                            )),
                            None => report.warn(
                                Subsystem::SecurityGroups,
                                format!("security group '{}' not declared", name),
                            ),
                        },
                        Some(account_key) => {
                            match external_group_id(scope.bus, account_key, scope.region, name) {
                                Some(id) => peers
                                    .push((RulePeer::ExternalGroup(id), rule.description.clone())),
                                None => report.warn(
                                    Subsystem::SecurityGroups,
                                    format!(
                                        "security group '{}' of account '{}' not found in outputs",
                                        name, account_key
                                    ),
                                ),
                            }
                        }
                    }
                }
            }
        }
    }
    peers
}

/// Identity of a group recorded by another account's network build
fn external_group_id(bus: &OutputBus, account_key: &str, region: &str, name: &str) -> Option<String> {
    bus.find_latest(
        &OutputFilter::new().account(account_key).region(region),
        |output: &NetworkOutput| output.security_group_id(name).is_some(),
    )
    .and_then(|output| output.security_group_id(name).map(str::to_string))
}

/// Add the compiled groups and entries to a graph
///
/// `vpc` is the property value naming the network; `vpc_dependency` is set
/// when the network lives in the same graph.
pub fn emit(
    compiled: &CompiledSecurityGroups,
    vpc: Value,
    vpc_dependency: Option<&LogicalId>,
    graph: &mut ResourceGraph,
) -> Result<Vec<(String, ResourceRef)>, GraphError> {
    let mut created = Vec::new();
    for group in &compiled.groups {
        let mut resource = Resource::new(group.logical_id.clone(), ResourceKind::SecurityGroup)
            .property("groupName", group.group_name.as_str())
            .property("groupDescription", group.description.as_str())
            .property("vpcId", vpc.clone())
            .tag("Name", group.group_name.as_str());
        if let Some(dependency) = vpc_dependency {
            resource = resource.depends_on(dependency);
        }
        created.push((group.name.clone(), graph.add(resource)?));
    }

    for entry in &compiled.entries {
        let kind = if entry.egress {
            ResourceKind::SecurityGroupEgress
        } else {
            ResourceKind::SecurityGroupIngress
        };
        let mut resource = Resource::new(entry.logical_id.as_str(), kind)
            .property("groupId", reference(&entry.group))
            .property("ipProtocol", entry.protocol.as_property())
            .property("description", entry.description.as_str())
            .depends_on(&entry.group);
        if let Some(from) = entry.from_port {
            resource = resource.property("fromPort", from);
        }
        if let Some(to) = entry.to_port {
            resource = resource.property("toPort", to);
        }
        let peer_group_key = if entry.egress {
            "destinationSecurityGroupId"
        } else {
            "sourceSecurityGroupId"
        };
        resource = match &entry.peer {
            RulePeer::Cidr(cidr) if cidr.is_ipv6() => resource.property("cidrIpv6", cidr.to_string()),
            RulePeer::Cidr(cidr) => resource.property("cidrIp", cidr.to_string()),
            RulePeer::Group(id) => resource
                .property(peer_group_key, reference(id))
                .depends_on(id),
            RulePeer::ExternalGroup(token) => resource.property(peer_group_key, json!(token)),
        };
        graph.add(resource)?;
    }

    Ok(created)
}
