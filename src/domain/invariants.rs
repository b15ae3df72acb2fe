// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Network Invariants
//!
//! Checks a [`NetworkConfig`] for configuration errors before any resource is
//! emitted, so a bad network aborts before its graph is half built.
//!
//! # Invariant Categories
//!
//! 1. **Uniqueness**: route tables, security groups and (subnet, az) pairs
//! 2. **References**: route tables named by subnets, subnet groups named by
//!    NAT and attachment settings, security groups named by local rules
//!
//! All functions are pure and return the first violation found.

use std::collections::HashSet;

use super::config::{NetworkConfig, RuleSource, DEFAULT_ROUTE_TABLE};
use crate::errors::MissingReference;

/// Validation result carrying the offending reference
pub type ValidationResult = Result<(), MissingReference>;

/// Run every check in declaration order
pub fn validate_network(network: &NetworkConfig) -> ValidationResult {
    validate_unique_route_tables(network)?;
    validate_unique_subnets(network)?;
    validate_unique_security_groups(network)?;
    validate_subnet_route_tables(network)?;
    validate_nat_subnet(network)?;
    validate_attach_subnets(network)?;
    validate_security_group_references(network)
}

pub fn validate_unique_route_tables(network: &NetworkConfig) -> ValidationResult {
    let mut seen = HashSet::new();
    for table in &network.route_tables {
        if !seen.insert(table.name.as_str()) {
            return Err(MissingReference::DuplicateRouteTable(table.name.clone()));
        }
    }
    Ok(())
}

/// (subnet name, az) is unique over enabled definitions
pub fn validate_unique_subnets(network: &NetworkConfig) -> ValidationResult {
    let mut seen = HashSet::new();
    for group in &network.subnets {
        for definition in group.enabled_definitions() {
            if !seen.insert((group.name.as_str(), definition.az.as_str())) {
                return Err(MissingReference::DuplicateSubnet {
                    subnet: group.name.clone(),
                    az: definition.az.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn validate_unique_security_groups(network: &NetworkConfig) -> ValidationResult {
    let mut seen = HashSet::new();
    for group in &network.security_groups {
        if !seen.insert(group.name.as_str()) {
            return Err(MissingReference::DuplicateSecurityGroup(group.name.clone()));
        }
    }
    Ok(())
}

/// Every enabled definition names a declared route table or the default one
pub fn validate_subnet_route_tables(network: &NetworkConfig) -> ValidationResult {
    for definition in network.subnets.iter().flat_map(|g| g.enabled_definitions()) {
        if definition.route_table != DEFAULT_ROUTE_TABLE
            && network.route_table(&definition.route_table).is_none()
        {
            return Err(MissingReference::RouteTable(definition.route_table.clone()));
        }
    }
    Ok(())
}

pub fn validate_nat_subnet(network: &NetworkConfig) -> ValidationResult {
    match &network.natgw {
        Some(nat) if network.subnet_group(&nat.subnet.name).is_none() => {
            Err(MissingReference::Subnet(nat.subnet.name.clone()))
        }
        _ => Ok(()),
    }
}

pub fn validate_attach_subnets(network: &NetworkConfig) -> ValidationResult {
    let Some(attach) = &network.tgw_attach else {
        return Ok(());
    };
    match attach
        .attach_subnets
        .iter()
        .find(|name| network.subnet_group(name).is_none())
    {
        Some(name) => Err(MissingReference::Subnet(name.clone())),
        None => Ok(()),
    }
}

/// Local security-group sources must name a group declared in this network
pub fn validate_security_group_references(network: &NetworkConfig) -> ValidationResult {
    let declared: HashSet<&str> = network
        .security_groups
        .iter()
        .map(|g| g.name.as_str())
        .collect();

    let rules = network
        .security_groups
        .iter()
        .flat_map(|g| g.inbound_rules.iter().chain(g.outbound_rules.iter()));

    for rule in rules {
        for source in &rule.source {
            if let RuleSource::SecurityGroup {
                account: None,
                security_group,
            } = source
            {
                if let Some(missing) = security_group
                    .iter()
                    .find(|name| !declared.contains(name.as_str()))
                {
                    return Err(MissingReference::SecurityGroup(missing.clone()));
                }
            }
        }
    }
    Ok(())
}
