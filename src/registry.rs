// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Registry
//!
//! Index of the subnets created by one network build, keyed by
//! (subnet name, availability zone). Route associations, NAT gateways,
//! traffic filters, attachments and shares query it instead of recomputing
//! identities.
//!
//! A registry is created per build and dropped with it; it is never shared
//! between concurrent builds.

use std::collections::HashMap;

use crate::domain::Cidr;
use crate::errors::MissingReference;
use crate::topology::graph::ResourceRef;

/// One created subnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetRecord {
    pub subnet_name: String,
    /// Availability zone as written in the configuration (e.g. `a`)
    pub az: String,
    pub identity: ResourceRef,
    pub cidr: Cidr,
}

#[derive(Debug, Default)]
pub struct SubnetRegistry {
    records: Vec<SubnetRecord>,
    index: HashMap<(String, String), usize>,
}

impl SubnetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subnet; a second record for the same (name, az) is rejected
    pub fn register(&mut self, record: SubnetRecord) -> Result<&SubnetRecord, MissingReference> {
        let key = (record.subnet_name.clone(), record.az.clone());
        if self.index.contains_key(&key) {
            return Err(MissingReference::DuplicateSubnet {
                subnet: record.subnet_name,
                az: record.az,
            });
        }
        let position = self.records.len();
        self.index.insert(key, position);
        self.records.push(record);
        Ok(&self.records[position])
    }

    pub fn get(&self, subnet_name: &str, az: &str) -> Option<&SubnetRecord> {
        self.index
            .get(&(subnet_name.to_string(), az.to_string()))
            .map(|&i| &self.records[i])
    }

    /// Every record of a subnet group, in registration order
    pub fn by_name<'a>(&'a self, subnet_name: &'a str) -> impl Iterator<Item = &'a SubnetRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.subnet_name == subnet_name)
    }

    pub fn all(&self) -> &[SubnetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
