// Copyright (c) 2025 - Cowboy AI, Inc.
//! Abstract Resource Graph
//!
//! The builders never talk to a cloud API. They emit [`Resource`] nodes into
//! a [`ResourceGraph`] scoped to one network (or transit router) in one
//! (account, region) and hand the graph to the synthesis collaborator.
//!
//! # Identity
//!
//! Every node has a [`LogicalId`] derived only from configuration values,
//! so re-running a build against an unchanged configuration yields the same
//! identities. A [`ResourceRef`] qualifies a logical id with its account,
//! region and scope (the network or transit router that owns the graph) and
//! is the identity token other phases see through the output bus.
//!
//! # Invariants
//!
//! - Logical ids are unique within a graph
//! - Dependencies name nodes already present in the graph
//! - Insertion order is preserved (serialization is stable)

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use crate::domain::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("Resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency { resource: String, dependency: String },
}

/// Deterministic name of a node within one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LogicalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Account- and region-qualified identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub account_key: String,
    pub region: String,
    pub scope: String,
    pub logical_id: LogicalId,
}

impl ResourceRef {
    /// Token form used in output records: `account/region/scope/logical-id`
    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.account_key, self.region, self.scope, self.logical_id
        )
    }
}

/// Property value pointing at another node of the same graph
pub fn reference(id: &LogicalId) -> Value {
    json!({ "ref": id.as_str() })
}

/// One node of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(logical_id: impl Into<LogicalId>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: Map::new(),
            depends_on: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        if !self.depends_on.contains(id) {
            self.depends_on.push(id.clone());
        }
        self
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    /// Name tag, if one was assigned
    pub fn name(&self) -> Option<&str> {
        self.tags.get("Name").map(String::as_str)
    }
}

/// Insertion-ordered resource graph for one scope in one (account, region)
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGraph {
    account_key: String,
    region: String,
    scope: String,
    resources: Vec<Resource>,
    #[serde(skip)]
    index: HashMap<LogicalId, usize>,
}

impl ResourceGraph {
    pub fn new(
        account_key: impl Into<String>,
        region: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            account_key: account_key.into(),
            region: region.into(),
            scope: scope.into(),
            resources: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Add a node; returns its qualified identity
    pub fn add(&mut self, resource: Resource) -> Result<ResourceRef, GraphError> {
        if self.index.contains_key(&resource.logical_id) {
            return Err(GraphError::DuplicateLogicalId(resource.logical_id.to_string()));
        }
        if let Some(missing) = resource
            .depends_on
            .iter()
            .find(|dep| !self.index.contains_key(*dep))
        {
            return Err(GraphError::UnknownDependency {
                resource: resource.logical_id.to_string(),
                dependency: missing.to_string(),
            });
        }

        let reference = self.reference(&resource.logical_id);
        self.index
            .insert(resource.logical_id.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(reference)
    }

    pub fn reference(&self, id: &LogicalId) -> ResourceRef {
        ResourceRef {
            account_key: self.account_key.clone(),
            region: self.region.clone(),
            scope: self.scope.clone(),
            logical_id: id.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.index
            .get(&LogicalId::from(id))
            .map(|&i| &self.resources[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(&LogicalId::from(id))
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Logical ids in insertion order
    pub fn logical_ids(&self) -> impl Iterator<Item = &LogicalId> {
        self.resources.iter().map(|r| &r.logical_id)
    }
}
