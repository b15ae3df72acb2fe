// Copyright (c) 2025 - Cowboy AI, Inc.
//! Accounts, Organizational Units and the Landing-Zone Document
//!
//! Two inputs meet here:
//!
//! - [`LandingZoneConfig`]: the declarative document (account entries and
//!   organizational-unit entries, each optionally declaring networks and
//!   transit routers), already validated by the configuration collaborator.
//! - [`AccountDirectory`]: the account records (key → id, OU membership)
//!   supplied by the account-resolution collaborator.
//!
//! Both preserve declaration order; resolution and quota admission depend on it.

use serde::{Deserialize, Serialize};

use super::config::NetworkConfig;

/// Account record supplied by the account collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub key: String,
    pub id: String,
    /// Organizational unit the account is a member of
    #[serde(default, rename = "ou", skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
}

/// Ordered list of known accounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn get(&self, key: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.key == key)
    }

    pub fn id_of(&self, key: &str) -> Option<&str> {
        self.get(key).map(|a| a.id.as_str())
    }

    /// Members of an organizational unit, in directory order
    pub fn members_of<'a>(&'a self, ou: &'a str) -> impl Iterator<Item = &'a Account> + 'a {
        self.accounts
            .iter()
            .filter(move |a| a.organizational_unit.as_deref() == Some(ou))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Transit router declared under an account's deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransitRouterConfig {
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(default)]
    pub route_tables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployments {
    #[serde(default)]
    pub tgw: Vec<TransitRouterConfig>,
}

/// Account entry of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
    #[serde(default)]
    pub vpc: Vec<NetworkConfig>,
    #[serde(default)]
    pub deployments: Deployments,
    /// Opt-in networks of its organizational unit this account accepts
    #[serde(default, rename = "opt-in-vpcs")]
    pub opt_in_vpcs: Vec<String>,
}

impl AccountConfig {
    pub fn opts_into(&self, network_name: &str) -> bool {
        self.opt_in_vpcs.iter().any(|name| name == network_name)
    }
}

/// Organizational-unit entry of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnitConfig {
    pub key: String,
    #[serde(default)]
    pub vpc: Vec<NetworkConfig>,
}

/// Root of the landing-zone configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LandingZoneConfig {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub organizational_units: Vec<OrganizationalUnitConfig>,
}

impl LandingZoneConfig {
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    pub fn account(&self, key: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.key == key)
    }

    /// Transit routers in declaration order, paired with the owning account key
    pub fn transit_routers(&self) -> impl Iterator<Item = (&str, &TransitRouterConfig)> {
        self.accounts
            .iter()
            .flat_map(|a| a.deployments.tgw.iter().map(move |t| (a.key.as_str(), t)))
    }
}
