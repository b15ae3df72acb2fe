// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resolved Configuration View
//!
//! Flattens the account / organizational-unit hierarchy into one
//! [`ResolvedNetwork`] per physical deployment target.
//!
//! ```text
//! accounts[i].vpc[j]                        ──► (account i, -, vpc j)
//! organizational-units[k].vpc[j] deploy=local ─► (member m, ou k, vpc j) for every member m
//! organizational-units[k].vpc[j] deploy=acct  ─► (acct, ou k, vpc j)
//! ```
//!
//! A local network marked `opt-in` skips members whose account entry does not
//! list it under `opt-in-vpcs`.
//!
//! Output order is declaration order (accounts first, then organizational
//! units, members in account-directory order). Quota admission depends on it.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{AccountDirectory, DeployTarget, LandingZoneConfig, NetworkConfig};

/// One network instantiated in one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub account_key: String,
    pub ou_key: Option<String>,
    pub network: Arc<NetworkConfig>,
}

impl ResolvedNetwork {
    pub fn name(&self) -> &str {
        &self.network.name
    }

    pub fn region(&self) -> &str {
        &self.network.region
    }

    /// Organizational unit that owns the network: the declaring unit, or the
    /// account's own unit for account-level declarations
    pub fn owning_ou<'a>(&'a self, accounts: &'a AccountDirectory) -> Option<&'a str> {
        self.ou_key.as_deref().or_else(|| {
            accounts
                .get(&self.account_key)
                .and_then(|a| a.organizational_unit.as_deref())
        })
    }
}

/// Resolve every declared network to its deployment targets
pub fn resolve(config: &LandingZoneConfig, accounts: &AccountDirectory) -> Vec<ResolvedNetwork> {
    let mut resolved = Vec::new();

    for account in &config.accounts {
        if account.vpc.is_empty() {
            debug!(account = %account.key, "Account declares no networks");
            continue;
        }
        for network in &account.vpc {
            resolved.push(ResolvedNetwork {
                account_key: account.key.clone(),
                ou_key: None,
                network: Arc::new(network.clone()),
            });
        }
    }

    for ou in &config.organizational_units {
        if ou.vpc.is_empty() {
            debug!(ou = %ou.key, "Organizational unit declares no networks");
            continue;
        }
        for network in &ou.vpc {
            let shared = Arc::new(network.clone());
            match &network.deploy {
                DeployTarget::Local => {
                    let mut members = accounts.members_of(&ou.key).peekable();
                    if members.peek().is_none() {
                        warn!(
                            ou = %ou.key,
                            network = %network.name,
                            "Network deploys locally but the organizational unit has no accounts"
                        );
                    }
                    for member in members {
                        if network.opt_in
                            && !config
                                .account(&member.key)
                                .is_some_and(|account| account.opts_into(&network.name))
                        {
                            debug!(
                                account = %member.key,
                                network = %network.name,
                                "Account did not opt into network"
                            );
                            continue;
                        }
                        resolved.push(ResolvedNetwork {
                            account_key: member.key.clone(),
                            ou_key: Some(ou.key.clone()),
                            network: Arc::clone(&shared),
                        });
                    }
                }
                DeployTarget::Account(account_key) => resolved.push(ResolvedNetwork {
                    account_key: account_key.clone(),
                    ou_key: Some(ou.key.clone()),
                    network: shared,
                }),
            }
        }
    }

    debug!(count = resolved.len(), "Resolved networks");
    resolved
}

/// Lookup of a resolved network by (account, network name)
pub fn find<'a>(
    resolved: &'a [ResolvedNetwork],
    account_key: &str,
    network_name: &str,
) -> Option<&'a ResolvedNetwork> {
    resolved
        .iter()
        .find(|r| r.account_key == account_key && r.network.name == network_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn network(name: &str, deploy: &str) -> serde_json::Value {
        json!({"name": name, "region": "ca-central-1", "deploy": deploy, "cidr": "10.0.0.0/16"})
    }

    fn directory() -> AccountDirectory {
        serde_json::from_value(json!([
            {"key": "shared-network", "id": "111111111111", "ou": "core"},
            {"key": "dev", "id": "222222222222", "ou": "Dev"},
            {"key": "dev2", "id": "333333333333", "ou": "Dev"}
        ]))
        .unwrap()
    }

    fn targets(resolved: &[ResolvedNetwork]) -> Vec<(String, Option<String>, String)> {
        resolved
            .iter()
            .map(|r| (r.account_key.clone(), r.ou_key.clone(), r.network.name.clone()))
            .collect()
    }

    #[test]
    fn test_local_expands_per_member_and_explicit_is_single() {
        let config: LandingZoneConfig = serde_json::from_value(json!({
            "accounts": [
                {"key": "shared-network", "vpc": [network("Endpoint", "local")]},
                {"key": "dev"}
            ],
            "organizational-units": [
                {"key": "core", "vpc": [network("Central", "shared-network")]},
                {"key": "Dev", "vpc": [network("Dev", "local")]},
                {"key": "Sandbox"}
            ]
        }))
        .unwrap();

        let resolved = resolve(&config, &directory());
        assert_eq!(
            targets(&resolved),
            vec![
                ("shared-network".to_string(), None, "Endpoint".to_string()),
                ("shared-network".to_string(), Some("core".to_string()), "Central".to_string()),
                ("dev".to_string(), Some("Dev".to_string()), "Dev".to_string()),
                ("dev2".to_string(), Some("Dev".to_string()), "Dev".to_string()),
            ]
        );
        assert!(Arc::ptr_eq(&resolved[2].network, &resolved[3].network));
    }

    #[test]
    fn test_opt_in_network_deploys_only_to_accounts_that_ask() {
        let mut sandbox = network("Sandbox", "local");
        sandbox["opt-in"] = json!(true);
        let config: LandingZoneConfig = serde_json::from_value(json!({
            "accounts": [
                {"key": "dev", "opt-in-vpcs": ["Sandbox"]},
                {"key": "dev2", "opt-in-vpcs": ["Other"]}
            ],
            "organizational-units": [
                {"key": "Dev", "vpc": [sandbox, network("Dev", "local")]}
            ]
        }))
        .unwrap();

        let resolved = resolve(&config, &directory());
        assert_eq!(
            targets(&resolved),
            vec![
                ("dev".to_string(), Some("Dev".to_string()), "Sandbox".to_string()),
                ("dev".to_string(), Some("Dev".to_string()), "Dev".to_string()),
                ("dev2".to_string(), Some("Dev".to_string()), "Dev".to_string()),
            ]
        );
    }

    #[test]
    fn test_opt_in_skips_members_without_an_account_entry() {
        let mut sandbox = network("Sandbox", "local");
        sandbox["opt-in"] = json!(true);
        let config: LandingZoneConfig = serde_json::from_value(json!({
            "organizational-units": [{"key": "Dev", "vpc": [sandbox]}]
        }))
        .unwrap();
        assert!(resolve(&config, &directory()).is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config: LandingZoneConfig = serde_json::from_value(json!({
            "organizational-units": [{"key": "Dev", "vpc": [network("Dev", "local")]}]
        }))
        .unwrap();
        let dir = directory();
        assert_eq!(targets(&resolve(&config, &dir)), targets(&resolve(&config, &dir)));
    }

    #[test]
    fn test_owning_ou_falls_back_to_account_membership() {
        let config: LandingZoneConfig = serde_json::from_value(json!({
            "accounts": [{"key": "dev", "vpc": [network("Dev", "local")]}]
        }))
        .unwrap();
        let dir = directory();
        let resolved = resolve(&config, &dir);
        assert_eq!(resolved[0].owning_ou(&dir), Some("Dev"));
        assert!(find(&resolved, "dev", "Dev").is_some());
    }
}
