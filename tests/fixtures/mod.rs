// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-landing-zone
//!
//! Deterministic landing-zone documents and account directories shared by the
//! integration tests. Timestamps are fixed so records compare equal across
//! runs.
//!
//! The reference landing zone:
//!
//! ```text
//! shared-network  (core)  transit router Main; builds Central (declared by OU core)
//! perimeter       (core)  Perimeter, internet facing, peered with Central
//! dev             (Dev)   Dev, attached to Main from another account
//! dev2            (Dev)   consumer of Central's Web subnets and of Dev's App subnets
//! ```

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use cim_landing_zone::domain::{AccountDirectory, LandingZoneConfig};
use cim_landing_zone::limiter::{QuotaCeiling, QuotaKind};
use cim_landing_zone::output_bus::OutputBus;
use cim_landing_zone::phase::Phase;
use cim_landing_zone::resolve::{resolve, ResolvedNetwork};
use cim_landing_zone::topology::BuildContext;
use cim_landing_zone::Limiter;

pub const REGION: &str = "ca-central-1";

pub const SHARED_NETWORK_ID: &str = "111111111111";
pub const DEV_ID: &str = "222222222222";
pub const DEV2_ID: &str = "333333333333";
pub const PERIMETER_ID: &str = "444444444444";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn accounts() -> AccountDirectory {
    serde_json::from_value(json!([
        {"key": "shared-network", "id": SHARED_NETWORK_ID, "ou": "core"},
        {"key": "perimeter", "id": PERIMETER_ID, "ou": "core"},
        {"key": "dev", "id": DEV_ID, "ou": "Dev"},
        {"key": "dev2", "id": DEV2_ID, "ou": "Dev"}
    ]))
    .expect("Invalid account fixture")
}

pub fn central_network() -> Value {
    json!({
        "name": "Central",
        "region": REGION,
        "deploy": "shared-network",
        "cidr": "10.2.0.0/16",
        "route-tables": [
            {"name": "default"},
            {"name": "Central_Shared", "routes": [
                {"destination": "0.0.0.0/0", "target": "TGW"},
                {"destination": {"account": "perimeter", "vpc": "Perimeter", "subnet": "Public"}, "target": "pcx"}
            ]}
        ],
        "subnets": [
            {"name": "TGW", "definitions": [
                {"az": "a", "cidr": "10.2.88.0/27", "route-table": "default"},
                {"az": "b", "cidr": "10.2.88.32/27", "route-table": "default"},
                {"az": "d", "cidr": "10.2.88.64/27", "route-table": "default", "disabled": true}
            ]},
            {"name": "Web", "share-to-specific-accounts": ["dev", "dev2"], "definitions": [
                {"az": "a", "cidr": "10.2.32.0/20", "route-table": "Central_Shared"},
                {"az": "b", "cidr": "10.2.128.0/20", "route-table": "Central_Shared"}
            ]}
        ],
        "security-groups": [{
            "name": "Web",
            "inbound-rules": [{
                "description": "TLS",
                "tcp-ports": [443],
                "source": ["10.0.0.0/8", "2001:db8::/32"]
            }]
        }],
        "tgw-attach": {
            "associate-to-tgw": "Main",
            "account": "shared-network",
            "tgw-rt-associate": ["shared"],
            "tgw-rt-propagate": ["core", "shared"],
            "attach-subnets": ["TGW"]
        },
        "pcx": {
            "source": "perimeter",
            "source-vpc": "Perimeter",
            "source-subnets": "Public",
            "local-subnets": "Web"
        }
    })
}

pub fn perimeter_network() -> Value {
    json!({
        "name": "Perimeter",
        "region": REGION,
        "deploy": "local",
        "cidr": "100.96.250.0/23",
        "igw": true,
        "route-tables": [
            {"name": "Public_Shared", "routes": [{"destination": "0.0.0.0/0", "target": "IGW"}]}
        ],
        "subnets": [
            {"name": "Public", "definitions": [
                {"az": "a", "cidr": "100.96.250.0/26", "route-table": "Public_Shared"},
                {"az": "b", "cidr": "100.96.250.64/26", "route-table": "Public_Shared"}
            ]}
        ]
    })
}

pub fn dev_network() -> Value {
    json!({
        "name": "Dev",
        "region": REGION,
        "deploy": "dev",
        "cidr": "10.3.0.0/16",
        "route-tables": [
            {"name": "Dev_Shared", "routes": [{"destination": "10.0.0.0/8", "target": "TGW"}]}
        ],
        "subnets": [
            {"name": "App", "share-to-ou-accounts": true, "definitions": [
                {"az": "a", "cidr": "10.3.32.0/20", "route-table": "Dev_Shared"},
                {"az": "b", "cidr": "10.3.128.0/20", "route-table": "Dev_Shared"}
            ]}
        ],
        "tgw-attach": {
            "associate-to-tgw": "Main",
            "account": "shared-network",
            "tgw-rt-associate": ["standalone"],
            "tgw-rt-propagate": ["core"],
            "blackhole-route": true,
            "attach-subnets": ["App"]
        }
    })
}

pub fn landing_zone_document() -> Value {
    json!({
        "accounts": [
            {
                "key": "shared-network",
                "ou": "core",
                "deployments": {"tgw": [{
                    "name": "Main",
                    "region": REGION,
                    "asn": 65521,
                    "route-tables": ["core", "segregated", "shared", "standalone"]
                }]}
            },
            {"key": "perimeter", "ou": "core", "vpc": [perimeter_network()]}
        ],
        "organizational-units": [
            {"key": "core", "vpc": [central_network()]},
            {"key": "Dev", "vpc": [dev_network()]}
        ]
    })
}

pub fn landing_zone() -> LandingZoneConfig {
    serde_json::from_value(landing_zone_document()).expect("Invalid landing-zone fixture")
}

/// A document declaring `network` under the `shared-network` account
pub fn single_network(network: Value) -> LandingZoneConfig {
    serde_json::from_value(json!({
        "accounts": [{"key": "shared-network", "ou": "core", "vpc": [network]}]
    }))
    .expect("Invalid network fixture")
}

pub fn ceiling(account: &str, kind: QuotaKind, value: u32) -> QuotaCeiling {
    QuotaCeiling {
        account_key: account.to_string(),
        kind,
        value,
        region: None,
    }
}

/// Everything a direct `build` call borrows
pub struct Harness {
    pub accounts: AccountDirectory,
    pub resolved: Vec<ResolvedNetwork>,
    pub limiter: Limiter,
    pub bus: OutputBus,
}

impl Harness {
    pub fn new(config: &LandingZoneConfig) -> Self {
        Self::with_limiter(config, Limiter::unbounded())
    }

    pub fn with_limiter(config: &LandingZoneConfig, limiter: Limiter) -> Self {
        let accounts = accounts();
        let resolved = resolve(config, &accounts);
        Self {
            accounts,
            resolved,
            limiter,
            bus: OutputBus::new(),
        }
    }

    pub fn context(&self, phase: Phase) -> BuildContext<'_> {
        BuildContext {
            limiter: &self.limiter,
            bus: &self.bus,
            accounts: &self.accounts,
            resolved: &self.resolved,
            phase,
            recorded_at: fixed_timestamp(),
        }
    }

    pub fn network(&self, account: &str, name: &str) -> &ResolvedNetwork {
        cim_landing_zone::resolve::find(&self.resolved, account, name)
            .expect("network not resolved")
    }
}
