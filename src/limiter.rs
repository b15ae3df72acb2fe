// Copyright (c) 2025 - Cowboy AI, Inc.
//! Quota Limiter
//!
//! Gates creation of rate-limited resources against per-account ceilings
//! supplied by the quota collaborator.
//!
//! ```text
//! try_reserve(account, kind, region?, discriminator?)
//!     │
//!     ├── no ceiling for (account, kind) ──────────────► true (unbounded)
//!     │
//!     └── counter[(account, kind, region, discriminator)]
//!             count < ceiling → count += 1 ─────────────► true
//!             count ≥ ceiling ──────────────────────────► false (skip creation)
//! ```
//!
//! Counters live for one process run. They are never decremented, reset or
//! persisted. `false` is never an error: callers skip the one creation and
//! log it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Rate-limited resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotaKind {
    #[serde(rename = "Amazon EC2/Number of EIPs")]
    Ec2Eips,
    #[serde(rename = "Amazon VPC/VPCs per Region")]
    VpcPerRegion,
    #[serde(rename = "Amazon VPC/Interface VPC endpoints per VPC")]
    VpcInterfaceEndpointsPerVpc,
    #[serde(rename = "AWS CloudFormation/Stack count")]
    CloudFormationStackCount,
    #[serde(rename = "AWS CloudFormation/Stack sets per administrator account")]
    CloudFormationStackSetPerAdmin,
    #[serde(rename = "AWS Organizations/Maximum accounts")]
    OrganizationsMaximumAccounts,
}

impl QuotaKind {
    /// (service code, quota code) of the platform quota
    pub fn codes(&self) -> (&'static str, &'static str) {
        match self {
            QuotaKind::Ec2Eips => ("ec2", "L-0263D0A3"),
            QuotaKind::VpcPerRegion => ("vpc", "L-F678F1CE"),
            QuotaKind::VpcInterfaceEndpointsPerVpc => ("vpc", "L-29B6F2EB"),
            QuotaKind::CloudFormationStackCount => ("cloudformation", "L-0485CB21"),
            QuotaKind::CloudFormationStackSetPerAdmin => ("cloudformation", "L-EC62D81A"),
            QuotaKind::OrganizationsMaximumAccounts => ("organizations", "L-29A0C5DF"),
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (service, quota) = self.codes();
        write!(f, "{}/{}", service, quota)
    }
}

/// Ceiling record supplied by the quota collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCeiling {
    pub account_key: String,
    #[serde(rename = "limitKey")]
    pub kind: QuotaKind,
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuotaKey {
    account_key: String,
    kind: QuotaKind,
    region: Option<String>,
    discriminator: Option<String>,
}

/// In-memory admission control shared by every build of a run
#[derive(Debug, Default)]
pub struct Limiter {
    ceilings: Vec<QuotaCeiling>,
    counters: Mutex<HashMap<QuotaKey, u32>>,
}

impl Limiter {
    pub fn new(ceilings: Vec<QuotaCeiling>) -> Self {
        Self {
            ceilings,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter with no ceilings; every reservation succeeds
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Ceiling for (account, kind); a region-specific record wins over a
    /// region-less one
    pub fn ceiling(&self, account_key: &str, kind: QuotaKind, region: Option<&str>) -> Option<u32> {
        let mut fallback = None;
        for c in self
            .ceilings
            .iter()
            .filter(|c| c.account_key == account_key && c.kind == kind)
        {
            if region.is_some() && c.region.as_deref() == region {
                return Some(c.value);
            }
            if c.region.is_none() && fallback.is_none() {
                fallback = Some(c.value);
            }
        }
        fallback
    }

    /// Reserve one unit; `false` means skip this creation
    pub fn try_reserve(
        &self,
        account_key: &str,
        kind: QuotaKind,
        region: Option<&str>,
        discriminator: Option<&str>,
    ) -> bool {
        let Some(ceiling) = self.ceiling(account_key, kind, region) else {
            return true;
        };

        let key = QuotaKey {
            account_key: account_key.to_string(),
            kind,
            region: region.map(str::to_string),
            discriminator: discriminator.map(str::to_string),
        };

        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let count = counters.entry(key).or_insert(0);
        if *count < ceiling {
            *count += 1;
            debug!(
                account = %account_key,
                quota = %kind,
                used = *count,
                ceiling,
                "Quota reserved"
            );
            true
        } else {
            warn!(
                account = %account_key,
                quota = %kind,
                region = region.unwrap_or("-"),
                discriminator = discriminator.unwrap_or("-"),
                ceiling,
                "Quota ceiling reached, skipping creation"
            );
            false
        }
    }

    /// Units reserved so far for the full tuple
    pub fn used(
        &self,
        account_key: &str,
        kind: QuotaKind,
        region: Option<&str>,
        discriminator: Option<&str>,
    ) -> u32 {
        let key = QuotaKey {
            account_key: account_key.to_string(),
            kind,
            region: region.map(str::to_string),
            discriminator: discriminator.map(str::to_string),
        };
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(&key).copied().unwrap_or(0)
    }
}
