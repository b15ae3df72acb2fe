// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for persisted output records
//!
//! # Subject Pattern
//!
//! Every output record is published on:
//!
//! ```text
//! landing-zone.outputs.{account}.{region}.{output_type}
//! ```
//!
//! This allows for:
//! - Precise replays (`landing-zone.outputs.shared-network.ca-central-1.vpc`)
//! - Per-account filters (`landing-zone.outputs.shared-network.>`)
//! - Per-type filters across accounts (`landing-zone.outputs.*.*.tgw`)
//! - Full replays (`landing-zone.outputs.>`)
//!
//! # Examples
//!
//! ```rust
//! use cim_landing_zone::output_bus::OutputType;
//! use cim_landing_zone::subjects::SubjectBuilder;
//!
//! let subject = SubjectBuilder::new()
//!     .account("shared-network")
//!     .region("ca-central-1")
//!     .output_type(OutputType::Network)
//!     .build();
//! assert_eq!(subject, "landing-zone.outputs.shared-network.ca-central-1.vpc");
//!
//! let by_type = SubjectBuilder::new().output_type(OutputType::TransitRouter).build();
//! assert_eq!(by_type, "landing-zone.outputs.*.*.tgw");
//! ```

use crate::output_bus::{OutputFilter, OutputType};

/// Root namespace for all landing-zone subjects
pub const LANDING_ZONE_ROOT: &str = "landing-zone";

/// Second token for output records
pub const OUTPUTS_TOKEN: &str = "outputs";

/// Replace characters NATS reserves inside a subject token
pub fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Builder for output record subjects
///
/// Unset tokens become single-token wildcards.
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder {
    account: Option<String>,
    region: Option<String>,
    output_type: Option<OutputType>,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: &str) -> Self {
        self.account = Some(sanitize_token(account));
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = Some(sanitize_token(region));
        self
    }

    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    /// Subject matching an [`OutputFilter`]
    pub fn from_filter(filter: &OutputFilter) -> Self {
        let mut builder = Self::new();
        if let Some(account) = &filter.account_key {
            builder = builder.account(account);
        }
        if let Some(region) = &filter.region {
            builder = builder.region(region);
        }
        if let Some(output_type) = filter.output_type {
            builder = builder.output_type(output_type);
        }
        builder
    }

    pub fn build(self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            LANDING_ZONE_ROOT,
            OUTPUTS_TOKEN,
            self.account.as_deref().unwrap_or("*"),
            self.region.as_deref().unwrap_or("*"),
            self.output_type.map(|t| t.as_str()).unwrap_or("*"),
        )
    }

    /// Returns: `landing-zone.outputs.>`
    pub fn build_all() -> String {
        format!("{}.{}.>", LANDING_ZONE_ROOT, OUTPUTS_TOKEN)
    }
}
