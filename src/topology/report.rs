// Copyright (c) 2025 - Cowboy AI, Inc.
//! Per-unit build report
//!
//! A run reports, per network (or transit router), which subsystems
//! succeeded, were skipped or failed, plus the non-fatal warnings raised
//! along the way.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Build step a status or warning belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subsystem {
    Admission,
    Validation,
    AddressSpace,
    Gateways,
    RouteTables,
    Subnets,
    NatGateways,
    Routes,
    GatewayEndpoints,
    InterfaceEndpoints,
    SecurityGroups,
    NetworkAcls,
    Sharing,
    TransitAttachment,
    TransitRouter,
    DeferredAttachments,
    SharedSecurityGroups,
    Peering,
    PeeringRoutes,
    /// The task running the unit panicked or was cancelled
    Execution,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::Admission => "admission",
            Subsystem::Validation => "validation",
            Subsystem::AddressSpace => "address-space",
            Subsystem::Gateways => "gateways",
            Subsystem::RouteTables => "route-tables",
            Subsystem::Subnets => "subnets",
            Subsystem::NatGateways => "nat-gateways",
            Subsystem::Routes => "routes",
            Subsystem::GatewayEndpoints => "gateway-endpoints",
            Subsystem::InterfaceEndpoints => "interface-endpoints",
            Subsystem::SecurityGroups => "security-groups",
            Subsystem::NetworkAcls => "network-acls",
            Subsystem::Sharing => "sharing",
            Subsystem::TransitAttachment => "transit-attachment",
            Subsystem::TransitRouter => "transit-router",
            Subsystem::DeferredAttachments => "deferred-attachments",
            Subsystem::SharedSecurityGroups => "shared-security-groups",
            Subsystem::Peering => "peering",
            Subsystem::PeeringRoutes => "peering-routes",
            Subsystem::Execution => "execution",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum SubsystemStatus {
    Succeeded,
    Skipped(String),
    Failed(String),
}

/// Non-fatal condition: cross-phase unavailability, quota exhaustion or a
/// reference that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildWarning {
    pub subsystem: Subsystem,
    pub message: String,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.subsystem, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkReport {
    pub account_key: String,
    pub region: String,
    /// Network name, or transit router name for router units
    pub network: String,
    pub subsystems: Vec<(Subsystem, SubsystemStatus)>,
    pub warnings: Vec<BuildWarning>,
}

impl NetworkReport {
    pub fn new(
        account_key: impl Into<String>,
        region: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            account_key: account_key.into(),
            region: region.into(),
            network: network.into(),
            subsystems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a status; a later status for the same subsystem replaces the
    /// earlier one unless the earlier one failed
    pub fn set(&mut self, subsystem: Subsystem, status: SubsystemStatus) {
        match self.subsystems.iter_mut().find(|(s, _)| *s == subsystem) {
            Some((_, SubsystemStatus::Failed(_))) => {}
            Some((_, existing)) => *existing = status,
            None => self.subsystems.push((subsystem, status)),
        }
    }

    pub fn succeeded(&mut self, subsystem: Subsystem) {
        self.set(subsystem, SubsystemStatus::Succeeded);
    }

    pub fn skipped(&mut self, subsystem: Subsystem, reason: impl Into<String>) {
        self.set(subsystem, SubsystemStatus::Skipped(reason.into()));
    }

    pub fn failed(&mut self, subsystem: Subsystem, reason: impl Into<String>) {
        self.set(subsystem, SubsystemStatus::Failed(reason.into()));
    }

    /// Record and log a warning
    pub fn warn(&mut self, subsystem: Subsystem, message: impl Into<String>) {
        let message = message.into();
        warn!(
            account = %self.account_key,
            region = %self.region,
            network = %self.network,
            subsystem = %subsystem,
            "{}",
            message
        );
        self.warnings.push(BuildWarning { subsystem, message });
    }

    pub fn status(&self, subsystem: Subsystem) -> Option<&SubsystemStatus> {
        self.subsystems
            .iter()
            .find(|(s, _)| *s == subsystem)
            .map(|(_, status)| status)
    }

    pub fn has_failures(&self) -> bool {
        self.subsystems
            .iter()
            .any(|(_, status)| matches!(status, SubsystemStatus::Failed(_)))
    }

    pub fn warnings_for(&self, subsystem: Subsystem) -> impl Iterator<Item = &BuildWarning> {
        self.warnings.iter().filter(move |w| w.subsystem == subsystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_sticky() {
        let mut report = NetworkReport::new("dev", "ca-central-1", "Dev");
        report.failed(Subsystem::Subnets, "route table 'X' is not declared");
        report.succeeded(Subsystem::Subnets);
        assert!(report.has_failures());
        assert!(matches!(
            report.status(Subsystem::Subnets),
            Some(SubsystemStatus::Failed(_))
        ));
    }

    #[test]
    fn test_skip_replaced_by_success() {
        let mut report = NetworkReport::new("dev", "ca-central-1", "Dev");
        report.skipped(Subsystem::Sharing, "no consumers");
        report.succeeded(Subsystem::Sharing);
        assert_eq!(report.status(Subsystem::Sharing), Some(&SubsystemStatus::Succeeded));
    }

    #[test]
    fn test_warnings_are_collected() {
        let mut report = NetworkReport::new("dev", "ca-central-1", "Dev");
        report.warn(Subsystem::TransitAttachment, "transit router 'Main' not found");
        assert_eq!(report.warnings_for(Subsystem::TransitAttachment).count(), 1);
        assert_eq!(
            report.warnings[0].to_string(),
            "[transit-attachment] transit router 'Main' not found"
        );
    }
}
