// Copyright (c) 2025 - Cowboy AI, Inc.
//! Phase Runner
//!
//! A deployment runs as an ordered sequence of phases. Each phase reads the
//! output bus as left by the earlier phases and appends its own records:
//!
//! ```text
//! 0 transit-routers  router owners        TransitRouterOutput
//! 1 networks         every network        NetworkOutput, AttachmentOutput, tag requests
//! 2 cross-account    router owners        deferred associations / propagations
//!                    networks with pcx    PeeringOutput
//!                    shared networks      security-group copies, SecurityGroupIndexOutput
//! 3 peering-routes   networks with pcx routes
//! ```
//!
//! # Concurrency
//!
//! Units are grouped by (account, region). Groups run concurrently on the
//! blocking pool; the units of one group run sequentially in declaration
//! order. Records staged by the units are appended to the bus once every
//! group has finished, in declaration order, and only for units that
//! succeeded, so a phase never observes its own records.
//!
//! Network admission (`VpcPerRegion`) is decided up front, in declaration
//! order, so quota outcomes do not depend on scheduling.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::domain::{AccountDirectory, LandingZoneConfig, TransitRouterConfig};
use crate::errors::{LandingZoneError, LandingZoneResult};
use crate::limiter::{Limiter, QuotaKind};
use crate::output_bus::{OutputBus, OutputRecord};
use crate::resolve::{resolve, ResolvedNetwork};
use crate::topology::graph::ResourceGraph;
use crate::topology::report::{NetworkReport, Subsystem};
use crate::topology::{self, peering, sharing, transit_gateway, BuildContext, UnitOutcome};

/// Ordered deployment phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    TransitRouters = 0,
    Networks = 1,
    CrossAccount = 2,
    PeeringRoutes = 3,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::TransitRouters,
        Phase::Networks,
        Phase::CrossAccount,
        Phase::PeeringRoutes,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::TransitRouters => "transit-routers",
            Phase::Networks => "networks",
            Phase::CrossAccount => "cross-account",
            Phase::PeeringRoutes => "peering-routes",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown phase: {0} (expected 0-3 or a phase name)")]
pub struct PhaseParseError(pub String);

impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Phase::ALL
            .into_iter()
            .find(|phase| s == phase.as_str() || s == phase.number().to_string())
            .ok_or_else(|| PhaseParseError(s.to_string()))
    }
}

/// Inputs shared by every phase of a run
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub config: Arc<LandingZoneConfig>,
    pub accounts: Arc<AccountDirectory>,
    pub resolved: Arc<Vec<ResolvedNetwork>>,
    pub limiter: Arc<Limiter>,
    /// Timestamp stamped on every record of the run
    pub recorded_at: DateTime<Utc>,
}

impl PhaseContext {
    pub fn new(
        config: LandingZoneConfig,
        accounts: AccountDirectory,
        limiter: Limiter,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let resolved = resolve(&config, &accounts);
        Self {
            config: Arc::new(config),
            accounts: Arc::new(accounts),
            resolved: Arc::new(resolved),
            limiter: Arc::new(limiter),
            recorded_at,
        }
    }
}

/// A unit whose work failed; siblings are unaffected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub account_key: String,
    pub region: String,
    pub network: String,
    pub message: String,
    /// True for configuration errors, which fail the run
    pub configuration: bool,
}

#[derive(Debug, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub reports: Vec<NetworkReport>,
    pub graphs: Vec<ResourceGraph>,
    pub failures: Vec<UnitFailure>,
    /// Records appended to the bus by this phase
    pub recorded: usize,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            reports: Vec::new(),
            graphs: Vec::new(),
            failures: Vec::new(),
            recorded: 0,
        }
    }

    pub fn has_configuration_errors(&self) -> bool {
        self.failures.iter().any(|f| f.configuration)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn report_for(&self, account_key: &str, network: &str) -> Option<&NetworkReport> {
        self.reports
            .iter()
            .find(|r| r.account_key == account_key && r.network == network)
    }
}

/// One piece of phase work
#[derive(Debug, Clone)]
enum Unit {
    TransitRouter { owner: String, config: TransitRouterConfig },
    Network(ResolvedNetwork),
    DeferredAttachments { owner: String, region: String },
    Peering(ResolvedNetwork),
    SharedSecurityGroups(ResolvedNetwork),
    PeeringRoutes(ResolvedNetwork),
}

impl Unit {
    fn group_key(&self) -> (String, String) {
        match self {
            Unit::TransitRouter { owner, config } => (owner.clone(), config.region.clone()),
            Unit::DeferredAttachments { owner, region } => (owner.clone(), region.clone()),
            Unit::Network(r) | Unit::Peering(r) | Unit::SharedSecurityGroups(r) | Unit::PeeringRoutes(r) => {
                (r.account_key.clone(), r.region().to_string())
            }
        }
    }

    /// (account, region, name) identifying the unit in reports
    fn label(&self) -> UnitLabel {
        match self {
            Unit::TransitRouter { owner, config } => {
                (owner.clone(), config.region.clone(), config.name.clone())
            }
            Unit::DeferredAttachments { owner, region } => (
                owner.clone(),
                region.clone(),
                transit_gateway::DEFERRED_ATTACHMENT_SCOPE.to_string(),
            ),
            Unit::Network(r) | Unit::Peering(r) | Unit::SharedSecurityGroups(r) | Unit::PeeringRoutes(r) => {
                (r.account_key.clone(), r.region().to_string(), r.name().to_string())
            }
        }
    }

    fn run(&self, ctx: &BuildContext<'_>) -> Result<UnitOutcome, (LandingZoneError, NetworkReport)> {
        let wrap = |result: LandingZoneResult<UnitOutcome>, subsystem: Subsystem| {
            result.map_err(|e| {
                let (account, region, name) = self.label();
                let mut report = NetworkReport::new(account, region, name);
                report.failed(subsystem, e.to_string());
                (e, report)
            })
        };
        match self {
            Unit::TransitRouter { owner, config } => wrap(
                transit_gateway::create_transit_router(owner, config, ctx),
                Subsystem::TransitRouter,
            ),
            Unit::Network(resolved) => topology::build(resolved, ctx)
                .map(topology::NetworkHandle::into_outcome)
                .map_err(|failure| (failure.error, failure.report)),
            Unit::DeferredAttachments { owner, region } => wrap(
                transit_gateway::apply_deferred_attachments(owner, region, ctx),
                Subsystem::DeferredAttachments,
            ),
            Unit::Peering(resolved) => wrap(peering::create_connection(resolved, ctx), Subsystem::Peering),
            Unit::SharedSecurityGroups(resolved) => wrap(
                sharing::share_security_groups(resolved, ctx),
                Subsystem::SharedSecurityGroups,
            ),
            Unit::PeeringRoutes(resolved) => {
                wrap(peering::create_routes(resolved, ctx), Subsystem::PeeringRoutes)
            }
        }
    }
}

/// Units of a phase in declaration order, plus the reports of networks
/// refused admission
fn plan(phase: Phase, ctx: &PhaseContext) -> (Vec<Unit>, Vec<NetworkReport>) {
    let mut units = Vec::new();
    let mut refused = Vec::new();

    match phase {
        Phase::TransitRouters => {
            for (owner, config) in ctx.config.transit_routers() {
                units.push(Unit::TransitRouter {
                    owner: owner.to_string(),
                    config: config.clone(),
                });
            }
        }
        Phase::Networks => {
            for resolved in ctx.resolved.iter() {
                if ctx.limiter.try_reserve(
                    &resolved.account_key,
                    QuotaKind::VpcPerRegion,
                    Some(resolved.region()),
                    None,
                ) {
                    units.push(Unit::Network(resolved.clone()));
                } else {
                    let mut report =
                        NetworkReport::new(&resolved.account_key, resolved.region(), resolved.name());
                    report.skipped(Subsystem::Admission, "VPC quota reached for the region");
                    warn!(
                        account = %resolved.account_key,
                        region = %resolved.region(),
                        network = %resolved.name(),
                        "Network not admitted, VPC quota reached"
                    );
                    refused.push(report);
                }
            }
        }
        Phase::CrossAccount => {
            for (owner, config) in ctx.config.transit_routers() {
                let unit = Unit::DeferredAttachments {
                    owner: owner.to_string(),
                    region: config.region.clone(),
                };
                if !units.iter().any(|u: &Unit| u.group_key() == unit.group_key()) {
                    units.push(unit);
                }
            }
            for resolved in ctx.resolved.iter() {
                if resolved.network.pcx.is_some() {
                    units.push(Unit::Peering(resolved.clone()));
                }
                if resolved.network.has_shared_subnets() && !resolved.network.security_groups.is_empty() {
                    units.push(Unit::SharedSecurityGroups(resolved.clone()));
                }
            }
        }
        Phase::PeeringRoutes => {
            for resolved in ctx.resolved.iter() {
                let has_peering_routes = resolved
                    .network
                    .route_tables
                    .iter()
                    .flat_map(|t| t.routes.iter())
                    .any(|r| r.target == crate::domain::RouteTarget::Peering);
                if has_peering_routes {
                    units.push(Unit::PeeringRoutes(resolved.clone()));
                }
            }
        }
    }

    (units, refused)
}

/// Group units by (account, region), keeping first-seen group order
fn group(units: Vec<Unit>) -> Vec<Vec<Unit>> {
    let mut keys: Vec<(String, String)> = Vec::new();
    let mut groups: Vec<Vec<Unit>> = Vec::new();
    for unit in units {
        let key = unit.group_key();
        match keys.iter().position(|k| *k == key) {
            Some(i) => groups[i].push(unit),
            None => {
                keys.push(key);
                groups.push(vec![unit]);
            }
        }
    }
    groups
}

type UnitResult = Result<UnitOutcome, (LandingZoneError, NetworkReport)>;

fn run_group(units: Vec<Unit>, phase: Phase, ctx: PhaseContext, bus: Arc<OutputBus>) -> Vec<UnitResult> {
    let build_ctx = BuildContext {
        limiter: &ctx.limiter,
        bus: &bus,
        accounts: &ctx.accounts,
        resolved: &ctx.resolved,
        phase,
        recorded_at: ctx.recorded_at,
    };
    units.iter().map(|unit| unit.run(&build_ctx)).collect()
}

/// Run one phase to completion
///
/// Every unit runs even when siblings fail. Successful units' records are
/// appended to `bus`; persisting the bus is left to the caller.
pub async fn run_phase(phase: Phase, ctx: &PhaseContext, bus: Arc<OutputBus>) -> LandingZoneResult<PhaseReport> {
    let (units, refused) = plan(phase, ctx);
    let mut report = PhaseReport::new(phase);
    report.reports.extend(refused);
    info!(phase = %phase, units = units.len(), "Running phase");

    let groups = group(units);
    let labels: Vec<Vec<UnitLabel>> = groups
        .iter()
        .map(|units| units.iter().map(Unit::label).collect())
        .collect();
    let tasks = groups.into_iter().map(|units| {
        let ctx = ctx.clone();
        let bus = Arc::clone(&bus);
        tokio::task::spawn_blocking(move || run_group(units, phase, ctx, bus))
    });
    let joined = join_all(tasks).await;

    settle(phase, labels.into_iter().zip(joined), &bus, &mut report);
    info!(
        phase = %phase,
        units = report.reports.len(),
        failures = report.failures.len(),
        warnings = report.warning_count(),
        recorded = report.recorded,
        "Phase complete"
    );
    Ok(report)
}

type UnitLabel = (String, String, String);

/// Fold group results into the report and append the staged records
///
/// A group whose task died fails each of its units; the other groups'
/// records still reach the bus.
fn settle(
    phase: Phase,
    groups: impl IntoIterator<Item = (Vec<UnitLabel>, Result<Vec<UnitResult>, JoinError>)>,
    bus: &OutputBus,
    report: &mut PhaseReport,
) {
    let mut staged: Vec<OutputRecord> = Vec::new();
    for (labels, joined) in groups {
        let results = match joined {
            Ok(results) => results,
            Err(join_error) => {
                let error = LandingZoneError::Task(join_error.to_string());
                for (account, region, name) in labels {
                    let mut unit_report = NetworkReport::new(account, region, name);
                    unit_report.failed(Subsystem::Execution, error.to_string());
                    record_failure(phase, &error, unit_report, report);
                }
                continue;
            }
        };
        for result in results {
            match result {
                Ok(outcome) => {
                    staged.extend(outcome.outputs);
                    report.graphs.extend(outcome.graphs);
                    report.reports.push(outcome.report);
                }
                Err((error, unit_report)) => record_failure(phase, &error, unit_report, report),
            }
        }
    }

    report.recorded = staged.len();
    bus.append_all(staged);
}

fn record_failure(phase: Phase, error: &LandingZoneError, unit_report: NetworkReport, report: &mut PhaseReport) {
    error!(
        phase = %phase,
        account = %unit_report.account_key,
        network = %unit_report.network,
        error = %error,
        "Unit failed"
    );
    report.failures.push(UnitFailure {
        account_key: unit_report.account_key.clone(),
        region: unit_report.region.clone(),
        network: unit_report.network.clone(),
        message: error.to_string(),
        configuration: matches!(error, LandingZoneError::Configuration(_)),
    });
    report.reports.push(unit_report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_bus::TransitRouterOutput;
    use crate::topology::graph::GraphError;
    use crate::topology::report::SubsystemStatus;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test_case("0", Phase::TransitRouters ; "number")]
    #[test_case("networks", Phase::Networks ; "name")]
    #[test_case(" cross-account ", Phase::CrossAccount ; "trimmed")]
    #[test_case("3", Phase::PeeringRoutes ; "last")]
    fn test_phase_parse(raw: &str, expected: Phase) {
        assert_eq!(raw.parse::<Phase>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_phase_rejected() {
        assert!("4".parse::<Phase>().is_err());
        assert!("deploy".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serde() {
        assert_eq!(serde_json::to_string(&Phase::PeeringRoutes).unwrap(), "\"peering-routes\"");
    }

    fn label(account: &str, name: &str) -> UnitLabel {
        (account.to_string(), "ca-central-1".to_string(), name.to_string())
    }

    fn router_outcome(name: &str) -> UnitOutcome {
        let at = Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap();
        let router = TransitRouterOutput {
            name: name.to_string(),
            tgw_id: format!("shared-network/ca-central-1/{}/{}", name, name),
            route_tables: Default::default(),
        };
        let mut outcome = UnitOutcome::new(NetworkReport::new("shared-network", "ca-central-1", name));
        outcome.outputs.push(
            OutputRecord::typed("shared-network", "ca-central-1", Phase::TransitRouters, at, &router).unwrap(),
        );
        outcome
    }

    #[tokio::test]
    async fn test_dead_group_does_not_drop_sibling_records() {
        let died = tokio::task::spawn_blocking(|| -> Vec<UnitResult> { panic!("group crashed") })
            .await
            .unwrap_err();
        let bus = OutputBus::new();
        let mut report = PhaseReport::new(Phase::TransitRouters);

        settle(
            Phase::TransitRouters,
            vec![
                (vec![label("shared-network", "Main")], Ok(vec![Ok(router_outcome("Main"))])),
                (vec![label("perimeter", "Edge"), label("perimeter", "Inspection")], Err(died)),
                (vec![label("operations", "Ops")], Ok(vec![Ok(router_outcome("Ops"))])),
            ],
            &bus,
            &mut report,
        );

        assert_eq!(bus.len(), 2);
        assert_eq!(report.recorded, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.account_key == "perimeter" && !f.configuration));
        assert!(!report.has_configuration_errors());
        assert!(matches!(
            report.report_for("perimeter", "Inspection").and_then(|r| r.status(Subsystem::Execution)),
            Some(SubsystemStatus::Failed(_))
        ));
    }

    #[test]
    fn test_failed_unit_keeps_group_siblings() {
        let failing = NetworkReport::new("shared-network", "ca-central-1", "Broken");
        let bus = OutputBus::new();
        let mut report = PhaseReport::new(Phase::TransitRouters);

        settle(
            Phase::TransitRouters,
            vec![(
                vec![label("shared-network", "Broken"), label("shared-network", "Main")],
                Ok(vec![
                    Err((GraphError::DuplicateLogicalId("Broken".to_string()).into(), failing)),
                    Ok(router_outcome("Main")),
                ]),
            )],
            &bus,
            &mut report,
        );

        assert_eq!(bus.len(), 1);
        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.failures[0].network, "Broken");
        assert!(!report.failures[0].configuration);
    }
}
