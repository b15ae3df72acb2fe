// Copyright (c) 2025 - Cowboy AI, Inc.
//! Landing-Zone Phase Runner
//!
//! Loads the landing-zone configuration, the account directory and the quota
//! ceilings, hydrates the output bus from its store and runs one phase (or
//! all of them in order). Resource graphs and build reports are written as
//! JSON per phase.
//!
//! Run with: cargo run --bin lz-phase
//!
//! Environment:
//! - `LZ_CONFIG_FILE`   landing-zone configuration (JSON, required)
//! - `LZ_ACCOUNTS_FILE` account directory (JSON, required)
//! - `LZ_LIMITS_FILE`   quota ceilings (JSON, optional)
//! - `LZ_PHASE`         phase number, phase name or `all` (default: all)
//! - `LZ_OUTPUT_DIR`    where graphs, reports and file-backed outputs go
//! - `NATS_URL`         when set, outputs are kept in JetStream
//! - `LZ_OUTPUT_STREAM` JetStream stream name

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use cim_landing_zone::{
    jetstream::JetStreamConfig, run_phase, AccountDirectory, InMemoryOutputStore,
    JsonFileOutputStore, LandingZoneConfig, Limiter, NatsConfig, NatsOutputStore, OutputBus,
    OutputStore, Phase, PhaseContext, PhaseReport, QuotaCeiling,
};

#[derive(Debug, Clone)]
struct RunnerConfig {
    config_file: PathBuf,
    accounts_file: PathBuf,
    limits_file: Option<PathBuf>,
    phases: Vec<Phase>,
    output_dir: Option<PathBuf>,
    nats_url: Option<String>,
    stream_name: Option<String>,
}

impl RunnerConfig {
    fn from_env() -> Result<Self> {
        let config_file = std::env::var("LZ_CONFIG_FILE")
            .context("LZ_CONFIG_FILE not set")?
            .into();
        let accounts_file = std::env::var("LZ_ACCOUNTS_FILE")
            .context("LZ_ACCOUNTS_FILE not set")?
            .into();

        let phase = std::env::var("LZ_PHASE").unwrap_or_else(|_| "all".to_string());
        let phases = if phase.trim().eq_ignore_ascii_case("all") {
            Phase::ALL.to_vec()
        } else {
            vec![phase.parse::<Phase>()?]
        };

        Ok(Self {
            config_file,
            accounts_file,
            limits_file: std::env::var("LZ_LIMITS_FILE").ok().map(PathBuf::from),
            phases,
            output_dir: std::env::var("LZ_OUTPUT_DIR").ok().map(PathBuf::from),
            nats_url: std::env::var("NATS_URL").ok(),
            stream_name: std::env::var("LZ_OUTPUT_STREAM").ok(),
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn open_store(config: &RunnerConfig) -> Result<Box<dyn OutputStore>> {
    if let Some(url) = &config.nats_url {
        info!("🔌 Keeping outputs in JetStream at {}", url);
        let mut stream_config = JetStreamConfig::default();
        if let Some(name) = &config.stream_name {
            stream_config.stream_name = name.clone();
        }
        let store = NatsOutputStore::connect_with_config(&NatsConfig::for_servers(url), stream_config)
            .await
            .context("Failed to open JetStream output store")?;
        return Ok(Box::new(store));
    }
    if let Some(dir) = &config.output_dir {
        let store = JsonFileOutputStore::in_dir(dir);
        info!("📁 Keeping outputs in {}", store.path().display());
        return Ok(Box::new(store));
    }
    warn!("No NATS_URL or LZ_OUTPUT_DIR; outputs will not outlive this run");
    Ok(Box::new(InMemoryOutputStore::new()))
}

async fn write_report(dir: &Path, report: &PhaseReport) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("phase-{}-{}.json", report.phase.number(), report.phase));
    let body = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("📝 Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting landing-zone phase runner");

    let runner = RunnerConfig::from_env()?;
    let config: LandingZoneConfig = read_json(&runner.config_file).await?;
    let accounts: AccountDirectory = read_json(&runner.accounts_file).await?;
    let ceilings: Vec<QuotaCeiling> = match &runner.limits_file {
        Some(path) => read_json(path).await?,
        None => Vec::new(),
    };
    info!(
        "📋 {} accounts, {} quota ceilings, phases {:?}",
        accounts.len(),
        ceilings.len(),
        runner.phases.iter().map(Phase::as_str).collect::<Vec<_>>()
    );

    let store = open_store(&runner).await?;
    let bus = Arc::new(OutputBus::load(store.as_ref()).await?);
    info!("✅ Loaded {} output records", bus.len());

    let ctx = PhaseContext::new(config, accounts, Limiter::new(ceilings), Utc::now());

    let mut configuration_errors = 0;
    for phase in runner.phases {
        let report = run_phase(phase, &ctx, Arc::clone(&bus)).await?;
        let flushed = bus.flush(store.as_ref()).await?;
        info!(
            "✅ Phase {} done: {} graphs, {} warnings, {} failures, {} records persisted",
            phase,
            report.graphs.len(),
            report.warning_count(),
            report.failures.len(),
            flushed
        );

        for failure in &report.failures {
            warn!(
                "❌ {}/{}/{}: {}",
                failure.account_key, failure.region, failure.network, failure.message
            );
        }
        if let Some(dir) = &runner.output_dir {
            write_report(dir, &report).await?;
        }
        if report.has_configuration_errors() {
            configuration_errors = report.failures.iter().filter(|f| f.configuration).count();
            break;
        }
    }

    if configuration_errors > 0 {
        bail!("{} network(s) failed with configuration errors", configuration_errors);
    }
    info!("🏁 Phase runner finished");
    Ok(())
}
