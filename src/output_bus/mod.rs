// Copyright (c) 2025 - Cowboy AI, Inc.
//! Output Bus
//!
//! The only channel through which phases exchange identifiers. Builders
//! append typed [`OutputRecord`]s during a phase; later phases read them with
//! point-in-time filtered scans.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────── phase N ─────────────┐        ┌──────────── phase N+1 ───────────┐
//! │ build(network) ──append──┐       │        │       ┌──find(filter)── build    │
//! │ build(network) ──append──┤       │        │       ├──find(filter)── build    │
//! │                          ▼       │        │       │                          │
//! │                     OutputBus ───┼─flush──┼─► OutputStore ──load──► OutputBus│
//! └──────────────────────────────────┘        └──────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - Append-only: records are never mutated or deleted
//! - Several records of the same (account, region, type) may coexist
//! - Consumers needing one fact take the most recent match
//! - A flush persists only records appended since the last load or flush

pub mod file;
pub mod nats;
pub mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, RwLock};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, warn};

use crate::errors::{LandingZoneError, LandingZoneResult};
use crate::phase::Phase;

pub use file::JsonFileOutputStore;
pub use nats::NatsOutputStore;
pub use records::{
    AttachmentOutput, NetworkOutput, PeeringOutput, PeeringVpc, SecurityGroupIndexOutput,
    SecurityGroupOutput, SharedResourceTagRequest, SharedResourceTags, SharedResourceType,
    SubnetOutput, Tag, TransitRouterOutput,
};

/// Kind of fact carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    #[serde(rename = "TgwOutput")]
    TransitRouter,
    #[serde(rename = "VpcOutput")]
    Network,
    #[serde(rename = "TgwAttachmentOutput")]
    Attachment,
    #[serde(rename = "PcxOutput")]
    Peering,
    #[serde(rename = "AddTagsToResources")]
    SharedResourceTags,
    #[serde(rename = "SecurityGroupIndexOutput")]
    SecurityGroupIndex,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::TransitRouter => "tgw",
            OutputType::Network => "vpc",
            OutputType::Attachment => "tgw-attachment",
            OutputType::Peering => "pcx",
            OutputType::SharedResourceTags => "add-tags",
            OutputType::SecurityGroupIndex => "sg-index",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of an output record
pub trait OutputValue: Serialize + DeserializeOwned {
    const OUTPUT_TYPE: OutputType;
}

/// One persisted fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub account_key: String,
    pub region: String,
    pub output_type: OutputType,
    pub value: serde_json::Value,
    pub phase: Phase,
    pub recorded_at: DateTime<Utc>,
}

impl OutputRecord {
    /// Wrap a typed payload; the timestamp is supplied by the caller
    pub fn typed<T: OutputValue>(
        account_key: impl Into<String>,
        region: impl Into<String>,
        phase: Phase,
        recorded_at: DateTime<Utc>,
        value: &T,
    ) -> LandingZoneResult<Self> {
        Ok(Self {
            account_key: account_key.into(),
            region: region.into(),
            output_type: T::OUTPUT_TYPE,
            value: serde_json::to_value(value)?,
            phase,
            recorded_at,
        })
    }

    pub fn decode<T: OutputValue>(&self) -> LandingZoneResult<T> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| LandingZoneError::Deserialization(e.to_string()))
    }
}

/// Filter for point-in-time scans; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    pub account_key: Option<String>,
    pub region: Option<String>,
    pub output_type: Option<OutputType>,
}

impl OutputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(output_type: OutputType) -> Self {
        Self {
            output_type: Some(output_type),
            ..Self::default()
        }
    }

    pub fn account(mut self, account_key: impl Into<String>) -> Self {
        self.account_key = Some(account_key.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn matches(&self, record: &OutputRecord) -> bool {
        self.account_key
            .as_deref()
            .map_or(true, |a| a == record.account_key)
            && self.region.as_deref().map_or(true, |r| r == record.region)
            && self.output_type.map_or(true, |t| t == record.output_type)
    }
}

/// Durable backing store for the bus
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Every record ever appended, in append order
    async fn load_all(&self) -> LandingZoneResult<Vec<OutputRecord>>;

    /// Persist records in order
    async fn append(&self, records: &[OutputRecord]) -> LandingZoneResult<()>;
}

/// Append-only, concurrently readable fact log
#[derive(Debug, Default)]
pub struct OutputBus {
    records: RwLock<Vec<OutputRecord>>,
    persisted: Mutex<usize>,
}

impl OutputBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus pre-populated with records already persisted elsewhere
    pub fn from_records(records: Vec<OutputRecord>) -> Self {
        let persisted = records.len();
        Self {
            records: RwLock::new(records),
            persisted: Mutex::new(persisted),
        }
    }

    /// Hydrate from a store
    pub async fn load(store: &dyn OutputStore) -> LandingZoneResult<Self> {
        let records = store.load_all().await?;
        debug!(count = records.len(), "Loaded output records");
        Ok(Self::from_records(records))
    }

    pub fn append(&self, record: OutputRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        debug!(
            account = %record.account_key,
            region = %record.region,
            output_type = %record.output_type,
            "Output recorded"
        );
        records.push(record);
    }

    pub fn append_all(&self, batch: Vec<OutputRecord>) {
        if batch.is_empty() {
            return;
        }
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.extend(batch);
    }

    /// Snapshot of matching records in append order
    pub fn find(&self, filter: &OutputFilter) -> Vec<OutputRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().filter(|r| filter.matches(r)).cloned().collect()
    }

    /// Decoded payloads of every matching record of type `T`
    ///
    /// Records that fail to decode are logged and skipped.
    pub fn find_typed<T: OutputValue>(&self, filter: &OutputFilter) -> Vec<T> {
        let filter = OutputFilter {
            output_type: Some(T::OUTPUT_TYPE),
            ..filter.clone()
        };
        self.find(&filter)
            .iter()
            .filter_map(|record| match record.decode::<T>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(
                        account = %record.account_key,
                        output_type = %record.output_type,
                        error = %e,
                        "Skipping undecodable output record"
                    );
                    None
                }
            })
            .collect()
    }

    /// Most recent matching payload satisfying `predicate`
    pub fn find_latest<T, P>(&self, filter: &OutputFilter, predicate: P) -> Option<T>
    where
        T: OutputValue,
        P: Fn(&T) -> bool,
    {
        self.find_typed::<T>(filter)
            .into_iter()
            .rev()
            .find(|value| predicate(value))
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records appended since the last load or flush
    pub fn pending(&self) -> Vec<OutputRecord> {
        let persisted = *self.persisted.lock().unwrap_or_else(|e| e.into_inner());
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records[persisted.min(records.len())..].to_vec()
    }

    /// Persist pending records; returns how many were written
    pub async fn flush(&self, store: &dyn OutputStore) -> LandingZoneResult<usize> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(0);
        }
        store.append(&pending).await?;
        let mut persisted = self.persisted.lock().unwrap_or_else(|e| e.into_inner());
        *persisted += pending.len();
        debug!(count = pending.len(), "Flushed output records");
        Ok(pending.len())
    }
}

/// Store kept in process memory; used for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemoryOutputStore {
    records: AsyncRwLock<Vec<OutputRecord>>,
}

impl InMemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutputStore for InMemoryOutputStore {
    async fn load_all(&self) -> LandingZoneResult<Vec<OutputRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn append(&self, records: &[OutputRecord]) -> LandingZoneResult<()> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap()
    }

    fn router(name: &str, id: &str) -> TransitRouterOutput {
        TransitRouterOutput {
            name: name.to_string(),
            tgw_id: id.to_string(),
            route_tables: Default::default(),
        }
    }

    fn record(account: &str, value: &TransitRouterOutput) -> OutputRecord {
        OutputRecord::typed(account, "ca-central-1", Phase::TransitRouters, at(), value).unwrap()
    }

    #[test]
    fn test_filter_by_account_and_type() {
        let bus = OutputBus::new();
        bus.append(record("shared-network", &router("Main", "tgw-1")));
        bus.append(record("perimeter", &router("Edge", "tgw-2")));

        let found: Vec<TransitRouterOutput> =
            bus.find_typed(&OutputFilter::new().account("shared-network"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tgw_id, "tgw-1");
        assert!(bus
            .find(&OutputFilter::of_type(OutputType::Network))
            .is_empty());
    }

    #[test]
    fn test_latest_record_wins() {
        let bus = OutputBus::new();
        bus.append(record("shared-network", &router("Main", "tgw-old")));
        bus.append(record("shared-network", &router("Main", "tgw-new")));

        let latest: Option<TransitRouterOutput> =
            bus.find_latest(&OutputFilter::new(), |t: &TransitRouterOutput| t.name == "Main");
        assert_eq!(latest.unwrap().tgw_id, "tgw-new");
        assert_eq!(bus.len(), 2);
    }

    #[tokio::test]
    async fn test_flush_persists_only_new_records() {
        let store = InMemoryOutputStore::new();
        let bus = OutputBus::new();
        bus.append(record("shared-network", &router("Main", "tgw-1")));
        assert_eq!(bus.flush(&store).await.unwrap(), 1);
        assert_eq!(bus.flush(&store).await.unwrap(), 0);

        let reloaded = OutputBus::load(&store).await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.pending().is_empty());

        reloaded.append(record("perimeter", &router("Edge", "tgw-2")));
        assert_eq!(reloaded.flush(&store).await.unwrap(), 1);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }

    #[test]
    fn test_readers_see_a_consistent_snapshot_while_appending() {
        let bus = std::sync::Arc::new(OutputBus::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for n in 0..25 {
                        bus.append(record("shared-network", &router(&format!("R{i}-{n}"), "tgw")));
                        assert!(bus.find(&OutputFilter::new()).len() <= 100);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let store = InMemoryOutputStore::new();
        assert_eq!(tokio_test::block_on(bus.flush(&store)).unwrap(), 100);
        assert_eq!(tokio_test::block_on(store.load_all()).unwrap().len(), 100);
    }
}
