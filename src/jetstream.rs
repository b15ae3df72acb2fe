// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream configuration for the persisted output bus
//!
//! Output records are durable facts read by later phases, possibly days
//! later and from another process. They live in one file-backed stream with
//! limits-based retention.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_landing_zone::jetstream::{JetStreamConfig, create_output_stream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let stream = create_output_stream(jetstream, JetStreamConfig::default()).await?;
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, stream::Stream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{LandingZoneError, LandingZoneResult};
use crate::subjects::SubjectBuilder;

/// Configuration for the output record stream
#[derive(Debug, Clone)]
pub struct JetStreamConfig {
    pub stream_name: String,

    /// Subjects this stream captures (defaults to "landing-zone.outputs.>")
    pub subjects: Vec<String>,

    /// Maximum age of records (default: 365 days)
    pub max_age: Duration,

    /// Maximum bytes stored in stream (default: 1GB)
    pub max_bytes: i64,

    pub storage: StorageType,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "LANDING_ZONE_OUTPUTS".to_string(),
            subjects: vec![SubjectBuilder::build_all()],
            max_age: Duration::from_secs(365 * 24 * 60 * 60),
            max_bytes: 1024 * 1024 * 1024,
            storage: StorageType::File,
            replicas: 1,
        }
    }
}

/// Storage type for JetStream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

/// Envelope around a persisted output record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOutput<R> {
    /// Unique id (UUID v7 for time-ordering)
    pub output_id: Uuid,

    /// Time of publication
    pub published_at: DateTime<Utc>,

    pub record: R,
}

impl<R> StoredOutput<R> {
    pub fn new(output_id: Uuid, published_at: DateTime<Utc>, record: R) -> Self {
        Self {
            output_id,
            published_at,
            record,
        }
    }
}

/// Create or update the output record stream
///
/// Idempotent: creates the stream if missing, otherwise returns it.
pub async fn create_output_stream(
    jetstream: jetstream::Context,
    config: JetStreamConfig,
) -> LandingZoneResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects,
        max_age: config.max_age,
        max_bytes: config.max_bytes,
        storage,
        num_replicas: config.replicas,
        retention: jetstream::stream::RetentionPolicy::Limits,
        ..Default::default()
    };

    let stream = jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| LandingZoneError::NatsConnection(e.to_string()))?;

    Ok(stream)
}
