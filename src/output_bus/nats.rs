// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Output Store
//!
//! Persists output records between phase invocations. Each record is
//! published on its own subject (see [`crate::subjects`]) wrapped in a
//! [`StoredOutput`] envelope; a reload replays the whole stream in
//! sequence order.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_landing_zone::nats::NatsConfig;
//! use cim_landing_zone::output_bus::{NatsOutputStore, OutputBus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = NatsOutputStore::connect(&NatsConfig::default()).await?;
//!     let bus = OutputBus::load(&store).await?;
//!     // run a phase against `bus`, then:
//!     bus.flush(&store).await?;
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, stream::Stream};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{OutputRecord, OutputStore};
use crate::errors::{LandingZoneError, LandingZoneResult};
use crate::jetstream::{create_output_stream, JetStreamConfig, StoredOutput};
use crate::nats::NatsConfig;
use crate::subjects::SubjectBuilder;

/// Batch size for replay fetches
const BATCH_SIZE: usize = 10_000;

/// JetStream-backed output store
pub struct NatsOutputStore {
    jetstream: jetstream::Context,
    stream: Stream,
}

impl NatsOutputStore {
    /// Connect and create or get the output stream
    pub async fn connect(config: &NatsConfig) -> LandingZoneResult<Self> {
        Self::connect_with_config(config, JetStreamConfig::default()).await
    }

    pub async fn connect_with_config(
        config: &NatsConfig,
        stream_config: JetStreamConfig,
    ) -> LandingZoneResult<Self> {
        let client = config.connect().await?;
        let jetstream = jetstream::new(client);
        let stream = create_output_stream(jetstream.clone(), stream_config).await?;

        Ok(Self { jetstream, stream })
    }

    fn subject_for(record: &OutputRecord) -> String {
        SubjectBuilder::new()
            .account(&record.account_key)
            .region(&record.region)
            .output_type(record.output_type)
            .build()
    }
}

#[async_trait]
impl OutputStore for NatsOutputStore {
    async fn load_all(&self) -> LandingZoneResult<Vec<OutputRecord>> {
        let consumer = self
            .stream
            .create_consumer(jetstream::consumer::pull::Config {
                filter_subject: SubjectBuilder::build_all(),
                ..Default::default()
            })
            .await
            .map_err(|e| LandingZoneError::NatsConnection(e.to_string()))?;

        let mut stored: Vec<(u64, OutputRecord)> = Vec::new();

        loop {
            // A fetch that times out with nothing pending means the replay is complete
            let messages_result = consumer
                .fetch()
                .max_messages(BATCH_SIZE)
                .expires(Duration::from_secs(2))
                .messages()
                .await;

            let mut messages = match messages_result {
                Ok(msgs) => msgs,
                Err(e) => {
                    let err_msg = e.to_string().to_lowercase();
                    if err_msg.contains("timeout")
                        || err_msg.contains("timed out")
                        || err_msg.contains("no messages")
                    {
                        break;
                    }
                    return Err(LandingZoneError::NatsConnection(e.to_string()));
                }
            };

            let mut batch_count = 0;

            while let Some(message) = messages.next().await {
                let msg = message.map_err(|e| LandingZoneError::NatsConnection(e.to_string()))?;

                let envelope: StoredOutput<OutputRecord> = serde_json::from_slice(&msg.payload)
                    .map_err(|e| LandingZoneError::Deserialization(e.to_string()))?;
                let sequence = msg
                    .info()
                    .map(|info| info.stream_sequence)
                    .unwrap_or(stored.len() as u64);
                stored.push((sequence, envelope.record));

                msg.ack()
                    .await
                    .map_err(|e| LandingZoneError::NatsConnection(e.to_string()))?;

                batch_count += 1;
            }

            if batch_count < BATCH_SIZE {
                break;
            }
        }

        stored.sort_by_key(|(sequence, _)| *sequence);
        info!(count = stored.len(), "Replayed output records from JetStream");
        Ok(stored.into_iter().map(|(_, record)| record).collect())
    }

    async fn append(&self, records: &[OutputRecord]) -> LandingZoneResult<()> {
        for record in records {
            let subject = Self::subject_for(record);
            let envelope = StoredOutput::new(Uuid::now_v7(), Utc::now(), record);
            let payload = serde_json::to_vec(&envelope)
                .map_err(|e| LandingZoneError::Serialization(e.to_string()))?;

            self.jetstream
                .publish(subject.clone(), payload.into())
                .await
                .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?
                .await
                .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?;

            debug!(subject = %subject, "Published output record");
        }
        Ok(())
    }
}
