// Copyright (c) 2025 - Cowboy AI, Inc.
//! Output store backed by a JSON Lines file
//!
//! One record per line, appended in order. Lets consecutive `lz-phase`
//! invocations share outputs without a NATS server.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{OutputRecord, OutputStore};
use crate::errors::{LandingZoneError, LandingZoneResult};

/// File name used inside the output directory
pub const OUTPUTS_FILE: &str = "outputs.jsonl";

#[derive(Debug, Clone)]
pub struct JsonFileOutputStore {
    path: PathBuf,
}

impl JsonFileOutputStore {
    /// Store writing `outputs.jsonl` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(OUTPUTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputStore for JsonFileOutputStore {
    async fn load_all(&self) -> LandingZoneResult<Vec<OutputRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LandingZoneError::OutputStore(e.to_string())),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| LandingZoneError::Deserialization(e.to_string()))
            })
            .collect()
    }

    async fn append(&self, records: &[OutputRecord]) -> LandingZoneResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?;
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| LandingZoneError::OutputStore(e.to_string()))?;

        debug!(path = %self.path.display(), count = records.len(), "Appended output records");
        Ok(())
    }
}
