//! Local filesystem storage implementation.
//!
//! Keeps readings in a single JSON file for development and dry runs.
//! Production deployments should use `InfluxStorage`.
//!
//! ## File Layout
//!
//! ```text
//! {path}                    # JSON array of readings, oldest first
//! {path with .tmp}          # Write buffer, renamed over {path}
//! ```
//!
//! Readings older than the retention period are pruned on every write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Reading, TrendPoint};
use crate::storage::{ChartSource, ReadingStore, reading_points};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    retention: Duration,
}

impl LocalStorage {
    /// Create a new LocalStorage backed by the given file.
    pub fn new(path: impl AsRef<Path>, retention_days: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(&bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load every stored reading, oldest first.
    pub async fn load_readings(&self) -> Result<Vec<Reading>> {
        Ok(self.read_json().await?.unwrap_or_default())
    }

    async fn append(&self, reading: &Reading) -> Result<usize> {
        let cutoff = reading.observed_at - self.retention;
        let mut readings: Vec<Reading> = self
            .load_readings()
            .await?
            .into_iter()
            .filter(|r| r.observed_at >= cutoff)
            .collect();

        readings.push(*reading);
        readings.sort_by_key(|r| r.observed_at);

        self.write_json(&readings).await?;
        Ok(readings.len())
    }
}

#[async_trait]
impl ReadingStore for LocalStorage {
    async fn write(&self, reading: &Reading) -> Result<()> {
        let kept = self.append(reading).await.map_err(AppError::write)?;
        log::debug!("{} readings kept in {}", kept, self.path.display());
        Ok(())
    }
}

#[async_trait]
impl ChartSource for LocalStorage {
    async fn query_window(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>> {
        let readings = self.load_readings().await.map_err(AppError::chart_query)?;
        Ok(readings
            .iter()
            .filter(|r| r.observed_at >= start && r.observed_at <= stop)
            .flat_map(reading_points)
            .collect())
    }
}
