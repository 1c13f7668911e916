//! Storage abstractions for readings.
//!
//! Every run writes one reading; the chart renderer reads back the trailing
//! window. Two backends exist:
//!
//! - [`InfluxStorage`]: InfluxDB v2 over its HTTP API (production)
//! - [`LocalStorage`]: a JSON file on disk (development, dry runs)

pub mod influx;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Reading, StoreBackend, StoreConfig, Terminal, TrendPoint};

// Re-export for convenience
pub use influx::InfluxStorage;
pub use local::LocalStorage;

/// Persists readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Write a single reading. One attempt, no retry.
    async fn write(&self, reading: &Reading) -> Result<()>;
}

/// Supplies chart data.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// All points with `start <= timestamp <= stop`.
    async fn query_window(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>>;
}

/// A backend that both writes readings and serves chart data.
pub trait Store: ReadingStore + ChartSource {
    fn as_reading_store(&self) -> &dyn ReadingStore;
    fn as_chart_source(&self) -> &dyn ChartSource;
}

impl<T: ReadingStore + ChartSource> Store for T {
    fn as_reading_store(&self) -> &dyn ReadingStore {
        self
    }

    fn as_chart_source(&self) -> &dyn ChartSource {
        self
    }
}

/// Open the configured backend.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn Store>> {
    let store: Box<dyn Store> = match config.backend {
        StoreBackend::Influx => Box::new(InfluxStorage::new(config)?),
        StoreBackend::Local => Box::new(LocalStorage::new(
            &config.local_path,
            config.retention_days,
        )),
    };
    Ok(store)
}

/// Split a reading into one chart point per terminal.
pub(crate) fn reading_points(reading: &Reading) -> impl Iterator<Item = TrendPoint> + '_ {
    Terminal::ALL.into_iter().map(move |terminal| TrendPoint {
        timestamp: reading.observed_at,
        terminal,
        minutes: reading.minutes(terminal),
    })
}
