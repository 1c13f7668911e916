//! Pipeline entry points.
//!
//! - `run_once`: run one invocation against any set of capabilities
//! - `Components`: the production capabilities built from `Config`
//! - `run`: validate config, build components and run once

mod run;

use std::sync::Arc;

use chrono_tz::Tz;

pub use run::{Pipeline, PublishOutcome, RunOptions, RunReport, Stage, run_once};

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{ChartConfig, Config};
use crate::publishers::{Poster, build_posters};
use crate::services::{ChartRenderer, ChartSchedule, DaaFetcher};
use crate::storage::{Store, open_store};

/// Owned production capabilities for one run.
pub struct Components {
    fetcher: DaaFetcher,
    store: Box<dyn Store>,
    posters: Vec<Box<dyn Poster>>,
    schedule: ChartSchedule,
    chart: ChartConfig,
    timezone: Tz,
}

impl Components {
    /// Build every client the run needs. Readings are stamped by `clock`.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            fetcher: DaaFetcher::new(config.source.clone())?.with_clock(clock),
            store: open_store(&config.store)?,
            posters: build_posters(config)?,
            schedule: ChartSchedule::from_config(&config.chart)?,
            chart: config.chart.clone(),
            timezone: config.chart.timezone()?,
        })
    }

    /// Chart renderer over the configured store.
    pub fn charts(&self) -> ChartRenderer<'_> {
        ChartRenderer::new(
            self.store.as_chart_source(),
            self.timezone,
            (self.chart.width, self.chart.height),
        )
    }

    /// Borrow everything as a pipeline.
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            fetcher: &self.fetcher,
            store: self.store.as_reading_store(),
            charts: self.charts(),
            schedule: self.schedule.clone(),
            posters: self.posters.iter().map(|p| p.as_ref()).collect(),
            timezone: self.timezone,
        }
    }
}

/// Validate `config`, build the production components and run once.
///
/// Missing credentials are only logged here. The store or platform that needs
/// them fails on its own during the run.
pub async fn run(
    config: &Config,
    clock: Arc<dyn Clock>,
    options: RunOptions,
) -> Result<RunReport> {
    config.validate()?;
    for warning in config.credential_warnings() {
        log::warn!("{warning}");
    }

    let components = Components::from_config(config, Arc::clone(&clock))?;
    let pipeline = components.pipeline();

    if pipeline.posters.is_empty() && !options.dry_run {
        log::warn!("No platforms enabled; the post will not be published anywhere");
    }

    run_once(&pipeline, clock.now(), options).await
}
