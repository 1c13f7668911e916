// src/pipeline/run.rs

//! One scheduled invocation: fetch → store → chart → compose → publish.
//!
//! Only a fetch failure ends the run early. Every later stage logs its
//! failure and the run carries on without that stage's result.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ChartImage, PostMessage, Reading};
use crate::publishers::Poster;
use crate::services::{ChartRenderer, ChartSchedule, Fetcher, compose_post};
use crate::storage::ReadingStore;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Storing,
    Charting,
    Composing,
    Publishing,
    Done,
}

impl Stage {
    const WORK_STAGES: usize = 5;

    fn number(self) -> usize {
        self as usize + 1
    }

    fn log_start(self) {
        log::info!(
            "[STEP {}/{}] {}",
            self.number(),
            Self::WORK_STAGES,
            self
        );
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "Fetch - Scraping queue times",
            Stage::Storing => "Store - Writing reading",
            Stage::Charting => "Chart - Rendering trend chart",
            Stage::Composing => "Compose - Formatting post",
            Stage::Publishing => "Publish - Posting to platforms",
            Stage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the store write and publishing; still charts and composes
    pub dry_run: bool,
}

/// Capabilities wired together for one run.
pub struct Pipeline<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub store: &'a dyn ReadingStore,
    pub charts: ChartRenderer<'a>,
    pub schedule: ChartSchedule,
    pub posters: Vec<&'a dyn Poster>,
    pub timezone: Tz,
}

/// What happened on one platform.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublishOutcome {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reading: Reading,
    pub stored: bool,
    pub chart_attached: bool,
    pub post: String,
    pub published: Vec<PublishOutcome>,
}

impl RunReport {
    pub fn publish_failures(&self) -> usize {
        self.published.iter().filter(|p| !p.succeeded()).count()
    }
}

/// Run the pipeline once at `now`.
///
/// Returns `Err` only when the reading could not be fetched.
pub async fn run_once(
    pipeline: &Pipeline<'_>,
    now: DateTime<Utc>,
    options: RunOptions,
) -> Result<RunReport> {
    let local_now = now.with_timezone(&pipeline.timezone);

    Stage::Fetching.log_start();
    let reading = match pipeline.fetcher.fetch().await {
        Ok(reading) => reading,
        Err(e) => {
            log::error!("Fetch failed, nothing to post: {e}");
            return Err(e);
        }
    };
    log::info!(
        "T1: {} min, T2: {} min",
        reading.terminal1_minutes,
        reading.terminal2_minutes
    );

    Stage::Storing.log_start();
    let stored = if options.dry_run {
        log::info!("Dry run: skipping store write");
        false
    } else {
        match pipeline.store.write(&reading).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Store write failed, continuing without it: {e}");
                false
            }
        }
    };

    Stage::Charting.log_start();
    let image = render_chart(pipeline, now, &local_now).await;

    Stage::Composing.log_start();
    let message = PostMessage::new(compose_post(&reading, &local_now), image);
    log::debug!("Post body:\n{}", message.body);

    Stage::Publishing.log_start();
    let published = if options.dry_run {
        log::info!("Dry run: not publishing\n{}", message.body);
        Vec::new()
    } else {
        publish_all(&pipeline.posters, &message).await
    };

    let report = RunReport {
        reading,
        stored,
        chart_attached: message.has_image(),
        post: message.body,
        published,
    };

    log::info!(
        "[{}] stored={} chart={} published={}/{}",
        Stage::Done,
        report.stored,
        report.chart_attached,
        report.published.len() - report.publish_failures(),
        report.published.len()
    );

    Ok(report)
}

async fn render_chart(
    pipeline: &Pipeline<'_>,
    now: DateTime<Utc>,
    local_now: &DateTime<Tz>,
) -> Option<ChartImage> {
    let Some(title) = pipeline.schedule.title_for(local_now) else {
        log::info!("No chart due at {}", local_now.format("%H:%M"));
        return None;
    };

    match pipeline.charts.render(&title, now).await {
        Ok(Some(image)) => {
            log::info!("Rendered '{}' ({} bytes)", title, image.png.len());
            Some(image)
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("Chart unavailable, posting text only: {e}");
            None
        }
    }
}

async fn publish_all(posters: &[&dyn Poster], message: &PostMessage) -> Vec<PublishOutcome> {
    let mut outcomes = Vec::with_capacity(posters.len());

    for poster in posters {
        let platform = poster.platform().to_string();
        let outcome = match poster.publish(message).await {
            Ok(receipt) => {
                log::info!("Posted to {} ({})", platform, receipt.id);
                PublishOutcome {
                    platform,
                    id: Some(receipt.id),
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("Posting to {} failed: {}", platform, e);
                PublishOutcome {
                    platform,
                    id: None,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}
