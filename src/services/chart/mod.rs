//! Trailing 24-hour trend chart.

mod render;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::Result;
use crate::models::{ChartConfig, ChartImage, TrendSeries};
use crate::storage::ChartSource;

/// Queries the trailing window and renders it as a PNG chart.
pub struct ChartRenderer<'a> {
    source: &'a dyn ChartSource,
    timezone: Tz,
    size: (u32, u32),
}

impl<'a> ChartRenderer<'a> {
    pub fn new(source: &'a dyn ChartSource, timezone: Tz, size: (u32, u32)) -> Self {
        Self {
            source,
            timezone,
            size,
        }
    }

    pub fn from_config(source: &'a dyn ChartSource, config: &ChartConfig) -> Result<Self> {
        Ok(Self::new(
            source,
            config.timezone()?,
            (config.width, config.height),
        ))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Fetch the 24 hours ending at `now`.
    pub async fn series(&self, now: DateTime<Utc>) -> Result<TrendSeries> {
        let (start, stop) = TrendSeries::window(now);
        let points = self.source.query_window(start, stop).await?;
        Ok(TrendSeries::new(now, points))
    }

    /// Render the chart, or `None` when the window holds no data.
    pub async fn render(&self, title: &str, now: DateTime<Utc>) -> Result<Option<ChartImage>> {
        let series = self.series(now).await?;
        if series.is_empty() {
            log::info!("No readings in the last 24 hours; skipping chart");
            return Ok(None);
        }

        log::debug!("Rendering '{}' from {} points", title, series.len());
        let png = render::render_trend_png(&series, title, self.timezone, self.size)?;
        Ok(Some(ChartImage::new(png)))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::Europe::Dublin;

    use super::*;
    use crate::error::AppError;
    use crate::models::{Terminal, TrendPoint};

    struct EmptySource;

    #[async_trait]
    impl ChartSource for EmptySource {
        async fn query_window(
            &self,
            _start: DateTime<Utc>,
            _stop: DateTime<Utc>,
        ) -> Result<Vec<TrendPoint>> {
            Ok(Vec::new())
        }
    }

    struct StaleSource;

    #[async_trait]
    impl ChartSource for StaleSource {
        async fn query_window(
            &self,
            start: DateTime<Utc>,
            _stop: DateTime<Utc>,
        ) -> Result<Vec<TrendPoint>> {
            Ok(vec![TrendPoint {
                timestamp: start - chrono::Duration::hours(1),
                terminal: Terminal::T1,
                minutes: 10,
            }])
        }
    }

    struct DownSource;

    #[async_trait]
    impl ChartSource for DownSource {
        async fn query_window(
            &self,
            _start: DateTime<Utc>,
            _stop: DateTime<Utc>,
        ) -> Result<Vec<TrendPoint>> {
            Err(AppError::chart_query("connection refused"))
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_window_renders_nothing() {
        let renderer = ChartRenderer::new(&EmptySource, Dublin, (640, 480));
        assert_eq!(renderer.render("title", noon()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn points_outside_window_count_as_empty() {
        let renderer = ChartRenderer::new(&StaleSource, Dublin, (640, 480));
        assert_eq!(renderer.render("title", noon()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_failure_propagates() {
        let renderer = ChartRenderer::new(&DownSource, Dublin, (640, 480));
        assert!(matches!(
            renderer.render("title", noon()).await,
            Err(AppError::ChartQuery(_))
        ));
    }
}
