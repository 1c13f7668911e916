//! Trailing-window chart data.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::Terminal;

/// Length of the chart window.
pub const TREND_WINDOW_HOURS: i64 = 24;

/// One plotted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub terminal: Terminal,
    pub minutes: u32,
}

/// Points inside `[window_start, window_end]`, ordered by time.
#[derive(Debug, Clone)]
pub struct TrendSeries {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Bounds of the trailing window ending at `now`.
    pub fn window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::hours(TREND_WINDOW_HOURS), now)
    }

    /// Build a series ending at `now`, dropping points outside the window.
    pub fn new(now: DateTime<Utc>, points: impl IntoIterator<Item = TrendPoint>) -> Self {
        let (window_start, window_end) = Self::window(now);
        let mut points: Vec<TrendPoint> = points
            .into_iter()
            .filter(|p| p.timestamp >= window_start && p.timestamp <= window_end)
            .collect();
        points.sort_by_key(|p| (p.timestamp, p.terminal));

        Self {
            window_start,
            window_end,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Split into one time-ordered line per terminal.
    pub fn by_terminal(&self) -> BTreeMap<Terminal, Vec<(DateTime<Utc>, u32)>> {
        let mut lines: BTreeMap<Terminal, Vec<(DateTime<Utc>, u32)>> = BTreeMap::new();
        for point in &self.points {
            lines
                .entry(point.terminal)
                .or_default()
                .push((point.timestamp, point.minutes));
        }
        lines
    }

    /// Largest value in the series, if any.
    pub fn max_minutes(&self) -> Option<u32> {
        self.points.iter().map(|p| p.minutes).max()
    }
}
