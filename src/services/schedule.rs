//! When a trend chart gets attached, and what it is called.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};

use crate::error::Result;
use crate::models::ChartConfig;

/// Minute-exact local times at which a chart is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSchedule {
    slots: Vec<NaiveTime>,
}

impl ChartSchedule {
    pub fn new(slots: Vec<NaiveTime>) -> Self {
        Self { slots }
    }

    /// Schedule from config; empty when charts are disabled.
    pub fn from_config(config: &ChartConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::new(Vec::new()));
        }
        Ok(Self::new(config.slots()?))
    }

    pub fn slots(&self) -> &[NaiveTime] {
        &self.slots
    }

    /// The slot matching `now` to the minute, if any.
    pub fn matching_slot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<NaiveTime> {
        self.slots
            .iter()
            .copied()
            .find(|slot| slot.hour() == now.hour() && slot.minute() == now.minute())
    }

    /// Chart title for `now`, or `None` when no slot matches.
    ///
    /// The midnight chart covers the day that just ended; any other slot spans
    /// yesterday and today.
    pub fn title_for<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<String> {
        let slot = self.matching_slot(now)?;
        let today = now.date_naive();
        if slot == NaiveTime::MIN {
            Some(midnight_chart_title(today))
        } else {
            Some(noon_chart_title(today))
        }
    }
}

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Title for a chart spanning yesterday and today.
pub fn noon_chart_title(today: NaiveDate) -> String {
    let yesterday = today - Duration::days(1);
    format!(
        "{} - {} Security Times",
        yesterday.format(DATE_FORMAT),
        today.format(DATE_FORMAT)
    )
}

/// Title for a chart of the day that just ended.
pub fn midnight_chart_title(today: NaiveDate) -> String {
    let yesterday = today - Duration::days(1);
    format!("{} Security Times", yesterday.format(DATE_FORMAT))
}

impl Default for ChartSchedule {
    fn default() -> Self {
        Self::new(vec![NaiveTime::MIN + Duration::hours(12), NaiveTime::MIN])
    }
}
