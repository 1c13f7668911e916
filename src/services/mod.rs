//! Service layer for the bot.
//!
//! This module contains the business logic for:
//! - Scraping queue times (`DaaFetcher`)
//! - Formatting posts (`compose_post`)
//! - Deciding when a chart is due (`ChartSchedule`)
//! - Rendering the trend chart (`ChartRenderer`)

pub mod chart;
mod composer;
mod fetcher;
mod schedule;

pub use chart::ChartRenderer;
pub use composer::{PEAK_WARNING, SATURATED_MINUTES, compose_post, is_peaking};
pub use fetcher::{DaaFetcher, Fetcher, parse_terminal_times};
pub use schedule::{ChartSchedule, midnight_chart_title, noon_chart_title};
