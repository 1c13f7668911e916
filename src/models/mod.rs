// src/models/mod.rs

//! Domain models for the bot.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod post;
mod reading;
mod trend;

// Re-export all public types
pub use config::{
    BlueskyConfig, ChartConfig, Config, LoggingConfig, SourceConfig, StoreBackend, StoreConfig,
    XConfig,
};
pub use post::{CHART_ALT_TEXT, ChartImage, PostMessage, PostReceipt};
pub use reading::{Reading, Terminal};
pub use trend::{TREND_WINDOW_HOURS, TrendPoint, TrendSeries};
