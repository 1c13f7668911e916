// src/services/fetcher.rs

//! Queue time scraper.
//!
//! Fetches the airport's live departures page and pulls both terminals'
//! security times out of it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::clock::{Clock, SystemClock};
use crate::error::{AppError, Result};
use crate::models::{Reading, SourceConfig};
use crate::utils::first_number;
use crate::utils::http::{create_async_client, fetch_page_async};

/// Anything that can produce the current reading.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<Reading>;
}

/// Scrapes the Dublin Airport website.
pub struct DaaFetcher {
    config: SourceConfig,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl DaaFetcher {
    /// Create a new fetcher with the given source configuration.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = create_async_client(&config)?;
        Ok(Self {
            config,
            client,
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp readings from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Turn a fetched page into a reading stamped with the current time.
    fn read_document(&self, document: &Html) -> Result<Reading> {
        let (t1, t2) = parse_terminal_times(
            document,
            &self.config.container_selector,
            &self.config.value_selector,
        )?;
        log::debug!("Parsed T1={t1} T2={t2}");
        Ok(Reading::new(t1, t2, self.clock.now()))
    }
}

#[async_trait]
impl Fetcher for DaaFetcher {
    async fn fetch(&self) -> Result<Reading> {
        let url = &self.config.url;
        log::debug!("Fetching queue times from {url}");

        let document = fetch_page_async(&self.client, url)
            .await
            .map_err(|e| AppError::fetch(url.as_str(), e))?;

        self.read_document(&document)
            .map_err(|e| AppError::fetch(url.as_str(), e))
    }
}

/// Pull `(terminal1, terminal2)` minutes out of the page.
///
/// The container is the first element matching `container_selector`; its first
/// two `value_selector` matches are terminal 1 and terminal 2.
pub fn parse_terminal_times(
    document: &Html,
    container_selector: &str,
    value_selector: &str,
) -> Result<(u32, u32)> {
    let container_sel = parse_selector(container_selector)?;
    let value_sel = parse_selector(value_selector)?;

    let container = document.select(&container_sel).next().ok_or_else(|| {
        AppError::validation(format!("no element matches '{container_selector}'"))
    })?;

    let values: Vec<String> = container
        .select(&value_sel)
        .take(2)
        .map(|el| el.text().collect::<String>())
        .collect();

    let [t1_text, t2_text] = values.as_slice() else {
        return Err(AppError::validation(format!(
            "expected two '{value_selector}' elements in '{container_selector}', found {}",
            values.len()
        )));
    };

    let minutes = |text: &str| {
        first_number(text).ok_or_else(|| {
            AppError::validation(format!("no minutes value in '{}'", text.trim()))
        })
    };

    Ok((minutes(t1_text.as_str())?, minutes(t2_text.as_str())?))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: &str = "div.sec-times";
    const VALUE: &str = "strong";

    fn parse(html: &str) -> Result<(u32, u32)> {
        parse_terminal_times(&Html::parse_document(html), CONTAINER, VALUE)
    }

    #[test]
    fn test_parses_both_terminals() {
        let html = r#"
            <html><body>
              <div class="flight-info"><strong>Departures</strong></div>
              <div class="sec-times">
                <p>Terminal 1 <strong>12 mins</strong></p>
                <p>Terminal 2 <strong>15 mins</strong></p>
              </div>
            </body></html>
        "#;
        assert_eq!(parse(html).unwrap(), (12, 15));
    }

    #[test]
    fn test_takes_first_two_values_only() {
        let html = r#"<div class="sec-times extra">
            <strong>&lt; 5 min</strong><strong>60+ mins</strong><strong>99</strong>
        </div>"#;
        assert_eq!(parse(html).unwrap(), (5, 60));
    }

    #[test]
    fn test_missing_container() {
        let err = parse("<div class='other'><strong>1</strong></div>").unwrap_err();
        assert!(err.to_string().contains("div.sec-times"));
    }

    #[test]
    fn test_single_value_is_error() {
        let err = parse(r#"<div class="sec-times"><strong>7 mins</strong></div>"#).unwrap_err();
        assert!(err.to_string().contains("found 1"));
    }

    #[test]
    fn test_value_without_digits() {
        let html = r#"<div class="sec-times"><strong>7</strong><strong>closed</strong></div>"#;
        assert!(parse(html).is_err());
    }

    #[test]
    fn test_reading_stamped_by_injected_clock() {
        use chrono::{TimeZone, Utc};

        use crate::clock::FixedClock;

        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap();
        let fetcher = DaaFetcher::new(SourceConfig::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock(at)));
        let doc = Html::parse_document(
            r#"<div class="sec-times"><strong>12</strong><strong>15</strong></div>"#,
        );

        let reading = fetcher.read_document(&doc).unwrap();
        assert_eq!(reading, Reading::new(12, 15, at));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Html::parse_document("<div></div>");
        assert!(matches!(
            parse_terminal_times(&doc, "[[bad", VALUE),
            Err(AppError::Selector { .. })
        ));
    }
}
