// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use scraper::Html;

use crate::error::Result;
use crate::models::SourceConfig;

/// Timeout for platform and store API calls.
const API_TIMEOUT_SECS: u64 = 30;

/// Create a client for scraping the source page.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Create a client for JSON APIs (store, X, Bluesky).
pub fn create_api_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("daabot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(API_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// Fetch a page asynchronously and parse it as HTML.
///
/// Non-success statuses are errors rather than parsed error pages.
pub async fn fetch_page_async(client: &reqwest::Client, url: &str) -> Result<Html> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(Html::parse_document(&text))
}

/// Read a response body for an error message, truncated to keep logs readable.
pub async fn error_body(response: reqwest::Response) -> String {
    const MAX_LEN: usize = 300;
    let text = response.text().await.unwrap_or_default();
    let text = text.trim();
    match text.char_indices().nth(MAX_LEN) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
