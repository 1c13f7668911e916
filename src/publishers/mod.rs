//! Social platform publishers.
//!
//! Each platform sits behind [`Poster`] so the pipeline can fan a post out
//! without knowing which APIs are involved.

mod bluesky;
mod x;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, PublishFailure, Result};
use crate::models::{Config, PostMessage, PostReceipt};
use crate::utils::http::error_body;

pub use bluesky::BlueskyPoster;
pub use x::XPoster;

/// One platform's post-creation capability.
#[async_trait]
pub trait Poster: Send + Sync {
    /// Short platform name used in logs and reports.
    fn platform(&self) -> &str;

    /// Publish the message, uploading its image first if present.
    async fn publish(&self, message: &PostMessage) -> Result<PostReceipt>;
}

/// Build a poster for every enabled platform.
pub fn build_posters(config: &Config) -> Result<Vec<Box<dyn Poster>>> {
    let mut posters: Vec<Box<dyn Poster>> = Vec::new();
    if config.x.enabled {
        posters.push(Box::new(XPoster::new(&config.x)?));
    }
    if config.bluesky.enabled {
        posters.push(Box::new(BlueskyPoster::new(&config.bluesky)?));
    }
    Ok(posters)
}

/// Reject text the platform would refuse, before any request is made.
fn check_length(platform: &str, text: &str, limit: usize) -> Result<()> {
    let length = text.graphemes(true).count();
    if length > limit {
        return Err(AppError::publish(
            platform,
            PublishFailure::Payload,
            format!("post is {length} characters, limit is {limit}"),
        ));
    }
    Ok(())
}

/// Map a transport-level failure.
fn transport(platform: &str) -> impl Fn(reqwest::Error) -> AppError + '_ {
    move |error| AppError::publish(platform, PublishFailure::Transport, error)
}

/// Pass successful responses through; classify the rest by status.
async fn check_response(
    platform: &str,
    action: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = error_body(response).await;
    Err(AppError::publish(
        platform,
        PublishFailure::from_status(status),
        format!("{action} failed with {status}: {body}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlueskyConfig, XConfig};

    #[test]
    fn test_check_length_counts_graphemes() {
        assert!(check_length("bluesky", &"a".repeat(300), 300).is_ok());
        assert!(check_length("bluesky", &"é".repeat(300), 300).is_ok());

        let err = check_length("bluesky", &"a".repeat(301), 300).unwrap_err();
        assert!(matches!(
            err,
            AppError::Publish {
                kind: PublishFailure::Payload,
                ..
            }
        ));
    }

    #[test]
    fn test_build_posters_respects_enabled() {
        let mut config = Config::default();
        config.x = XConfig {
            enabled: false,
            ..XConfig::default()
        };
        config.bluesky = BlueskyConfig {
            identifier: "bot.bsky.social".to_string(),
            password: "pw".to_string(),
            ..BlueskyConfig::default()
        };

        let posters = build_posters(&config).unwrap();
        let names: Vec<&str> = posters.iter().map(|p| p.platform()).collect();
        assert_eq!(names, vec!["bluesky"]);
    }
}
