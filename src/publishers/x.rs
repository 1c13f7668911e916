//! X (Twitter) API v2 publisher.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Poster, check_length, check_response, transport};
use crate::error::{AppError, PublishFailure, Result};
use crate::models::{ChartImage, PostMessage, PostReceipt, XConfig};
use crate::utils::http::create_api_client;

const PLATFORM: &str = "x";
const MAX_POST_LENGTH: usize = 280;

/// Posts through the X API v2 with an OAuth 2.0 user token.
pub struct XPoster {
    client: Client,
    api_base: Url,
    access_token: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct CreatePost<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<PostMedia>,
}

#[derive(Debug, Serialize, PartialEq)]
struct PostMedia {
    media_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

impl XPoster {
    pub fn new(config: &XConfig) -> Result<Self> {
        Ok(Self {
            client: create_api_client()?,
            api_base: Url::parse(&config.api_base)?,
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.api_base.join(path)?)
    }

    /// Upload a chart and return its media id.
    async fn upload_media(&self, image: &ChartImage) -> Result<String> {
        let part = Part::bytes(image.png.clone())
            .file_name("plot.png")
            .mime_str("image/png")
            .map_err(transport(PLATFORM))?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let response = self
            .client
            .post(self.endpoint("2/media/upload")?)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(transport(PLATFORM))?;
        let response = check_response(PLATFORM, "media upload", response).await?;

        let uploaded: Envelope<IdOnly> = response.json().await.map_err(transport(PLATFORM))?;
        log::debug!("Uploaded chart to X as media {}", uploaded.data.id);
        Ok(uploaded.data.id)
    }

    async fn create_post(&self, body: &CreatePost<'_>) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("2/tweets")?)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(transport(PLATFORM))?;
        let response = check_response(PLATFORM, "post", response).await?;

        let created: Envelope<IdOnly> = response.json().await.map_err(transport(PLATFORM))?;
        Ok(created.data.id)
    }
}

#[async_trait]
impl Poster for XPoster {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn publish(&self, message: &PostMessage) -> Result<PostReceipt> {
        check_length(PLATFORM, &message.body, MAX_POST_LENGTH)?;
        if self.access_token.trim().is_empty() {
            return Err(AppError::publish(
                PLATFORM,
                PublishFailure::Auth,
                "no access token configured",
            ));
        }

        let media = match &message.image {
            Some(image) => Some(PostMedia {
                media_ids: vec![self.upload_media(image).await?],
            }),
            None => None,
        };

        let id = self
            .create_post(&CreatePost {
                text: &message.body,
                media,
            })
            .await?;

        Ok(PostReceipt {
            platform: PLATFORM.to_string(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_body_omits_media() {
        let body = CreatePost {
            text: "hello",
            media: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "text": "hello" })
        );
    }

    #[test]
    fn test_media_body() {
        let body = CreatePost {
            text: "chart",
            media: Some(PostMedia {
                media_ids: vec!["123".to_string()],
            }),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "text": "chart", "media": { "media_ids": ["123"] } })
        );
    }

    #[test]
    fn test_endpoints() {
        let poster = XPoster::new(&XConfig::default()).unwrap();
        assert_eq!(
            poster.endpoint("2/tweets").unwrap().as_str(),
            "https://api.x.com/2/tweets"
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_failure() {
        let poster = XPoster::new(&XConfig::default()).unwrap();
        let err = poster
            .publish(&PostMessage::new("hi", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Publish {
                kind: PublishFailure::Auth,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_overlong_post_rejected_locally() {
        let config = XConfig {
            access_token: "token".to_string(),
            ..XConfig::default()
        };
        let poster = XPoster::new(&config).unwrap();
        let err = poster
            .publish(&PostMessage::new("x".repeat(281), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Publish {
                kind: PublishFailure::Payload,
                ..
            }
        ));
    }
}
