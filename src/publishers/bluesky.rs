//! Bluesky (AT Protocol) publisher.
//!
//! Logs in with an app password on every publish, uploads the chart as a
//! blob when present, then creates an `app.bsky.feed.post` record.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::{Poster, check_length, check_response, transport};
use crate::error::{AppError, PublishFailure, Result};
use crate::models::{BlueskyConfig, ChartImage, PostMessage, PostReceipt};
use crate::utils::http::create_api_client;

const PLATFORM: &str = "bluesky";
const MAX_POST_LENGTH: usize = 300;
const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Posts to a Bluesky PDS.
pub struct BlueskyPoster {
    client: Client,
    service: Url,
    identifier: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct CreateSession<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct UploadedBlob {
    blob: Value,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    uri: String,
}

impl BlueskyPoster {
    pub fn new(config: &BlueskyConfig) -> Result<Self> {
        Ok(Self {
            client: create_api_client()?,
            service: Url::parse(&config.service)?,
            identifier: config.identifier.clone(),
            password: config.password.clone(),
        })
    }

    fn xrpc(&self, method: &str) -> Result<Url> {
        Ok(self.service.join(&format!("xrpc/{method}"))?)
    }

    async fn create_session(&self) -> Result<Session> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession")?)
            .json(&CreateSession {
                identifier: &self.identifier,
                password: &self.password,
            })
            .send()
            .await
            .map_err(transport(PLATFORM))?;
        let response = check_response(PLATFORM, "login", response).await?;
        response.json().await.map_err(transport(PLATFORM))
    }

    /// Upload a chart and return the blob reference to embed.
    async fn upload_blob(&self, session: &Session, image: &ChartImage) -> Result<Value> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.uploadBlob")?)
            .bearer_auth(&session.access_jwt)
            .header(CONTENT_TYPE, "image/png")
            .body(image.png.clone())
            .send()
            .await
            .map_err(transport(PLATFORM))?;
        let response = check_response(PLATFORM, "blob upload", response).await?;
        let uploaded: UploadedBlob = response.json().await.map_err(transport(PLATFORM))?;
        Ok(uploaded.blob)
    }

    async fn create_record(&self, session: &Session, record: Value) -> Result<String> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord")?)
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await
            .map_err(transport(PLATFORM))?;
        let response = check_response(PLATFORM, "post", response).await?;
        let created: CreatedRecord = response.json().await.map_err(transport(PLATFORM))?;
        Ok(created.uri)
    }
}

/// Build a post record, embedding one image when a blob is given.
fn post_record(text: &str, created_at: DateTime<Utc>, image: Option<(Value, &str)>) -> Value {
    let mut record = json!({
        "$type": POST_COLLECTION,
        "text": text,
        "createdAt": created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    if let Some((blob, alt)) = image {
        record["embed"] = json!({
            "$type": "app.bsky.embed.images",
            "images": [{ "alt": alt, "image": blob }],
        });
    }
    record
}

#[async_trait]
impl Poster for BlueskyPoster {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn publish(&self, message: &PostMessage) -> Result<PostReceipt> {
        check_length(PLATFORM, &message.body, MAX_POST_LENGTH)?;
        if self.identifier.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::publish(
                PLATFORM,
                PublishFailure::Auth,
                "no identifier or app password configured",
            ));
        }

        let session = self.create_session().await?;

        let embed = match &message.image {
            Some(image) => Some((
                self.upload_blob(&session, image).await?,
                image.alt_text.as_str(),
            )),
            None => None,
        };

        let record = post_record(&message.body, Utc::now(), embed);
        let uri = self.create_record(&session, record).await?;

        Ok(PostReceipt {
            platform: PLATFORM.to_string(),
            id: uri,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::CHART_ALT_TEXT;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_text_record() {
        let record = post_record("Terminal 1: 5 minutes", created_at(), None);
        assert_eq!(
            record,
            json!({
                "$type": "app.bsky.feed.post",
                "text": "Terminal 1: 5 minutes",
                "createdAt": "2024-03-04T12:00:00.000Z",
            })
        );
    }

    #[test]
    fn test_image_record_embeds_blob_with_alt_text() {
        let blob = json!({ "$type": "blob", "ref": { "$link": "bafk" }, "mimeType": "image/png", "size": 10 });
        let record = post_record("chart", created_at(), Some((blob.clone(), CHART_ALT_TEXT)));

        assert_eq!(record["embed"]["$type"], "app.bsky.embed.images");
        assert_eq!(record["embed"]["images"][0]["alt"], CHART_ALT_TEXT);
        assert_eq!(record["embed"]["images"][0]["image"], blob);
    }

    #[test]
    fn test_xrpc_url() {
        let poster = BlueskyPoster::new(&BlueskyConfig::default()).unwrap();
        assert_eq!(
            poster
                .xrpc("com.atproto.server.createSession")
                .unwrap()
                .as_str(),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }

    #[test]
    fn test_session_deserializes_camel_case() {
        let session: Session =
            serde_json::from_str(r#"{"accessJwt":"jwt","refreshJwt":"r","did":"did:plc:abc","handle":"h"}"#)
                .unwrap();
        assert_eq!(session.access_jwt, "jwt");
        assert_eq!(session.did, "did:plc:abc");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_failure() {
        let poster = BlueskyPoster::new(&BlueskyConfig::default()).unwrap();
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
}
