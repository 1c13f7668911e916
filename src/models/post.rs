//! Outgoing post payload.

/// Alt text attached to chart images.
pub const CHART_ALT_TEXT: &str = "Dublin Airport security times";

/// A rendered chart ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    /// PNG-encoded bytes
    pub png: Vec<u8>,

    /// Accessibility description
    pub alt_text: String,
}

impl ChartImage {
    pub fn new(png: Vec<u8>) -> Self {
        Self {
            png,
            alt_text: CHART_ALT_TEXT.to_string(),
        }
    }
}

/// Text body plus optional chart, shared read-only by every publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub body: String,
    pub image: Option<ChartImage>,
}

impl PostMessage {
    pub fn new(body: impl Into<String>, image: Option<ChartImage>) -> Self {
        Self {
            body: body.into(),
            image,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Identifier returned by a platform after a successful post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub platform: String,
    pub id: String,
}
