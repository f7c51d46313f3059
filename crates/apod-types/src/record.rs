//! Astronomy Picture of the Day record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of media the record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    /// Anything the upstream API adds later
    #[serde(other)]
    Other,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Other => write!(f, "other"),
        }
    }
}

/// One astronomy-of-the-day item.
///
/// The same shape is used for the upstream payload, request bodies and
/// responses. `id` is assigned by the store and ignored on input. Unknown
/// fields are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    pub title: String,
    pub url: String,
}

impl Record {
    /// Create a record carrying only the required fields
    pub fn new(
        explanation: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            copyright: None,
            date: None,
            explanation: explanation.into(),
            hdurl: None,
            media_type: None,
            service_version: None,
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}
