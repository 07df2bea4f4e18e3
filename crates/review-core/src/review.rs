//! Review record and field limits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lowest accepted star rating
pub const MIN_RATING: u8 = 1;

/// Highest accepted star rating
pub const MAX_RATING: u8 = 5;

/// Minimum review length after trimming whitespace
pub const MIN_TEXT_LENGTH: usize = 10;

/// Maximum review length in characters
pub const MAX_TEXT_LENGTH: usize = 1000;

/// Maximum number of images attached to one review
pub const MAX_IMAGES: usize = 3;

/// Maximum declared size of a single image (5 MiB)
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Moderation status of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const ALL: [ReviewStatus; 3] = [
        ReviewStatus::Pending,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(format!("Unknown review status: {}", other)),
        }
    }
}

/// An image reference attached to a submission
///
/// Accepts either a bare URL string or an object carrying the
/// declared upload metadata. Storage of the bytes happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewImage {
    Url(String),
    #[serde(rename_all = "camelCase")]
    Upload {
        url: String,
        #[serde(default)]
        size_bytes: Option<u64>,
        #[serde(default)]
        content_type: Option<String>,
    },
}

impl ReviewImage {
    pub fn url(&self) -> &str {
        match self {
            ReviewImage::Url(url) => url,
            ReviewImage::Upload { url, .. } => url,
        }
    }

    pub fn size_bytes(&self) -> Option<u64> {
        match self {
            ReviewImage::Url(_) => None,
            ReviewImage::Upload { size_bytes, .. } => *size_bytes,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            ReviewImage::Url(_) => None,
            ReviewImage::Upload { content_type, .. } => content_type.as_deref(),
        }
    }
}

/// A stored review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Customer email, known only for reviews written from an order link
    #[serde(default, skip_serializing)]
    pub author_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub rating: u8,
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub verified_purchase: bool,
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl Review {
    pub fn has_photos(&self) -> bool {
        !self.images.is_empty()
    }
}
