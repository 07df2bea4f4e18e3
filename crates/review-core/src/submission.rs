//! Submission routing
//!
//! Every place that accepts a new review (the public form endpoint, the
//! order-review flow and the embeddable widget) goes through [`submit`].
//! The rating alone decides the initial status and what the submitter
//! sees next.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::review::{
    ReviewImage, ReviewStatus, MAX_IMAGES, MAX_IMAGE_BYTES, MAX_RATING, MAX_TEXT_LENGTH,
    MIN_RATING, MIN_TEXT_LENGTH,
};

/// Delay before a 5-star submitter is sent to the incentive page
pub const INCENTIVE_REDIRECT_DELAY_MS: u64 = 2000;

/// Path of the incentive (cross-posting rewards) page
pub const INCENTIVE_PATH: &str = "/incentive";

/// Raw submission as entered by the customer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionInput {
    /// Selected star count; 0 means nothing was selected
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<ReviewImage>,
}

/// Accepted submission: what to store and what to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub status: ReviewStatus,
    pub next_action: NextAction,
    pub rating: u8,
    /// Trimmed review text
    pub text: String,
    pub images: Vec<String>,
}

/// What the submitter's UI does after a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NextAction {
    /// Published immediately; go to the incentive page after a delay
    RedirectToIncentive { path: String, delay_ms: u64 },
    /// Queued for moderation
    AwaitingApproval { title: String, message: String },
    /// Queued for the team to look at
    ThankYouForFeedback { title: String, message: String },
}

impl NextAction {
    fn for_rating(rating: u8) -> Self {
        match rating {
            5 => NextAction::RedirectToIncentive {
                path: INCENTIVE_PATH.to_string(),
                delay_ms: INCENTIVE_REDIRECT_DELAY_MS,
            },
            4 => NextAction::AwaitingApproval {
                title: "Thank you for your review!".to_string(),
                message: "Your feedback has been submitted for approval. Once approved, \
                          you'll receive an email with a link to our public review incentive program."
                    .to_string(),
            },
            _ => NextAction::ThankYouForFeedback {
                title: "Thank you for your feedback!".to_string(),
                message: "We appreciate you taking the time to share your experience. \
                          Your review has been submitted for our team to look at."
                    .to_string(),
            },
        }
    }
}

/// Why a submission was refused. The message is shown inline on the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Please select a rating")]
    MissingRating,

    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange(u8),

    #[error("Review must be at least 10 characters long")]
    TextTooShort,

    #[error("Review must be at most 1000 characters long")]
    TextTooLong(usize),

    #[error("You can only upload up to 3 images")]
    TooManyImages(usize),

    #[error("Image \"{0}\" exceeds 5MB limit")]
    ImageTooLarge(String),

    #[error("\"{0}\" is not a valid image file")]
    NotAnImage(String),
}

/// Validate a submission and decide its initial status.
///
/// Status is `Approved` iff the rating is 5; everything else starts
/// `Pending`.
pub fn submit(input: &SubmissionInput) -> Result<Submission, SubmissionError> {
    if input.rating < MIN_RATING {
        return Err(SubmissionError::MissingRating);
    }
    if input.rating > MAX_RATING {
        return Err(SubmissionError::RatingOutOfRange(input.rating));
    }

    let text = input.text.trim();
    let length = text.chars().count();
    if length < MIN_TEXT_LENGTH {
        return Err(SubmissionError::TextTooShort);
    }
    if length > MAX_TEXT_LENGTH {
        return Err(SubmissionError::TextTooLong(length));
    }

    if input.images.len() > MAX_IMAGES {
        return Err(SubmissionError::TooManyImages(input.images.len()));
    }
    for image in &input.images {
        if image.size_bytes().is_some_and(|size| size > MAX_IMAGE_BYTES) {
            return Err(SubmissionError::ImageTooLarge(image.url().to_string()));
        }
        if image
            .content_type()
            .is_some_and(|content_type| !content_type.starts_with("image/"))
        {
            return Err(SubmissionError::NotAnImage(image.url().to_string()));
        }
    }

    let status = if input.rating == MAX_RATING {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Pending
    };

    Ok(Submission {
        status,
        next_action: NextAction::for_rating(input.rating),
        rating: input.rating,
        text: text.to_string(),
        images: input.images.iter().map(|i| i.url().to_string()).collect(),
    })
}
