//! Widget lifecycle, independent of the DOM
//!
//! The DOM layer asks the controller what to do and performs it: which
//! event to dispatch, which containers to remove, what to post.

use review_core::{submit, SubmissionInput};
use serde_json::{json, Value};

use crate::config::WidgetConfig;

/// Dispatched on `document` when the review form should show
pub const OPEN_EVENT: &str = "review-widget:open";

/// Dispatched on `document` when the review form should hide
pub const CLOSE_EVENT: &str = "review-widget:close";

/// Id of the container the review form is mounted into
pub const MODAL_CONTAINER_ID: &str = "review-widget-modal";

/// Narrow a rating from JavaScript without wrapping.
///
/// `NaN`, `undefined` and `0` mean no rating was picked. Anything that is not
/// a whole number within `u8` is reported as out of range.
pub fn rating_from_js(value: f64) -> Result<u8, String> {
    if value.is_nan() {
        return Ok(0);
    }
    if value.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&value) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(value as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Uninitialized,
    Closed,
    Open,
}

#[derive(Debug)]
pub struct WidgetController {
    state: WidgetState,
    config: Option<WidgetConfig>,
}

impl Default for WidgetController {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetController {
    pub fn new() -> Self {
        Self {
            state: WidgetState::Uninitialized,
            config: None,
        }
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn config(&self) -> Option<&WidgetConfig> {
        self.config.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Start closed with `config`. Returns the previous config when this
    /// replaces a live widget, so its containers can be torn down first.
    pub fn init(&mut self, config: WidgetConfig) -> Option<WidgetConfig> {
        let previous = self.config.replace(config);
        self.state = WidgetState::Closed;
        previous
    }

    /// Event to dispatch, or `None` before `init`
    pub fn open(&mut self) -> Option<&'static str> {
        if !self.is_initialized() {
            return None;
        }
        self.state = WidgetState::Open;
        Some(OPEN_EVENT)
    }

    /// Event to dispatch, or `None` before `init`
    pub fn close(&mut self) -> Option<&'static str> {
        if !self.is_initialized() {
            return None;
        }
        self.state = WidgetState::Closed;
        Some(CLOSE_EVENT)
    }

    /// Forget the widget; returns its config if there was one
    pub fn destroy(&mut self) -> Option<WidgetConfig> {
        self.state = WidgetState::Uninitialized;
        self.config.take()
    }

    /// Validate a submission and build the request body for the reviews endpoint.
    ///
    /// Returns the URL to post to alongside the body.
    pub fn prepare_submission(&self, input: &SubmissionInput) -> Result<(String, Value), String> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| "Review widget is not initialized".to_string())?;
        let submission = submit(input).map_err(|e| e.to_string())?;

        let body = json!({
            "productId": config.product_id,
            "rating": submission.rating,
            "text": submission.text,
            "images": submission.images,
        });

        Ok((config.reviews_url(), body))
    }
}
