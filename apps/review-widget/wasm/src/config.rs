//! Widget configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRODUCT_ID: &str = "default-product";
pub const DEFAULT_BUTTON_TEXT: &str = "Write a Review";
pub const DEFAULT_CONTAINER_ID: &str = "review-widget-container";

/// Options passed to `ReviewWidget.init`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    pub product_id: String,
    /// Review API origin; empty means the page's own origin
    pub api_base_url: String,
    pub button_text: String,
    pub container_id: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            product_id: DEFAULT_PRODUCT_ID.to_string(),
            api_base_url: String::new(),
            button_text: DEFAULT_BUTTON_TEXT.to_string(),
            container_id: DEFAULT_CONTAINER_ID.to_string(),
        }
    }
}

impl WidgetConfig {
    /// Build from `data-*` attributes on the embedding `<script data-review-widget>` tag
    pub fn from_attributes<F>(attribute: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str, fallback: String| {
            attribute(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        Self {
            product_id: read("data-product-id", defaults.product_id),
            api_base_url: read("data-api-base-url", defaults.api_base_url),
            button_text: read("data-button-text", defaults.button_text),
            container_id: read("data-container-id", defaults.container_id),
        }
    }

    /// Endpoint the widget posts reviews to
    pub fn reviews_url(&self) -> String {
        format!("{}/api/reviews", self.api_base_url.trim_end_matches('/'))
    }
}
