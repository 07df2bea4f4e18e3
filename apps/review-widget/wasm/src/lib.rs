//! Embeddable review widget
//!
//! A storefront drops in one script tag and gets a "Write a Review" button
//! plus a modal container. Submissions are validated with the same rules
//! the review API enforces before anything is posted.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { ReviewWidget } from './pkg/review_widget_wasm.js';
//!
//! await init();
//!
//! ReviewWidget.init({ productId: "phone-x", apiBaseUrl: "https://reviews.example.com" });
//! document.addEventListener("review-widget:open", showForm);
//! const { review, nextAction } = await ReviewWidget.submitReview(5, text, []);
//! ReviewWidget.close();
//! ```
//!
//! A `<script data-review-widget data-product-id="phone-x">` tag on the
//! page initializes the widget on load without any JavaScript.

pub mod config;
pub mod controller;
pub mod widget;

use wasm_bindgen::prelude::*;

pub use config::WidgetConfig;
pub use controller::{WidgetController, WidgetState, CLOSE_EVENT, OPEN_EVENT};
pub use widget::ReviewWidget;

/// Selector for the script tag that opts into auto-init
const AUTO_INIT_SELECTOR: &str = "script[data-review-widget]";

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    if let Err(e) = auto_init() {
        web_sys::console::error_1(&e);
    }
}

fn auto_init() -> Result<(), JsValue> {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return Ok(());
    };
    let Some(script) = document.query_selector(AUTO_INIT_SELECTOR)? else {
        return Ok(());
    };

    let config = WidgetConfig::from_attributes(|name| script.get_attribute(name));
    widget::init_widget(config)
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
