//! `ReviewWidget` global exposed to the embedding page

use std::cell::RefCell;

use review_core::{ReviewImage, SubmissionInput};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CustomEvent, Document, Element, HtmlButtonElement, Request, RequestInit, RequestMode, Response};

use crate::config::WidgetConfig;
use crate::controller::{rating_from_js, WidgetController, WidgetState, MODAL_CONTAINER_ID};

struct WidgetInstance {
    controller: WidgetController,
    /// Keeps the button's click handler alive until `destroy`
    on_click: Option<Closure<dyn FnMut()>>,
}

thread_local! {
    static INSTANCE: RefCell<WidgetInstance> = RefCell::new(WidgetInstance {
        controller: WidgetController::new(),
        on_click: None,
    });
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document available"))
}

/// Find `#id`, or append a new `<div id=id>` to the body
fn ensure_container(document: &Document, id: &str) -> Result<Element, JsValue> {
    if let Some(existing) = document.get_element_by_id(id) {
        return Ok(existing);
    }

    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("Document has no body"))?;
    let element = document.create_element("div")?;
    element.set_id(id);
    body.append_child(&element)?;
    Ok(element)
}

fn remove_containers(document: &Document, config: &WidgetConfig) {
    for id in [config.container_id.as_str(), MODAL_CONTAINER_ID] {
        if let Some(element) = document.get_element_by_id(id) {
            element.remove();
        }
    }
}

fn dispatch(event_name: &str) -> Result<(), JsValue> {
    let event = CustomEvent::new(event_name)?;
    document()?.dispatch_event(&event)?;
    Ok(())
}

pub(crate) fn init_widget(config: WidgetConfig) -> Result<(), JsValue> {
    let document = document()?;

    let previous = INSTANCE.with(|cell| {
        let mut instance = cell.borrow_mut();
        instance.on_click = None;
        instance.controller.init(config.clone())
    });
    if let Some(previous) = previous {
        remove_containers(&document, &previous);
    }

    let container = ensure_container(&document, &config.container_id)?;
    ensure_container(&document, MODAL_CONTAINER_ID)?;

    let button: HtmlButtonElement = document.create_element("button")?.dyn_into()?;
    button.set_type("button");
    button.set_text_content(Some(&config.button_text));

    let on_click = Closure::<dyn FnMut()>::new(|| {
        if let Err(e) = ReviewWidget::open() {
            web_sys::console::error_1(&e);
        }
    });
    button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
    container.append_child(&button)?;

    INSTANCE.with(|cell| cell.borrow_mut().on_click = Some(on_click));
    Ok(())
}

/// Global widget API: `ReviewWidget.init(config)`, `open()`, `close()`,
/// `destroy()` and `submitReview(rating, text, images)`
#[wasm_bindgen]
pub struct ReviewWidget {
    _private: (),
}

#[wasm_bindgen]
impl ReviewWidget {
    /// Create the button and modal containers and start closed.
    /// Calling `init` again replaces the existing widget.
    pub fn init(config: JsValue) -> Result<(), JsValue> {
        let config: WidgetConfig = if config.is_undefined() || config.is_null() {
            WidgetConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid widget config: {}", e)))?
        };

        init_widget(config)
    }

    /// Show the review form. No-op before `init`.
    pub fn open() -> Result<(), JsValue> {
        match INSTANCE.with(|cell| cell.borrow_mut().controller.open()) {
            Some(event) => dispatch(event),
            None => Ok(()),
        }
    }

    /// Hide the review form. No-op before `init`.
    pub fn close() -> Result<(), JsValue> {
        match INSTANCE.with(|cell| cell.borrow_mut().controller.close()) {
            Some(event) => dispatch(event),
            None => Ok(()),
        }
    }

    /// Remove the widget's containers and forget its config
    pub fn destroy() -> Result<(), JsValue> {
        let config = INSTANCE.with(|cell| {
            let mut instance = cell.borrow_mut();
            instance.on_click = None;
            instance.controller.destroy()
        });

        if let Some(config) = config {
            remove_containers(&document()?, &config);
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open() -> bool {
        INSTANCE.with(|cell| {
            cell.borrow().controller.state() == WidgetState::Open
        })
    }

    /// Validate with the shared submission rules, then post to the review API.
    /// Resolves to the API's `{review, nextAction}` response.
    #[wasm_bindgen(js_name = submitReview)]
    pub async fn submit_review(rating: f64, text: String, images: JsValue) -> Result<JsValue, JsValue> {
        let rating = rating_from_js(rating).map_err(|e| JsValue::from_str(&e))?;
        let images: Vec<ReviewImage> = if images.is_undefined() || images.is_null() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(images)
                .map_err(|e| JsValue::from_str(&format!("Invalid images: {}", e)))?
        };
        let input = SubmissionInput { rating, text, images };

        let (url, body) = INSTANCE
            .with(|cell| cell.borrow().controller.prepare_submission(&input))
            .map_err(|e| JsValue::from_str(&e))?;

        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_mode(RequestMode::Cors);
        opts.set_body(&JsValue::from_str(&body.to_string()));

        let request = Request::new_with_str_and_init(&url, &opts)?;
        request.headers().set("Content-Type", "application/json")?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window available"))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await?
            .dyn_into()?;
        let payload = JsFuture::from(response.json()?).await?;

        if !response.ok() {
            let message = js_sys::Reflect::get(&payload, &JsValue::from_str("error"))
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_else(|| format!("Review submission failed ({})", response.status()));
            return Err(JsValue::from_str(&message));
        }

        Ok(payload)
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use crate::controller::{CLOSE_EVENT, OPEN_EVENT};
    use std::cell::Cell;
    use std::rc::Rc;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn count_events(name: &str) -> (Rc<Cell<u32>>, Closure<dyn FnMut()>) {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let listener = Closure::<dyn FnMut()>::new(move || seen.set(seen.get() + 1));
        document()
            .unwrap()
            .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
            .unwrap();
        (count, listener)
    }

    #[wasm_bindgen_test]
    fn lifecycle_dispatches_events_and_cleans_up() {
        let (opened, _open_listener) = count_events(OPEN_EVENT);
        let (closed, _close_listener) = count_events(CLOSE_EVENT);
        let document = document().unwrap();

        // Before init nothing is dispatched
        ReviewWidget::open().unwrap();
        assert_eq!(opened.get(), 0);

        ReviewWidget::init(JsValue::UNDEFINED).unwrap();
        let container = document.get_element_by_id("review-widget-container").unwrap();
        assert_eq!(container.text_content().as_deref(), Some("Write a Review"));
        assert!(document.get_element_by_id(MODAL_CONTAINER_ID).is_some());
        assert!(!ReviewWidget::is_open());

        ReviewWidget::open().unwrap();
        assert_eq!(opened.get(), 1);
        assert!(ReviewWidget::is_open());

        ReviewWidget::close().unwrap();
        assert_eq!(closed.get(), 1);
        assert!(!ReviewWidget::is_open());

        ReviewWidget::destroy().unwrap();
        assert!(document.get_element_by_id("review-widget-container").is_none());
        assert!(document.get_element_by_id(MODAL_CONTAINER_ID).is_none());

        ReviewWidget::close().unwrap();
        assert_eq!(closed.get(), 1);
    }
}
