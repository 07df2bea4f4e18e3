//! Order webhook validation and the order-review context

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::REMINDER_DELAY_DAYS;

/// Last year a stored timestamp can carry and still sort as text
pub const MAX_SCHEDULE_YEAR: i32 = 9999;

/// Order webhook payload as posted by the store
///
/// Every field is optional at the wire level so that a missing field is
/// reported as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWebhook {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<String>,
}

/// A validated order, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub purchase_date: DateTime<Utc>,
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Internal identifier
    pub id: String,
    /// External (store) order id, unique
    pub order_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub purchase_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),

    #[error("Invalid purchase date: {0}")]
    InvalidPurchaseDate(String),
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl OrderWebhook {
    /// Check required fields and parse the purchase date
    pub fn validate(&self) -> Result<NewOrder, IntakeError> {
        let fields = [
            ("orderId", required(&self.order_id)),
            ("customerEmail", required(&self.customer_email)),
            ("customerName", required(&self.customer_name)),
            ("productId", required(&self.product_id)),
            ("productName", required(&self.product_name)),
            ("purchaseDate", required(&self.purchase_date)),
        ];

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(IntakeError::MissingFields(missing));
        }

        let [order_id, customer_email, customer_name, product_id, product_name, purchase_date] =
            fields.map(|(_, value)| value.unwrap_or_default().to_string());

        let parsed = parse_purchase_date(&purchase_date)?;
        let last_send = parsed.checked_add_signed(Duration::days(REMINDER_DELAY_DAYS));
        if !last_send.is_some_and(|at| at.year() <= MAX_SCHEDULE_YEAR) {
            return Err(IntakeError::InvalidPurchaseDate(purchase_date));
        }

        Ok(NewOrder {
            purchase_date: parsed,
            order_id,
            customer_email,
            customer_name,
            product_id,
            product_name,
        })
    }
}

/// Parse a purchase date.
///
/// Accepts RFC 3339 (`2024-01-01T10:30:00Z`, any offset), a naive
/// date-time taken as UTC, or a bare `YYYY-MM-DD` taken as UTC midnight.
pub fn parse_purchase_date(raw: &str) -> Result<DateTime<Utc>, IntakeError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(IntakeError::InvalidPurchaseDate(raw.to_string()))
}

/// Who is reviewing what when a customer follows an order link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReviewContext {
    pub product_id: String,
    pub product_name: Option<String>,
    /// Internal order id, present only when the order was found
    pub order_ref: Option<String>,
    pub author: String,
    #[serde(skip_serializing)]
    pub author_email: Option<String>,
    pub verified_purchase: bool,
}

impl OrderReviewContext {
    /// Build the context for `external_order_id`.
    ///
    /// When no order is on file the id is treated as the product id and
    /// the review is anonymous and unverified.
    pub fn resolve(external_order_id: &str, order: Option<&Order>) -> Self {
        match order {
            Some(order) => {
                let author = if !order.customer_name.trim().is_empty() {
                    order.customer_name.trim().to_string()
                } else {
                    order
                        .customer_email
                        .split('@')
                        .next()
                        .filter(|local| !local.is_empty())
                        .unwrap_or("Customer")
                        .to_string()
                };

                Self {
                    product_id: order.product_id.clone(),
                    product_name: Some(order.product_name.clone()),
                    order_ref: Some(order.id.clone()),
                    author,
                    author_email: Some(order.customer_email.clone()),
                    verified_purchase: true,
                }
            }
            None => Self {
                product_id: external_order_id.to_string(),
                product_name: None,
                order_ref: None,
                author: "Customer".to_string(),
                author_email: None,
                verified_purchase: false,
            },
        }
    }
}
