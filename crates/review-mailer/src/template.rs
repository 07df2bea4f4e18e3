//! Review-request email templates
//!
//! Copy differs by email type; layout is shared.

use review_core::{parse_purchase_date, EmailType};

use crate::types::ReviewEmailRequest;

/// Subject, bodies and the review link for one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub review_url: String,
}

struct EmailCopy {
    greeting: String,
    opening: String,
    body: &'static str,
}

fn copy_for(email_type: EmailType, first_name: &str, product: &str) -> EmailCopy {
    match email_type {
        EmailType::InitialRequest => EmailCopy {
            greeting: format!("Hi {}!", first_name),
            opening: format!("Thank you for your recent purchase of {}!", product),
            body: "We hope you're enjoying it! We'd love to hear about your experience.",
        },
        EmailType::Reminder => EmailCopy {
            greeting: format!("Hi again, {}!", first_name),
            opening: format!(
                "We noticed you haven't had a chance to review your {} yet.",
                product
            ),
            body: "Your feedback is incredibly valuable to us and helps other customers make informed decisions.",
        },
    }
}

fn subject_for(email_type: EmailType, product: &str) -> String {
    match email_type {
        EmailType::InitialRequest => format!("How was your {}?", product),
        EmailType::Reminder => format!("Reminder: Share your experience with {}", product),
    }
}

/// Link to the review form, with the product and optional token as query parameters
pub fn review_url(app_url: &str, product_id: &str, token: Option<&str>) -> String {
    let mut params = vec![("productId", product_id)];
    if let Some(token) = token {
        params.push(("token", token));
    }

    match reqwest::Url::parse_with_params(app_url, &params) {
        Ok(url) => url.to_string(),
        // Not a URL we can parse; fall back to plain concatenation
        Err(_) => {
            let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{}?{}", app_url, query.join("&"))
        }
    }
}

/// "January 8, 2024", or the raw value when it is not a recognisable date
fn format_order_date(raw: &str) -> String {
    parse_purchase_date(raw)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the email for `request`
pub fn render(request: &ReviewEmailRequest, app_url: &str) -> RenderedEmail {
    let first_name = request
        .to_name
        .split_whitespace()
        .next()
        .unwrap_or("there");
    let subject = subject_for(request.email_type, &request.product_name);
    let url = review_url(app_url, &request.product_id, request.custom_token.as_deref());
    let order_date = format_order_date(&request.order_date);

    let copy = copy_for(request.email_type, first_name, &request.product_name);
    let html_copy = copy_for(
        request.email_type,
        &escape_html(first_name),
        &format!("<strong>{}</strong>", escape_html(&request.product_name)),
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f5f5f5;">
  <table role="presentation" style="width: 100%; border-collapse: collapse;">
    <tr>
      <td align="center" style="padding: 40px 0;">
        <table role="presentation" style="width: 600px; max-width: 100%; background-color: #ffffff; border-radius: 8px;">
          <tr>
            <td style="padding: 40px; text-align: center; background: #F97315;">
              <h1 style="margin: 0; color: #ffffff; font-size: 28px;">Your Opinion Matters</h1>
            </td>
          </tr>
          <tr>
            <td style="padding: 40px;">
              <h2 style="margin: 0 0 20px; color: #1f2937; font-size: 24px;">{greeting}</h2>
              <p style="margin: 0 0 20px; color: #4b5563; font-size: 16px; line-height: 1.6;">{opening}</p>
              <p style="margin: 0 0 20px; color: #4b5563; font-size: 16px; line-height: 1.6;">{body}</p>
              <p style="margin: 0 0 30px; color: #4b5563; font-size: 16px; line-height: 1.6;">
                It only takes a minute to share your thoughts, and your review helps other customers make better decisions.
              </p>
              <table role="presentation" style="margin: 0 auto;">
                <tr>
                  <td style="border-radius: 6px; background: #F97315;">
                    <a href="{url}" style="display: inline-block; padding: 16px 40px; color: #ffffff; text-decoration: none; font-size: 16px; font-weight: bold;">
                      Write Your Review
                    </a>
                  </td>
                </tr>
              </table>
              <p style="margin: 30px 0 0; color: #6b7280; font-size: 14px;">
                <strong>Order Date:</strong> {order_date}
              </p>
            </td>
          </tr>
          <tr>
            <td style="padding: 30px 40px; background-color: #f9fafb; border-top: 1px solid #e5e7eb;">
              <p style="margin: 0; color: #6b7280; font-size: 14px; text-align: center;">
                Thank you for being a valued customer!
              </p>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#,
        title = escape_html(&subject),
        greeting = html_copy.greeting,
        opening = html_copy.opening,
        body = html_copy.body,
        url = escape_html(&url),
        order_date = escape_html(&order_date),
    );

    let text = format!(
        "{greeting}\n\n{opening}\n\n{body}\n\n\
         It only takes a minute to share your thoughts, and your review helps other customers make better decisions.\n\n\
         Write your review here: {url}\n\n\
         Order Date: {order_date}\n\n\
         Thank you for being a valued customer!\n",
        greeting = copy.greeting,
        opening = copy.opening,
        body = copy.body,
        url = url,
        order_date = order_date,
    );

    RenderedEmail {
        subject,
        html,
        text,
        review_url: url,
    }
}
