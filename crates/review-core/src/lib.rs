//! Core review rules shared by the API server and the embeddable widget
//!
//! Everything in this crate is pure: no I/O, no clocks read implicitly.
//! Callers pass `now` and persisted records in, and get decisions back.
//!
//! ## Modules
//!
//! - [`review`] - the review record and its field limits
//! - [`submission`] - rating-driven routing of a new review
//! - [`moderation`] - the explicit approve/reject transition table
//! - [`order`] - order webhook validation
//! - [`schedule`] - review-request email scheduling and job states
//! - [`stats`] - rating summary and public display filter/sort
//!
//! ## Flow
//!
//! ```text
//! order webhook ─► order::validate ─► schedule::schedule ─► (queue processor)
//!                                                               │
//! review form ─► submission::submit ─► moderation::transition ◄─┘ (already reviewed?)
//! ```

pub mod moderation;
pub mod order;
pub mod review;
pub mod schedule;
pub mod stats;
pub mod submission;

pub use moderation::{decide, transition, Decision, Transition, TransitionError};
pub use order::{
    parse_purchase_date, IntakeError, NewOrder, Order, OrderReviewContext, OrderWebhook,
};
pub use review::{Review, ReviewImage, ReviewStatus};
pub use schedule::{schedule, truncate_error, EmailType, JobStatus, ScheduledEmail};
pub use stats::{DisplayQuery, RatingDistribution, ReviewStats, SortOrder};
pub use submission::{submit, NextAction, Submission, SubmissionError, SubmissionInput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
