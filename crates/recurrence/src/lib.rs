#![deny(warnings)]

//! Recurrence calculus for quest rules.
//!
//! This crate provides pure, deterministic helpers for:
//! - Deciding whether a rule fires on a date ([`fires_on`])
//! - Resolving the concrete day a monthly rule targets ([`resolve_monthly_day`])
//! - Deciding whether a rule's end condition is met ([`is_exhausted`])
//! - Previewing upcoming firings ([`upcoming`])
//!
//! Nothing here touches storage; the expansion engine combines these with
//! the rule and quest stores.

pub mod calendar;
mod end_condition;
mod occurrence;
mod preview;

pub use end_condition::{is_exhausted, remaining_firings};
pub use occurrence::{annual_date, fires_on, resolve_monthly_day};
pub use preview::{final_firing, upcoming, PREVIEW_HORIZON_DAYS};
