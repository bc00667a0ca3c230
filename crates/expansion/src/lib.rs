#![deny(warnings)]

//! Recurring quest expansion.
//!
//! The [`ExpansionEngine`] walks every stored rule for a target date and
//! makes sure each rule that is due has exactly one quest for that date.
//! Stores are reached through the [`RuleStore`] and [`QuestStore`] ports;
//! [`MemoryStore`] implements both for tests and dry runs.

mod engine;
mod memory;
mod report;
mod rules;
mod store;

pub use engine::{
    parse_target_date, EngineConfig, EngineError, ExpansionEngine, DEFAULT_STORE_TIMEOUT,
};
pub use memory::MemoryStore;
pub use report::{CreatedQuest, FailedRule, RunReport, SkipReason, SkippedRule};
pub use rules::{DeleteScope, Deleted, RuleService, RuleServiceError};
pub use store::{QuestStore, RuleStore, StoreError};
pub use tokio_util::sync::CancellationToken;
