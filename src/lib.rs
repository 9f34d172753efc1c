pub mod audit;
pub mod cashflow;
pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod logging;
pub mod resolver;
pub mod rules;
pub mod service;
pub mod store;
pub mod utils;
pub mod version;

pub use cashflow::{CashflowDraft, CashflowRecord, RevisionType};
pub use error::{CashflowError, ErrorCategory, SubCategory};
pub use event::InboundEvent;
pub use resolver::resolve_revision_type;
pub use service::{CashflowService, ProcessOutcome};
pub use store::SledCashflowStore;
pub use version::{CfProcessedCheckOutcome, VersionManager};
