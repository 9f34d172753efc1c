//! Error types for the revision and versioning engine
use crate::cashflow::{RevisionType, TradeEventAction, TradeEventType, TradeType};

/// How a failure must be handled by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ErrorCategory {
    /// Programming or data-integrity violation. Never retried.
    #[n(0)]
    TechnicalUnrecoverable,
    /// A concurrent writer advanced the cashflow. The whole unit may be retried.
    #[n(1)]
    TechnicalRecoverable,
    /// Reference data problem an operator can fix before replaying.
    #[n(2)]
    BusinessRecoverable,
    /// Terminal business state, e.g. the cashflow is already cancelled.
    #[n(3)]
    BusinessUnrecoverable,
}

/// Stable reason codes written to the rejection log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum SubCategory {
    #[n(0)]
    RevisionTypeResolutionFailure,
    #[n(1)]
    NotFirstVersion,
    #[n(2)]
    TradeIdMismatch,
    #[n(3)]
    IncorrectRevisionType,
    #[n(4)]
    CfPersistenceFailure,
    #[n(5)]
    InvalidFoVersion,
    #[n(6)]
    InvalidMessage,
    #[n(7)]
    MissingSsi,
    #[n(8)]
    InactiveCounterparty,
    #[n(9)]
    MissingNostro,
    #[n(10)]
    LastCashflowCancelled,
}

impl SubCategory {
    pub fn code(&self) -> &'static str {
        match self {
            SubCategory::RevisionTypeResolutionFailure => "REVISION_TYPE_RESOLUTION_FAILURE",
            SubCategory::NotFirstVersion => "NOT_FIRST_VERSION",
            SubCategory::TradeIdMismatch => "TRADEID_MISMATCH",
            SubCategory::IncorrectRevisionType => "INCORRECT_CF_REVISION_TYPE",
            SubCategory::CfPersistenceFailure => "CF_PERSISTENCE_FAILURE",
            SubCategory::InvalidFoVersion => "INVALID_FO_VERSION",
            SubCategory::InvalidMessage => "INVALID_MESSAGE",
            SubCategory::MissingSsi => "INACTIVE_OR_MISSING_SSI",
            SubCategory::InactiveCounterparty => "INACTIVE_COUNTERPARTY_CODE",
            SubCategory::MissingNostro => "MISSING_NOSTRO",
            SubCategory::LastCashflowCancelled => "LAST_CASHFLOW_CANCELLED",
        }
    }
}

/// No rule matched the given combination of inputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Unable to determine RevisionType. firstCashflow: {first_cashflow}, tradeType: {trade_type:?}, tradeEventType: {event_type:?}, tradeEventAction: {event_action:?}"
)]
pub struct ResolutionFailure {
    pub first_cashflow: bool,
    pub trade_type: TradeType,
    pub event_type: TradeEventType,
    pub event_action: TradeEventAction,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(
        "Cashflow[cfID: {cashflow_id}, cfVer: {cashflow_version}] is no longer latest, possibly updated by a concurrent transaction"
    )]
    ConcurrentUpdate {
        cashflow_id: u64,
        cashflow_version: u32,
    },
    #[error("A first version already exists for foCashflowID {fo_cashflow_id}")]
    FirstVersionExists { fo_cashflow_id: u64 },
    #[error(
        "Multiple cashflows are latest for cashflowID {cashflow_id} (expected version {expected_version}, index has {indexed_version})"
    )]
    MultipleLatest {
        cashflow_id: u64,
        expected_version: u32,
        indexed_version: u32,
    },
    #[error("Cashflow[cfID: {cashflow_id}, cfVer: {cashflow_version}] does not exist")]
    MissingRecord {
        cashflow_id: u64,
        cashflow_version: u32,
    },
    #[error("Malformed key in tree {0}")]
    MalformedKey(&'static str),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Storage error: {0}")]
    Sled(#[from] sled::Error),
}

impl StoreError {
    /// The conditional write found that someone else moved the cashflow on.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrentUpdate { .. } | StoreError::FirstVersionExists { .. }
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("No primary SSI found for Counterparty: {counterparty}, Currency: {currency}, TradeType: {trade_type:?}")]
    MissingSsi {
        counterparty: String,
        currency: String,
        trade_type: TradeType,
    },
    #[error("Primary SSI: {ssi_id} is inactive")]
    InactiveSsi { ssi_id: String },
    #[error("Counterparty: {0} is inactive")]
    InactiveCounterparty(String),
    #[error("No nostro found for Entity: {entity}, Currency: {currency}")]
    MissingNostro { entity: String, currency: String },
    #[error("Draft is missing field {0} required for enrichment")]
    MissingField(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum CashflowError {
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),
    #[error("Previous cashflow version is not processed. foCashflowVersion: {fo_cashflow_version}")]
    NotFirstVersion { fo_cashflow_version: u32 },
    #[error("Incorrect RevisionType determination {revision_type:?} for foCashflowVersion {fo_cashflow_version}")]
    IncorrectRevisionType {
        fo_cashflow_version: u32,
        revision_type: RevisionType,
    },
    #[error("TradeID {actual} does not match tradeID {expected} of last processed cashflow for foCashflowID {fo_cashflow_id}")]
    TradeIdMismatch {
        fo_cashflow_id: u64,
        expected: u64,
        actual: u64,
    },
    #[error("TradeVersion {actual} differs from {expected} although tradeID and foCashflowID-Ver {fo_cashflow_id}-{fo_cashflow_version} match")]
    TradeVersionMismatch {
        fo_cashflow_id: u64,
        fo_cashflow_version: u32,
        expected: u32,
        actual: u32,
    },
    #[error("fields[foCashflowVersion] is invalid: {0}")]
    InvalidFoVersion(i32),
    #[error("foCashflowVersion {fo_cashflow_version} for foCashflowID {fo_cashflow_id} is older than last processed foCashflowVersion {last_fo_cashflow_version}")]
    StaleFoVersion {
        fo_cashflow_id: u64,
        fo_cashflow_version: u32,
        last_fo_cashflow_version: u32,
    },
    #[error("fields[{field}] is invalid: {reason}")]
    InvalidMessage { field: &'static str, reason: String },
    #[error("Cashflow draft is missing field {0}")]
    IncompleteDraft(&'static str),
    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CashflowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CashflowError::Enrichment(_) => ErrorCategory::BusinessRecoverable,
            CashflowError::Store(e) if e.is_conflict() => ErrorCategory::TechnicalRecoverable,
            CashflowError::Store(StoreError::Sled(_)) => ErrorCategory::TechnicalRecoverable,
            _ => ErrorCategory::TechnicalUnrecoverable,
        }
    }

    pub fn sub_category(&self) -> SubCategory {
        match self {
            CashflowError::Resolution(_) => SubCategory::RevisionTypeResolutionFailure,
            CashflowError::NotFirstVersion { .. } => SubCategory::NotFirstVersion,
            CashflowError::IncorrectRevisionType { .. } => SubCategory::IncorrectRevisionType,
            CashflowError::TradeIdMismatch { .. } | CashflowError::TradeVersionMismatch { .. } => {
                SubCategory::TradeIdMismatch
            }
            CashflowError::InvalidFoVersion(_) | CashflowError::StaleFoVersion { .. } => {
                SubCategory::InvalidFoVersion
            }
            CashflowError::InvalidMessage { .. } | CashflowError::IncompleteDraft(_) => {
                SubCategory::InvalidMessage
            }
            CashflowError::Enrichment(e) => match e {
                EnrichmentError::MissingSsi { .. } | EnrichmentError::InactiveSsi { .. } => {
                    SubCategory::MissingSsi
                }
                EnrichmentError::InactiveCounterparty(_) => SubCategory::InactiveCounterparty,
                EnrichmentError::MissingNostro { .. } => SubCategory::MissingNostro,
                EnrichmentError::MissingField(_) => SubCategory::InvalidMessage,
            },
            CashflowError::Store(_) => SubCategory::CfPersistenceFailure,
        }
    }

    /// A conflict the caller can resolve by re-reading and retrying the whole unit.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, CashflowError::Store(e) if e.is_conflict())
    }

    /// Infrastructure failures are surfaced to the transport instead of being rejected.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, CashflowError::Store(StoreError::Sled(_)))
    }
}
