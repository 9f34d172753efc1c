//! Receipt and rejection entries written alongside the cashflow records
use super::cashflow::{CashflowRecord, RevisionType, TimeStamp, TradeType};
use super::error::{ErrorCategory, SubCategory};
use super::event::InboundEvent;
use super::utils;
use chrono::Utc;

/// One entry per inbound event, written before any versioning work happens.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct ReceiptAudit {
    #[n(0)]
    pub receipt_id: String, // bech32 encoded uuid7
    #[n(1)]
    pub fo_cashflow_id: u64,
    #[n(2)]
    pub fo_cashflow_version: i32,
    #[n(3)]
    pub trade_id: u64,
    #[n(4)]
    pub trade_version: u32,
    #[n(5)]
    pub trade_type: TradeType,
    #[n(6)]
    pub received_at: TimeStamp<Utc>,
}

/// Dead-letter entry for an event the engine refused to version.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct RejectionRecord {
    #[n(0)]
    pub rejection_id: String, // bech32 encoded uuid7
    #[n(1)]
    pub fo_cashflow_id: u64,
    #[n(2)]
    pub fo_cashflow_version: i32,
    #[n(3)]
    pub trade_id: u64,
    #[n(4)]
    pub trade_version: u32,
    #[n(5)]
    pub trade_type: TradeType,
    #[n(6)]
    pub revision_type: Option<RevisionType>, // resolved type, if resolution got that far
    #[n(7)]
    pub category: ErrorCategory,
    #[n(8)]
    pub sub_category: SubCategory,
    #[n(9)]
    pub reason: String,
    #[n(10)]
    pub last_cashflow_id: Option<u64>,
    #[n(11)]
    pub last_cashflow_version: Option<u32>,
    #[n(12)]
    pub event_digest: String, // sha256 of the event payload
    #[n(13)]
    pub rejected_at: TimeStamp<Utc>,
}

impl ReceiptAudit {
    pub fn new(event: &InboundEvent) -> anyhow::Result<Self> {
        Ok(Self {
            receipt_id: utils::new_uuid_to_bech32("rcpt_")?,
            fo_cashflow_id: event.fo_cashflow_id,
            fo_cashflow_version: event.fo_cashflow_version,
            trade_id: event.trade_id,
            trade_version: event.trade_version,
            trade_type: event.trade_type,
            received_at: TimeStamp::new(),
        })
    }
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        Ok((self.receipt_id.clone(), cbor))
    }
}

impl RejectionRecord {
    pub fn new(
        event: &InboundEvent,
        revision_type: Option<RevisionType>,
        category: ErrorCategory,
        sub_category: SubCategory,
        reason: String,
        last_processed: Option<&CashflowRecord>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            rejection_id: utils::new_uuid_to_bech32("rej_")?,
            fo_cashflow_id: event.fo_cashflow_id,
            fo_cashflow_version: event.fo_cashflow_version,
            trade_id: event.trade_id,
            trade_version: event.trade_version,
            trade_type: event.trade_type,
            revision_type,
            category,
            sub_category,
            reason,
            last_cashflow_id: last_processed.map(|cf| cf.cashflow_id),
            last_cashflow_version: last_processed.map(|cf| cf.cashflow_version),
            event_digest: event.digest()?,
            rejected_at: TimeStamp::new(),
        })
    }
    /// Returns the store key and the CBOR encoding of the entry.
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        Ok((self.rejection_id.clone(), cbor))
    }
}
