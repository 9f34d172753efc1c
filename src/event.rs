//! Inbound front-office cashflow event and its mapping onto a [`CashflowDraft`]
use super::cashflow::{
    Amount, CashflowDraft, FIRST_VERSION, InputBy, PayOrReceive, Rate, TimeStamp, TradeEventAction,
    TradeEventType, TradeLink, TradeType, TransactionType, ValueDate,
};
use super::error::CashflowError;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const AMOUNT_SCALE: u32 = 2;
pub const RATE_SCALE: u32 = 10;

/// Decoded event as handed over by the transport. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(rename = "cashflowID")]
    pub fo_cashflow_id: u64,
    #[serde(rename = "cashflowVersion")]
    pub fo_cashflow_version: i32,
    #[serde(rename = "tradeID")]
    pub trade_id: u64,
    pub trade_version: u32,
    pub trade_type: TradeType,
    pub trade_event_type: TradeEventType,
    pub trade_event_action: TradeEventAction,
    pub transaction_type: TransactionType,
    pub book_code: String,
    #[serde(default)]
    pub counter_book_code: Option<String>,
    #[serde(default)]
    pub secondary_ledger_account: Option<String>,
    pub rate: Decimal,
    pub value_date: NaiveDate,
    pub entity_code: String,
    pub counterparty_code: String,
    pub amount: Decimal,
    pub pay_or_receive: PayOrReceive,
    pub curr_code: String,
    #[serde(default)]
    pub trade_links: Vec<TradeLink>,
}

/// The four identifiers the version state machine compares against the last processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashflowIdentifiers {
    pub fo_cashflow_id: u64,
    pub fo_cashflow_version: u32,
    pub trade_id: u64,
    pub trade_version: u32,
}

impl CashflowIdentifiers {
    pub fn is_first_version(&self) -> bool {
        self.fo_cashflow_version == FIRST_VERSION
    }
}

impl InboundEvent {
    pub fn identifiers(&self) -> Result<CashflowIdentifiers, CashflowError> {
        Ok(CashflowIdentifiers {
            fo_cashflow_id: self.fo_cashflow_id,
            fo_cashflow_version: self.checked_fo_version()?,
            trade_id: self.trade_id,
            trade_version: self.trade_version,
        })
    }

    /// SHA-256 of the JSON form of the event, kept with rejections for later matching.
    pub fn digest(&self) -> anyhow::Result<String> {
        let payload = serde_json::to_vec(self)?;
        Ok(sha256::digest(&payload))
    }

    fn checked_fo_version(&self) -> Result<u32, CashflowError> {
        match u32::try_from(self.fo_cashflow_version) {
            Ok(version) if version >= FIRST_VERSION => Ok(version),
            _ => Err(CashflowError::InvalidFoVersion(self.fo_cashflow_version)),
        }
    }

    fn signed_amount(&self) -> Amount {
        let amount = self
            .amount
            .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointTowardZero);

        match self.pay_or_receive {
            PayOrReceive::Pay => Amount(-amount),
            PayOrReceive::Receive => Amount(amount),
        }
    }
}

impl CashflowDraft {
    /// Maps the FO event onto a fresh draft. Revision type and identity are left unset.
    pub fn from_event(event: &InboundEvent) -> Result<Self, CashflowError> {
        let ids = event.identifiers()?;

        let curr_code = event.curr_code.trim().to_uppercase();
        if curr_code.is_empty() {
            return Err(CashflowError::InvalidMessage {
                field: "currCode",
                reason: "currency is empty".into(),
            });
        }
        if event.book_code.trim().is_empty() {
            return Err(CashflowError::InvalidMessage {
                field: "bookCode",
                reason: "book code is empty".into(),
            });
        }

        // only an inter-book transfer has a counter book
        let counter_book_code = match event.transaction_type {
            TransactionType::InterBook => match &event.counter_book_code {
                Some(code) if !code.trim().is_empty() => Some(code.clone()),
                _ => {
                    return Err(CashflowError::InvalidMessage {
                        field: "counterBookCode",
                        reason: "required for INTER_BOOK transactions".into(),
                    });
                }
            },
            _ => None,
        };

        let draft = CashflowDraft::new()
            .set_input_by(InputBy::System)
            .set_input_date_time(TimeStamp::new())
            .set_fo_cashflow_id(ids.fo_cashflow_id)
            .set_fo_cashflow_version(ids.fo_cashflow_version)
            .set_trade_id(ids.trade_id)
            .set_trade_version(ids.trade_version)
            .set_trade_type(event.trade_type)
            .set_book_code(event.book_code.clone())
            .set_counter_book_code(counter_book_code)
            .set_secondary_ledger_account(event.secondary_ledger_account.clone())
            .set_transaction_type(event.transaction_type)
            .set_rate(Rate(event.rate.round_dp_with_strategy(
                RATE_SCALE,
                RoundingStrategy::MidpointTowardZero,
            )))
            .set_value_date(ValueDate(event.value_date))
            .set_entity_code(event.entity_code.clone())
            .set_counterparty_code(event.counterparty_code.clone())
            .set_amount(event.signed_amount())
            .set_curr_code(curr_code)
            .set_trade_links(event.trade_links.clone());

        debug!(
            "Mapped FO event to cashflow draft. FoCashflowID-Ver: {}-{}",
            ids.fo_cashflow_id, ids.fo_cashflow_version
        );
        Ok(draft)
    }
}
