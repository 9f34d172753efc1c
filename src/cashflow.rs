//! Core cashflow record, its draft, and the value types they are built from
use super::error::CashflowError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// First version number on both the FO and the consuming side.
pub const FIRST_VERSION: u32 = 1;

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    #[n(0)]
    Payment,
    #[n(1)]
    Fx,
    #[n(2)]
    FxNdf,
    #[n(3)]
    Bond,
    #[n(4)]
    Repo,
    #[n(5)]
    Option,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEventType {
    #[n(0)]
    NewTrade,
    #[n(1)]
    Rebook,
    #[n(2)]
    Amend,
    #[n(3)]
    Correction,
    #[n(4)]
    BookMove,
    #[n(5)]
    Cancel,
    #[n(6)]
    Roll,
    #[n(7)]
    Terminate,
    #[n(8)]
    Fix,
    #[n(9)]
    UnFix,
    #[n(10)]
    Exercise,
    #[n(11)]
    KnockOut,
    #[n(12)]
    Expire,
    #[n(13)]
    InterestAction,
    #[n(14)]
    Mature,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEventAction {
    #[n(0)]
    Add,
    #[n(1)]
    Modify,
    #[n(2)]
    Remove,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    #[n(0)]
    New,
    #[n(1)]
    Cor,
    #[n(2)]
    Can,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[n(0)]
    Client,
    #[n(1)]
    Market,
    #[n(2)]
    InterBook,
    #[n(3)]
    InterBranch,
    #[n(4)]
    InterCompany,
    #[n(5)]
    CorporateAction,
}

impl TransactionType {
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TransactionType::InterBook | TransactionType::InterBranch | TransactionType::InterCompany
        )
    }
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayOrReceive {
    #[n(0)]
    Pay,
    #[n(1)]
    Receive,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSuppressionCategory {
    #[n(0)]
    Interbook,
    #[n(1)]
    AmountTooSmall,
}

/// Link from the FO trade to a related trade. Carried with every version of the cashflow.
#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TradeLink {
    #[n(0)]
    pub link_type: String,
    #[n(1)]
    pub related_reference: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBy {
    #[n(0)]
    System,
    #[n(1)]
    User,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    #[cfg(test)]
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

/// Signed cashflow amount. Direction is carried by the sign, not a separate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(pub Decimal);

impl std::ops::Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rate(pub Decimal);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValueDate(pub NaiveDate);

/// A persisted, immutable version of a cashflow. Identity is `(cashflow_id, cashflow_version)`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CashflowRecord {
    #[n(0)]
    pub cashflow_id: u64,
    #[n(1)]
    pub cashflow_version: u32,
    #[n(2)]
    pub latest: bool,
    #[n(3)]
    pub revision_type: RevisionType,
    #[n(4)]
    pub fo_cashflow_id: u64,
    #[n(5)]
    pub fo_cashflow_version: u32,
    #[n(6)]
    pub trade_id: u64,
    #[n(7)]
    pub trade_version: u32,
    #[n(8)]
    pub trade_type: TradeType,
    #[n(9)]
    pub book_code: String,
    #[n(10)]
    pub counter_book_code: Option<String>,
    #[n(11)]
    pub secondary_ledger_account: Option<String>,
    #[n(12)]
    pub transaction_type: TransactionType,
    #[n(13)]
    pub rate: Rate,
    #[n(14)]
    pub value_date: ValueDate,
    #[n(15)]
    pub entity_code: String,
    #[n(16)]
    pub counterparty_code: String,
    #[n(17)]
    pub amount: Amount,
    #[n(18)]
    pub curr_code: String,
    #[n(19)]
    pub internal: bool,
    #[n(20)]
    pub nostro_id: Option<String>,
    #[n(21)]
    pub ssi_id: Option<String>,
    #[n(22)]
    pub payment_suppressed: bool,
    #[n(23)]
    pub payment_suppression_category: Option<PaymentSuppressionCategory>,
    #[n(24)]
    pub input_by: InputBy,
    #[n(25)]
    pub input_date_time: TimeStamp<Utc>,
    #[n(26)]
    pub trade_links: Vec<TradeLink>,
}

/// Mutable draft of a [`CashflowRecord`], finalised once by [`CashflowDraft::build`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CashflowDraft {
    cashflow_id: Option<u64>,
    cashflow_version: Option<u32>,
    latest: Option<bool>,
    revision_type: Option<RevisionType>,
    fo_cashflow_id: Option<u64>,
    fo_cashflow_version: Option<u32>,
    trade_id: Option<u64>,
    trade_version: Option<u32>,
    trade_type: Option<TradeType>,
    book_code: Option<String>,
    counter_book_code: Option<String>,
    secondary_ledger_account: Option<String>,
    transaction_type: Option<TransactionType>,
    rate: Option<Rate>,
    value_date: Option<ValueDate>,
    entity_code: Option<String>,
    counterparty_code: Option<String>,
    amount: Option<Amount>,
    curr_code: Option<String>,
    internal: bool,
    nostro_id: Option<String>,
    ssi_id: Option<String>,
    payment_suppressed: bool,
    payment_suppression_category: Option<PaymentSuppressionCategory>,
    input_by: Option<InputBy>,
    input_date_time: Option<TimeStamp<Utc>>,
    trade_links: Vec<TradeLink>,
}

impl CashflowDraft {
    pub fn new() -> Self {
        Self::default()
    }
    /// Starts a draft that copies every field of an existing record.
    pub fn from_record(record: &CashflowRecord) -> Self {
        Self {
            cashflow_id: Some(record.cashflow_id),
            cashflow_version: Some(record.cashflow_version),
            latest: Some(record.latest),
            revision_type: Some(record.revision_type),
            fo_cashflow_id: Some(record.fo_cashflow_id),
            fo_cashflow_version: Some(record.fo_cashflow_version),
            trade_id: Some(record.trade_id),
            trade_version: Some(record.trade_version),
            trade_type: Some(record.trade_type),
            book_code: Some(record.book_code.clone()),
            counter_book_code: record.counter_book_code.clone(),
            secondary_ledger_account: record.secondary_ledger_account.clone(),
            transaction_type: Some(record.transaction_type),
            rate: Some(record.rate),
            value_date: Some(record.value_date),
            entity_code: Some(record.entity_code.clone()),
            counterparty_code: Some(record.counterparty_code.clone()),
            amount: Some(record.amount),
            curr_code: Some(record.curr_code.clone()),
            internal: record.internal,
            nostro_id: record.nostro_id.clone(),
            ssi_id: record.ssi_id.clone(),
            payment_suppressed: record.payment_suppressed,
            payment_suppression_category: record.payment_suppression_category,
            input_by: Some(record.input_by),
            input_date_time: Some(record.input_date_time.clone()),
            trade_links: record.trade_links.clone(),
        }
    }
    pub fn set_cashflow_id(mut self, id: u64) -> Self {
        self.cashflow_id = Some(id);
        self
    }
    pub fn set_cashflow_version(mut self, version: u32) -> Self {
        self.cashflow_version = Some(version);
        self
    }
    pub fn set_latest(mut self, latest: bool) -> Self {
        self.latest = Some(latest);
        self
    }
    pub fn set_revision_type(mut self, revision_type: RevisionType) -> Self {
        self.revision_type = Some(revision_type);
        self
    }
    pub fn set_fo_cashflow_id(mut self, id: u64) -> Self {
        self.fo_cashflow_id = Some(id);
        self
    }
    pub fn set_fo_cashflow_version(mut self, version: u32) -> Self {
        self.fo_cashflow_version = Some(version);
        self
    }
    pub fn set_trade_id(mut self, id: u64) -> Self {
        self.trade_id = Some(id);
        self
    }
    pub fn set_trade_version(mut self, version: u32) -> Self {
        self.trade_version = Some(version);
        self
    }
    pub fn set_trade_type(mut self, trade_type: TradeType) -> Self {
        self.trade_type = Some(trade_type);
        self
    }
    pub fn set_book_code(mut self, code: impl Into<String>) -> Self {
        self.book_code = Some(code.into());
        self
    }
    pub fn set_counter_book_code(mut self, code: Option<String>) -> Self {
        self.counter_book_code = code;
        self
    }
    pub fn set_secondary_ledger_account(mut self, account: Option<String>) -> Self {
        self.secondary_ledger_account = account;
        self
    }
    pub fn set_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }
    pub fn set_rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }
    pub fn set_value_date(mut self, date: ValueDate) -> Self {
        self.value_date = Some(date);
        self
    }
    pub fn set_entity_code(mut self, code: impl Into<String>) -> Self {
        self.entity_code = Some(code.into());
        self
    }
    pub fn set_counterparty_code(mut self, code: impl Into<String>) -> Self {
        self.counterparty_code = Some(code.into());
        self
    }
    pub fn set_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn set_curr_code(mut self, code: impl Into<String>) -> Self {
        self.curr_code = Some(code.into());
        self
    }
    pub fn set_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }
    pub fn set_nostro_id(mut self, id: Option<String>) -> Self {
        self.nostro_id = id;
        self
    }
    pub fn set_ssi_id(mut self, id: Option<String>) -> Self {
        self.ssi_id = id;
        self
    }
    pub fn set_payment_suppression(mut self, category: Option<PaymentSuppressionCategory>) -> Self {
        self.payment_suppressed = category.is_some();
        self.payment_suppression_category = category;
        self
    }
    pub fn set_input_by(mut self, input_by: InputBy) -> Self {
        self.input_by = Some(input_by);
        self
    }
    pub fn set_input_date_time(mut self, ts: TimeStamp<Utc>) -> Self {
        self.input_date_time = Some(ts);
        self
    }
    pub fn set_trade_links(mut self, links: Vec<TradeLink>) -> Self {
        self.trade_links = links;
        self
    }

    pub fn revision_type(&self) -> Option<RevisionType> {
        self.revision_type
    }
    pub fn fo_cashflow_id(&self) -> Option<u64> {
        self.fo_cashflow_id
    }
    pub fn fo_cashflow_version(&self) -> Option<u32> {
        self.fo_cashflow_version
    }
    pub fn trade_id(&self) -> Option<u64> {
        self.trade_id
    }
    pub fn trade_version(&self) -> Option<u32> {
        self.trade_version
    }
    pub fn trade_type(&self) -> Option<TradeType> {
        self.trade_type
    }
    pub fn transaction_type(&self) -> Option<TransactionType> {
        self.transaction_type
    }
    pub fn entity_code(&self) -> Option<&str> {
        self.entity_code.as_deref()
    }
    pub fn counterparty_code(&self) -> Option<&str> {
        self.counterparty_code.as_deref()
    }
    pub fn curr_code(&self) -> Option<&str> {
        self.curr_code.as_deref()
    }
    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }
    pub fn input_date_time(&self) -> Option<&TimeStamp<Utc>> {
        self.input_date_time.as_ref()
    }
    pub fn trade_links(&self) -> &[TradeLink] {
        &self.trade_links
    }

    /// Checks every mandatory field is present and produces the immutable record.
    pub fn build(self) -> Result<CashflowRecord, CashflowError> {
        Ok(CashflowRecord {
            cashflow_id: self.cashflow_id.ok_or(CashflowError::IncompleteDraft("cashflowID"))?,
            cashflow_version: self
                .cashflow_version
                .ok_or(CashflowError::IncompleteDraft("cashflowVersion"))?,
            latest: self.latest.ok_or(CashflowError::IncompleteDraft("latest"))?,
            revision_type: self
                .revision_type
                .ok_or(CashflowError::IncompleteDraft("revisionType"))?,
            fo_cashflow_id: self
                .fo_cashflow_id
                .ok_or(CashflowError::IncompleteDraft("foCashflowID"))?,
            fo_cashflow_version: self
                .fo_cashflow_version
                .ok_or(CashflowError::IncompleteDraft("foCashflowVersion"))?,
            trade_id: self.trade_id.ok_or(CashflowError::IncompleteDraft("tradeID"))?,
            trade_version: self
                .trade_version
                .ok_or(CashflowError::IncompleteDraft("tradeVersion"))?,
            trade_type: self
                .trade_type
                .ok_or(CashflowError::IncompleteDraft("tradeType"))?,
            book_code: self
                .book_code
                .ok_or(CashflowError::IncompleteDraft("bookCode"))?,
            counter_book_code: self.counter_book_code,
            secondary_ledger_account: self.secondary_ledger_account,
            transaction_type: self
                .transaction_type
                .ok_or(CashflowError::IncompleteDraft("transactionType"))?,
            rate: self.rate.ok_or(CashflowError::IncompleteDraft("rate"))?,
            value_date: self
                .value_date
                .ok_or(CashflowError::IncompleteDraft("valueDate"))?,
            entity_code: self
                .entity_code
                .ok_or(CashflowError::IncompleteDraft("entityCode"))?,
            counterparty_code: self
                .counterparty_code
                .ok_or(CashflowError::IncompleteDraft("counterpartyCode"))?,
            amount: self.amount.ok_or(CashflowError::IncompleteDraft("amount"))?,
            curr_code: self
                .curr_code
                .ok_or(CashflowError::IncompleteDraft("currCode"))?,
            internal: self.internal,
            nostro_id: self.nostro_id,
            ssi_id: self.ssi_id,
            payment_suppressed: self.payment_suppressed,
            payment_suppression_category: self.payment_suppression_category,
            input_by: self.input_by.unwrap_or(InputBy::System),
            input_date_time: self.input_date_time.unwrap_or_default(),
            trade_links: self.trade_links,
        })
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}
impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// Decimals are stored in rust_decimal's fixed 16 byte form.
fn encode_decimal<W: minicbor::encode::Write>(
    value: &Decimal,
    e: &mut minicbor::Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.bytes(&value.serialize())?.ok()
}
fn decode_decimal(d: &mut minicbor::Decoder<'_>) -> Result<Decimal, minicbor::decode::Error> {
    let bytes: [u8; 16] = d
        .bytes()?
        .try_into()
        .map_err(|_| minicbor::decode::Error::message("decimal must be 16 bytes"))?;

    Ok(Decimal::deserialize(bytes))
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        encode_decimal(&self.0, e)
    }
}
impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        decode_decimal(d).map(Amount)
    }
}

impl<C> minicbor::Encode<C> for Rate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        encode_decimal(&self.0, e)
    }
}
impl<'b, C> minicbor::Decode<'b, C> for Rate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        decode_decimal(d).map(Rate)
    }
}

impl<C> minicbor::Encode<C> for ValueDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}
impl<'b, C> minicbor::Decode<'b, C> for ValueDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(ValueDate)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert value date from days",
            ))
    }
}
