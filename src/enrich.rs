//! Reference data enrichment applied to every draft before it is versioned
use super::cashflow::{
    Amount, CashflowDraft, PaymentSuppressionCategory, TradeType, TransactionType,
};
use super::config::SuppressionConfig;
use super::error::EnrichmentError;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Shared by every worker that processes events.
pub trait Enricher: Send + Sync {
    fn enrich(&self, draft: CashflowDraft) -> Result<CashflowDraft, EnrichmentError>;
}

impl<E: Enricher + ?Sized> Enricher for Box<E> {
    fn enrich(&self, draft: CashflowDraft) -> Result<CashflowDraft, EnrichmentError> {
        (**self).enrich(draft)
    }
}

/// Leaves the draft untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Enricher for PassThrough {
    fn enrich(&self, draft: CashflowDraft) -> Result<CashflowDraft, EnrichmentError> {
        Ok(draft)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingInstruction {
    pub ssi_id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterparty {
    pub active: bool,
    pub internal: bool,
}

// on-disk snapshot layout
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SsiEntry {
    counterparty_code: String,
    curr_code: String,
    trade_type: TradeType,
    #[serde(rename = "ssiID")]
    ssi_id: String,
    #[serde(default = "active")]
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CounterpartyEntry {
    counterparty_code: String,
    #[serde(default = "active")]
    active: bool,
    #[serde(default)]
    internal: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NostroEntry {
    entity_code: String,
    curr_code: String,
    #[serde(rename = "nostroID")]
    nostro_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    ssis: Vec<SsiEntry>,
    #[serde(default)]
    counterparties: Vec<CounterpartyEntry>,
    #[serde(default)]
    nostros: Vec<NostroEntry>,
}

fn active() -> bool {
    true
}

/// Snapshot of settlement reference data, keyed by upper-case codes.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    ssis: HashMap<(String, String, TradeType), StandingInstruction>,
    counterparties: HashMap<String, Counterparty>,
    nostros: HashMap<(String, String), String>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON snapshot with `ssis`, `counterparties` and `nostros` arrays.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;

        let reference = snapshot.ssis.into_iter().fold(Self::new(), |data, e| {
            data.with_ssi(
                &e.counterparty_code,
                &e.curr_code,
                e.trade_type,
                StandingInstruction {
                    ssi_id: e.ssi_id,
                    active: e.active,
                },
            )
        });
        let reference = snapshot
            .counterparties
            .into_iter()
            .fold(reference, |data, e| {
                data.with_counterparty(
                    &e.counterparty_code,
                    Counterparty {
                        active: e.active,
                        internal: e.internal,
                    },
                )
            });
        Ok(snapshot.nostros.into_iter().fold(reference, |data, e| {
            data.with_nostro(&e.entity_code, &e.curr_code, e.nostro_id)
        }))
    }

    pub fn with_ssi(
        mut self,
        counterparty: &str,
        curr_code: &str,
        trade_type: TradeType,
        ssi: StandingInstruction,
    ) -> Self {
        self.ssis.insert(
            (counterparty.to_uppercase(), curr_code.to_uppercase(), trade_type),
            ssi,
        );
        self
    }

    pub fn with_counterparty(mut self, code: &str, counterparty: Counterparty) -> Self {
        self.counterparties.insert(code.to_uppercase(), counterparty);
        self
    }

    pub fn with_nostro(mut self, entity: &str, curr_code: &str, nostro_id: impl Into<String>) -> Self {
        self.nostros
            .insert((entity.to_uppercase(), curr_code.to_uppercase()), nostro_id.into());
        self
    }

    fn ssi(&self, counterparty: &str, curr_code: &str, trade_type: TradeType) -> Option<&StandingInstruction> {
        self.ssis
            .get(&(counterparty.to_uppercase(), curr_code.to_uppercase(), trade_type))
    }

    fn counterparty(&self, code: &str) -> Option<&Counterparty> {
        self.counterparties.get(&code.to_uppercase())
    }

    fn nostro(&self, entity: &str, curr_code: &str) -> Option<&String> {
        self.nostros
            .get(&(entity.to_uppercase(), curr_code.to_uppercase()))
    }
}

/// Sets ssiID, nostroID, the internal flag and payment suppression.
#[derive(Debug, Clone)]
pub struct ReferenceDataEnricher {
    reference: ReferenceData,
    suppression: SuppressionConfig,
}

impl ReferenceDataEnricher {
    pub fn new(reference: ReferenceData, suppression: SuppressionConfig) -> Self {
        Self {
            reference,
            suppression,
        }
    }

    fn suppression_category(
        &self,
        transaction_type: TransactionType,
        curr_code: &str,
        amount: Amount,
    ) -> Option<PaymentSuppressionCategory> {
        if transaction_type == TransactionType::InterBook && self.suppression.interbook_tx {
            return Some(PaymentSuppressionCategory::Interbook);
        }
        match self.suppression.limit_for(curr_code) {
            Some(limit) if amount.0.abs() <= limit => Some(PaymentSuppressionCategory::AmountTooSmall),
            _ => None,
        }
    }
}

impl Enricher for ReferenceDataEnricher {
    fn enrich(&self, draft: CashflowDraft) -> Result<CashflowDraft, EnrichmentError> {
        let counterparty = draft
            .counterparty_code()
            .ok_or(EnrichmentError::MissingField("counterpartyCode"))?
            .to_string();
        let curr_code = draft
            .curr_code()
            .ok_or(EnrichmentError::MissingField("currCode"))?
            .to_string();
        let entity = draft
            .entity_code()
            .ok_or(EnrichmentError::MissingField("entityCode"))?
            .to_string();
        let trade_type = draft
            .trade_type()
            .ok_or(EnrichmentError::MissingField("tradeType"))?;
        let transaction_type = draft
            .transaction_type()
            .ok_or(EnrichmentError::MissingField("transactionType"))?;
        let amount = draft
            .amount()
            .ok_or(EnrichmentError::MissingField("amount"))?;

        let cpty = self
            .reference
            .counterparty(&counterparty)
            .copied()
            .unwrap_or(Counterparty {
                active: true,
                internal: false,
            });
        if !cpty.active {
            return Err(EnrichmentError::InactiveCounterparty(counterparty));
        }

        let ssi = self
            .reference
            .ssi(&counterparty, &curr_code, trade_type)
            .ok_or_else(|| EnrichmentError::MissingSsi {
                counterparty: counterparty.clone(),
                currency: curr_code.clone(),
                trade_type,
            })?;
        if !ssi.active {
            return Err(EnrichmentError::InactiveSsi {
                ssi_id: ssi.ssi_id.clone(),
            });
        }

        let nostro_id = self
            .reference
            .nostro(&entity, &curr_code)
            .ok_or_else(|| EnrichmentError::MissingNostro {
                entity: entity.clone(),
                currency: curr_code.clone(),
            })?;

        let internal = transaction_type.is_internal() && cpty.internal;
        let suppression = self.suppression_category(transaction_type, &curr_code, amount);

        debug!(
            "Enriched cashflow for Counterparty: {}, Currency: {}. ssiID: {}, nostroID: {}, internal: {}, suppression: {:?}",
            counterparty, curr_code, ssi.ssi_id, nostro_id, internal, suppression
        );

        Ok(draft
            .set_ssi_id(Some(ssi.ssi_id.clone()))
            .set_nostro_id(Some(nostro_id.clone()))
            .set_internal(internal)
            .set_payment_suppression(suppression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashflow::tests::sample_record;
    use rust_decimal_macros::dec;

    /// Reference data covering `sample_record()`.
    fn sample_reference() -> ReferenceData {
        ReferenceData::new()
            .with_ssi(
                "CPTY1",
                "USD",
                TradeType::Bond,
                StandingInstruction {
                    ssi_id: "SSI-1".into(),
                    active: true,
                },
            )
            .with_counterparty(
                "CPTY1",
                Counterparty {
                    active: true,
                    internal: true,
                },
            )
            .with_nostro("ENT1", "USD", "NOSTRO-USD")
    }

    fn suppression(limit: rust_decimal::Decimal, interbook_tx: bool) -> SuppressionConfig {
        SuppressionConfig {
            upto_amount: [("USD".to_string(), limit)].into(),
            interbook_tx,
        }
    }

    #[test]
    fn sets_reference_fields() {
        let enricher = ReferenceDataEnricher::new(sample_reference(), SuppressionConfig::default());

        let record = enricher
            .enrich(CashflowDraft::from_record(&sample_record()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(record.ssi_id.as_deref(), Some("SSI-1"));
        assert_eq!(record.nostro_id.as_deref(), Some("NOSTRO-USD"));
        // CLIENT trades are never internal
        assert!(!record.internal);
        assert!(!record.payment_suppressed);
    }

    #[test]
    fn internal_needs_internal_counterparty_and_transaction() {
        let enricher = ReferenceDataEnricher::new(sample_reference(), SuppressionConfig::default());
        let draft = CashflowDraft::from_record(&sample_record())
            .set_transaction_type(TransactionType::InterCompany);

        let record = enricher.enrich(draft).unwrap().build().unwrap();

        assert!(record.internal);
    }

    #[test]
    fn small_amounts_are_suppressed() {
        // sample amount is -1500.25; the absolute value is compared
        let enricher = ReferenceDataEnricher::new(sample_reference(), suppression(dec!(1500.25), false));
        let record = enricher
            .enrich(CashflowDraft::from_record(&sample_record()))
            .unwrap()
            .build()
            .unwrap();
        assert!(record.payment_suppressed);
        assert_eq!(
            record.payment_suppression_category,
            Some(PaymentSuppressionCategory::AmountTooSmall)
        );

        let enricher = ReferenceDataEnricher::new(sample_reference(), suppression(dec!(1500.24), false));
        let record = enricher
            .enrich(CashflowDraft::from_record(&sample_record()))
            .unwrap()
            .build()
            .unwrap();
        assert!(!record.payment_suppressed);
        assert_eq!(record.payment_suppression_category, None);
    }

    #[test]
    fn interbook_suppression_wins() {
        let enricher = ReferenceDataEnricher::new(sample_reference(), suppression(dec!(1), true));
        let draft = CashflowDraft::from_record(&sample_record())
            .set_transaction_type(TransactionType::InterBook)
            .set_counter_book_code(Some("BOOK2".into()));

        let record = enricher.enrich(draft).unwrap().build().unwrap();

        assert_eq!(
            record.payment_suppression_category,
            Some(PaymentSuppressionCategory::Interbook)
        );
    }

    #[test]
    fn loads_json_snapshot() {
        let json = r#"{
            "ssis": [
                {"counterpartyCode": "cpty1", "currCode": "usd", "tradeType": "BOND", "ssiID": "SSI-1"}
            ],
            "counterparties": [
                {"counterpartyCode": "CPTY1", "internal": true}
            ],
            "nostros": [
                {"entityCode": "ENT1", "currCode": "USD", "nostroID": "NOSTRO-USD"}
            ]
        }"#;
        let reference = ReferenceData::from_json(json).unwrap();
        let enricher = ReferenceDataEnricher::new(reference, SuppressionConfig::default());

        let record = enricher
            .enrich(CashflowDraft::from_record(&sample_record()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(record.ssi_id.as_deref(), Some("SSI-1"));
        assert_eq!(record.nostro_id.as_deref(), Some("NOSTRO-USD"));
    }

    #[test]
    fn missing_reference_data() {
        let enricher = ReferenceDataEnricher::new(ReferenceData::new(), SuppressionConfig::default());
        assert!(matches!(
            enricher.enrich(CashflowDraft::from_record(&sample_record())),
            Err(EnrichmentError::MissingSsi { .. })
        ));

        let reference = sample_reference().with_counterparty(
            "CPTY1",
            Counterparty {
                active: false,
                internal: false,
            },
        );
        let enricher = ReferenceDataEnricher::new(reference, SuppressionConfig::default());
        assert_eq!(
            enricher
                .enrich(CashflowDraft::from_record(&sample_record()))
                .unwrap_err(),
            EnrichmentError::InactiveCounterparty("CPTY1".into())
        );

        let reference = ReferenceData::new().with_ssi(
            "CPTY1",
            "USD",
            TradeType::Bond,
            StandingInstruction {
                ssi_id: "SSI-1".into(),
                active: true,
            },
        );
        let enricher = ReferenceDataEnricher::new(reference, SuppressionConfig::default());
        assert!(matches!(
            enricher.enrich(CashflowDraft::from_record(&sample_record())),
            Err(EnrichmentError::MissingNostro { .. })
        ));
    }
}
