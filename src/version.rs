//! Version state machine.
//!
//! Decides whether an inbound event is a first version, a revision of the last
//! processed cashflow, a duplicate, or an attempt to revise a cancelled cashflow,
//! and builds the record(s) that must be written for it.
//!
//! There is no link field tying an offset or cancellation to the record it
//! neutralizes. Events for one FO cashflow must therefore be applied in
//! increasing `fo_cashflow_version` order, which makes "the last processed live
//! record" unambiguous.
use super::cashflow::{CashflowDraft, CashflowRecord, FIRST_VERSION, RevisionType};
use super::enrich::Enricher;
use super::error::CashflowError;
use super::event::CashflowIdentifiers;
use super::store::CashflowStore;
use tracing::{debug, info};

/// Result of comparing an inbound event with the last processed cashflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfProcessedCheckOutcome {
    /// Nothing has been stored for this FO cashflow yet.
    FirstVersion,
    NonFirstVersion { last_processed: CashflowRecord },
    /// Same FO cashflow version and trade version were already applied.
    AlreadyProcessed,
    /// The last processed cashflow is a cancellation; no further revision is permitted.
    LastCashflowIsCancelled { last_processed: CashflowRecord },
}

/// Records produced for a non-first version, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionRecords {
    Amendment {
        offset: CashflowRecord,
        amendment: CashflowRecord,
    },
    Cancellation(CashflowRecord),
}

impl RevisionRecords {
    pub fn records(&self) -> Vec<&CashflowRecord> {
        match self {
            RevisionRecords::Amendment { offset, amendment } => vec![offset, amendment],
            RevisionRecords::Cancellation(cancel) => vec![cancel],
        }
    }

    /// The record that becomes latest once committed.
    pub fn live(&self) -> &CashflowRecord {
        match self {
            RevisionRecords::Amendment { amendment, .. } => amendment,
            RevisionRecords::Cancellation(cancel) => cancel,
        }
    }

    pub fn into_records(self) -> Vec<CashflowRecord> {
        match self {
            RevisionRecords::Amendment { offset, amendment } => vec![offset, amendment],
            RevisionRecords::Cancellation(cancel) => vec![cancel],
        }
    }
}

/// What [`VersionManager::classify_and_version`] did for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub outcome: CfProcessedCheckOutcome,
    /// Committed records; empty for duplicates and cancelled cashflows.
    pub records: Vec<CashflowRecord>,
}

pub struct VersionManager<S> {
    store: S,
}

impl<S: CashflowStore> VersionManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn check_against_last_processed(
        &self,
        ids: &CashflowIdentifiers,
    ) -> Result<CfProcessedCheckOutcome, CashflowError> {
        let Some(last) = self.store.last_processed(ids.fo_cashflow_id)? else {
            return Ok(CfProcessedCheckOutcome::FirstVersion);
        };

        if last.fo_cashflow_id == ids.fo_cashflow_id
            && last.fo_cashflow_version == ids.fo_cashflow_version
        {
            if last.trade_id != ids.trade_id {
                return Err(CashflowError::TradeIdMismatch {
                    fo_cashflow_id: ids.fo_cashflow_id,
                    expected: last.trade_id,
                    actual: ids.trade_id,
                });
            }
            if last.trade_version != ids.trade_version {
                return Err(CashflowError::TradeVersionMismatch {
                    fo_cashflow_id: ids.fo_cashflow_id,
                    fo_cashflow_version: ids.fo_cashflow_version,
                    expected: last.trade_version,
                    actual: ids.trade_version,
                });
            }
            return Ok(CfProcessedCheckOutcome::AlreadyProcessed);
        }

        // a superseded FO version arriving late must not displace the live record
        if ids.fo_cashflow_version < last.fo_cashflow_version {
            return Err(CashflowError::StaleFoVersion {
                fo_cashflow_id: ids.fo_cashflow_id,
                fo_cashflow_version: ids.fo_cashflow_version,
                last_fo_cashflow_version: last.fo_cashflow_version,
            });
        }

        if last.revision_type == RevisionType::Can {
            return Ok(CfProcessedCheckOutcome::LastCashflowIsCancelled {
                last_processed: last,
            });
        }
        Ok(CfProcessedCheckOutcome::NonFirstVersion {
            last_processed: last,
        })
    }

    /// NEW is only possible once, for FO version 1. Allocates a fresh cashflow id.
    pub fn create_first_version(
        &self,
        draft: CashflowDraft,
    ) -> Result<CashflowRecord, CashflowError> {
        let fo_cashflow_version = draft
            .fo_cashflow_version()
            .ok_or(CashflowError::IncompleteDraft("foCashflowVersion"))?;
        let revision_type = draft
            .revision_type()
            .ok_or(CashflowError::IncompleteDraft("revisionType"))?;

        if fo_cashflow_version != FIRST_VERSION {
            return Err(CashflowError::NotFirstVersion {
                fo_cashflow_version,
            });
        }
        if revision_type != RevisionType::New {
            return Err(CashflowError::IncorrectRevisionType {
                fo_cashflow_version,
                revision_type,
            });
        }

        let cashflow_id = self.store.next_cashflow_id()?;
        let cashflow = draft
            .set_cashflow_id(cashflow_id)
            .set_cashflow_version(FIRST_VERSION)
            .set_latest(true)
            .build()?;

        debug!(
            "Created new cashflow. CashflowID-Ver: {}-{}",
            cashflow.cashflow_id, cashflow.cashflow_version
        );
        Ok(cashflow)
    }

    /// Builds an offset + amendment pair for COR, or a single cancellation for CAN.
    pub fn create_non_first_version(
        &self,
        previous: &CashflowRecord,
        draft: CashflowDraft,
    ) -> Result<RevisionRecords, CashflowError> {
        let fo_cashflow_version = draft
            .fo_cashflow_version()
            .ok_or(CashflowError::IncompleteDraft("foCashflowVersion"))?;
        if fo_cashflow_version <= FIRST_VERSION {
            return Err(CashflowError::NotFirstVersion {
                fo_cashflow_version,
            });
        }

        let revision_type = draft
            .revision_type()
            .ok_or(CashflowError::IncompleteDraft("revisionType"))?;

        match revision_type {
            RevisionType::New => Err(CashflowError::IncorrectRevisionType {
                fo_cashflow_version,
                revision_type,
            }),
            RevisionType::Cor => {
                let offset = offset_of(previous, &draft)?;
                let amendment = draft
                    .set_cashflow_id(previous.cashflow_id)
                    .set_cashflow_version(offset.cashflow_version + 1)
                    .set_latest(true)
                    .build()?;

                debug!(
                    "Created amendment cashflow and corresponding offset. CashflowID-Ver: {}-{}",
                    amendment.cashflow_id, amendment.cashflow_version
                );
                Ok(RevisionRecords::Amendment { offset, amendment })
            }
            RevisionType::Can => {
                let cancel = cancellation_of(previous, &draft)?;

                debug!(
                    "Created cancellation cashflow. CashflowID-Ver: {}-{}",
                    cancel.cashflow_id, cancel.cashflow_version
                );
                Ok(RevisionRecords::Cancellation(cancel))
            }
        }
    }

    /// Check, enrich, build and commit one event. Enrichment runs before any
    /// identifier is assigned so a rejected enrichment never consumes a version.
    pub fn classify_and_version<E: Enricher + ?Sized>(
        &self,
        ids: &CashflowIdentifiers,
        draft: CashflowDraft,
        enricher: &E,
    ) -> Result<Versioned, CashflowError> {
        let outcome = self.check_against_last_processed(ids)?;

        let records = match &outcome {
            CfProcessedCheckOutcome::FirstVersion => {
                let draft = enricher.enrich(draft)?;
                let cashflow = self.create_first_version(draft)?;
                self.store.commit_first_version(&cashflow)?;
                vec![cashflow]
            }
            CfProcessedCheckOutcome::NonFirstVersion { last_processed } => {
                let draft = enricher.enrich(draft)?;
                let revisions = self.create_non_first_version(last_processed, draft)?;
                self.store
                    .commit_non_first_version(&revisions, last_processed)?;
                revisions.into_records()
            }
            CfProcessedCheckOutcome::AlreadyProcessed => {
                info!(
                    "Received duplicate cashflow[foCfID: {}, foCfVer: {}]",
                    ids.fo_cashflow_id, ids.fo_cashflow_version
                );
                vec![]
            }
            CfProcessedCheckOutcome::LastCashflowIsCancelled { last_processed } => {
                info!(
                    "Last processed cashflow[cfID: {}, cfVer: {}] is cancelled. No further amendment is permitted for foCfID: {}, foCfVer: {}",
                    last_processed.cashflow_id,
                    last_processed.cashflow_version,
                    ids.fo_cashflow_id,
                    ids.fo_cashflow_version
                );
                vec![]
            }
        };

        Ok(Versioned { outcome, records })
    }
}

/// Clone of `previous` that neutralizes it while the amendment takes over.
fn offset_of(
    previous: &CashflowRecord,
    current: &CashflowDraft,
) -> Result<CashflowRecord, CashflowError> {
    let mut offset = CashflowDraft::from_record(previous)
        .set_revision_type(RevisionType::Can)
        .set_cashflow_version(previous.cashflow_version + 1)
        .set_amount(-previous.amount)
        .set_latest(false);
    if let Some(ts) = current.input_date_time() {
        offset = offset.set_input_date_time(ts.clone());
    }
    offset.build()
}

/// Clone of `previous` that cancels it and becomes the terminal latest record.
fn cancellation_of(
    previous: &CashflowRecord,
    current: &CashflowDraft,
) -> Result<CashflowRecord, CashflowError> {
    let fo_cashflow_id = current
        .fo_cashflow_id()
        .ok_or(CashflowError::IncompleteDraft("foCashflowID"))?;
    let fo_cashflow_version = current
        .fo_cashflow_version()
        .ok_or(CashflowError::IncompleteDraft("foCashflowVersion"))?;

    // trade identifiers follow the event so a replay is recognised as a duplicate
    let mut cancel = CashflowDraft::from_record(previous)
        .set_revision_type(RevisionType::Can)
        .set_cashflow_id(previous.cashflow_id)
        .set_cashflow_version(previous.cashflow_version + 1)
        .set_fo_cashflow_id(fo_cashflow_id)
        .set_fo_cashflow_version(fo_cashflow_version)
        .set_trade_id(current.trade_id().unwrap_or(previous.trade_id))
        .set_trade_version(current.trade_version().unwrap_or(previous.trade_version))
        .set_amount(-previous.amount)
        .set_latest(true);
    if let Some(ts) = current.input_date_time() {
        cancel = cancel.set_input_date_time(ts.clone());
    }
    cancel.build()
}
