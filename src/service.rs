//! Service layer API for cashflow ingestion
use super::audit::{ReceiptAudit, RejectionRecord};
use super::cashflow::{CashflowDraft, CashflowRecord, RevisionType};
use super::enrich::Enricher;
use super::error::{CashflowError, ErrorCategory, SubCategory};
use super::event::InboundEvent;
use super::resolver::resolve_revision_type;
use super::store::{AuditLog, CashflowStore};
use super::version::{CfProcessedCheckOutcome, VersionManager, Versioned};
use anyhow::Context;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Records were committed for a first or non-first version.
    Processed {
        outcome: CfProcessedCheckOutcome,
        records: Vec<CashflowRecord>,
    },
    /// The event had already been applied; nothing was written.
    Duplicate,
    /// The event was written to the rejection log instead of being versioned.
    Rejected(RejectionRecord),
}

pub struct CashflowService<S, E> {
    versions: VersionManager<S>,
    enricher: E,
    max_conflict_retries: u32,
}

impl<S, E> CashflowService<S, E>
where
    S: CashflowStore + AuditLog,
    E: Enricher,
{
    pub fn new(store: S, enricher: E, max_conflict_retries: u32) -> Self {
        Self {
            versions: VersionManager::new(store),
            enricher,
            max_conflict_retries,
        }
    }

    pub fn store(&self) -> &S {
        self.versions.store()
    }

    /// Record receipt, then resolve and version the event.
    ///
    /// Concurrent-update conflicts re-run the whole unit from a fresh read, up to
    /// `max_conflict_retries` times. Storage failures are returned as errors so
    /// the transport can redeliver; every other failure is written to the
    /// rejection log and returned as [`ProcessOutcome::Rejected`].
    pub fn process(&self, event: &InboundEvent) -> anyhow::Result<ProcessOutcome> {
        let receipt = ReceiptAudit::new(event)?;
        self.store()
            .save_receipt(&receipt)
            .context("Failed to save receipt audit")?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut resolved = None;

            match self.version_event(event, &mut resolved) {
                Ok(versioned) => return self.outcome_of(event, versioned),
                Err(e) if e.is_retryable_conflict() && attempt <= self.max_conflict_retries => {
                    warn!(
                        "Conflict on attempt {} for foCfID: {}, foCfVer: {}. Retrying: {}",
                        attempt, event.fo_cashflow_id, event.fo_cashflow_version, e
                    );
                }
                Err(e) if e.is_storage_failure() => {
                    return Err(e).with_context(|| {
                        format!(
                            "Storage failure while processing foCfID: {}, foCfVer: {}",
                            event.fo_cashflow_id, event.fo_cashflow_version
                        )
                    });
                }
                Err(e) => return self.reject_error(event, resolved, e),
            }
        }
    }

    fn version_event(
        &self,
        event: &InboundEvent,
        resolved: &mut Option<RevisionType>,
    ) -> Result<Versioned, CashflowError> {
        let ids = event.identifiers()?;
        let draft = CashflowDraft::from_event(event)?;

        let revision_type = resolve_revision_type(
            ids.is_first_version(),
            event.trade_type,
            event.trade_event_type,
            event.trade_event_action,
        )?;
        *resolved = Some(revision_type);
        info!(
            "Resolved revisionType: {:?} for foCfID: {}, foCfVer: {}",
            revision_type, ids.fo_cashflow_id, ids.fo_cashflow_version
        );

        self.versions.classify_and_version(
            &ids,
            draft.set_revision_type(revision_type),
            &self.enricher,
        )
    }

    fn outcome_of(
        &self,
        event: &InboundEvent,
        versioned: Versioned,
    ) -> anyhow::Result<ProcessOutcome> {
        match versioned.outcome {
            CfProcessedCheckOutcome::AlreadyProcessed => Ok(ProcessOutcome::Duplicate),
            CfProcessedCheckOutcome::LastCashflowIsCancelled { last_processed } => {
                let reason = format!(
                    "Last processed cashflow[cfID: {}, cfVer: {}] is cancelled",
                    last_processed.cashflow_id, last_processed.cashflow_version
                );
                self.reject(
                    event,
                    None,
                    ErrorCategory::BusinessUnrecoverable,
                    SubCategory::LastCashflowCancelled,
                    reason,
                    Some(&last_processed),
                )
                .map(ProcessOutcome::Rejected)
            }
            outcome => {
                info!(
                    "Processed foCfID: {}, foCfVer: {}. {} record(s) written",
                    event.fo_cashflow_id,
                    event.fo_cashflow_version,
                    versioned.records.len()
                );
                Ok(ProcessOutcome::Processed {
                    outcome,
                    records: versioned.records,
                })
            }
        }
    }

    fn reject_error(
        &self,
        event: &InboundEvent,
        revision_type: Option<RevisionType>,
        err: CashflowError,
    ) -> anyhow::Result<ProcessOutcome> {
        let last_processed = self
            .store()
            .last_processed(event.fo_cashflow_id)
            .context("Failed to read last processed cashflow for rejection")?;

        self.reject(
            event,
            revision_type,
            err.category(),
            err.sub_category(),
            err.to_string(),
            last_processed.as_ref(),
        )
        .map(ProcessOutcome::Rejected)
    }

    fn reject(
        &self,
        event: &InboundEvent,
        revision_type: Option<RevisionType>,
        category: ErrorCategory,
        sub_category: SubCategory,
        reason: String,
        last_processed: Option<&CashflowRecord>,
    ) -> anyhow::Result<RejectionRecord> {
        error!(
            "Rejecting foCfID: {}, foCfVer: {}, tradeID: {}. {:?}/{}: {}",
            event.fo_cashflow_id,
            event.fo_cashflow_version,
            event.trade_id,
            category,
            sub_category.code(),
            reason
        );

        let rejection = RejectionRecord::new(
            event,
            revision_type,
            category,
            sub_category,
            reason,
            last_processed,
        )?;
        self.store()
            .save_rejection(&rejection)
            .context("Failed to save rejection")?;
        Ok(rejection)
    }
}
