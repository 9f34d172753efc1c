//! Persistence contract and its sled implementation.
//!
//! Trees:
//! - `cashflows`: `cashflow_key(id, version)` -> CBOR [`CashflowRecord`]
//! - `latest`: `cashflow_id` -> version of the row currently flagged latest
//! - `fo_index`: `fo_cashflow_id` -> `cashflow_key` of the last processed record
//! - `receipts`, `rejections`: bech32 id -> CBOR audit entry
use super::audit::{ReceiptAudit, RejectionRecord};
use super::cashflow::CashflowRecord;
use super::error::StoreError;
use super::utils::{cashflow_key, decode_cashflow_key, decode_version};
use super::version::RevisionRecords;
use sled::Transactional;
use sled::transaction::{TransactionError, abort};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, trace};

/// What the version manager needs from storage.
pub trait CashflowStore {
    /// The record with the highest FO version for `fo_cashflow_id`, if any.
    fn last_processed(&self, fo_cashflow_id: u64) -> Result<Option<CashflowRecord>, StoreError>;

    /// Monotonic, never reused.
    fn next_cashflow_id(&self) -> Result<u64, StoreError>;

    /// Inserts the first version. Fails with a conflict if another writer got there first.
    fn commit_first_version(&self, record: &CashflowRecord) -> Result<(), StoreError>;

    /// Atomically flips `previous` to non-latest (only if it is still latest) and
    /// inserts the new records.
    fn commit_non_first_version(
        &self,
        records: &RevisionRecords,
        previous: &CashflowRecord,
    ) -> Result<(), StoreError>;
}

/// Receipt and dead-letter storage used by the ingestion service.
pub trait AuditLog {
    fn save_receipt(&self, receipt: &ReceiptAudit) -> Result<(), StoreError>;
    fn save_rejection(&self, rejection: &RejectionRecord) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct SledCashflowStore {
    instance: Arc<sled::Db>,
    cashflows: sled::Tree,
    latest: sled::Tree,
    fo_index: sled::Tree,
    receipts: sled::Tree,
    rejections: sled::Tree,
}

impl SledCashflowStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, StoreError> {
        Ok(Self {
            cashflows: instance.open_tree("cashflows")?,
            latest: instance.open_tree("latest")?,
            fo_index: instance.open_tree("fo_index")?,
            receipts: instance.open_tree("receipts")?,
            rejections: instance.open_tree("rejections")?,
            instance,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::new(Arc::new(db))
    }

    /// Every stored version of a cashflow, oldest first.
    pub fn history(&self, cashflow_id: u64) -> Result<Vec<CashflowRecord>, StoreError> {
        decode_all(self.cashflows.scan_prefix(cashflow_id.to_be_bytes()))
    }

    pub fn receipts(&self) -> Result<Vec<ReceiptAudit>, StoreError> {
        decode_all(self.receipts.iter())
    }

    pub fn rejections(&self) -> Result<Vec<RejectionRecord>, StoreError> {
        decode_all(self.rejections.iter())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.instance.flush()?;
        Ok(())
    }
}

fn decode_all<T>(iter: sled::Iter) -> Result<Vec<T>, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut out = Vec::new();
    for value in iter.values() {
        out.push(minicbor::decode(&value?)?);
    }
    Ok(out)
}

fn encode(record: &CashflowRecord) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(record).map_err(|e| StoreError::Encode(e.to_string()))
}

fn unwrap_tx(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StoreError::Sled(e),
    }
}

impl CashflowStore for SledCashflowStore {
    fn last_processed(&self, fo_cashflow_id: u64) -> Result<Option<CashflowRecord>, StoreError> {
        let Some(key) = self.fo_index.get(fo_cashflow_id.to_be_bytes())? else {
            return Ok(None);
        };
        let (cashflow_id, cashflow_version) =
            decode_cashflow_key(&key).ok_or(StoreError::MalformedKey("fo_index"))?;

        let value = self
            .cashflows
            .get(&key)?
            .ok_or(StoreError::MissingRecord {
                cashflow_id,
                cashflow_version,
            })?;
        Ok(Some(minicbor::decode(&value)?))
    }

    fn next_cashflow_id(&self) -> Result<u64, StoreError> {
        // generate_id starts at zero; cashflow ids start at one
        Ok(self.instance.generate_id()? + 1)
    }

    fn commit_first_version(&self, record: &CashflowRecord) -> Result<(), StoreError> {
        let key = cashflow_key(record.cashflow_id, record.cashflow_version);
        let value = encode(record)?;
        let id_key = record.cashflow_id.to_be_bytes();
        let version = record.cashflow_version.to_be_bytes();
        let fo_key = record.fo_cashflow_id.to_be_bytes();

        trace!(
            "Saving Cashflow[{}-{}] to DB",
            record.cashflow_id, record.cashflow_version
        );

        (&self.cashflows, &self.latest, &self.fo_index)
            .transaction(|(cashflows, latest, fo_index)| {
                if fo_index.get(fo_key)?.is_some() {
                    return abort(StoreError::FirstVersionExists {
                        fo_cashflow_id: record.fo_cashflow_id,
                    });
                }
                cashflows.insert(key.as_slice(), value.as_slice())?;
                latest.insert(&id_key[..], &version[..])?;
                fo_index.insert(&fo_key[..], key.as_slice())?;
                Ok(())
            })
            .map_err(unwrap_tx)
    }

    fn commit_non_first_version(
        &self,
        records: &RevisionRecords,
        previous: &CashflowRecord,
    ) -> Result<(), StoreError> {
        let previous_key = cashflow_key(previous.cashflow_id, previous.cashflow_version);
        let id_key = previous.cashflow_id.to_be_bytes();

        let inserts = records
            .records()
            .into_iter()
            .map(|cf| -> Result<(Vec<u8>, Vec<u8>), StoreError> {
                trace!(
                    "Saving Cashflow[{}-{}] to DB",
                    cf.cashflow_id, cf.cashflow_version
                );
                Ok((cashflow_key(cf.cashflow_id, cf.cashflow_version), encode(cf)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let live = records.live();
        let live_key = cashflow_key(live.cashflow_id, live.cashflow_version);
        let live_version = live.cashflow_version.to_be_bytes();
        let fo_key = live.fo_cashflow_id.to_be_bytes();

        let result = (&self.cashflows, &self.latest, &self.fo_index).transaction(
            |(cashflows, latest, fo_index)| {
                let Some(value) = cashflows.get(&previous_key)? else {
                    return abort(StoreError::MissingRecord {
                        cashflow_id: previous.cashflow_id,
                        cashflow_version: previous.cashflow_version,
                    });
                };
                let mut stored: CashflowRecord = match minicbor::decode(&value) {
                    Ok(stored) => stored,
                    Err(e) => return abort(StoreError::Decode(e)),
                };

                // conditional update: WHERE id = ? AND version = ? AND latest
                if !stored.latest {
                    return abort(StoreError::ConcurrentUpdate {
                        cashflow_id: previous.cashflow_id,
                        cashflow_version: previous.cashflow_version,
                    });
                }
                if let Some(indexed_version) = latest.get(id_key)?.as_deref().and_then(decode_version) {
                    if indexed_version != previous.cashflow_version {
                        return abort(StoreError::MultipleLatest {
                            cashflow_id: previous.cashflow_id,
                            expected_version: previous.cashflow_version,
                            indexed_version,
                        });
                    }
                }

                stored.latest = false;
                let flipped = match encode(&stored) {
                    Ok(flipped) => flipped,
                    Err(e) => return abort(e),
                };
                cashflows.insert(previous_key.as_slice(), flipped)?;

                for (key, value) in &inserts {
                    if cashflows.get(key)?.is_some() {
                        return abort(StoreError::ConcurrentUpdate {
                            cashflow_id: previous.cashflow_id,
                            cashflow_version: previous.cashflow_version,
                        });
                    }
                    cashflows.insert(key.as_slice(), value.as_slice())?;
                }
                latest.insert(&id_key[..], &live_version[..])?;
                fo_index.insert(&fo_key[..], live_key.as_slice())?;
                Ok(())
            },
        );

        result.map_err(unwrap_tx).inspect_err(|e| {
            error!(
                "Unable to persist revision of LastProcessedCashflow[cfID: {}, cfVer: {}] for foCfID: {}, foCfVer: {}: {}",
                previous.cashflow_id,
                previous.cashflow_version,
                live.fo_cashflow_id,
                live.fo_cashflow_version,
                e
            )
        })
    }
}

impl AuditLog for SledCashflowStore {
    fn save_receipt(&self, receipt: &ReceiptAudit) -> Result<(), StoreError> {
        let (key, cbor) = receipt
            .build()
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        self.receipts.insert(key.as_bytes(), cbor)?;
        Ok(())
    }

    fn save_rejection(&self, rejection: &RejectionRecord) -> Result<(), StoreError> {
        let (key, cbor) = rejection
            .build()
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        self.rejections.insert(key.as_bytes(), cbor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashflow::tests::sample_record;
    use crate::cashflow::{CashflowDraft, RevisionType};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SledCashflowStore) {
        let dir = tempdir().unwrap();
        let store = SledCashflowStore::open(dir.path().join("store.db")).unwrap();
        (dir, store)
    }

    fn cancellation_of(previous: &CashflowRecord) -> RevisionRecords {
        let cancel = CashflowDraft::from_record(previous)
            .set_revision_type(RevisionType::Can)
            .set_cashflow_version(previous.cashflow_version + 1)
            .set_fo_cashflow_version(previous.fo_cashflow_version + 1)
            .set_amount(-previous.amount)
            .build()
            .unwrap();
        RevisionRecords::Cancellation(cancel)
    }

    #[test]
    fn last_processed_follows_fo_index() {
        let (_dir, store) = store();
        let first = sample_record();
        assert_eq!(store.last_processed(first.fo_cashflow_id).unwrap(), None);

        store.commit_first_version(&first).unwrap();
        assert_eq!(store.last_processed(first.fo_cashflow_id).unwrap(), Some(first.clone()));

        let revisions = cancellation_of(&first);
        store.commit_non_first_version(&revisions, &first).unwrap();

        let last = store.last_processed(first.fo_cashflow_id).unwrap().unwrap();
        assert_eq!(&last, revisions.live());

        let history = store.history(first.cashflow_id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].latest);
        assert!(history[1].latest);
    }

    #[test]
    fn second_first_version_conflicts() {
        let (_dir, store) = store();
        let first = sample_record();
        store.commit_first_version(&first).unwrap();

        let again = CashflowDraft::from_record(&first)
            .set_cashflow_id(first.cashflow_id + 1)
            .build()
            .unwrap();
        let err = store.commit_first_version(&again).unwrap_err();

        assert!(err.is_conflict());
    }

    #[test]
    fn stale_previous_is_a_conflict() {
        let (_dir, store) = store();
        let first = sample_record();
        store.commit_first_version(&first).unwrap();
        store
            .commit_non_first_version(&cancellation_of(&first), &first)
            .unwrap();

        // a second writer still holding the old snapshot
        let err = store
            .commit_non_first_version(&cancellation_of(&first), &first)
            .unwrap_err();

        assert!(matches!(err, StoreError::ConcurrentUpdate { .. }));
        assert_eq!(store.history(first.cashflow_id).unwrap().len(), 2);
    }

    #[test]
    fn two_latest_rows_are_an_integrity_error() {
        let (_dir, store) = store();
        let first = sample_record();
        store.commit_first_version(&first).unwrap();

        // index points elsewhere while the row still claims to be latest
        store
            .latest
            .insert(first.cashflow_id.to_be_bytes(), &5u32.to_be_bytes()[..])
            .unwrap();

        let err = store
            .commit_non_first_version(&cancellation_of(&first), &first)
            .unwrap_err();

        assert!(matches!(err, StoreError::MultipleLatest { indexed_version: 5, .. }));
        assert!(!err.is_conflict());
    }

    #[test]
    fn cashflow_ids_are_monotonic() {
        let (_dir, store) = store();

        let a = store.next_cashflow_id().unwrap();
        let b = store.next_cashflow_id().unwrap();

        assert!(a >= 1);
        assert!(b > a);
    }
}
