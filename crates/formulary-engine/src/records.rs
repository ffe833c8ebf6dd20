//! Canonical drug records.

use formulary_core::DrugRecord;
use formulary_storage::{DynKvStore, WriteBatch};

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::keys::KeySpace;

/// Reads drug records and stages record writes for the index maintainer.
#[derive(Clone)]
pub struct RecordStore {
    store: DynKvStore,
    keys: KeySpace,
}

impl RecordStore {
    pub fn new(store: DynKvStore, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    pub async fn get(&self, ndc: &str) -> Result<Option<DrugRecord>> {
        let key = self.keys.drug(ndc);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Resolves ids to records in the given order. Ids without a record
    /// are skipped.
    pub async fn get_many(&self, ndcs: &[String]) -> Result<Vec<DrugRecord>> {
        let mut records = Vec::with_capacity(ndcs.len());
        for ndc in ndcs {
            match self.get(ndc).await? {
                Some(record) => records.push(record),
                None => tracing::debug!(ndc = %ndc, "index references missing record"),
            }
        }
        Ok(records)
    }

    pub(crate) fn stage_put(&self, batch: &mut WriteBatch, record: &DrugRecord) -> Result<()> {
        batch.set(self.keys.drug(&record.ndc), encode(record)?);
        Ok(())
    }

    pub(crate) fn stage_delete(&self, batch: &mut WriteBatch, ndc: &str) {
        batch.delete(self.keys.drug(ndc));
    }
}
