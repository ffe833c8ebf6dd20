//! Secondary index maintenance.
//!
//! Every catalog write goes through [`IndexMaintainer`], which keeps the
//! record and its tier, flag, class and search-term memberships together.
//! All writes of one call are grouped into a single [`WriteBatch`]. A batch
//! whose key types do not fit is rejected before any op is written. Redis
//! checks types ahead of `EXEC`, so a concurrent client changing a key's
//! type in between can still leave a partial batch there.
//!
//! # Maintenance modes
//!
//! - [`IndexMaintenance::Reconciling`] reads the previous record before an
//!   upsert and removes memberships the new field values no longer imply.
//!   Each record's search tokens are tracked in a reverse set so deletion
//!   can clear them.
//! - [`IndexMaintenance::Accretive`] only ever adds memberships on upsert.
//!   Changing a tier or class leaves the id in the old set too, and removal
//!   leaves the id in every search-token set it populated.

use std::collections::BTreeSet;

use formulary_core::{DrugRecord, record_terms};
use formulary_storage::{DynKvStore, WriteBatch};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::KeySpace;
use crate::records::RecordStore;

/// Number of deletes sent per batch when clearing the catalog.
const CLEAR_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMaintenance {
    #[default]
    Reconciling,
    Accretive,
}

/// Outcome of [`IndexMaintainer::bulk_upsert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_ndcs: Vec<String>,
}

#[derive(Clone)]
pub struct IndexMaintainer {
    store: DynKvStore,
    keys: KeySpace,
    records: RecordStore,
    mode: IndexMaintenance,
}

impl IndexMaintainer {
    pub fn new(store: DynKvStore, keys: KeySpace, mode: IndexMaintenance) -> Self {
        let records = RecordStore::new(store.clone(), keys.clone());
        Self {
            store,
            keys,
            records,
            mode,
        }
    }

    pub fn mode(&self) -> IndexMaintenance {
        self.mode
    }

    /// Writes `record` and brings its index memberships in line with it.
    pub async fn upsert(&self, record: &DrugRecord) -> Result<()> {
        let ndc = record.ndc.as_str();
        let previous = match self.mode {
            IndexMaintenance::Reconciling => self.records.get(ndc).await?,
            IndexMaintenance::Accretive => None,
        };

        let mut batch = WriteBatch::new();
        self.records.stage_put(&mut batch, record)?;

        if let Some(tier) = record.tier {
            batch.set_add(self.keys.tier(tier), ndc);
        }
        self.stage_flag(
            &mut batch,
            self.keys.prior_auth_required(),
            ndc,
            record.requires_prior_auth,
        );
        self.stage_flag(
            &mut batch,
            self.keys.step_therapy_required(),
            ndc,
            record.requires_step_therapy,
        );

        let class = record.normalized_class();
        if let Some(label) = &class {
            batch.set_add(self.keys.class(label), ndc);
        }

        let terms = record_terms(record);
        for term in &terms {
            batch.set_add(self.keys.search_term(term), ndc);
        }

        if self.mode == IndexMaintenance::Reconciling {
            if let Some(previous) = &previous {
                if let Some(old_tier) = previous.tier.filter(|t| Some(*t) != record.tier) {
                    batch.set_remove(self.keys.tier(old_tier), ndc);
                }
                if let Some(old_class) = previous
                    .normalized_class()
                    .filter(|c| Some(c) != class.as_ref())
                {
                    batch.set_remove(self.keys.class(&old_class), ndc);
                }
            }

            let terms_key = self.keys.drug_terms(ndc);
            let previous_terms = self.indexed_terms(ndc, previous.as_ref()).await?;
            for stale in previous_terms.difference(&terms) {
                batch.set_remove(self.keys.search_term(stale), ndc);
                batch.set_remove(terms_key.as_str(), stale.as_str());
            }
            for term in &terms {
                batch.set_add(terms_key.as_str(), term.as_str());
            }
        }

        let ops = batch.len();
        self.store.apply(batch).await?;
        tracing::debug!(ndc = %ndc, ops, mode = ?self.mode, "upserted drug");
        Ok(())
    }

    /// Deletes a record and its memberships. Returns `false` for unknown ids.
    pub async fn remove(&self, ndc: &str) -> Result<bool> {
        let Some(record) = self.records.get(ndc).await? else {
            tracing::debug!(ndc = %ndc, "remove of unknown drug ignored");
            return Ok(false);
        };

        let mut batch = WriteBatch::new();
        self.records.stage_delete(&mut batch, ndc);
        if let Some(tier) = record.tier {
            batch.set_remove(self.keys.tier(tier), ndc);
        }
        batch.set_remove(self.keys.prior_auth_required(), ndc);
        batch.set_remove(self.keys.step_therapy_required(), ndc);
        if let Some(label) = record.normalized_class() {
            batch.set_remove(self.keys.class(&label), ndc);
        }

        if self.mode == IndexMaintenance::Reconciling {
            for term in self.indexed_terms(ndc, Some(&record)).await? {
                batch.set_remove(self.keys.search_term(&term), ndc);
            }
            batch.delete(self.keys.drug_terms(ndc));
        }

        self.store.apply(batch).await?;
        tracing::debug!(ndc = %ndc, "removed drug");
        Ok(true)
    }

    /// Upserts each record independently. A failing record is counted and
    /// the batch carries on.
    pub async fn bulk_upsert(&self, records: &[DrugRecord]) -> BulkUpsertReport {
        let mut report = BulkUpsertReport::default();
        for record in records {
            match self.upsert(record).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(ndc = %record.ndc, error = %e, "bulk upsert item failed");
                    report.failed += 1;
                    report.failed_ndcs.push(record.ndc.clone());
                }
            }
        }
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "bulk upsert finished"
        );
        report
    }

    /// Deletes every catalog and index key. Step-therapy rules, criteria
    /// and authorization requests are kept. Returns the number of keys
    /// deleted.
    pub async fn clear_catalog(&self) -> Result<usize> {
        let mut keys = Vec::new();
        for prefix in self.keys.catalog_prefixes() {
            keys.extend(self.store.keys_with_prefix(&prefix).await?);
        }

        for chunk in keys.chunks(CLEAR_CHUNK) {
            let mut batch = WriteBatch::new();
            for key in chunk {
                batch.delete(key.as_str());
            }
            self.store.apply(batch).await?;
        }

        tracing::info!(deleted = keys.len(), "cleared catalog");
        Ok(keys.len())
    }

    fn stage_flag(&self, batch: &mut WriteBatch, key: String, ndc: &str, flagged: bool) {
        if flagged {
            batch.set_add(key, ndc);
        } else {
            batch.set_remove(key, ndc);
        }
    }

    /// Tokens `ndc` is currently indexed under: the reverse set plus the
    /// tokens implied by its stored record, which covers records written
    /// before the reverse set existed.
    async fn indexed_terms(
        &self,
        ndc: &str,
        previous: Option<&DrugRecord>,
    ) -> Result<BTreeSet<String>> {
        let mut terms: BTreeSet<String> = self
            .store
            .set_members(&self.keys.drug_terms(ndc))
            .await?
            .into_iter()
            .collect();
        if let Some(previous) = previous {
            terms.extend(record_terms(previous));
        }
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_db_memory::create_memory_store;

    fn maintainer(mode: IndexMaintenance) -> (IndexMaintainer, DynKvStore, KeySpace) {
        let store = create_memory_store();
        let keys = KeySpace::default();
        (
            IndexMaintainer::new(store.clone(), keys.clone(), mode),
            store,
            keys,
        )
    }

    fn lipitor() -> DrugRecord {
        DrugRecord::new("lipitor-10", "Lipitor", "Atorvastatin")
            .with_tier(2)
            .with_class("Statins")
    }

    async fn members(store: &DynKvStore, key: &str) -> Vec<String> {
        let mut members = store.set_members(key).await.unwrap();
        members.sort();
        members
    }

    #[tokio::test]
    async fn test_upsert_populates_every_index() {
        let (index, store, keys) = maintainer(IndexMaintenance::Reconciling);
        let record = lipitor().with_prior_auth(true);
        index.upsert(&record).await.unwrap();

        assert!(store.get(&keys.drug("lipitor-10")).await.unwrap().is_some());
        assert_eq!(members(&store, &keys.tier(2)).await, vec!["lipitor-10"]);
        assert_eq!(members(&store, &keys.prior_auth_required()).await, vec!["lipitor-10"]);
        assert!(members(&store, &keys.step_therapy_required()).await.is_empty());
        assert_eq!(members(&store, &keys.class("statins")).await, vec!["lipitor-10"]);
        assert_eq!(members(&store, &keys.search_term("lipitor")).await, vec!["lipitor-10"]);
        assert_eq!(
            members(&store, &keys.search_term("atorvastatin")).await,
            vec!["lipitor-10"]
        );
        assert_eq!(
            members(&store, &keys.drug_terms("lipitor-10")).await,
            vec!["atorvastatin", "lipitor"]
        );
    }

    #[tokio::test]
    async fn test_flags_follow_current_value_in_both_modes() {
        for mode in [IndexMaintenance::Reconciling, IndexMaintenance::Accretive] {
            let (index, store, keys) = maintainer(mode);
            index.upsert(&lipitor().with_step_therapy(true)).await.unwrap();
            assert!(store.set_contains(&keys.step_therapy_required(), "lipitor-10").await.unwrap());

            index.upsert(&lipitor().with_step_therapy(false)).await.unwrap();
            assert!(!store.set_contains(&keys.step_therapy_required(), "lipitor-10").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_reconciling_update_moves_tier_class_and_terms() {
        let (index, store, keys) = maintainer(IndexMaintenance::Reconciling);
        index.upsert(&lipitor()).await.unwrap();

        let mut updated = lipitor().with_tier(4).with_class("Lipid Agents");
        updated.name = "Lipitor Max".into();
        updated.generic_name = "Atorvastatin".into();
        index.upsert(&updated).await.unwrap();

        assert!(members(&store, &keys.tier(2)).await.is_empty());
        assert_eq!(members(&store, &keys.tier(4)).await, vec!["lipitor-10"]);
        assert!(members(&store, &keys.class("statins")).await.is_empty());
        assert_eq!(members(&store, &keys.class("lipid agents")).await, vec!["lipitor-10"]);
        assert_eq!(members(&store, &keys.search_term("max")).await, vec!["lipitor-10"]);

        let mut renamed = updated.clone();
        renamed.name = "Atorva".into();
        index.upsert(&renamed).await.unwrap();
        assert!(members(&store, &keys.search_term("lipitor")).await.is_empty());
        assert!(members(&store, &keys.search_term("max")).await.is_empty());
        assert_eq!(
            members(&store, &keys.drug_terms("lipitor-10")).await,
            vec!["atorva", "atorvastatin"]
        );
    }

    #[tokio::test]
    async fn test_accretive_update_leaves_stale_memberships() {
        let (index, store, keys) = maintainer(IndexMaintenance::Accretive);
        index.upsert(&lipitor()).await.unwrap();
        index.upsert(&lipitor().with_tier(3).with_class("Lipid Agents")).await.unwrap();

        assert_eq!(members(&store, &keys.tier(2)).await, vec!["lipitor-10"]);
        assert_eq!(members(&store, &keys.tier(3)).await, vec!["lipitor-10"]);
        assert_eq!(members(&store, &keys.class("statins")).await, vec!["lipitor-10"]);
        assert!(members(&store, &keys.drug_terms("lipitor-10")).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let (index, store, _) = maintainer(IndexMaintenance::Reconciling);
        assert!(!index.remove("nope").await.unwrap());
        assert!(store.keys_with_prefix("formulary:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconciling_remove_clears_search_terms() {
        let (index, store, _) = maintainer(IndexMaintenance::Reconciling);
        index.upsert(&lipitor().with_prior_auth(true)).await.unwrap();

        assert!(index.remove("lipitor-10").await.unwrap());
        assert!(store.keys_with_prefix("formulary:").await.unwrap().is_empty());
        assert!(!index.remove("lipitor-10").await.unwrap());
    }

    #[tokio::test]
    async fn test_accretive_remove_keeps_search_terms() {
        let (index, store, keys) = maintainer(IndexMaintenance::Accretive);
        index.upsert(&lipitor()).await.unwrap();
        assert!(index.remove("lipitor-10").await.unwrap());

        assert!(store.get(&keys.drug("lipitor-10")).await.unwrap().is_none());
        assert!(members(&store, &keys.tier(2)).await.is_empty());
        assert!(members(&store, &keys.class("statins")).await.is_empty());
        assert_eq!(members(&store, &keys.search_term("lipitor")).await, vec!["lipitor-10"]);
    }

    #[tokio::test]
    async fn test_reconciling_cleans_terms_written_in_accretive_mode() {
        let store = create_memory_store();
        let keys = KeySpace::default();
        IndexMaintainer::new(store.clone(), keys.clone(), IndexMaintenance::Accretive)
            .upsert(&lipitor())
            .await
            .unwrap();

        let index = IndexMaintainer::new(store.clone(), keys.clone(), IndexMaintenance::Reconciling);
        index.remove("lipitor-10").await.unwrap();
        assert!(members(&store, &keys.search_term("lipitor")).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tier_is_accepted() {
        let (index, store, keys) = maintainer(IndexMaintenance::Reconciling);
        index.upsert(&DrugRecord::new("x", "Xarelto", "Rivaroxaban")).await.unwrap();

        assert!(store.get(&keys.drug("x")).await.unwrap().is_some());
        assert!(store.keys_with_prefix("formulary:tier:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_upsert_counts_failures() {
        let (index, store, keys) = maintainer(IndexMaintenance::Reconciling);
        // a scalar squatting on the class key makes that record's batch fail
        store.set(&keys.class("broken"), "x", None).await.unwrap();

        let records = vec![
            lipitor(),
            DrugRecord::new("bad", "Brokenol", "brokenide").with_class("Broken"),
            DrugRecord::new("zocor-20", "Zocor", "Simvastatin").with_tier(1),
        ];
        let report = index.bulk_upsert(&records).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_ndcs, vec!["bad"]);
        assert!(store.get(&keys.drug("zocor-20")).await.unwrap().is_some());
        assert!(store.get(&keys.drug("bad")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_catalog_keeps_workflow_keys() {
        let (index, store, keys) = maintainer(IndexMaintenance::Reconciling);
        index.upsert(&lipitor()).await.unwrap();
        store.set(&keys.step_rule("lipitor-10"), "{}", None).await.unwrap();

        let deleted = index.clear_catalog().await.unwrap();
        assert!(deleted >= 5);
        assert_eq!(
            store.keys_with_prefix("formulary:").await.unwrap(),
            vec![keys.step_rule("lipitor-10")]
        );
    }
}
