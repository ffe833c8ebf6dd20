//! Catalog statistics and export.

use std::collections::{BTreeMap, HashSet};

use formulary_core::DrugRecord;
use formulary_storage::DynKvStore;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::KeySpace;
use crate::records::RecordStore;

/// Index cardinalities at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormularyStats {
    /// Sum of the tier set sizes. Records without a tier are not counted.
    pub total_drugs: u64,
    pub tiers: BTreeMap<u8, u64>,
    pub prior_auth_required: u64,
    pub step_therapy_required: u64,
}

#[derive(Clone)]
pub struct CatalogReporter {
    store: DynKvStore,
    keys: KeySpace,
    records: RecordStore,
    max_tier: u8,
}

impl CatalogReporter {
    pub fn new(store: DynKvStore, keys: KeySpace, max_tier: u8) -> Self {
        let records = RecordStore::new(store.clone(), keys.clone());
        Self {
            store,
            keys,
            records,
            max_tier,
        }
    }

    pub async fn compute_stats(&self) -> Result<FormularyStats> {
        let mut stats = FormularyStats::default();
        for tier in 1..=self.max_tier {
            let count = self.store.set_cardinality(&self.keys.tier(tier)).await?;
            stats.tiers.insert(tier, count);
            stats.total_drugs += count;
        }
        stats.prior_auth_required = self
            .store
            .set_cardinality(&self.keys.prior_auth_required())
            .await?;
        stats.step_therapy_required = self
            .store
            .set_cardinality(&self.keys.step_therapy_required())
            .await?;
        Ok(stats)
    }

    /// Class labels with at least one member, sorted.
    pub async fn list_classes(&self) -> Result<Vec<String>> {
        let keys = self.store.keys_with_prefix(&self.keys.class_prefix()).await?;
        let mut labels: Vec<String> = keys
            .iter()
            .filter_map(|key| self.keys.class_label(key))
            .map(str::to_string)
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    /// Every tiered record, grouped by ascending tier.
    ///
    /// Within a tier records are ordered by ndc. A record listed under more
    /// than one tier set appears only under the lowest one.
    pub async fn export_all(&self) -> Result<Vec<DrugRecord>> {
        let mut seen = HashSet::new();
        let mut exported = Vec::new();
        for tier in 1..=self.max_tier {
            let mut ids = self.store.set_members(&self.keys.tier(tier)).await?;
            ids.sort();
            ids.retain(|id| seen.insert(id.clone()));
            exported.extend(self.records.get_many(&ids).await?);
        }
        tracing::info!(records = exported.len(), "catalog exported");
        Ok(exported)
    }
}
