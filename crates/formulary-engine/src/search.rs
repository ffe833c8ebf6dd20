//! Name search and index filters.
//!
//! Results are resolved from index sets back to full records. Candidate
//! ids are sorted before any limit is applied so that the same catalog
//! state always yields the same page.

use std::collections::HashSet;

use formulary_core::{DrugRecord, normalize_class, query_terms};
use formulary_storage::DynKvStore;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::KeySpace;
use crate::records::RecordStore;

/// Predicates for [`SearchEngine::advanced_filter`].
///
/// `tier`, `therapeutic_class` and the flags set to `true` each select one
/// index set and the result is their intersection. A flag set to `false`
/// excludes members of that flag's set but selects nothing by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default)]
    pub tier: Option<u8>,
    #[serde(default)]
    pub requires_prior_auth: Option<bool>,
    #[serde(default)]
    pub requires_step_therapy: Option<bool>,
    #[serde(default)]
    pub therapeutic_class: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tier(mut self, tier: u8) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn prior_auth(mut self, required: bool) -> Self {
        self.requires_prior_auth = Some(required);
        self
    }

    pub fn step_therapy(mut self, required: bool) -> Self {
        self.requires_step_therapy = Some(required);
        self
    }

    pub fn class(mut self, label: impl Into<String>) -> Self {
        self.therapeutic_class = Some(label.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Clone)]
pub struct SearchEngine {
    store: DynKvStore,
    keys: KeySpace,
    records: RecordStore,
    default_filter_limit: usize,
}

impl SearchEngine {
    pub fn new(store: DynKvStore, keys: KeySpace, default_filter_limit: usize) -> Self {
        let records = RecordStore::new(store.clone(), keys.clone());
        Self {
            store,
            keys,
            records,
            default_filter_limit,
        }
    }

    /// Exact-token AND search over drug and generic names.
    ///
    /// The query is tokenized like indexed names; a query without any
    /// qualifying token returns nothing.
    pub async fn search_by_name(&self, query: &str, limit: usize) -> Result<Vec<DrugRecord>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = terms.iter().map(|t| self.keys.search_term(t)).collect();
        let ids = self.members_of_all(&keys).await?;
        tracing::debug!(query = %query, terms = keys.len(), hits = ids.len(), "name search");
        self.resolve(ids, Some(limit)).await
    }

    pub async fn filter_by_tier(&self, tier: u8) -> Result<Vec<DrugRecord>> {
        self.resolve_set(&self.keys.tier(tier)).await
    }

    pub async fn filter_by_prior_auth(&self) -> Result<Vec<DrugRecord>> {
        self.resolve_set(&self.keys.prior_auth_required()).await
    }

    pub async fn filter_by_step_therapy(&self) -> Result<Vec<DrugRecord>> {
        self.resolve_set(&self.keys.step_therapy_required()).await
    }

    /// Class lookup; `label` is matched case-insensitively.
    pub async fn filter_by_class(&self, label: &str) -> Result<Vec<DrugRecord>> {
        self.resolve_set(&self.keys.class(&normalize_class(label))).await
    }

    /// Intersects the index sets selected by `criteria`.
    ///
    /// Returns nothing when no predicate selects a set, rather than
    /// scanning the whole catalog.
    pub async fn advanced_filter(&self, criteria: &FilterCriteria) -> Result<Vec<DrugRecord>> {
        let mut keys = Vec::new();
        if let Some(tier) = criteria.tier {
            keys.push(self.keys.tier(tier));
        }
        if criteria.requires_prior_auth == Some(true) {
            keys.push(self.keys.prior_auth_required());
        }
        if criteria.requires_step_therapy == Some(true) {
            keys.push(self.keys.step_therapy_required());
        }
        if let Some(label) = &criteria.therapeutic_class {
            keys.push(self.keys.class(&normalize_class(label)));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = self.members_of_all(&keys).await?;

        let mut excluded = Vec::new();
        if criteria.requires_prior_auth == Some(false) {
            excluded.push(self.keys.prior_auth_required());
        }
        if criteria.requires_step_therapy == Some(false) {
            excluded.push(self.keys.step_therapy_required());
        }
        for key in excluded {
            let members: HashSet<String> = self.store.set_members(&key).await?.into_iter().collect();
            ids.retain(|id| !members.contains(id));
        }

        let limit = criteria.limit.unwrap_or(self.default_filter_limit);
        self.resolve(ids, Some(limit)).await
    }

    async fn members_of_all(&self, keys: &[String]) -> Result<Vec<String>> {
        Ok(match keys {
            [single] => self.store.set_members(single).await?,
            _ => self.store.set_intersect(keys).await?,
        })
    }

    async fn resolve_set(&self, key: &str) -> Result<Vec<DrugRecord>> {
        let ids = self.store.set_members(key).await?;
        self.resolve(ids, None).await
    }

    async fn resolve(&self, mut ids: Vec<String>, limit: Option<usize>) -> Result<Vec<DrugRecord>> {
        ids.sort();
        ids.dedup();
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        self.records.get_many(&ids).await
    }
}
