use formulary_core::DynClock;
use formulary_storage::DynKvStore;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::index::IndexMaintainer;
use crate::keys::KeySpace;
use crate::prior_auth::PriorAuthWorkflow;
use crate::search::SearchEngine;
use crate::stats::CatalogReporter;
use crate::step_therapy::StepTherapyEngine;
use crate::store::create_store;

/// All engine components wired to one store and key space.
#[derive(Clone)]
pub struct Formulary {
    store: DynKvStore,
    index: IndexMaintainer,
    search: SearchEngine,
    step_therapy: StepTherapyEngine,
    prior_auth: PriorAuthWorkflow,
    reporter: CatalogReporter,
}

impl Formulary {
    /// Wires the components over an existing store.
    ///
    /// `clock` timestamps authorization requests. With the memory backend it
    /// should be the clock the store was built with.
    pub fn new(store: DynKvStore, clock: DynClock, config: &EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::configuration)?;

        let keys = KeySpace::new(config.index.key_prefix.clone());
        Ok(Self {
            index: IndexMaintainer::new(store.clone(), keys.clone(), config.index.maintenance),
            search: SearchEngine::new(
                store.clone(),
                keys.clone(),
                config.index.default_filter_limit,
            ),
            step_therapy: StepTherapyEngine::new(store.clone(), keys.clone()),
            prior_auth: PriorAuthWorkflow::new(
                store.clone(),
                keys.clone(),
                clock,
                config.prior_auth.request_ttl(),
            ),
            reporter: CatalogReporter::new(store.clone(), keys, config.index.max_tier),
            store,
        })
    }

    /// Builds the configured store and wires the components over it.
    pub async fn connect(config: &EngineConfig, clock: DynClock) -> Result<Self> {
        config.validate().map_err(EngineError::configuration)?;
        let store = create_store(&config.store, clock.clone()).await?;
        tracing::info!(
            backend = store.backend_name(),
            prefix = %config.index.key_prefix,
            maintenance = ?config.index.maintenance,
            "formulary engine ready"
        );
        Self::new(store, clock, config)
    }

    pub fn store(&self) -> &DynKvStore {
        &self.store
    }

    pub fn index(&self) -> &IndexMaintainer {
        &self.index
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn step_therapy(&self) -> &StepTherapyEngine {
        &self.step_therapy
    }

    pub fn prior_auth(&self) -> &PriorAuthWorkflow {
        &self.prior_auth
    }

    pub fn reporter(&self) -> &CatalogReporter {
        &self.reporter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::{DrugRecord, system_clock};

    #[tokio::test]
    async fn test_connect_with_defaults() {
        let formulary = Formulary::connect(&EngineConfig::default(), system_clock())
            .await
            .unwrap();
        formulary
            .index()
            .upsert(&DrugRecord::new("a", "Alpha", "alphamab").with_tier(1))
            .await
            .unwrap();
        assert_eq!(formulary.search().filter_by_tier(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.index.default_filter_limit = 0;
        let Err(err) = Formulary::connect(&config, system_clock()).await else {
            panic!("zero filter limit should be rejected");
        };
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_key_prefix_isolates_catalogs() {
        let store = formulary_db_memory::create_memory_store();
        let mut config = EngineConfig::default();
        let default = Formulary::new(store.clone(), system_clock(), &config).unwrap();
        config.index.key_prefix = "staging".into();
        let staging = Formulary::new(store, system_clock(), &config).unwrap();

        default
            .index()
            .upsert(&DrugRecord::new("a", "Alpha", "alphamab").with_tier(1))
            .await
            .unwrap();
        assert!(staging.search().filter_by_tier(1).await.unwrap().is_empty());
        assert_eq!(default.reporter().compute_stats().await.unwrap().total_drugs, 1);
    }
}
