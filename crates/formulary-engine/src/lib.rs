//! # formulary-engine
//!
//! Indexing, search and clinical workflows for a drug formulary kept in a
//! key-value store.
//!
//! The [`Formulary`] facade wires every component to one store:
//!
//! - [`IndexMaintainer`] writes records and keeps the tier, flag, class and
//!   search-term sets in step with them.
//! - [`SearchEngine`] answers name searches and filters by set intersection.
//! - [`StepTherapyEngine`] stores prerequisite rules and checks histories.
//! - [`PriorAuthWorkflow`] stores criteria and tracks expiring requests.
//! - [`CatalogReporter`] computes statistics and exports the catalog.
//!
//! ## Example
//!
//! ```ignore
//! use formulary_core::{DrugRecord, system_clock};
//! use formulary_engine::Formulary;
//! use formulary_engine::config::loader::load_config;
//! use formulary_engine::observability::init_tracing_from_config;
//!
//! let config = load_config(None)?;
//! init_tracing_from_config(&config.logging);
//! let formulary = Formulary::connect(&config, system_clock()).await?;
//! formulary
//!     .index()
//!     .upsert(&DrugRecord::new("0071-0155-23", "Lipitor", "Atorvastatin").with_tier(2))
//!     .await?;
//! let hits = formulary.search().search_by_name("atorvastatin", 10).await?;
//! ```

mod codec;
pub mod config;
pub mod error;
mod formulary;
pub mod index;
pub mod keys;
pub mod observability;
pub mod prior_auth;
pub mod records;
pub mod search;
pub mod stats;
pub mod step_therapy;
pub mod store;

pub use config::{EngineConfig, StoreBackend};
pub use error::{EngineError, Result};
pub use formulary::Formulary;
pub use index::{BulkUpsertReport, IndexMaintainer, IndexMaintenance};
pub use keys::KeySpace;
pub use prior_auth::{DEFAULT_REQUEST_TTL, PriorAuthWorkflow, generate_request_id};
pub use records::RecordStore;
pub use search::{FilterCriteria, SearchEngine};
pub use stats::{CatalogReporter, FormularyStats};
pub use step_therapy::StepTherapyEngine;
pub use store::create_store;
