//! Core formulary types shared by the storage backends and the engine.

pub mod drug;
pub mod error;
pub mod id;
pub mod prior_auth;
pub mod search_terms;
pub mod step_therapy;
pub mod time;

pub use drug::{DrugRecord, QuantityLimit, normalize_class};
pub use error::CoreError;
pub use id::generate_request_id;
pub use prior_auth::{
    AuthorizationRequest, AuthorizationStatus, NewAuthorizationRequest, PriorAuthCriteria,
};
pub use search_terms::{MIN_TOKEN_LEN, query_terms, record_terms, tokenize};
pub use step_therapy::{ComplianceResult, StepTherapyRule};
pub use time::{Clock, DynClock, ManualClock, SystemClock, system_clock};
