//! Prior-authorization criteria and request tracking.
//!
//! Requests are stored with a TTL and disappear from lookups once it
//! lapses. The per-patient index is never expired, so it can reference
//! requests that are already gone; those ids are skipped on read.

use std::time::Duration;

use formulary_core::{
    AuthorizationRequest, DynClock, NewAuthorizationRequest, PriorAuthCriteria,
};
use formulary_storage::{DynKvStore, WriteBatch};

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::keys::KeySpace;

pub use formulary_core::generate_request_id;

/// Default lifetime of a submitted request.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(30 * 86_400);

#[derive(Clone)]
pub struct PriorAuthWorkflow {
    store: DynKvStore,
    keys: KeySpace,
    clock: DynClock,
    request_ttl: Duration,
}

impl PriorAuthWorkflow {
    pub fn new(store: DynKvStore, keys: KeySpace, clock: DynClock, request_ttl: Duration) -> Self {
        Self {
            store,
            keys,
            clock,
            request_ttl,
        }
    }

    pub fn request_ttl(&self) -> Duration {
        self.request_ttl
    }

    /// Stores the criteria for `criteria.ndc`, replacing any earlier entry.
    pub async fn set_criteria(&self, criteria: &PriorAuthCriteria) -> Result<()> {
        let key = self.keys.prior_auth_criteria(&criteria.ndc);
        self.store.set(&key, &encode(criteria)?, None).await?;
        Ok(())
    }

    pub async fn get_criteria(&self, ndc: &str) -> Result<Option<PriorAuthCriteria>> {
        let key = self.keys.prior_auth_criteria(ndc);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Records a new pending request and returns what was stored.
    ///
    /// An existing request with the same id is replaced and its lifetime
    /// starts over.
    pub async fn submit_request(
        &self,
        request: NewAuthorizationRequest,
    ) -> Result<AuthorizationRequest> {
        let stored = AuthorizationRequest::pending(request, self.clock.now());

        let mut batch = WriteBatch::new();
        batch
            .set_with_ttl(
                self.keys.prior_auth_request(&stored.request_id),
                encode(&stored)?,
                self.request_ttl,
            )
            .set_add(
                self.keys.patient_requests(&stored.patient_id),
                stored.request_id.clone(),
            );
        self.store.apply(batch).await?;

        tracing::info!(
            request_id = %stored.request_id,
            ndc = %stored.ndc,
            patient_id = %stored.patient_id,
            "prior authorization request submitted"
        );
        Ok(stored)
    }

    /// Returns the stored request, or `None` once it has expired.
    pub async fn get_status(&self, request_id: &str) -> Result<Option<AuthorizationRequest>> {
        let key = self.keys.prior_auth_request(request_id);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Live requests for a patient, oldest first.
    pub async fn requests_for_patient(&self, patient_id: &str) -> Result<Vec<AuthorizationRequest>> {
        let ids = self
            .store
            .set_members(&self.keys.patient_requests(patient_id))
            .await?;

        let mut requests = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(request) = self.get_status(id).await? {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        Ok(requests)
    }
}
