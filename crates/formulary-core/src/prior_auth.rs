//! Prior-authorization types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::error::CoreError;

/// Approval criteria for a drug requiring prior authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorAuthCriteria {
    pub ndc: String,
    pub criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_duration_days: Option<u32>,
    #[serde(default)]
    pub expedited_review_available: bool,
}

impl PriorAuthCriteria {
    pub fn new(ndc: impl Into<String>, criteria: Vec<String>) -> Self {
        Self {
            ndc: ndc.into(),
            criteria,
            approval_duration_days: None,
            expedited_review_available: false,
        }
    }

    pub fn with_approval_duration_days(mut self, days: u32) -> Self {
        self.approval_duration_days = Some(days);
        self
    }

    pub fn with_expedited_review(mut self, available: bool) -> Self {
        self.expedited_review_available = available;
        self
    }
}

/// Lifecycle states of an authorization request.
///
/// Submission always produces [`AuthorizationStatus::Pending`]; the other
/// states are assigned by the reviewing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::unknown_status(other)),
        }
    }
}

/// Caller input for a new authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthorizationRequest {
    /// Caller-supplied id. Submitting an existing id overwrites it.
    pub request_id: String,
    pub ndc: String,
    pub patient_id: String,
    pub prescriber_id: String,
}

impl NewAuthorizationRequest {
    pub fn new(
        request_id: impl Into<String>,
        ndc: impl Into<String>,
        patient_id: impl Into<String>,
        prescriber_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            ndc: ndc.into(),
            patient_id: patient_id.into(),
            prescriber_id: prescriber_id.into(),
        }
    }
}

/// A stored authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub request_id: String,
    pub ndc: String,
    pub patient_id: String,
    pub prescriber_id: String,
    pub status: AuthorizationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl AuthorizationRequest {
    /// Builds the pending record for a submission.
    pub fn pending(request: NewAuthorizationRequest, submitted_at: OffsetDateTime) -> Self {
        Self {
            request_id: request.request_id,
            ndc: request.ndc,
            patient_id: request.patient_id,
            prescriber_id: request.prescriber_id,
            status: AuthorizationStatus::Pending,
            submitted_at,
        }
    }
}
