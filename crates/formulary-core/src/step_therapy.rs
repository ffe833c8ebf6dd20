use serde::{Deserialize, Serialize};

/// Prerequisite policy governing a single drug.
///
/// `duration_days` and `exceptions` are carried for external clinical review
/// and play no part in [`StepTherapyRule::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTherapyRule {
    pub ndc: String,
    pub required_drugs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<Vec<String>>,
}

impl StepTherapyRule {
    pub fn new(ndc: impl Into<String>, required_drugs: Vec<String>) -> Self {
        Self {
            ndc: ndc.into(),
            required_drugs,
            duration_days: None,
            exceptions: None,
        }
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    pub fn with_exceptions(mut self, exceptions: Vec<String>) -> Self {
        self.exceptions = Some(exceptions);
        self
    }

    /// Checks a patient's drug history against the prerequisites.
    pub fn evaluate<S: AsRef<str>>(&self, history: &[S]) -> ComplianceResult {
        let missing_drugs: Vec<String> = self
            .required_drugs
            .iter()
            .filter(|required| !history.iter().any(|h| h.as_ref() == required.as_str()))
            .cloned()
            .collect();

        ComplianceResult {
            compliant: missing_drugs.is_empty(),
            missing_drugs,
        }
    }
}

/// Outcome of a step-therapy compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub compliant: bool,
    /// Prerequisites absent from the history, in rule order.
    pub missing_drugs: Vec<String>,
}

impl ComplianceResult {
    pub fn compliant() -> Self {
        Self {
            compliant: true,
            missing_drugs: Vec::new(),
        }
    }
}
