//! Formulary drug records.
//!
//! A [`DrugRecord`] is the canonical entry stored per NDC. The record is
//! accepted as-is: no schema validation happens here, so a record with no
//! tier is legal and simply joins no tier index.

use serde::{Deserialize, Serialize};

/// Quantity limit attached to a formulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityLimit {
    pub max_quantity: u32,
    pub period_days: u32,
}

/// A single formulary entry keyed by its National Drug Code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugRecord {
    /// Natural key. Immutable once the record is created.
    pub ndc: String,
    /// Brand / display name.
    #[serde(default)]
    pub name: String,
    /// Generic (canonical) name.
    #[serde(default)]
    pub generic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u8>,
    #[serde(default)]
    pub requires_prior_auth: bool,
    #[serde(default)]
    pub requires_step_therapy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapeutic_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_limit: Option<QuantityLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage_form: Option<String>,
}

impl DrugRecord {
    /// Creates a record with the identifying fields set and everything else empty.
    pub fn new(
        ndc: impl Into<String>,
        name: impl Into<String>,
        generic_name: impl Into<String>,
    ) -> Self {
        Self {
            ndc: ndc.into(),
            name: name.into(),
            generic_name: generic_name.into(),
            tier: None,
            requires_prior_auth: false,
            requires_step_therapy: false,
            therapeutic_class: None,
            quantity_limit: None,
            restrictions: None,
            strength: None,
            dosage_form: None,
        }
    }

    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.therapeutic_class = Some(class.into());
        self
    }

    pub fn with_prior_auth(mut self, required: bool) -> Self {
        self.requires_prior_auth = required;
        self
    }

    pub fn with_step_therapy(mut self, required: bool) -> Self {
        self.requires_step_therapy = required;
        self
    }

    pub fn with_quantity_limit(mut self, max_quantity: u32, period_days: u32) -> Self {
        self.quantity_limit = Some(QuantityLimit {
            max_quantity,
            period_days,
        });
        self
    }

    /// Lower-cased class label used as the class index key. A blank label
    /// counts as no class.
    pub fn normalized_class(&self) -> Option<String> {
        self.therapeutic_class
            .as_deref()
            .map(normalize_class)
            .filter(|label| !label.is_empty())
    }
}

/// Normalizes a therapeutic class label for index lookups.
pub fn normalize_class(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = DrugRecord::new("0071-0155-23", "Lipitor", "Atorvastatin")
            .with_tier(2)
            .with_class("Statins")
            .with_quantity_limit(30, 30);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["genericName"], "Atorvastatin");
        assert_eq!(json["requiresPriorAuth"], false);
        assert_eq!(json["therapeuticClass"], "Statins");
        assert_eq!(json["quantityLimit"]["periodDays"], 30);
        assert!(json.get("strength").is_none());
    }

    #[test]
    fn test_record_accepts_missing_fields() {
        let record: DrugRecord = serde_json::from_str(r#"{"ndc":"123","name":"Zocor"}"#).unwrap();
        assert_eq!(record.ndc, "123");
        assert_eq!(record.tier, None);
        assert!(record.generic_name.is_empty());
        assert!(!record.requires_step_therapy);
    }

    #[test]
    fn test_normalized_class() {
        let record = DrugRecord::new("1", "a", "b").with_class("  ACE Inhibitors ");
        assert_eq!(record.normalized_class().as_deref(), Some("ace inhibitors"));
        assert_eq!(DrugRecord::new("2", "a", "b").normalized_class(), None);
    }

    #[test]
    fn test_blank_class_is_absent() {
        let record = DrugRecord::new("3", "a", "b").with_class("   ");
        assert_eq!(record.normalized_class(), None);
        assert_eq!(DrugRecord::new("4", "a", "b").with_class("").normalized_class(), None);
    }
}
