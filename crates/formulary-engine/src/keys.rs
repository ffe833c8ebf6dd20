//! Key layout in the backing store.
//!
//! ```text
//! {prefix}:drug:{ndc}               scalar  DrugRecord JSON
//! {prefix}:tier:{tier}              set     ndcs
//! {prefix}:flag:prior_auth          set     ndcs
//! {prefix}:flag:step_therapy        set     ndcs
//! {prefix}:class:{label}            set     ndcs (label lower-cased)
//! {prefix}:search:{token}           set     ndcs
//! {prefix}:terms:{ndc}              set     tokens contributed by ndc
//! {prefix}:st_rule:{ndc}            scalar  StepTherapyRule JSON
//! {prefix}:pa_criteria:{ndc}        scalar  PriorAuthCriteria JSON
//! {prefix}:pa_request:{request_id}  scalar  AuthorizationRequest JSON, TTL
//! {prefix}:patient_pa:{patient_id}  set     request ids
//! ```

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn drug(&self, ndc: &str) -> String {
        format!("{}:drug:{ndc}", self.prefix)
    }

    pub fn tier(&self, tier: u8) -> String {
        format!("{}:tier:{tier}", self.prefix)
    }

    pub fn prior_auth_required(&self) -> String {
        format!("{}:flag:prior_auth", self.prefix)
    }

    pub fn step_therapy_required(&self) -> String {
        format!("{}:flag:step_therapy", self.prefix)
    }

    /// `label` must already be normalized.
    pub fn class(&self, label: &str) -> String {
        format!("{}{label}", self.class_prefix())
    }

    pub fn class_prefix(&self) -> String {
        format!("{}:class:", self.prefix)
    }

    /// Extracts the label from a class key produced by [`KeySpace::class`].
    pub fn class_label<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.class_prefix())
    }

    pub fn search_term(&self, token: &str) -> String {
        format!("{}:search:{token}", self.prefix)
    }

    pub fn drug_terms(&self, ndc: &str) -> String {
        format!("{}:terms:{ndc}", self.prefix)
    }

    pub fn step_rule(&self, ndc: &str) -> String {
        format!("{}:st_rule:{ndc}", self.prefix)
    }

    pub fn prior_auth_criteria(&self, ndc: &str) -> String {
        format!("{}:pa_criteria:{ndc}", self.prefix)
    }

    pub fn prior_auth_request(&self, request_id: &str) -> String {
        format!("{}:pa_request:{request_id}", self.prefix)
    }

    pub fn patient_requests(&self, patient_id: &str) -> String {
        format!("{}:patient_pa:{patient_id}", self.prefix)
    }

    /// Prefixes covering the catalog and every index derived from it.
    /// Workflow keys are not included.
    pub fn catalog_prefixes(&self) -> Vec<String> {
        ["drug", "tier", "flag", "class", "search", "terms"]
            .iter()
            .map(|family| format!("{}:{family}:", self.prefix))
            .collect()
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("formulary")
    }
}
