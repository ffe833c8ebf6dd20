//! Step-therapy rules and compliance checks.

use formulary_core::{ComplianceResult, StepTherapyRule};
use formulary_storage::DynKvStore;

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::keys::KeySpace;

#[derive(Clone)]
pub struct StepTherapyEngine {
    store: DynKvStore,
    keys: KeySpace,
}

impl StepTherapyEngine {
    pub fn new(store: DynKvStore, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Stores the rule for `rule.ndc`, replacing any earlier one.
    pub async fn set_rule(&self, rule: &StepTherapyRule) -> Result<()> {
        let key = self.keys.step_rule(&rule.ndc);
        self.store.set(&key, &encode(rule)?, None).await?;
        tracing::debug!(
            ndc = %rule.ndc,
            prerequisites = rule.required_drugs.len(),
            "step therapy rule stored"
        );
        Ok(())
    }

    pub async fn get_rule(&self, ndc: &str) -> Result<Option<StepTherapyRule>> {
        let key = self.keys.step_rule(ndc);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Evaluates `history` against the rule for `ndc`.
    ///
    /// A drug without a rule is always compliant. History entries are
    /// compared to prerequisites by exact id.
    pub async fn check_compliance<S: AsRef<str> + Sync>(
        &self,
        ndc: &str,
        history: &[S],
    ) -> Result<ComplianceResult> {
        let Some(rule) = self.get_rule(ndc).await? else {
            return Ok(ComplianceResult::compliant());
        };
        let result = rule.evaluate(history);
        if !result.compliant {
            tracing::debug!(ndc = %ndc, missing = ?result.missing_drugs, "step therapy not satisfied");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_db_memory::create_memory_store;

    fn engine() -> StepTherapyEngine {
        StepTherapyEngine::new(create_memory_store(), KeySpace::default())
    }

    #[tokio::test]
    async fn test_no_rule_is_compliant() {
        let engine = engine();
        let history: Vec<String> = Vec::new();
        let result = engine
            .check_compliance("anything", history.as_slice())
            .await
            .unwrap();
        assert_eq!(result, ComplianceResult::compliant());
    }

    #[tokio::test]
    async fn test_missing_prerequisites_keep_rule_order() {
        let engine = engine();
        let rule = StepTherapyRule::new(
            "crestor",
            vec!["lipitor".into(), "zocor".into(), "pravachol".into()],
        );
        engine.set_rule(&rule).await.unwrap();

        let result = engine.check_compliance("crestor", &["zocor"]).await.unwrap();
        assert!(!result.compliant);
        assert_eq!(result.missing_drugs, vec!["lipitor", "pravachol"]);

        let result = engine
            .check_compliance("crestor", &["pravachol", "lipitor", "zocor", "other"])
            .await
            .unwrap();
        assert!(result.compliant);
        assert!(result.missing_drugs.is_empty());
    }

    #[tokio::test]
    async fn test_exceptions_and_duration_are_not_evaluated() {
        let engine = engine();
        let rule = StepTherapyRule::new("crestor", vec!["lipitor".into()])
            .with_duration_days(90)
            .with_exceptions(vec!["statin intolerance".into()]);
        engine.set_rule(&rule).await.unwrap();

        let result = engine
            .check_compliance("crestor", &["statin intolerance"])
            .await
            .unwrap();
        assert_eq!(result.missing_drugs, vec!["lipitor"]);
        assert_eq!(engine.get_rule("crestor").await.unwrap(), Some(rule));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let engine = engine();
        engine
            .set_rule(&StepTherapyRule::new("crestor", vec!["lipitor".into()]))
            .await
            .unwrap();
        engine
            .set_rule(&StepTherapyRule::new("crestor", vec!["zocor".into()]))
            .await
            .unwrap();

        let rule = engine.get_rule("crestor").await.unwrap().unwrap();
        assert_eq!(rule.required_drugs, vec!["zocor"]);
        assert_eq!(engine.get_rule("lipitor").await.unwrap(), None);
    }
}
