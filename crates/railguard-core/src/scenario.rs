use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{ComplianceEngine, MemoryComplianceEngine};
use crate::policy::TierPolicyTable;
use crate::store::{
    DepositEventStore, MemoryAuditSink, MemoryDepositStore, MemoryUserStore, UserStore,
};
use crate::types::{DepositEvent, Money, RiskLevel, TransactionKind, UserComplianceState};
use crate::ComplianceResult;

fn default_currency() -> String {
    "USD".to_string()
}

/// A deposit described relative to "now", so scenario files stay
/// hand-writable without absolute timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDeposit {
    pub user_id: String,
    pub amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub kind: TransactionKind,
    /// Age of the deposit, counting back from now.
    #[serde(default)]
    pub hours_ago: i64,
    #[serde(default)]
    pub risk_level_at_time: RiskLevel,
}

impl ScenarioDeposit {
    fn into_event(self) -> DepositEvent {
        DepositEvent {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            kind: self.kind,
            timestamp: Utc::now() - Duration::hours(self.hours_ago),
            risk_level_at_time: self.risk_level_at_time,
            flagged: false,
            flag_reason: None,
        }
    }
}

/// Seed state for an engine instance: the host's persisted world, expressed
/// as a fixture. Consumed by the CLI, the bindings, and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioState {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<TierPolicyTable>,
    #[serde(default)]
    pub users: Vec<UserComplianceState>,
    #[serde(default)]
    pub deposits: Vec<ScenarioDeposit>,
}

impl ScenarioState {
    /// Build an in-memory engine seeded with this scenario.
    pub fn into_engine(self) -> ComplianceResult<MemoryComplianceEngine> {
        let policies = self.policies.unwrap_or_default();
        let engine = ComplianceEngine::new(
            self.config,
            policies,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryDepositStore::new()),
            Arc::new(MemoryAuditSink::new()),
        )?;
        for user in self.users {
            engine.users().insert(user);
        }
        for deposit in self.deposits {
            engine.deposits().append(deposit.into_event());
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scenario_roundtrip_from_json() {
        let json = r#"{
            "users": [
                {"user_id": "u-1", "tier": "BASIC"}
            ],
            "deposits": [
                {"user_id": "u-1", "amount": "1000", "kind": "FIAT_TO_CRYPTO", "hours_ago": 4}
            ]
        }"#;
        let scenario: ScenarioState = serde_json::from_str(json).unwrap();
        let engine = scenario.into_engine().unwrap();

        let user = engine.users().get("u-1").unwrap();
        assert_eq!(user.tier, crate::types::VerificationTier::Basic);
        let events = engine.deposits().all_for_user("u-1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, dec!(1000));
    }

    #[test]
    fn test_empty_scenario_builds() {
        let engine = ScenarioState::default().into_engine().unwrap();
        assert!(engine.users().is_empty());
    }

    #[test]
    fn test_bad_policies_rejected_at_seed_time() {
        let mut scenario = ScenarioState::default();
        let defaults = TierPolicyTable::default();
        let json = serde_json::to_value(&defaults).unwrap();
        let mut broken: serde_json::Value = json;
        broken["basic"]["daily_limit"] = serde_json::Value::String("1".to_string());
        scenario.policies = Some(serde_json::from_value(broken).unwrap());
        assert!(scenario.into_engine().is_err());
    }
}
