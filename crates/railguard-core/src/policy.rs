use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::types::{Money, TransactionKind, VerificationTier};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Tier policies
// ---------------------------------------------------------------------------

/// Limits and capabilities for one verification tier. Immutable for the
/// process lifetime; a reload replaces the whole table, never a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub tier: VerificationTier,
    pub single_tx_limit: Money,
    /// The only limit with blocking authority.
    pub daily_limit: Money,
    /// Monitoring only, never blocks.
    pub weekly_limit: Money,
    /// Monitoring only, never blocks.
    pub monthly_limit: Money,
    pub allowed_kinds: Vec<TransactionKind>,
    pub max_daily_tx_count: u32,
}

impl TierPolicy {
    pub fn allows(&self, kind: TransactionKind) -> bool {
        self.allowed_kinds.contains(&kind)
    }
}

/// Static mapping from verification tier to limits and capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicyTable {
    none: TierPolicy,
    basic: TierPolicy,
    standard: TierPolicy,
}

impl TierPolicyTable {
    /// Build a table, validating the cross-tier invariants eagerly so a
    /// half-broken table is never observed mid-decision.
    pub fn new(
        none: TierPolicy,
        basic: TierPolicy,
        standard: TierPolicy,
    ) -> ComplianceResult<Self> {
        let table = Self {
            none,
            basic,
            standard,
        };
        table.validate()?;
        Ok(table)
    }

    /// Re-run the cross-tier invariant checks, e.g. on a table arriving
    /// from deserialized configuration.
    pub fn validated(self) -> ComplianceResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn policy_for(&self, tier: VerificationTier) -> &TierPolicy {
        match tier {
            VerificationTier::None => &self.none,
            VerificationTier::Basic => &self.basic,
            VerificationTier::Standard => &self.standard,
        }
    }

    /// Lowest tier whose policy permits the given kind, if any does.
    pub fn first_tier_allowing(&self, kind: TransactionKind) -> Option<VerificationTier> {
        VerificationTier::ALL
            .into_iter()
            .find(|tier| self.policy_for(*tier).allows(kind))
    }

    fn validate(&self) -> ComplianceResult<()> {
        for pair in [[&self.none, &self.basic], [&self.basic, &self.standard]] {
            let [lower, higher] = pair;
            if higher.single_tx_limit <= lower.single_tx_limit
                || higher.daily_limit <= lower.daily_limit
                || higher.weekly_limit <= lower.weekly_limit
                || higher.monthly_limit <= lower.monthly_limit
                || higher.max_daily_tx_count <= lower.max_daily_tx_count
            {
                return Err(ComplianceError::ConfigurationError(format!(
                    "tier limits must strictly increase: {} does not exceed {}",
                    higher.tier, lower.tier
                )));
            }
            let missing = lower
                .allowed_kinds
                .iter()
                .find(|kind| !higher.allowed_kinds.contains(kind));
            if let Some(kind) = missing {
                return Err(ComplianceError::ConfigurationError(format!(
                    "tier {} drops transaction kind {} allowed at tier {}",
                    higher.tier, kind, lower.tier
                )));
            }
        }
        for policy in [&self.none, &self.basic, &self.standard] {
            if policy.single_tx_limit <= Money::ZERO || policy.monthly_limit <= Money::ZERO {
                return Err(ComplianceError::ConfigurationError(format!(
                    "tier {}: limits must be positive",
                    policy.tier
                )));
            }
            if policy.single_tx_limit > policy.daily_limit {
                return Err(ComplianceError::ConfigurationError(format!(
                    "tier {}: single transaction limit exceeds daily limit",
                    policy.tier
                )));
            }
        }
        Ok(())
    }
}

impl Default for TierPolicyTable {
    fn default() -> Self {
        Self {
            none: TierPolicy {
                tier: VerificationTier::None,
                single_tx_limit: dec!(1_000),
                daily_limit: dec!(2_500),
                weekly_limit: dec!(10_000),
                monthly_limit: dec!(25_000),
                allowed_kinds: vec![TransactionKind::FiatToCrypto],
                max_daily_tx_count: 5,
            },
            basic: TierPolicy {
                tier: VerificationTier::Basic,
                single_tx_limit: dec!(5_000),
                daily_limit: dec!(25_000),
                weekly_limit: dec!(100_000),
                monthly_limit: dec!(250_000),
                allowed_kinds: vec![
                    TransactionKind::FiatToCrypto,
                    TransactionKind::CryptoToFiat,
                ],
                max_daily_tx_count: 20,
            },
            standard: TierPolicy {
                tier: VerificationTier::Standard,
                single_tx_limit: dec!(50_000),
                daily_limit: dec!(250_000),
                weekly_limit: dec!(1_000_000),
                monthly_limit: dec!(2_500_000),
                allowed_kinds: vec![
                    TransactionKind::FiatToCrypto,
                    TransactionKind::CryptoToFiat,
                    TransactionKind::CryptoWithdrawal,
                ],
                max_daily_tx_count: 100,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_limits_non_decreasing_across_tiers() {
        let table = TierPolicyTable::default();
        let mut prev: Option<&TierPolicy> = None;
        for tier in VerificationTier::ALL {
            let policy = table.policy_for(tier);
            if let Some(p) = prev {
                assert!(policy.daily_limit > p.daily_limit);
                assert!(policy.single_tx_limit > p.single_tx_limit);
                assert!(policy.weekly_limit > p.weekly_limit);
                assert!(policy.monthly_limit > p.monthly_limit);
                assert!(policy.max_daily_tx_count > p.max_daily_tx_count);
                for kind in &p.allowed_kinds {
                    assert!(policy.allows(*kind));
                }
            }
            prev = Some(policy);
        }
    }

    #[test]
    fn test_policy_lookup() {
        let table = TierPolicyTable::default();
        assert_eq!(
            table.policy_for(VerificationTier::Basic).daily_limit,
            dec!(25_000)
        );
        assert_eq!(
            table.policy_for(VerificationTier::Basic).single_tx_limit,
            dec!(5_000)
        );
    }

    #[test]
    fn test_first_tier_allowing() {
        let table = TierPolicyTable::default();
        assert_eq!(
            table.first_tier_allowing(TransactionKind::FiatToCrypto),
            Some(VerificationTier::None)
        );
        assert_eq!(
            table.first_tier_allowing(TransactionKind::CryptoToFiat),
            Some(VerificationTier::Basic)
        );
        assert_eq!(
            table.first_tier_allowing(TransactionKind::CryptoWithdrawal),
            Some(VerificationTier::Standard)
        );
    }

    #[test]
    fn test_rejects_non_increasing_limits() {
        let mut basic = TierPolicyTable::default().basic;
        basic.daily_limit = dec!(2_500); // equal to NONE tier
        let result = TierPolicyTable::new(
            TierPolicyTable::default().none,
            basic,
            TierPolicyTable::default().standard,
        );
        assert!(matches!(
            result,
            Err(ComplianceError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_dropped_kind() {
        let defaults = TierPolicyTable::default();
        let mut standard = defaults.standard.clone();
        standard.allowed_kinds = vec![TransactionKind::CryptoWithdrawal];
        let result = TierPolicyTable::new(defaults.none.clone(), defaults.basic.clone(), standard);
        assert!(matches!(
            result,
            Err(ComplianceError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_single_limit_above_daily() {
        let defaults = TierPolicyTable::default();
        let mut none = defaults.none.clone();
        none.single_tx_limit = dec!(3_000);
        let result = TierPolicyTable::new(none, defaults.basic.clone(), defaults.standard.clone());
        assert!(matches!(
            result,
            Err(ComplianceError::ConfigurationError(_))
        ));
    }
}
