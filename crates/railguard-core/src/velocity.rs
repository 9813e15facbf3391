use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::policy::{TierPolicy, TierPolicyTable};
use crate::store::{AuditSink, UserStore};
use crate::types::{
    AccountStatus, ComplianceAction, ComplianceLogEntry, Money, TransactionKind,
    UserComplianceState, VerificationTier, VerificationType,
};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Current limit usage for the evaluated kind, returned with every decision
/// for UI and monitoring. Weekly/monthly figures are informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitSnapshot {
    pub tier: VerificationTier,
    pub kind: TransactionKind,
    pub single_tx_limit: Money,
    pub daily_limit: Money,
    pub daily_used: Money,
    pub daily_remaining: Money,
    pub weekly_limit: Money,
    pub weekly_used: Money,
    pub monthly_limit: Money,
    pub monthly_used: Money,
    pub daily_tx_count: u32,
    pub max_daily_tx_count: u32,
}

impl LimitSnapshot {
    fn capture(user: &UserComplianceState, policy: &TierPolicy, kind: TransactionKind) -> Self {
        let daily_used = user.daily_used.get(kind);
        Self {
            tier: user.tier,
            kind,
            single_tx_limit: policy.single_tx_limit,
            daily_limit: policy.daily_limit,
            daily_used,
            daily_remaining: (policy.daily_limit - daily_used).max(Decimal::ZERO),
            weekly_limit: policy.weekly_limit,
            weekly_used: user.weekly_used.get(kind),
            monthly_limit: policy.monthly_limit,
            monthly_used: user.monthly_used.get(kind),
            daily_tx_count: user.daily_tx_count,
            max_daily_tx_count: policy.max_daily_tx_count,
        }
    }
}

/// Gate verdict. A denial is a normal outcome with a human-readable reason,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<LimitSnapshot>,
}

impl GateDecision {
    fn allowed(snapshot: LimitSnapshot) -> Self {
        Self {
            allowed: true,
            reason: None,
            snapshot: Some(snapshot),
        }
    }

    fn denied(reason: impl Into<String>, snapshot: Option<LimitSnapshot>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            snapshot,
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// The sole component with transaction-blocking authority. Evaluates a
/// proposed transaction against the tier policy and rolling usage counters;
/// `commit` applies usage only after settlement.
pub struct VelocityGate<U: UserStore, A: AuditSink> {
    users: Arc<U>,
    audit: Arc<A>,
    policies: Arc<TierPolicyTable>,
    light_pending_tx_cap: Money,
}

impl<U: UserStore, A: AuditSink> VelocityGate<U, A> {
    pub fn new(
        users: Arc<U>,
        audit: Arc<A>,
        policies: Arc<TierPolicyTable>,
        light_pending_tx_cap: Money,
    ) -> Self {
        Self {
            users,
            audit,
            policies,
            light_pending_tx_cap,
        }
    }

    /// Evaluate a proposed transaction. Checks run in order and
    /// short-circuit on the first failure.
    pub fn evaluate(&self, user_id: &str, amount: Money, kind: TransactionKind) -> GateDecision {
        let Some(user) = self.users.get(user_id) else {
            tracing::debug!(user_id, "gate denial: unknown user");
            return GateDecision::denied("user not found", None);
        };
        let policy = self.policies.policy_for(user.tier);
        let snapshot = LimitSnapshot::capture(&user, policy, kind);

        match user.account_status {
            AccountStatus::Suspended => {
                return GateDecision::denied(
                    "account suspended — contact support",
                    Some(snapshot),
                );
            }
            AccountStatus::Restricted => {
                return GateDecision::denied(
                    "account restricted pending compliance review",
                    Some(snapshot),
                );
            }
            AccountStatus::Active | AccountStatus::Flagged => {}
        }

        match user.pending_verification {
            Some(VerificationType::Standard) if kind.is_withdrawal() => {
                return GateDecision::denied(
                    "withdrawals are paused until identity verification is completed",
                    Some(snapshot),
                );
            }
            Some(VerificationType::Light) if amount > self.light_pending_tx_cap => {
                return GateDecision::denied(
                    format!(
                        "transactions are capped at ${} while verification is pending",
                        self.light_pending_tx_cap.normalize()
                    ),
                    Some(snapshot),
                );
            }
            _ => {}
        }

        if !policy.allows(kind) {
            let reason = match self.policies.first_tier_allowing(kind) {
                Some(tier) => format!("{} requires {} verification", kind, tier),
                None => format!("{} transactions are not supported", kind),
            };
            return GateDecision::denied(reason, Some(snapshot));
        }

        if amount > policy.single_tx_limit {
            let decision = GateDecision::denied(
                format!(
                    "amount ${} exceeds the ${} per-transaction limit — consider splitting into smaller transactions",
                    amount.normalize(),
                    policy.single_tx_limit.normalize()
                ),
                Some(snapshot),
            );
            self.audit_denial(&user.user_id, amount, &decision);
            return decision;
        }

        if user.daily_tx_count >= policy.max_daily_tx_count {
            let decision = GateDecision::denied(
                format!(
                    "daily transaction count limit of {} reached",
                    policy.max_daily_tx_count
                ),
                Some(snapshot),
            );
            self.audit_denial(&user.user_id, amount, &decision);
            return decision;
        }

        let projected = user.daily_used.get(kind) + amount;
        if projected > policy.daily_limit {
            let remaining = (policy.daily_limit - user.daily_used.get(kind)).max(Decimal::ZERO);
            let decision = GateDecision::denied(
                format!(
                    "daily limit reached: ${} remaining today (resets at midnight UTC)",
                    remaining.normalize()
                ),
                Some(snapshot),
            );
            self.audit_denial(&user.user_id, amount, &decision);
            return decision;
        }

        GateDecision::allowed(snapshot)
    }

    /// Record settled usage. Re-checks the daily limit and transaction
    /// count under the user's entry lock, so two racing commits can never
    /// both land past the limit; a lost race changes nothing and surfaces
    /// as `ConcurrencyConflict`.
    pub fn commit(
        &self,
        user_id: &str,
        amount: Money,
        kind: TransactionKind,
    ) -> ComplianceResult<()> {
        let committed = self.users.with_user(user_id, |user| {
            let policy = self.policies.policy_for(user.tier);
            if user.daily_used.get(kind) + amount > policy.daily_limit
                || user.daily_tx_count >= policy.max_daily_tx_count
            {
                return false;
            }
            let now = Utc::now();
            user.daily_used.add(kind, amount);
            user.weekly_used.add(kind, amount);
            user.monthly_used.add(kind, amount);
            user.daily_tx_count += 1;
            user.total_deposited_lifetime += amount;
            user.first_deposit_at.get_or_insert(now);
            user.last_deposit_at = Some(now);
            true
        })?;

        if committed {
            Ok(())
        } else {
            tracing::warn!(user_id, %amount, %kind, "commit lost the daily-limit race");
            self.audit.append(
                ComplianceLogEntry::for_user(ComplianceAction::LimitExceeded, user_id)
                    .with_amount(amount)
                    .with_reason("commit rejected: daily limit re-check failed"),
            );
            Err(ComplianceError::ConcurrencyConflict {
                user_id: user_id.to_string(),
            })
        }
    }

    /// Zero every user's daily accumulators. Idempotent; scheduled for
    /// midnight UTC by the host.
    pub fn reset_daily(&self) {
        let mut users = 0usize;
        self.users.for_each(|user| {
            user.daily_used.reset();
            user.daily_tx_count = 0;
            users += 1;
        });
        tracing::info!(users, "daily velocity counters reset");
        self.audit
            .append(ComplianceLogEntry::new(ComplianceAction::CountersReset).with_reason("daily"));
    }

    /// Zero every user's weekly accumulators. Scheduled for Monday 00:00 UTC.
    pub fn reset_weekly(&self) {
        let mut users = 0usize;
        self.users.for_each(|user| {
            user.weekly_used.reset();
            users += 1;
        });
        tracing::info!(users, "weekly velocity counters reset");
        self.audit
            .append(ComplianceLogEntry::new(ComplianceAction::CountersReset).with_reason("weekly"));
    }

    /// Zero every user's monthly accumulators. Scheduled for the first of
    /// the month, 00:00 UTC.
    pub fn reset_monthly(&self) {
        let mut users = 0usize;
        self.users.for_each(|user| {
            user.monthly_used.reset();
            users += 1;
        });
        tracing::info!(users, "monthly velocity counters reset");
        self.audit.append(
            ComplianceLogEntry::new(ComplianceAction::CountersReset).with_reason("monthly"),
        );
    }

    fn audit_denial(&self, user_id: &str, amount: Money, decision: &GateDecision) {
        let reason = decision.reason.clone().unwrap_or_default();
        tracing::debug!(user_id, %amount, reason, "gate denial");
        self.audit.append(
            ComplianceLogEntry::for_user(ComplianceAction::LimitExceeded, user_id)
                .with_amount(amount)
                .with_reason(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TierPolicy;
    use crate::store::{MemoryAuditSink, MemoryUserStore};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn gate() -> (
        Arc<MemoryUserStore>,
        Arc<MemoryAuditSink>,
        VelocityGate<MemoryUserStore, MemoryAuditSink>,
    ) {
        let users = Arc::new(MemoryUserStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let gate = VelocityGate::new(
            users.clone(),
            audit.clone(),
            Arc::new(TierPolicyTable::default()),
            dec!(1_000),
        );
        (users, audit, gate)
    }

    fn basic_user(users: &MemoryUserStore) {
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        users.insert(user);
    }

    // === evaluate ===

    #[test]
    fn test_unknown_user_denied() {
        let (_, _, gate) = gate();
        let decision = gate.evaluate("ghost", dec!(100), TransactionKind::FiatToCrypto);
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("user not found"));
        assert!(decision.snapshot.is_none());
    }

    #[test]
    fn test_allowed_with_snapshot() {
        let (users, _, gate) = gate();
        basic_user(&users);

        let decision = gate.evaluate("u-1", dec!(500), TransactionKind::CryptoToFiat);
        assert!(decision.allowed);
        assert!(decision.reason.is_none());

        let snapshot = decision.snapshot.unwrap();
        assert_eq!(snapshot.tier, VerificationTier::Basic);
        assert_eq!(snapshot.daily_limit, dec!(25_000));
        assert_eq!(snapshot.daily_remaining, dec!(25_000));
        assert_eq!(snapshot.weekly_limit, dec!(100_000));
    }

    #[test]
    fn test_kind_denial_names_required_tier() {
        let (users, _, gate) = gate();
        users.insert(UserComplianceState::new("u-1")); // NONE tier

        let decision = gate.evaluate("u-1", dec!(100), TransactionKind::CryptoToFiat);
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("CRYPTO_TO_FIAT"));
        assert!(reason.contains("BASIC"));
    }

    #[test]
    fn test_single_tx_limit_denial_suggests_splitting() {
        let (users, audit, gate) = gate();
        basic_user(&users);

        let decision = gate.evaluate("u-1", dec!(5_001), TransactionKind::CryptoToFiat);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("splitting"));
        assert_eq!(audit.entries().len(), 1);
        assert_eq!(audit.entries()[0].action, ComplianceAction::LimitExceeded);
    }

    #[test]
    fn test_daily_limit_denial_reports_remaining_budget() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.daily_used
            .add(TransactionKind::CryptoToFiat, dec!(24_000));
        users.insert(user);

        let decision = gate.evaluate("u-1", dec!(1_500), TransactionKind::CryptoToFiat);
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("$1000"));
        assert!(reason.contains("resets at midnight"));
    }

    #[test]
    fn test_weekly_and_monthly_never_deny() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.weekly_used
            .add(TransactionKind::CryptoToFiat, dec!(900_000));
        user.monthly_used
            .add(TransactionKind::CryptoToFiat, dec!(9_000_000));
        users.insert(user);

        let decision = gate.evaluate("u-1", dec!(500), TransactionKind::CryptoToFiat);
        assert!(decision.allowed);
        let snapshot = decision.snapshot.unwrap();
        assert_eq!(snapshot.weekly_used, dec!(900_000));
        assert_eq!(snapshot.monthly_used, dec!(9_000_000));
    }

    #[test]
    fn test_daily_tx_count_limit() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.daily_tx_count = 20;
        users.insert(user);

        let decision = gate.evaluate("u-1", dec!(100), TransactionKind::CryptoToFiat);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("count limit"));
    }

    #[test]
    fn test_suspended_account_denied() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.account_status = AccountStatus::Suspended;
        users.insert(user);

        let decision = gate.evaluate("u-1", dec!(100), TransactionKind::FiatToCrypto);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("suspended"));
    }

    #[test]
    fn test_flagged_account_still_transacts() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.account_status = AccountStatus::Flagged;
        users.insert(user);

        let decision = gate.evaluate("u-1", dec!(100), TransactionKind::FiatToCrypto);
        assert!(decision.allowed);
    }

    #[test]
    fn test_standard_pending_blocks_withdrawals_only() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.pending_verification = Some(VerificationType::Standard);
        users.insert(user);

        let withdrawal = gate.evaluate("u-1", dec!(100), TransactionKind::CryptoToFiat);
        assert!(!withdrawal.allowed);
        assert!(withdrawal.reason.unwrap().contains("paused"));

        let deposit = gate.evaluate("u-1", dec!(100), TransactionKind::FiatToCrypto);
        assert!(deposit.allowed);
    }

    #[test]
    fn test_light_pending_caps_amount() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.pending_verification = Some(VerificationType::Light);
        users.insert(user);

        let over_cap = gate.evaluate("u-1", dec!(1_200), TransactionKind::CryptoToFiat);
        assert!(!over_cap.allowed);
        assert!(over_cap.reason.unwrap().contains("capped"));

        let under_cap = gate.evaluate("u-1", dec!(800), TransactionKind::CryptoToFiat);
        assert!(under_cap.allowed);
    }

    // === commit ===

    #[test]
    fn test_commit_updates_all_accumulators() {
        let (users, _, gate) = gate();
        basic_user(&users);

        gate.commit("u-1", dec!(750), TransactionKind::CryptoToFiat)
            .unwrap();

        let user = users.get("u-1").unwrap();
        assert_eq!(user.daily_used.crypto_to_fiat, dec!(750));
        assert_eq!(user.weekly_used.crypto_to_fiat, dec!(750));
        assert_eq!(user.monthly_used.crypto_to_fiat, dec!(750));
        assert_eq!(user.daily_tx_count, 1);
        assert_eq!(user.total_deposited_lifetime, dec!(750));
        assert!(user.first_deposit_at.is_some());
        assert!(user.last_deposit_at.is_some());
    }

    #[test]
    fn test_commit_first_deposit_at_is_set_once() {
        let (users, _, gate) = gate();
        basic_user(&users);

        gate.commit("u-1", dec!(100), TransactionKind::FiatToCrypto)
            .unwrap();
        let first = users.get("u-1").unwrap().first_deposit_at;

        gate.commit("u-1", dec!(100), TransactionKind::FiatToCrypto)
            .unwrap();
        let user = users.get("u-1").unwrap();
        assert_eq!(user.first_deposit_at, first);
        assert!(user.last_deposit_at >= first);
    }

    #[test]
    fn test_commit_rejects_over_limit() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.daily_used
            .add(TransactionKind::CryptoToFiat, dec!(24_800));
        users.insert(user);

        let result = gate.commit("u-1", dec!(500), TransactionKind::CryptoToFiat);
        assert!(matches!(
            result,
            Err(ComplianceError::ConcurrencyConflict { .. })
        ));
        // Nothing moved
        let user = users.get("u-1").unwrap();
        assert_eq!(user.daily_used.crypto_to_fiat, dec!(24_800));
        assert_eq!(user.total_deposited_lifetime, dec!(0));
    }

    #[test]
    fn test_commit_unknown_user() {
        let (_, _, gate) = gate();
        let result = gate.commit("ghost", dec!(100), TransactionKind::FiatToCrypto);
        assert!(matches!(result, Err(ComplianceError::NotFound { .. })));
    }

    // === resets ===

    #[test]
    fn test_reset_daily_restores_fresh_budget() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.daily_used
            .add(TransactionKind::CryptoToFiat, dec!(25_000));
        user.daily_tx_count = 20;
        users.insert(user);

        let before = gate.evaluate("u-1", dec!(100), TransactionKind::CryptoToFiat);
        assert!(!before.allowed);

        gate.reset_daily();
        gate.reset_daily(); // idempotent

        let after = gate.evaluate("u-1", dec!(100), TransactionKind::CryptoToFiat);
        assert!(after.allowed);

        // Same decision a brand-new user would get
        let mut fresh = UserComplianceState::new("u-2");
        fresh.tier = VerificationTier::Basic;
        users.insert(fresh);
        let fresh_decision = gate.evaluate("u-2", dec!(100), TransactionKind::CryptoToFiat);
        assert_eq!(after.allowed, fresh_decision.allowed);
        assert_eq!(
            after.snapshot.unwrap().daily_remaining,
            fresh_decision.snapshot.unwrap().daily_remaining
        );
    }

    #[test]
    fn test_resets_are_independent() {
        let (users, _, gate) = gate();
        let mut user = UserComplianceState::new("u-1");
        user.tier = VerificationTier::Basic;
        user.daily_used.add(TransactionKind::CryptoToFiat, dec!(10));
        user.weekly_used.add(TransactionKind::CryptoToFiat, dec!(20));
        user.monthly_used
            .add(TransactionKind::CryptoToFiat, dec!(30));
        users.insert(user);

        gate.reset_weekly();
        let user = users.get("u-1").unwrap();
        assert_eq!(user.daily_used.crypto_to_fiat, dec!(10));
        assert_eq!(user.weekly_used.crypto_to_fiat, dec!(0));
        assert_eq!(user.monthly_used.crypto_to_fiat, dec!(30));

        gate.reset_monthly();
        let user = users.get("u-1").unwrap();
        assert_eq!(user.monthly_used.crypto_to_fiat, dec!(0));
    }

    // === race safety ===

    #[test]
    fn test_concurrent_commits_never_exceed_daily_limit() {
        let none = TierPolicy {
            tier: VerificationTier::None,
            single_tx_limit: dec!(100),
            daily_limit: dec!(1_000),
            weekly_limit: dec!(5_000),
            monthly_limit: dec!(20_000),
            allowed_kinds: vec![TransactionKind::FiatToCrypto],
            max_daily_tx_count: 50,
        };
        let basic = TierPolicy {
            tier: VerificationTier::Basic,
            single_tx_limit: dec!(200),
            daily_limit: dec!(2_000),
            weekly_limit: dec!(10_000),
            monthly_limit: dec!(40_000),
            allowed_kinds: vec![TransactionKind::FiatToCrypto, TransactionKind::CryptoToFiat],
            max_daily_tx_count: 60,
        };
        let standard = TierPolicy {
            tier: VerificationTier::Standard,
            single_tx_limit: dec!(400),
            daily_limit: dec!(4_000),
            weekly_limit: dec!(20_000),
            monthly_limit: dec!(80_000),
            allowed_kinds: vec![
                TransactionKind::FiatToCrypto,
                TransactionKind::CryptoToFiat,
                TransactionKind::CryptoWithdrawal,
            ],
            max_daily_tx_count: 70,
        };
        let policies = Arc::new(TierPolicyTable::new(none, basic, standard).unwrap());

        let users = Arc::new(MemoryUserStore::new());
        users.insert(UserComplianceState::new("u-1"));
        let gate = VelocityGate::new(
            users.clone(),
            Arc::new(MemoryAuditSink::new()),
            policies,
            dec!(1_000),
        );

        let successes = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..50 {
                scope.spawn(|| {
                    let decision = gate.evaluate("u-1", dec!(100), TransactionKind::FiatToCrypto);
                    if decision.allowed
                        && gate
                            .commit("u-1", dec!(100), TransactionKind::FiatToCrypto)
                            .is_ok()
                    {
                        successes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        // 1000 daily limit / 100 per attempt => exactly 10 commits land
        assert_eq!(successes.load(std::sync::atomic::Ordering::SeqCst), 10);
        let user = users.get("u-1").unwrap();
        assert_eq!(user.daily_used.fiat_to_crypto, dec!(1_000));
        assert_eq!(user.daily_tx_count, 10);
    }
}
