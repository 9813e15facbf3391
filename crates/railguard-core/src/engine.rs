use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::aml::{AmlCheckResult, AmlScreener};
use crate::config::EngineConfig;
use crate::error::ComplianceError;
use crate::policy::TierPolicyTable;
use crate::risk::{PatternReport, RiskEngine, RiskScore};
use crate::store::{
    AuditSink, DepositEventStore, MemoryAuditSink, MemoryDepositStore, MemoryUserStore, UserStore,
};
use crate::types::{
    ComplianceAction, ComplianceLogEntry, DepositEvent, KindAmounts, Money, TransactionKind,
    UserComplianceState, VerificationType,
};
use crate::velocity::{GateDecision, VelocityGate};
use crate::verification::{
    Recommendation, VerificationAdvisor, VerificationOutcome, VerificationRequestOutcome,
};
use crate::ComplianceResult;

/// The compliance engine over the in-memory stores, as used by tests and
/// the CLI.
pub type MemoryComplianceEngine =
    ComplianceEngine<MemoryUserStore, MemoryDepositStore, MemoryAuditSink>;

/// Facade wiring the tier table, velocity gate, AML screener, risk engine,
/// and verification advisor over injected stores. This is the surface the
/// host application calls around each transaction.
pub struct ComplianceEngine<U: UserStore, D: DepositEventStore, A: AuditSink> {
    users: Arc<U>,
    deposits: Arc<D>,
    audit: Arc<A>,
    gate: VelocityGate<U, A>,
    screener: AmlScreener,
    risk: RiskEngine<U, D>,
    advisor: VerificationAdvisor<U, A>,
}

impl MemoryComplianceEngine {
    /// Engine over fresh in-memory stores.
    pub fn in_memory(config: EngineConfig) -> ComplianceResult<Self> {
        Self::new(
            config,
            TierPolicyTable::default(),
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryDepositStore::new()),
            Arc::new(MemoryAuditSink::new()),
        )
    }
}

impl<U: UserStore, D: DepositEventStore, A: AuditSink> ComplianceEngine<U, D, A> {
    /// Wire the engine over host-provided stores. Configuration and the
    /// policy table are validated here, eagerly; a bad table never reaches
    /// a decision.
    pub fn new(
        config: EngineConfig,
        policies: TierPolicyTable,
        users: Arc<U>,
        deposits: Arc<D>,
        audit: Arc<A>,
    ) -> ComplianceResult<Self> {
        config.validate()?;
        let policies = Arc::new(policies.validated()?);

        let gate = VelocityGate::new(
            users.clone(),
            audit.clone(),
            policies.clone(),
            config.verification.light_pending_tx_cap,
        );
        let screener = AmlScreener::from_config(&config.aml)?;
        let risk = RiskEngine::new(
            users.clone(),
            deposits.clone(),
            policies.clone(),
            config.aml.thresholds,
        );
        let advisor =
            VerificationAdvisor::new(users.clone(), audit.clone(), config.verification.clone());

        Ok(Self {
            users,
            deposits,
            audit,
            gate,
            screener,
            risk,
            advisor,
        })
    }

    pub fn users(&self) -> &Arc<U> {
        &self.users
    }

    pub fn deposits(&self) -> &Arc<D> {
        &self.deposits
    }

    pub fn audit(&self) -> &Arc<A> {
        &self.audit
    }

    // -----------------------------------------------------------------
    // User lifecycle
    // -----------------------------------------------------------------

    /// Create the compliance record for a user who just became eligible to
    /// transact. Idempotent: an existing record is returned untouched.
    pub fn register_user(&self, user_id: &str) -> ComplianceResult<UserComplianceState> {
        if user_id.trim().is_empty() {
            return Err(ComplianceError::InvalidInput {
                field: "user_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(existing) = self.users.get(user_id) {
            return Ok(existing);
        }
        let state = UserComplianceState::new(user_id);
        self.users.insert(state.clone());
        tracing::debug!(user_id, "compliance record created");
        Ok(state)
    }

    // -----------------------------------------------------------------
    // Transaction path
    // -----------------------------------------------------------------

    /// Hard-stop check before a transaction is attempted.
    pub fn evaluate_transaction(
        &self,
        user_id: &str,
        amount: Money,
        kind: TransactionKind,
    ) -> ComplianceResult<GateDecision> {
        validate_amount(amount)?;
        Ok(self.gate.evaluate(user_id, amount, kind))
    }

    /// Record a settled transaction: usage counters, the deposit event
    /// stamped with the risk level at settlement time, and the audit trail.
    pub fn commit_transaction(
        &self,
        user_id: &str,
        amount: Money,
        kind: TransactionKind,
        currency: &str,
    ) -> ComplianceResult<DepositEvent> {
        validate_amount(amount)?;
        self.gate.commit(user_id, amount, kind)?;

        let risk_level = self.risk.score(user_id)?.level;
        let event = DepositEvent::new(user_id, amount, currency, kind, risk_level);
        self.deposits.append(event.clone());
        self.audit.append(
            ComplianceLogEntry::for_user(ComplianceAction::TransactionCommitted, user_id)
                .with_amount(amount)
                .with_tx(event.id)
                .with_risk_level(risk_level),
        );
        Ok(event)
    }

    // -----------------------------------------------------------------
    // AML
    // -----------------------------------------------------------------

    /// Screen a counterparty address. Provider outages degrade to the mock
    /// fallback; the caller sees a verdict either way.
    pub fn screen_counterparty(
        &self,
        address: &str,
        amount: Option<Money>,
    ) -> ComplianceResult<AmlCheckResult> {
        if address.trim().is_empty() {
            return Err(ComplianceError::InvalidInput {
                field: "address".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let result = self.screener.screen(address, amount);
        self.audit.append(
            ComplianceLogEntry::new(ComplianceAction::AmlScreened)
                .with_risk_level(result.risk_level)
                .with_metadata(serde_json::json!({
                    "address": address,
                    "provider": result.provider,
                    "risk_score": result.risk_score,
                    "is_sanctioned": result.is_sanctioned,
                })),
        );
        Ok(result)
    }

    /// Store a screening score on the user record so the risk engine's AML
    /// factor can see it.
    pub fn attach_aml_result(
        &self,
        user_id: &str,
        result: &AmlCheckResult,
    ) -> ComplianceResult<()> {
        self.users.with_user(user_id, |user| {
            user.aml_risk_score = Some(result.risk_score);
        })
    }

    // -----------------------------------------------------------------
    // Risk & patterns
    // -----------------------------------------------------------------

    pub fn risk_score(&self, user_id: &str) -> ComplianceResult<RiskScore> {
        self.risk.score(user_id)
    }

    pub fn unusual_patterns(&self, user_id: &str) -> ComplianceResult<PatternReport> {
        self.risk.detect_patterns(user_id)
    }

    // -----------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------

    pub fn verification_recommendation(
        &self,
        user_id: &str,
    ) -> ComplianceResult<Recommendation> {
        let risk = self.risk.score(user_id)?;
        let patterns = self.risk.detect_patterns(user_id)?;
        self.advisor.recommend(user_id, &risk, &patterns)
    }

    pub fn request_verification(
        &self,
        user_id: &str,
        verification_type: VerificationType,
    ) -> ComplianceResult<VerificationRequestOutcome> {
        self.advisor.request_verification(user_id, verification_type)
    }

    pub fn complete_verification(
        &self,
        user_id: &str,
        documents: &[String],
    ) -> ComplianceResult<VerificationOutcome> {
        self.advisor.complete_verification(user_id, documents)
    }

    // -----------------------------------------------------------------
    // Scheduled maintenance
    // -----------------------------------------------------------------

    pub fn reset_daily(&self) {
        self.gate.reset_daily();
    }

    pub fn reset_weekly(&self) {
        self.gate.reset_weekly();
    }

    pub fn reset_monthly(&self) {
        self.gate.reset_monthly();
    }

    // -----------------------------------------------------------------
    // Review & reconciliation
    // -----------------------------------------------------------------

    /// Toggle the review flag on a settled deposit.
    pub fn flag_deposit(&self, event_id: Uuid, reason: &str) -> ComplianceResult<DepositEvent> {
        let event = self.deposits.set_flag(event_id, reason)?;
        self.audit.append(
            ComplianceLogEntry::for_user(ComplianceAction::DepositFlagged, event.user_id.clone())
                .with_tx(event.id)
                .with_reason(reason),
        );
        Ok(event)
    }

    /// Rebuild a user's usage accumulators from the deposit-event log. The
    /// counters are a cached projection; this proves (and restores) the
    /// projection invariant after a store repair.
    pub fn rebuild_counters(&self, user_id: &str) -> ComplianceResult<()> {
        let now = Utc::now();
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let week_start = day_start
            - Duration::days(i64::from(now.date_naive().weekday().num_days_from_monday()));
        let month_start = now
            .date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
            .unwrap_or(day_start);

        let events = self.deposits.all_for_user(user_id);
        let mut daily = KindAmounts::default();
        let mut weekly = KindAmounts::default();
        let mut monthly = KindAmounts::default();
        let mut daily_count = 0u32;
        let mut lifetime = Decimal::ZERO;
        let mut first = None;
        let mut last = None;

        for event in &events {
            lifetime += event.amount;
            if first.map(|f| event.timestamp < f).unwrap_or(true) {
                first = Some(event.timestamp);
            }
            if last.map(|l| event.timestamp > l).unwrap_or(true) {
                last = Some(event.timestamp);
            }
            if event.timestamp >= month_start {
                monthly.add(event.kind, event.amount);
            }
            if event.timestamp >= week_start {
                weekly.add(event.kind, event.amount);
            }
            if event.timestamp >= day_start {
                daily.add(event.kind, event.amount);
                daily_count += 1;
            }
        }

        self.users.with_user(user_id, |user| {
            user.daily_used = daily;
            user.weekly_used = weekly;
            user.monthly_used = monthly;
            user.daily_tx_count = daily_count;
            user.total_deposited_lifetime = lifetime;
            user.first_deposit_at = first;
            user.last_deposit_at = last;
        })?;
        tracing::info!(user_id, events = events.len(), "usage counters rebuilt");
        Ok(())
    }
}

fn validate_amount(amount: Money) -> ComplianceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ComplianceError::InvalidInput {
            field: "amount".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(())
}
