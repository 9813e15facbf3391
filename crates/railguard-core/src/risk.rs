use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::AmlThresholds;
use crate::error::ComplianceError;
use crate::policy::TierPolicyTable;
use crate::store::{DepositEventStore, UserStore};
use crate::types::{RiskLevel, UserComplianceState, VerificationTier};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub score: Decimal,
    pub weight: Decimal,
}

/// Composite risk verdict: fixed weighted sum of four sub-scores, each
/// normalized to 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: Decimal,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    RapidDeposits,
    RoundNumbers,
    BusinessPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternAction {
    Monitor,
    Suggest,
    Review,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub confidence: Decimal,
    pub description: String,
    pub action: PatternAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub has_unusual_patterns: bool,
    pub patterns: Vec<DetectedPattern>,
}

// ---------------------------------------------------------------------------
// Factor weights and buckets
// ---------------------------------------------------------------------------

const WEIGHT_FREQUENCY: Decimal = dec!(0.20);
const WEIGHT_SIZE: Decimal = dec!(0.30);
const WEIGHT_TIER: Decimal = dec!(0.30);
const WEIGHT_AML: Decimal = dec!(0.20);

/// Trailing-7-day deposit count, bucketed.
fn frequency_score(count: usize) -> Decimal {
    if count <= 5 {
        dec!(30)
    } else if count <= 15 {
        dec!(60)
    } else {
        dec!(100)
    }
}

/// Trailing-30-day volume as a percentage of the tier monthly limit,
/// bucketed.
fn size_score(pct_of_monthly: Decimal) -> Decimal {
    if pct_of_monthly <= dec!(30) {
        dec!(20)
    } else if pct_of_monthly <= dec!(70) {
        dec!(50)
    } else if pct_of_monthly <= dec!(120) {
        dec!(80)
    } else {
        dec!(100)
    }
}

/// Activity inconsistent with the declared tier. Thresholds stay literals
/// until the host promotes them to the policy table.
fn tier_compliance_score(user: &UserComplianceState) -> Decimal {
    match user.tier {
        VerificationTier::Standard => Decimal::ZERO,
        VerificationTier::Basic => {
            if user.total_deposited_lifetime > dec!(50_000) {
                dec!(70)
            } else {
                dec!(30)
            }
        }
        VerificationTier::None => {
            if user.total_deposited_lifetime > dec!(10_000) {
                dec!(80)
            } else {
                dec!(40)
            }
        }
    }
}

/// AML sub-score stepped by the screening thresholds. A score on file below
/// the medium boundary still contributes 30; only the absence of any
/// screening result scores 0.
fn aml_score(user: &UserComplianceState, thresholds: &AmlThresholds) -> Decimal {
    match user.aml_risk_score {
        None => Decimal::ZERO,
        Some(s) if s >= thresholds.high => dec!(100),
        Some(s) if s >= thresholds.medium => dec!(60),
        Some(_) => dec!(30),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Scores historical deposit behavior and detects behavioral patterns over
/// the deposit-event log.
pub struct RiskEngine<U: UserStore, D: DepositEventStore> {
    users: Arc<U>,
    events: Arc<D>,
    policies: Arc<TierPolicyTable>,
    aml_thresholds: AmlThresholds,
}

impl<U: UserStore, D: DepositEventStore> RiskEngine<U, D> {
    pub fn new(
        users: Arc<U>,
        events: Arc<D>,
        policies: Arc<TierPolicyTable>,
        aml_thresholds: AmlThresholds,
    ) -> Self {
        Self {
            users,
            events,
            policies,
            aml_thresholds,
        }
    }

    /// Composite 0–100 risk score with the per-factor breakdown.
    pub fn score(&self, user_id: &str) -> ComplianceResult<RiskScore> {
        let user = self
            .users
            .get(user_id)
            .ok_or_else(|| ComplianceError::user_not_found(user_id))?;
        let now = Utc::now();

        let week_count = self
            .events
            .events_since(user_id, now - Duration::days(7))
            .len();
        let frequency = frequency_score(week_count);

        let month_total: Decimal = self
            .events
            .events_since(user_id, now - Duration::days(30))
            .iter()
            .map(|e| e.amount)
            .sum();
        let monthly_limit = self.policies.policy_for(user.tier).monthly_limit;
        let pct_of_monthly = month_total / monthly_limit * dec!(100);
        let size = size_score(pct_of_monthly);

        let tier = tier_compliance_score(&user);
        let aml = aml_score(&user, &self.aml_thresholds);

        let composite = frequency * WEIGHT_FREQUENCY
            + size * WEIGHT_SIZE
            + tier * WEIGHT_TIER
            + aml * WEIGHT_AML;

        let level = if composite >= dec!(70) {
            RiskLevel::High
        } else if composite >= dec!(40) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Ok(RiskScore {
            score: composite,
            level,
            factors: vec![
                RiskFactor {
                    name: "deposit_frequency".to_string(),
                    score: frequency,
                    weight: WEIGHT_FREQUENCY,
                },
                RiskFactor {
                    name: "deposit_size".to_string(),
                    score: size,
                    weight: WEIGHT_SIZE,
                },
                RiskFactor {
                    name: "tier_compliance".to_string(),
                    score: tier,
                    weight: WEIGHT_TIER,
                },
                RiskFactor {
                    name: "aml_risk".to_string(),
                    score: aml,
                    weight: WEIGHT_AML,
                },
            ],
        })
    }

    /// Behavioral pattern sweep over the trailing 30 days. Needs at least
    /// 3 events to say anything.
    pub fn detect_patterns(&self, user_id: &str) -> ComplianceResult<PatternReport> {
        if self.users.get(user_id).is_none() {
            return Err(ComplianceError::user_not_found(user_id));
        }

        let now = Utc::now();
        let mut events = self.events.events_since(user_id, now - Duration::days(30));
        if events.len() < 3 {
            return Ok(PatternReport::default());
        }
        events.sort_by_key(|e| e.timestamp);

        let total = Decimal::from(events.len());
        let mut patterns = Vec::new();

        // Rapid bursts: any three deposits spanning six hours or less.
        let mut rapid_count = 0usize;
        for i in 2..events.len() {
            let span = events[i].timestamp - events[i - 2].timestamp;
            if span <= Duration::hours(6) {
                rapid_count += 1;
            }
        }
        let rapid_confidence =
            (Decimal::from(rapid_count) / total * dec!(100)).min(dec!(100)).round_dp(2);
        if rapid_confidence > dec!(50) {
            let action = if rapid_confidence > dec!(70) {
                PatternAction::Suggest
            } else {
                PatternAction::Monitor
            };
            patterns.push(DetectedPattern {
                kind: PatternKind::RapidDeposits,
                confidence: rapid_confidence,
                description: format!(
                    "{} rapid deposit bursts across {} deposits in the last 30 days",
                    rapid_count,
                    events.len()
                ),
                action,
            });
        }

        // Round amounts: the strongest structuring signal, never downgraded.
        let round_count = events
            .iter()
            .filter(|e| {
                e.amount % dec!(1000) == Decimal::ZERO || e.amount % dec!(500) == Decimal::ZERO
            })
            .count();
        let round_pct = (Decimal::from(round_count) / total * dec!(100)).round_dp(2);
        if round_pct > dec!(60) {
            patterns.push(DetectedPattern {
                kind: PatternKind::RoundNumbers,
                confidence: round_pct,
                description: format!(
                    "{}% of deposits are round amounts (divisible by 500 or 1000)",
                    round_pct
                ),
                action: PatternAction::Review,
            });
        }

        // Salary-like regularity: benign, tracked but not "unusual".
        let mean = events.iter().map(|e| e.amount).sum::<Decimal>() / total;
        if mean > Decimal::ZERO {
            let variance = events
                .iter()
                .map(|e| {
                    let d = e.amount - mean;
                    d * d
                })
                .sum::<Decimal>()
                / total;
            let stddev = variance.sqrt().unwrap_or(Decimal::ZERO);
            let cov = (stddev / mean * dec!(100)).round_dp(2);
            if cov < dec!(40) {
                patterns.push(DetectedPattern {
                    kind: PatternKind::BusinessPattern,
                    confidence: (dec!(100) - cov).max(Decimal::ZERO),
                    description: format!(
                        "deposit amounts show business-like regularity (CoV {}%)",
                        cov
                    ),
                    action: PatternAction::Monitor,
                });
            }
        }

        let has_unusual_patterns = patterns
            .iter()
            .any(|p| p.kind != PatternKind::BusinessPattern);

        Ok(PatternReport {
            has_unusual_patterns,
            patterns,
        })
    }
}
