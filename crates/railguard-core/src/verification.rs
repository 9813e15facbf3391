use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VerificationConfig;
use crate::error::ComplianceError;
use crate::risk::{PatternKind, PatternReport, RiskScore};
use crate::store::{AuditSink, UserStore};
use crate::types::{
    ComplianceAction, ComplianceLogEntry, Money, RiskLevel, VerificationTier, VerificationType,
};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What the advisor wants the host to do about verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub should_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_type: Option<VerificationType>,
    pub mandatory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub suggestions: Vec<String>,
}

impl Recommendation {
    fn none(suggestions: Vec<String>) -> Self {
        Self {
            should_request: false,
            verification_type: None,
            mandatory: false,
            reason: None,
            suggestions,
        }
    }
}

/// Capability constraints in force while a verification is pending.
/// Enforced by the velocity gate reading `pending_verification`; this
/// struct only describes them to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConstraints {
    pub deposits_allowed: bool,
    pub withdrawals_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_tx_cap: Option<Money>,
}

impl PendingConstraints {
    pub fn for_type(verification_type: VerificationType, light_cap: Money) -> Self {
        match verification_type {
            VerificationType::Light => Self {
                deposits_allowed: true,
                withdrawals_allowed: true,
                single_tx_cap: Some(light_cap),
            },
            VerificationType::Standard => Self {
                deposits_allowed: true,
                withdrawals_allowed: false,
                single_tx_cap: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequestOutcome {
    pub user_id: String,
    pub verification_type: VerificationType,
    pub requested_at: DateTime<Utc>,
    pub constraints: PendingConstraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub user_id: String,
    pub previous_tier: VerificationTier,
    pub new_tier: VerificationTier,
    pub verified_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

/// Decides whether to require, suggest, or skip stronger verification, and
/// drives the per-user verification state machine.
pub struct VerificationAdvisor<U: UserStore, A: AuditSink> {
    users: Arc<U>,
    audit: Arc<A>,
    config: VerificationConfig,
}

impl<U: UserStore, A: AuditSink> VerificationAdvisor<U, A> {
    pub fn new(users: Arc<U>, audit: Arc<A>, config: VerificationConfig) -> Self {
        Self {
            users,
            audit,
            config,
        }
    }

    /// Apply the recommendation ladder to a user's risk score and pattern
    /// report. Rules are checked in priority order; the first hit wins.
    pub fn recommend(
        &self,
        user_id: &str,
        risk: &RiskScore,
        patterns: &PatternReport,
    ) -> ComplianceResult<Recommendation> {
        let user = self
            .users
            .get(user_id)
            .ok_or_else(|| ComplianceError::user_not_found(user_id))?;

        let mut suggestions = Vec::new();
        if user.total_deposited_lifetime > self.config.source_of_funds_threshold {
            suggestions.push(format!(
                "Provide source-of-funds documentation: lifetime deposits exceed ${}",
                self.config.source_of_funds_threshold.normalize()
            ));
        }

        if risk.level == RiskLevel::High && risk.score > self.config.mandatory_risk_score {
            return Ok(Recommendation {
                should_request: true,
                verification_type: Some(VerificationType::Standard),
                mandatory: true,
                reason: Some(format!(
                    "composite risk score {} requires full document verification",
                    risk.score.normalize()
                )),
                suggestions,
            });
        }

        let round_numbers = patterns
            .patterns
            .iter()
            .find(|p| p.kind == PatternKind::RoundNumbers);
        if let Some(pattern) = round_numbers {
            if pattern.confidence > self.config.round_numbers_confidence {
                return Ok(Recommendation {
                    should_request: true,
                    verification_type: Some(VerificationType::Standard),
                    mandatory: true,
                    reason: Some(
                        "round-amount deposit pattern consistent with structuring".to_string(),
                    ),
                    suggestions,
                });
            }
        }

        if patterns.has_unusual_patterns {
            let trigger = patterns
                .patterns
                .iter()
                .find(|p| p.kind != PatternKind::BusinessPattern);
            return Ok(Recommendation {
                should_request: true,
                verification_type: Some(VerificationType::Light),
                mandatory: false,
                reason: trigger.map(|p| p.description.clone()),
                suggestions,
            });
        }

        if user.tier == VerificationTier::None
            && user.total_deposited_lifetime > self.config.upgrade_suggestion_lifetime
        {
            suggestions.push(format!(
                "Verifying your identity raises limits: lifetime deposits already exceed ${}",
                self.config.upgrade_suggestion_lifetime.normalize()
            ));
            return Ok(Recommendation::none(suggestions));
        }

        Ok(Recommendation::none(suggestions))
    }

    /// Put the user into a pending-verification state and describe the
    /// constraints that apply until it completes.
    pub fn request_verification(
        &self,
        user_id: &str,
        verification_type: VerificationType,
    ) -> ComplianceResult<VerificationRequestOutcome> {
        let now = Utc::now();
        self.users.with_user(user_id, |user| {
            user.pending_verification = Some(verification_type);
            user.verification_requested_at = Some(now);
        })?;

        tracing::info!(user_id, %verification_type, "verification requested");
        self.audit.append(
            ComplianceLogEntry::for_user(ComplianceAction::VerificationRequested, user_id)
                .with_metadata(serde_json::json!({
                    "verification_type": verification_type,
                })),
        );

        Ok(VerificationRequestOutcome {
            user_id: user_id.to_string(),
            verification_type,
            requested_at: now,
            constraints: PendingConstraints::for_type(
                verification_type,
                self.config.light_pending_tx_cap,
            ),
        })
    }

    /// Resolve the pending verification into a tier outcome. Tier
    /// transitions are monotonic; this never downgrades.
    pub fn complete_verification(
        &self,
        user_id: &str,
        documents: &[String],
    ) -> ComplianceResult<VerificationOutcome> {
        let now = Utc::now();
        let (previous_tier, new_tier) = self.users.with_user(user_id, |user| {
            let Some(pending) = user.pending_verification.take() else {
                return Err(ComplianceError::InvalidInput {
                    field: "pending_verification".to_string(),
                    reason: format!("no verification is pending for user '{}'", user.user_id),
                });
            };
            let previous = user.tier;
            let target = match pending {
                VerificationType::Standard => VerificationTier::Standard,
                VerificationType::Light => {
                    if previous == VerificationTier::None {
                        VerificationTier::Basic
                    } else {
                        previous
                    }
                }
            };
            user.tier = previous.max(target);
            user.kyc_verified_at = Some(now);
            Ok((previous, user.tier))
        })??;

        tracing::info!(
            user_id,
            from = %previous_tier,
            to = %new_tier,
            "verification completed"
        );
        self.audit.append(
            ComplianceLogEntry::for_user(ComplianceAction::TierUpgraded, user_id).with_metadata(
                serde_json::json!({
                    "previous_tier": previous_tier,
                    "new_tier": new_tier,
                    "documents_submitted": documents.len(),
                }),
            ),
        );

        Ok(VerificationOutcome {
            user_id: user_id.to_string(),
            previous_tier,
            new_tier,
            verified_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{DetectedPattern, PatternAction, RiskFactor};
    use crate::store::{MemoryAuditSink, MemoryUserStore};
    use crate::types::UserComplianceState;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn advisor() -> (
        Arc<MemoryUserStore>,
        Arc<MemoryAuditSink>,
        VerificationAdvisor<MemoryUserStore, MemoryAuditSink>,
    ) {
        let users = Arc::new(MemoryUserStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let advisor =
            VerificationAdvisor::new(users.clone(), audit.clone(), VerificationConfig::default());
        (users, audit, advisor)
    }

    fn seed_user(users: &MemoryUserStore, tier: VerificationTier, lifetime: Decimal) {
        let mut user = UserComplianceState::new("u-1");
        user.tier = tier;
        user.total_deposited_lifetime = lifetime;
        users.insert(user);
    }

    fn risk(score: Decimal, level: RiskLevel) -> RiskScore {
        RiskScore {
            score,
            level,
            factors: vec![RiskFactor {
                name: "deposit_frequency".to_string(),
                score,
                weight: dec!(1),
            }],
        }
    }

    fn pattern(kind: PatternKind, confidence: Decimal, action: PatternAction) -> DetectedPattern {
        DetectedPattern {
            kind,
            confidence,
            description: format!("{:?} at {}", kind, confidence),
            action,
        }
    }

    fn no_patterns() -> PatternReport {
        PatternReport::default()
    }

    // === recommend ===

    #[test]
    fn test_high_risk_requires_standard() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(5_000));

        let rec = advisor
            .recommend("u-1", &risk(dec!(85), RiskLevel::High), &no_patterns())
            .unwrap();
        assert!(rec.should_request);
        assert!(rec.mandatory);
        assert_eq!(rec.verification_type, Some(VerificationType::Standard));
    }

    #[test]
    fn test_high_level_but_score_at_threshold_not_mandatory() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(5_000));

        let rec = advisor
            .recommend("u-1", &risk(dec!(80), RiskLevel::High), &no_patterns())
            .unwrap();
        assert!(!rec.should_request);
    }

    #[test]
    fn test_round_numbers_requires_standard() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(6_000));

        let report = PatternReport {
            has_unusual_patterns: true,
            patterns: vec![pattern(
                PatternKind::RoundNumbers,
                dec!(100),
                PatternAction::Review,
            )],
        };
        let rec = advisor
            .recommend("u-1", &risk(dec!(30), RiskLevel::Low), &report)
            .unwrap();
        assert!(rec.should_request);
        assert!(rec.mandatory);
        assert_eq!(rec.verification_type, Some(VerificationType::Standard));
        assert!(rec.reason.unwrap().contains("structuring"));
    }

    #[test]
    fn test_other_unusual_pattern_recommends_light() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(6_000));

        let report = PatternReport {
            has_unusual_patterns: true,
            patterns: vec![pattern(
                PatternKind::RapidDeposits,
                dec!(60),
                PatternAction::Monitor,
            )],
        };
        let rec = advisor
            .recommend("u-1", &risk(dec!(30), RiskLevel::Low), &report)
            .unwrap();
        assert!(rec.should_request);
        assert!(!rec.mandatory);
        assert_eq!(rec.verification_type, Some(VerificationType::Light));
    }

    #[test]
    fn test_unverified_whale_gets_soft_suggestion() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::None, dec!(12_000));

        let rec = advisor
            .recommend("u-1", &risk(dec!(30), RiskLevel::Low), &no_patterns())
            .unwrap();
        assert!(!rec.should_request);
        assert!(rec.verification_type.is_none());
        assert!(rec
            .suggestions
            .iter()
            .any(|s| s.contains("raises limits")));
    }

    #[test]
    fn test_quiet_user_gets_nothing() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(5_000));

        let rec = advisor
            .recommend("u-1", &risk(dec!(20), RiskLevel::Low), &no_patterns())
            .unwrap();
        assert!(!rec.should_request);
        assert!(rec.suggestions.is_empty());
    }

    #[test]
    fn test_source_of_funds_suggestion_rides_along() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Standard, dec!(40_000));

        let rec = advisor
            .recommend("u-1", &risk(dec!(85), RiskLevel::High), &no_patterns())
            .unwrap();
        assert!(rec.should_request);
        assert!(rec
            .suggestions
            .iter()
            .any(|s| s.contains("source-of-funds")));
    }

    #[test]
    fn test_business_pattern_alone_triggers_nothing() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(9_000));

        let report = PatternReport {
            has_unusual_patterns: false,
            patterns: vec![pattern(
                PatternKind::BusinessPattern,
                dec!(95),
                PatternAction::Monitor,
            )],
        };
        let rec = advisor
            .recommend("u-1", &risk(dec!(20), RiskLevel::Low), &report)
            .unwrap();
        assert!(!rec.should_request);
    }

    // === request / complete ===

    #[test]
    fn test_request_light_sets_pending_and_constraints() {
        let (users, audit, advisor) = advisor();
        seed_user(&users, VerificationTier::None, dec!(0));

        let outcome = advisor
            .request_verification("u-1", VerificationType::Light)
            .unwrap();
        assert!(outcome.constraints.withdrawals_allowed);
        assert_eq!(outcome.constraints.single_tx_cap, Some(dec!(1_000)));

        let user = users.get("u-1").unwrap();
        assert_eq!(user.pending_verification, Some(VerificationType::Light));
        assert!(user.verification_requested_at.is_some());
        assert_eq!(
            audit.entries()[0].action,
            ComplianceAction::VerificationRequested
        );
    }

    #[test]
    fn test_request_standard_pauses_withdrawals() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(0));

        let outcome = advisor
            .request_verification("u-1", VerificationType::Standard)
            .unwrap();
        assert!(outcome.constraints.deposits_allowed);
        assert!(!outcome.constraints.withdrawals_allowed);
        assert_eq!(outcome.constraints.single_tx_cap, None);
    }

    #[test]
    fn test_light_round_trip_upgrades_none_to_basic() {
        let (users, audit, advisor) = advisor();
        seed_user(&users, VerificationTier::None, dec!(0));

        advisor
            .request_verification("u-1", VerificationType::Light)
            .unwrap();
        let outcome = advisor
            .complete_verification("u-1", &["phone:+44".to_string()])
            .unwrap();

        assert_eq!(outcome.previous_tier, VerificationTier::None);
        assert_eq!(outcome.new_tier, VerificationTier::Basic);

        let user = users.get("u-1").unwrap();
        assert_eq!(user.tier, VerificationTier::Basic);
        assert!(user.pending_verification.is_none());
        assert!(user.kyc_verified_at.is_some());
        assert!(audit
            .entries()
            .iter()
            .any(|e| e.action == ComplianceAction::TierUpgraded));
    }

    #[test]
    fn test_light_does_not_move_higher_tiers() {
        for tier in [VerificationTier::Basic, VerificationTier::Standard] {
            let (users, _, advisor) = advisor();
            seed_user(&users, tier, dec!(0));

            advisor
                .request_verification("u-1", VerificationType::Light)
                .unwrap();
            let outcome = advisor.complete_verification("u-1", &[]).unwrap();
            assert_eq!(outcome.new_tier, tier);
        }
    }

    #[test]
    fn test_standard_completion_upgrades_to_standard() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(0));

        advisor
            .request_verification("u-1", VerificationType::Standard)
            .unwrap();
        let outcome = advisor
            .complete_verification("u-1", &["passport".to_string(), "utility-bill".to_string()])
            .unwrap();
        assert_eq!(outcome.new_tier, VerificationTier::Standard);
    }

    #[test]
    fn test_standard_completion_never_downgrades() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Standard, dec!(0));

        advisor
            .request_verification("u-1", VerificationType::Light)
            .unwrap();
        let outcome = advisor.complete_verification("u-1", &[]).unwrap();
        assert_eq!(outcome.previous_tier, VerificationTier::Standard);
        assert_eq!(outcome.new_tier, VerificationTier::Standard);
    }

    #[test]
    fn test_complete_without_pending_is_invalid() {
        let (users, _, advisor) = advisor();
        seed_user(&users, VerificationTier::Basic, dec!(0));

        let result = advisor.complete_verification("u-1", &[]);
        assert!(matches!(
            result,
            Err(ComplianceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_unknown_user_everywhere() {
        let (_, _, advisor) = advisor();
        assert!(matches!(
            advisor.recommend("ghost", &risk(dec!(10), RiskLevel::Low), &no_patterns()),
            Err(ComplianceError::NotFound { .. })
        ));
        assert!(matches!(
            advisor.request_verification("ghost", VerificationType::Light),
            Err(ComplianceError::NotFound { .. })
        ));
        assert!(matches!(
            advisor.complete_verification("ghost", &[]),
            Err(ComplianceError::NotFound { .. })
        ));
    }
}
