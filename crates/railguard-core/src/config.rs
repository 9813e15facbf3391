use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::types::Money;
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// AML configuration
// ---------------------------------------------------------------------------

/// Which counterparty-screening provider to dispatch to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmlProviderKind {
    Chainalysis,
    Elliptic,
    #[default]
    Mock,
}

/// Risk bucketing boundaries. Thresholds are configuration, not logic; the
/// risk engine reuses the same boundaries for its AML factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmlThresholds {
    pub high: Decimal,
    pub medium: Decimal,
}

impl Default for AmlThresholds {
    fn default() -> Self {
        Self {
            high: dec!(70),
            medium: dec!(40),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlConfig {
    #[serde(default)]
    pub provider: AmlProviderKind,
    /// Credentials for the configured provider. Absence forces the mock
    /// fallback path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upper bound on a provider call before falling back.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default)]
    pub thresholds: AmlThresholds,
    /// Address shapes of known exchanges, screened to zero risk without a
    /// provider call.
    #[serde(default = "default_whitelist_patterns")]
    pub whitelist_patterns: Vec<String>,
}

fn default_provider_timeout_ms() -> u64 {
    2_500
}

fn default_whitelist_patterns() -> Vec<String> {
    vec![
        // Stellar exchange deposit addresses
        "^G[A-Z0-9]{55}$".to_string(),
        // XRP classic addresses used by custodial exchanges
        "^r[1-9A-HJ-NP-Za-km-z]{24,34}$".to_string(),
    ]
}

impl Default for AmlConfig {
    fn default() -> Self {
        Self {
            provider: AmlProviderKind::default(),
            api_key: None,
            provider_timeout_ms: default_provider_timeout_ms(),
            thresholds: AmlThresholds::default(),
            whitelist_patterns: default_whitelist_patterns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verification advisor configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Composite risk score above which STANDARD verification is mandatory.
    pub mandatory_risk_score: Decimal,
    /// Round-numbers pattern confidence above which STANDARD verification
    /// is mandatory.
    pub round_numbers_confidence: Decimal,
    /// Lifetime deposits above which an unverified user gets a soft upgrade
    /// suggestion.
    pub upgrade_suggestion_lifetime: Money,
    /// Lifetime deposits above which source-of-funds documentation is
    /// suggested.
    pub source_of_funds_threshold: Money,
    /// Per-transaction cap applied by the gate while LIGHT verification is
    /// pending.
    pub light_pending_tx_cap: Money,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mandatory_risk_score: dec!(80),
            round_numbers_confidence: dec!(70),
            upgrade_suggestion_lifetime: dec!(10_000),
            source_of_funds_threshold: dec!(25_000),
            light_pending_tx_cap: dec!(1_000),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub aml: AmlConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

impl EngineConfig {
    /// Validate eagerly so configuration errors are fatal at startup and
    /// never observed at request time.
    pub fn validate(&self) -> ComplianceResult<()> {
        let t = &self.aml.thresholds;
        if t.medium <= Decimal::ZERO || t.high <= t.medium {
            return Err(ComplianceError::ConfigurationError(format!(
                "AML thresholds must satisfy 0 < medium < high (got medium={}, high={})",
                t.medium, t.high
            )));
        }
        if self.verification.light_pending_tx_cap <= Decimal::ZERO {
            return Err(ComplianceError::ConfigurationError(
                "light-pending transaction cap must be positive".to_string(),
            ));
        }
        if self.verification.mandatory_risk_score <= Decimal::ZERO
            || self.verification.round_numbers_confidence <= Decimal::ZERO
        {
            return Err(ComplianceError::ConfigurationError(
                "verification trigger thresholds must be positive".to_string(),
            ));
        }
        for pattern in &self.aml.whitelist_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ComplianceError::ConfigurationError(format!(
                    "invalid whitelist pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }
        Ok(())
    }
}
