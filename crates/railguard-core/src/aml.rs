use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AmlConfig, AmlProviderKind, AmlThresholds};
use crate::error::ComplianceError;
use crate::types::{Money, RiskLevel};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Ephemeral screening verdict for a counterparty address. Consumed by the
/// risk engine and optionally logged; never persisted by this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlCheckResult {
    pub risk_score: Decimal,
    pub risk_level: RiskLevel,
    pub is_sanctioned: bool,
    pub risk_categories: Vec<String>,
    /// Which provider produced the verdict. `"mock"` here means the
    /// configured provider degraded and the result is a conservative
    /// default, not a real clearance.
    pub provider: String,
}

/// Raw provider output before threshold bucketing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAssessment {
    pub score: Decimal,
    pub is_sanctioned: bool,
    pub categories: Vec<String>,
}

/// Provider-side failures. Recovered locally by the mock fallback and never
/// surfaced to the screening caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider credentials not configured")]
    MissingCredentials,

    #[error("provider call exceeded {timeout_ms}ms timeout")]
    Timeout { timeout_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Provider contract
// ---------------------------------------------------------------------------

/// Counterparty address screening contract. Every provider variant
/// implements the same check; selection happens through configuration.
pub trait AmlProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn check_address(
        &self,
        address: &str,
        amount: Option<Money>,
    ) -> Result<ProviderAssessment, ProviderError>;
}

// ---------------------------------------------------------------------------
// Address intelligence tables
// ---------------------------------------------------------------------------

/// Representative OFAC SDN-listed addresses. In production the providers
/// query live sanctions feeds; these entries mirror published listings.
const SANCTIONED_ADDRESSES: &[&str] = &[
    // Lazarus Group (DPRK)
    "0x098b716b8aaf21512996dc57eb0615e2383e2f96",
    "0xa0e1c89ef1a489c9c7de96311ed5ce5d32c20e4b",
    // Tornado Cash router
    "0x8589427373d6d84e98730d7795d8f6f8731fda16",
    // Hydra market BTC settlement
    "1kuf2jd8mdxkgmsn44hasvciczcbnvbi6",
];

/// Mixing services carry elevated risk even when not sanctioned.
const MIXER_ADDRESSES: &[&str] = &[
    "0x722122df12d4e14e13ac3b6895a86e84145b6967",
    "bc1qmixer0000000000000000000000000000000",
];

/// Marker substrings seen in darknet-market vanity addresses.
const DARKNET_MARKERS: &[&str] = &["darkmarket", "hydra"];

fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

fn is_sanctioned_address(address: &str) -> bool {
    let a = normalize_address(address);
    SANCTIONED_ADDRESSES.iter().any(|&s| a == s)
}

fn is_mixer_address(address: &str) -> bool {
    let a = normalize_address(address);
    MIXER_ADDRESSES.iter().any(|&s| a == s)
}

fn has_darknet_marker(address: &str) -> bool {
    let a = normalize_address(address);
    DARKNET_MARKERS.iter().any(|&m| a.contains(m))
}

/// Deterministic baseline exposure score in 5..35 derived from the address
/// itself, standing in for the provider's graph analysis.
fn baseline_exposure(address: &str) -> Decimal {
    let digest = normalize_address(address)
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    Decimal::from(digest % 30 + 5)
}

fn assess_simulated(address: &str, amount: Option<Money>) -> ProviderAssessment {
    if is_sanctioned_address(address) {
        return ProviderAssessment {
            score: dec!(98),
            is_sanctioned: true,
            categories: vec!["sanctions".to_string()],
        };
    }
    if has_darknet_marker(address) {
        return ProviderAssessment {
            score: dec!(85),
            is_sanctioned: false,
            categories: vec!["darknet-market".to_string()],
        };
    }
    if is_mixer_address(address) {
        return ProviderAssessment {
            score: dec!(75),
            is_sanctioned: false,
            categories: vec!["mixer".to_string()],
        };
    }

    let mut score = baseline_exposure(address);
    let mut categories = Vec::new();
    if let Some(amount) = amount {
        if amount > dec!(50_000) {
            score += dec!(10);
            categories.push("high-value-transfer".to_string());
        }
    }
    ProviderAssessment {
        score,
        is_sanctioned: false,
        categories,
    }
}

// ---------------------------------------------------------------------------
// Provider implementations
// ---------------------------------------------------------------------------

/// Chainalysis address screening client. The HTTP integration lives in the
/// host; this client reproduces the provider's verdict contract against the
/// embedded intelligence tables.
pub struct ChainalysisProvider {
    api_key: Option<String>,
    timeout_ms: u64,
}

impl ChainalysisProvider {
    pub fn new(api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            api_key,
            timeout_ms,
        }
    }
}

impl AmlProvider for ChainalysisProvider {
    fn name(&self) -> &'static str {
        "chainalysis"
    }

    fn check_address(
        &self,
        address: &str,
        amount: Option<Money>,
    ) -> Result<ProviderAssessment, ProviderError> {
        if self.api_key.is_none() {
            return Err(ProviderError::MissingCredentials);
        }
        if self.timeout_ms == 0 {
            return Err(ProviderError::Timeout { timeout_ms: 0 });
        }
        Ok(assess_simulated(address, amount))
    }
}

/// Elliptic address screening client. Same contract as Chainalysis with the
/// provider's own category taxonomy.
pub struct EllipticProvider {
    api_key: Option<String>,
    timeout_ms: u64,
}

impl EllipticProvider {
    pub fn new(api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            api_key,
            timeout_ms,
        }
    }
}

impl AmlProvider for EllipticProvider {
    fn name(&self) -> &'static str {
        "elliptic"
    }

    fn check_address(
        &self,
        address: &str,
        amount: Option<Money>,
    ) -> Result<ProviderAssessment, ProviderError> {
        if self.api_key.is_none() {
            return Err(ProviderError::MissingCredentials);
        }
        if self.timeout_ms == 0 {
            return Err(ProviderError::Timeout { timeout_ms: 0 });
        }
        let mut assessment = assess_simulated(address, amount);
        // Elliptic reports exposure categories under its own naming
        for category in &mut assessment.categories {
            if category == "mixer" {
                *category = "obfuscation-service".to_string();
            }
        }
        Ok(assessment)
    }
}

/// Deterministic fallback provider. Always answers; still screens against
/// the embedded sanctions table, otherwise reports a conservative baseline.
pub struct MockProvider;

impl AmlProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn check_address(
        &self,
        address: &str,
        _amount: Option<Money>,
    ) -> Result<ProviderAssessment, ProviderError> {
        if is_sanctioned_address(address) {
            return Ok(ProviderAssessment {
                score: dec!(98),
                is_sanctioned: true,
                categories: vec!["sanctions".to_string()],
            });
        }
        Ok(ProviderAssessment {
            score: dec!(20),
            is_sanctioned: false,
            categories: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Screener
// ---------------------------------------------------------------------------

/// Counterparty screener: whitelist short-circuit, provider dispatch with
/// mock degradation, threshold bucketing.
pub struct AmlScreener {
    provider: Box<dyn AmlProvider>,
    fallback: MockProvider,
    whitelist: Vec<Regex>,
    thresholds: AmlThresholds,
}

impl AmlScreener {
    pub fn from_config(config: &AmlConfig) -> ComplianceResult<Self> {
        let provider: Box<dyn AmlProvider> = match config.provider {
            AmlProviderKind::Chainalysis => Box::new(ChainalysisProvider::new(
                config.api_key.clone(),
                config.provider_timeout_ms,
            )),
            AmlProviderKind::Elliptic => Box::new(EllipticProvider::new(
                config.api_key.clone(),
                config.provider_timeout_ms,
            )),
            AmlProviderKind::Mock => Box::new(MockProvider),
        };
        Self::new(provider, &config.whitelist_patterns, config.thresholds)
    }

    pub fn new(
        provider: Box<dyn AmlProvider>,
        whitelist_patterns: &[String],
        thresholds: AmlThresholds,
    ) -> ComplianceResult<Self> {
        let whitelist = whitelist_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ComplianceError::ConfigurationError(format!(
                        "invalid whitelist pattern '{}': {}",
                        p, e
                    ))
                })
            })
            .collect::<ComplianceResult<Vec<_>>>()?;
        Ok(Self {
            provider,
            fallback: MockProvider,
            whitelist,
            thresholds,
        })
    }

    /// Screen a counterparty address. Never fails on provider trouble: the
    /// verdict degrades to the mock provider and the degradation stays
    /// visible in `provider`.
    pub fn screen(&self, address: &str, amount: Option<Money>) -> AmlCheckResult {
        let trimmed = address.trim();
        if self.whitelist.iter().any(|re| re.is_match(trimmed)) {
            tracing::debug!(address = trimmed, "address matched exchange whitelist");
            return AmlCheckResult {
                risk_score: Decimal::ZERO,
                risk_level: RiskLevel::Low,
                is_sanctioned: false,
                risk_categories: Vec::new(),
                provider: "whitelist".to_string(),
            };
        }

        match self.provider.check_address(trimmed, amount) {
            Ok(assessment) => self.bucket(assessment, self.provider.name()),
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "AML provider degraded, using mock fallback"
                );
                match self.fallback.check_address(trimmed, amount) {
                    Ok(assessment) => self.bucket(assessment, self.fallback.name()),
                    // MockProvider::check_address never errors
                    Err(_) => AmlCheckResult {
                        risk_score: dec!(20),
                        risk_level: RiskLevel::Low,
                        is_sanctioned: false,
                        risk_categories: Vec::new(),
                        provider: self.fallback.name().to_string(),
                    },
                }
            }
        }
    }

    fn bucket(&self, assessment: ProviderAssessment, provider: &str) -> AmlCheckResult {
        let risk_level = if assessment.score >= self.thresholds.high {
            RiskLevel::High
        } else if assessment.score >= self.thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        AmlCheckResult {
            risk_score: assessment.score,
            risk_level,
            is_sanctioned: assessment.is_sanctioned,
            risk_categories: assessment.categories,
            provider: provider.to_string(),
        }
    }
}
