use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Verification level gating transaction kinds and limits.
/// Ordered: tiers only ever move upward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationTier {
    #[default]
    None,
    Basic,
    Standard,
}

impl VerificationTier {
    pub const ALL: [VerificationTier; 3] = [
        VerificationTier::None,
        VerificationTier::Basic,
        VerificationTier::Standard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationTier::None => "NONE",
            VerificationTier::Basic => "BASIC",
            VerificationTier::Standard => "STANDARD",
        }
    }
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of transaction kinds moving value between rails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    FiatToCrypto,
    CryptoToFiat,
    CryptoWithdrawal,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 3] = [
        TransactionKind::FiatToCrypto,
        TransactionKind::CryptoToFiat,
        TransactionKind::CryptoWithdrawal,
    ];

    /// Withdrawal-side kinds are restricted while document verification
    /// is pending.
    pub fn is_withdrawal(&self) -> bool {
        matches!(
            self,
            TransactionKind::CryptoToFiat | TransactionKind::CryptoWithdrawal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::FiatToCrypto => "FIAT_TO_CRYPTO",
            TransactionKind::CryptoToFiat => "CRYPTO_TO_FIAT",
            TransactionKind::CryptoWithdrawal => "CRYPTO_WITHDRAWAL",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    Flagged,
    Suspended,
    Restricted,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Verification flows the advisor can put a user through.
/// Light is phone-based and completes to Basic; Standard is document-based
/// and completes to Standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    Light,
    Standard,
}

impl std::fmt::Display for VerificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VerificationType::Light => "LIGHT",
            VerificationType::Standard => "STANDARD",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Usage accumulators
// ---------------------------------------------------------------------------

/// Per-kind usage counters with one field per transaction kind, so every
/// kind is accounted for at construction time rather than through dynamic
/// map indexing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindAmounts {
    pub fiat_to_crypto: Money,
    pub crypto_to_fiat: Money,
    pub crypto_withdrawal: Money,
}

impl KindAmounts {
    pub fn get(&self, kind: TransactionKind) -> Money {
        match kind {
            TransactionKind::FiatToCrypto => self.fiat_to_crypto,
            TransactionKind::CryptoToFiat => self.crypto_to_fiat,
            TransactionKind::CryptoWithdrawal => self.crypto_withdrawal,
        }
    }

    pub fn add(&mut self, kind: TransactionKind, amount: Money) {
        match kind {
            TransactionKind::FiatToCrypto => self.fiat_to_crypto += amount,
            TransactionKind::CryptoToFiat => self.crypto_to_fiat += amount,
            TransactionKind::CryptoWithdrawal => self.crypto_withdrawal += amount,
        }
    }

    pub fn reset(&mut self) {
        *self = KindAmounts::default();
    }

    pub fn total(&self) -> Money {
        self.fiat_to_crypto + self.crypto_to_fiat + self.crypto_withdrawal
    }
}

// ---------------------------------------------------------------------------
// User compliance state
// ---------------------------------------------------------------------------

/// Per-user mutable record owned jointly by the velocity gate and the risk
/// engine. Accumulators are a cached projection of the deposit-event log and
/// must stay reconstructible from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserComplianceState {
    pub user_id: String,
    #[serde(default)]
    pub tier: VerificationTier,
    #[serde(default)]
    pub daily_used: KindAmounts,
    #[serde(default)]
    pub weekly_used: KindAmounts,
    #[serde(default)]
    pub monthly_used: KindAmounts,
    #[serde(default)]
    pub daily_tx_count: u32,
    #[serde(default)]
    pub total_deposited_lifetime: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_deposit_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_deposit_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aml_risk_score: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_verification: Option<VerificationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub account_status: AccountStatus,
}

impl UserComplianceState {
    /// Fresh record for a user who just became eligible to transact.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tier: VerificationTier::None,
            daily_used: KindAmounts::default(),
            weekly_used: KindAmounts::default(),
            monthly_used: KindAmounts::default(),
            daily_tx_count: 0,
            total_deposited_lifetime: Decimal::ZERO,
            first_deposit_at: None,
            last_deposit_at: None,
            aml_risk_score: None,
            pending_verification: None,
            verification_requested_at: None,
            kyc_verified_at: None,
            account_status: AccountStatus::Active,
        }
    }
}

// ---------------------------------------------------------------------------
// Deposit events
// ---------------------------------------------------------------------------

/// Immutable append-only record per settled transaction. Only the review
/// flag may be toggled after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub id: Uuid,
    pub user_id: String,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
    pub risk_level_at_time: RiskLevel,
    #[serde(default)]
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<String>,
}

impl DepositEvent {
    pub fn new(
        user_id: impl Into<String>,
        amount: Money,
        currency: impl Into<String>,
        kind: TransactionKind,
        risk_level_at_time: RiskLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            kind,
            timestamp: Utc::now(),
            risk_level_at_time,
            flagged: false,
            flag_reason: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceAction {
    TransactionCommitted,
    LimitExceeded,
    AmlScreened,
    VerificationRequested,
    TierUpgraded,
    DepositFlagged,
    CountersReset,
}

/// Write-once audit record of a decision. Never used for decision-making,
/// only for compliance trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceLogEntry {
    pub id: Uuid,
    pub action: ComplianceAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ComplianceLogEntry {
    pub fn new(action: ComplianceAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            user_id: None,
            amount: None,
            tx_id: None,
            risk_level: None,
            reason: None,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn for_user(action: ComplianceAction, user_id: impl Into<String>) -> Self {
        let mut entry = Self::new(action);
        entry.user_id = Some(user_id.into());
        entry
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_tx(mut self, tx_id: Uuid) -> Self {
        self.tx_id = Some(tx_id);
        self
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
