pub mod aml;
pub mod gate;
pub mod risk;
pub mod verification;

use std::str::FromStr;

use railguard_core::types::{Money, TransactionKind, VerificationType};
use rust_decimal::Decimal;

/// Parse a monetary amount argument.
pub fn parse_amount(raw: &str) -> Result<Money, Box<dyn std::error::Error>> {
    Decimal::from_str(raw)
        .map_err(|e| format!("Invalid amount '{}': {}", raw, e).into())
}

/// Parse a transaction kind argument; accepts both SCREAMING_SNAKE_CASE and
/// kebab-case spellings.
pub fn parse_kind(raw: &str) -> Result<TransactionKind, Box<dyn std::error::Error>> {
    match raw.to_uppercase().replace('-', "_").as_str() {
        "FIAT_TO_CRYPTO" => Ok(TransactionKind::FiatToCrypto),
        "CRYPTO_TO_FIAT" => Ok(TransactionKind::CryptoToFiat),
        "CRYPTO_WITHDRAWAL" => Ok(TransactionKind::CryptoWithdrawal),
        _ => Err(format!(
            "Invalid transaction kind '{}': expected FIAT_TO_CRYPTO, CRYPTO_TO_FIAT, or CRYPTO_WITHDRAWAL",
            raw
        )
        .into()),
    }
}

/// Parse a verification type argument.
pub fn parse_verification_type(
    raw: &str,
) -> Result<VerificationType, Box<dyn std::error::Error>> {
    match raw.to_uppercase().as_str() {
        "LIGHT" => Ok(VerificationType::Light),
        "STANDARD" => Ok(VerificationType::Standard),
        _ => Err(format!(
            "Invalid verification type '{}': expected LIGHT or STANDARD",
            raw
        )
        .into()),
    }
}
