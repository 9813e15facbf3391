use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use railguard_core::scenario::ScenarioState;
use railguard_core::store::UserStore;
use railguard_core::types::{Money, TransactionKind, VerificationType};
use railguard_core::MemoryComplianceEngine;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn engine_from(scenario: ScenarioState) -> NapiResult<MemoryComplianceEngine> {
    scenario.into_engine().map_err(to_napi_error)
}

fn to_json(value: impl serde::Serialize) -> NapiResult<String> {
    serde_json::to_string(&value).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Transaction path
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TransactionRequest {
    #[serde(default)]
    scenario: ScenarioState,
    user_id: String,
    amount: Money,
    kind: TransactionKind,
    #[serde(default)]
    currency: Option<String>,
}

#[napi]
pub fn evaluate_transaction(input_json: String) -> NapiResult<String> {
    let request: TransactionRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let decision = engine
        .evaluate_transaction(&request.user_id, request.amount, request.kind)
        .map_err(to_napi_error)?;
    to_json(decision)
}

#[napi]
pub fn commit_transaction(input_json: String) -> NapiResult<String> {
    let request: TransactionRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let currency = request.currency.as_deref().unwrap_or("USD");
    let event = engine
        .commit_transaction(&request.user_id, request.amount, request.kind, currency)
        .map_err(to_napi_error)?;
    let user = engine.users().get(&request.user_id);
    to_json(serde_json::json!({ "event": event, "user": user }))
}

// ---------------------------------------------------------------------------
// AML screening
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ScreenRequest {
    #[serde(default)]
    scenario: ScenarioState,
    address: String,
    #[serde(default)]
    amount: Option<Money>,
    #[serde(default)]
    attach_to: Option<String>,
}

#[napi]
pub fn screen_counterparty(input_json: String) -> NapiResult<String> {
    let request: ScreenRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let result = engine
        .screen_counterparty(&request.address, request.amount)
        .map_err(to_napi_error)?;
    if let Some(user_id) = &request.attach_to {
        engine
            .attach_aml_result(user_id, &result)
            .map_err(to_napi_error)?;
    }
    to_json(result)
}

// ---------------------------------------------------------------------------
// Risk & patterns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UserRequest {
    #[serde(default)]
    scenario: ScenarioState,
    user_id: String,
}

#[napi]
pub fn get_risk_score(input_json: String) -> NapiResult<String> {
    let request: UserRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let score = engine.risk_score(&request.user_id).map_err(to_napi_error)?;
    to_json(score)
}

#[napi]
pub fn get_unusual_patterns(input_json: String) -> NapiResult<String> {
    let request: UserRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let report = engine
        .unusual_patterns(&request.user_id)
        .map_err(to_napi_error)?;
    to_json(report)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[napi]
pub fn get_verification_recommendation(input_json: String) -> NapiResult<String> {
    let request: UserRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let recommendation = engine
        .verification_recommendation(&request.user_id)
        .map_err(to_napi_error)?;
    to_json(recommendation)
}

#[derive(Deserialize)]
struct RequestVerificationRequest {
    #[serde(default)]
    scenario: ScenarioState,
    user_id: String,
    verification_type: VerificationType,
}

#[napi]
pub fn request_verification(input_json: String) -> NapiResult<String> {
    let request: RequestVerificationRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let outcome = engine
        .request_verification(&request.user_id, request.verification_type)
        .map_err(to_napi_error)?;
    to_json(outcome)
}

#[derive(Deserialize)]
struct CompleteVerificationRequest {
    #[serde(default)]
    scenario: ScenarioState,
    user_id: String,
    #[serde(default)]
    documents: Vec<String>,
}

#[napi]
pub fn complete_verification(input_json: String) -> NapiResult<String> {
    let request: CompleteVerificationRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    let outcome = engine
        .complete_verification(&request.user_id, &request.documents)
        .map_err(to_napi_error)?;
    to_json(outcome)
}

// ---------------------------------------------------------------------------
// Scheduled resets
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ResetRequest {
    #[serde(default)]
    scenario: ScenarioState,
    period: String,
}

#[napi]
pub fn reset_counters(input_json: String) -> NapiResult<String> {
    let request: ResetRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = engine_from(request.scenario)?;
    match request.period.to_lowercase().as_str() {
        "daily" => engine.reset_daily(),
        "weekly" => engine.reset_weekly(),
        "monthly" => engine.reset_monthly(),
        other => {
            return Err(to_napi_error(format!(
                "invalid reset period '{}': expected daily, weekly, or monthly",
                other
            )))
        }
    }
    let mut users = Vec::new();
    engine.users().for_each(|user| users.push(user.clone()));
    to_json(serde_json::json!({ "users": users }))
}
