use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Not found: {entity} '{id}'")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Concurrent update conflict for user '{user_id}' — please retry the transaction")]
    ConcurrencyConflict { user_id: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ComplianceError {
    pub fn user_not_found(id: impl Into<String>) -> Self {
        ComplianceError::NotFound {
            entity: "user",
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for ComplianceError {
    fn from(e: serde_json::Error) -> Self {
        ComplianceError::SerializationError(e.to_string())
    }
}
