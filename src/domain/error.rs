//! Domain error types.

use rust_decimal::Decimal;

/// Top-level error type for daytrader.
#[derive(Debug, thiserror::Error)]
pub enum DaytraderError {
    #[error("decision signal unavailable for {symbol}: {reason}")]
    DecisionUnavailable { symbol: String, reason: String },

    #[error("execution venue unavailable for {symbol}: {reason}")]
    ExecutionUnavailable { symbol: String, reason: String },

    #[error("order rejected for {symbol}: {reason}")]
    ExecutionRejected { symbol: String, reason: String },

    #[error("invariant violation on service {service_id}: {reason}")]
    InvariantViolation { service_id: i64, reason: String },

    #[error("service {service_id} already has a running engine")]
    ConcurrentStartRejected { service_id: i64 },

    #[error("no service with id {service_id}")]
    ServiceNotFound { service_id: i64 },

    #[error("no transaction with id {transaction_id}")]
    TransactionNotFound { transaction_id: i64 },

    #[error("service {service_id} already has an open transaction")]
    OpenTransactionExists { service_id: i64 },

    #[error("transaction {transaction_id} is not open")]
    TransactionNotOpen { transaction_id: i64 },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("invalid service: {reason}")]
    InvalidService { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DaytraderError {
    /// Transient failures the engine retries against its budget. Everything
    /// else is terminal for the current cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DaytraderError::DecisionUnavailable { .. }
                | DaytraderError::ExecutionUnavailable { .. }
                | DaytraderError::ExecutionRejected { .. }
        )
    }
}

impl From<&DaytraderError> for std::process::ExitCode {
    fn from(err: &DaytraderError) -> Self {
        let code: u8 = match err {
            DaytraderError::Io(_) => 1,
            DaytraderError::ConfigParse { .. }
            | DaytraderError::ConfigMissing { .. }
            | DaytraderError::ConfigInvalid { .. } => 2,
            DaytraderError::Database { .. } | DaytraderError::DatabaseQuery { .. } => 3,
            DaytraderError::ServiceNotFound { .. }
            | DaytraderError::TransactionNotFound { .. }
            | DaytraderError::InvalidService { .. } => 4,
            DaytraderError::OpenTransactionExists { .. }
            | DaytraderError::TransactionNotOpen { .. }
            | DaytraderError::InsufficientFunds { .. }
            | DaytraderError::InvariantViolation { .. }
            | DaytraderError::ConcurrentStartRejected { .. } => 5,
            DaytraderError::DecisionUnavailable { .. }
            | DaytraderError::ExecutionUnavailable { .. }
            | DaytraderError::ExecutionRejected { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
