use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Missing data ────────────────────────────────────────────────
    #[error("No forex rate available for {currency}")]
    MissingForexRate { currency: String },

    #[error("Price not available for {symbol} in {currency}")]
    PriceNotAvailable { symbol: String, currency: String },

    // ── Not found ───────────────────────────────────────────────────
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Asset not found: {0}")]
    AssetNotFound(Uuid),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Recurring transaction not found: {0}")]
    RecurringTransactionNotFound(Uuid),

    // ── User input ──────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Insufficient balance in {asset}: available {available}, requested {requested}")]
    InsufficientBalance {
        asset: String,
        available: f64,
        requested: f64,
    },

    // ── Numerical / schedule ────────────────────────────────────────
    #[error("Solver did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Schedule of {asset} still due after {iterations} iterations")]
    ScheduleLimitExceeded { asset: String, iterations: usize },

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No provider available for: {0}")]
    NoProvider(String),

    // ── Storage / serialization ─────────────────────────────────────
    #[error("Invalid snapshot format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// True for errors that signal a dangling reference between stored entities.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::AccountNotFound(_)
                | CoreError::AssetNotFound(_)
                | CoreError::TransactionNotFound(_)
                | CoreError::RecurringTransactionNotFound(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors often carry the full URL, query string included.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
