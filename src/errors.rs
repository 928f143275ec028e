//! Crate-wide error types.
use std::collections::BTreeSet;
use thiserror::Error;

/// Unknown enum values (`follow_heuristic`, `fee_convention`, `boundary_type`,
/// `balance_type`) never reach here directly — `serde` rejects them during
/// deserialization, surfacing as `Ron`/`Json` below.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to parse timewindow bound {0:?} with format {1:?}")]
    TimeWindow(String, String, #[source] chrono::ParseError),

    #[error("RON deserialization error")]
    Ron(#[from] ron::de::SpannedError),

    #[error("JSON deserialization error")]
    Json(#[source] serde_json::Error),

    #[error("I/O error reading config")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid transaction `{txn_id}`: amount sent ({amt_out}) < amount received ({amt_in})")]
    AmountSentLessThanReceived {
        txn_id: String,
        amt_out: rust_decimal::Decimal,
        amt_in: rust_decimal::Decimal,
    },

    #[error("Malformed transaction row: {0}")]
    MalformedRow(String),

    #[error("Unable to parse timestamp {0:?} with format {1:?}")]
    Timestamp(String, String, #[source] chrono::ParseError),

    #[error("Unable to parse decimal amount {0:?}")]
    Decimal(String, #[source] rust_decimal::Error),
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("CSV error")]
    Csv(#[from] csv::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Non-fatal processing failure, logged to the [`crate::model::report::Report`] and not
/// propagated: the engine keeps going per the best-effort processing policy.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("balance reconciliation underflowed for account `{0}`")]
    BalanceReconciliation(String),
}

#[derive(Debug, Error)]
#[error("boundary-inconsistent accounts: {0:?}")]
pub struct BoundaryInconsistencyReport(pub BTreeSet<String>);
