//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] seafill_executor::KeyError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] seafill_ledger::LedgerError),

    #[error("Trade failed: {0}")]
    Engine(#[from] seafill_executor::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] seafill_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
