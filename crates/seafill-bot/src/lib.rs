//! seafill operator binary.
//!
//! Wires configuration, credentials and the ledger connection into the
//! trade pipeline:
//! - `fulfill`: permissions, funding, order signing and fulfillment
//! - `check-transfer`: multi-asset holdings of the trading accounts

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
