//! Trade execution for seafill.
//!
//! Components, leaves first:
//!
//! - [`AccountSession`]: signing key, sequence counter and fee policy of one
//!   account; the only path for submitting its transactions
//! - [`PermissionGate`]: conduit channel and shared-proxy authorization
//! - [`BalanceReconciler`]: wrapped-native balance and allowance top-ups
//! - [`OrderBuilder`]: order assembly, hashing and signing
//! - [`FulfillmentSubmitter`]: `fulfillOrder` submission and settlement
//! - [`TradePipeline`]: the stages above in their required order

pub mod balance;
pub mod builder;
pub mod confirm;
pub mod error;
pub mod fee;
pub mod holdings;
pub mod keys;
pub mod permission;
pub mod pipeline;
pub mod sequence;
mod serde_hex;
pub mod session;
pub mod submitter;

pub use balance::{AllowanceOutcome, BalanceOutcome, BalanceReconciler};
pub use builder::{order_hash, BuiltOrder, HashCheck, OrderBuilder, OrderRequest};
pub use confirm::{Confirmation, PendingTransaction, WaitOptions};
pub use error::{EngineError, EngineResult, Step};
pub use fee::FeePolicy;
pub use holdings::{HoldingRow, HoldingsReport};
pub use keys::{AccountKey, KeyError, KeySource};
pub use permission::{ChannelOutcome, PermissionGate, ProxyOutcome};
pub use pipeline::{
    Built, Deployment, Funded, Permitted, TradeOutcome, TradeParties, TradePipeline, TradePlan,
    TradeReport, TradeServices,
};
pub use sequence::SequenceCounter;
pub use session::{AccountSession, PendingSubmissions, SessionRegistry, SubmissionRecord, TxOutcome};
pub use submitter::{FulfillmentSubmitter, SettlementReceipt};
