//! Ledger access for seafill.
//!
//! Everything the engine knows about the outside world goes through here:
//!
//! - [`LedgerClient`]: dyn-compatible seam over a ledger node (reads, calls,
//!   transaction submission, receipts)
//! - [`RpcLedger`]: JSON-RPC 2.0 implementation over HTTP
//! - [`SimLedger`]: deterministic in-memory ledger that simulates the exchange,
//!   conduit controller and token contracts
//! - [`contracts`]: typed clients for each consumed contract interface
//! - [`abi`]: `sol!` declarations of the exchange structs, calls, events and errors
//! - [`RevertReason`]: decoding of revert payloads into protocol error names

pub mod abi;
pub mod client;
pub mod contracts;
pub mod error;
pub mod revert;
pub mod rpc;
pub mod sim;

pub use client::{
    BoxFuture, CallRequest, ContractCall, DynLedger, LedgerClient, LogEntry, TransactionRequest,
    TxReceipt,
};
pub use contracts::{
    ConduitControllerContract, ExchangeContract, FulfilledEvent, FungibleTokenContract,
    MultiAssetContract, OrderStatus, TransferLeg,
};
pub use error::{LedgerError, LedgerResult};
pub use revert::RevertReason;
pub use rpc::RpcLedger;
pub use sim::{SimConfig, SimLedger};
