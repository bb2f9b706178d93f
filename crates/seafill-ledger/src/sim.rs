//! Deterministic in-memory ledger.
//!
//! Simulates the exchange, conduit controller, wrapped native token,
//! multi-asset contract and storefront adapter closely enough to drive every
//! engine flow without a node. Each accepted transaction is mined into its own
//! block immediately. A reverted transaction keeps its nonce and gas charge
//! but none of its state changes.
//!
//! Transfer rules enforced by the simulated exchange:
//! - fungible items need an allowance from the owner to the exchange
//! - multi-asset items need the conduit channel open for the owner
//! - multi-asset items addressed to the storefront additionally need the
//!   storefront registered as a shared proxy on the asset contract

use std::collections::{HashMap, HashSet};

use alloy::primitives::{keccak256, Address, Bytes, PrimitiveSignature, B256, U256};
use alloy::sol_types::{Eip712Domain, Revert, SolCall, SolError, SolEvent, SolInterface, SolStruct};
use parking_lot::Mutex;
use seafill_core::ItemType;
use tracing::debug;

use crate::abi::{
    exchange_domain, IAssetContractShared, IConduitController, ISeaport, IWrappedNative,
    OrderComponents, ReceivedItem, SpentItem,
};
use crate::client::{BoxFuture, CallRequest, LedgerClient, LogEntry, TransactionRequest, TxReceipt};
use crate::error::{LedgerError, LedgerResult};
use crate::revert::RevertReason;

/// Addresses and chain parameters of the simulated deployment.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub chain_id: u64,
    pub gas_price: U256,
    /// Gas charged for every mined transaction.
    pub gas_per_tx: u64,
    pub genesis_timestamp: u64,
    pub exchange: Address,
    pub exchange_version: String,
    pub conduit_controller: Address,
    /// Only this account may update channels.
    pub controller_owner: Address,
    pub conduit: Address,
    pub conduit_key: B256,
    pub fungible: Address,
    pub asset_contract: Address,
    /// Only this account may register shared proxies.
    pub asset_admin: Address,
    pub storefront: Address,
    /// Reject reverting transactions at submission, like a node that
    /// estimates gas, instead of mining them as failed.
    pub reject_reverting: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            gas_price: U256::from(1_000_000_000u64),
            gas_per_tx: 60_000,
            genesis_timestamp: 1_700_000_000,
            exchange: Address::repeat_byte(0xe0),
            exchange_version: "1.1".to_string(),
            conduit_controller: Address::repeat_byte(0xc0),
            controller_owner: Address::repeat_byte(0xa0),
            conduit: Address::repeat_byte(0xc1),
            conduit_key: B256::repeat_byte(0xc1),
            fungible: Address::repeat_byte(0xf0),
            asset_contract: Address::repeat_byte(0xa5),
            asset_admin: Address::repeat_byte(0xa0),
            storefront: Address::repeat_byte(0x5f),
            reject_reverting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SimOrder {
    cancelled: bool,
    filled: bool,
}

#[derive(Debug, Clone, Default)]
struct SimState {
    block_number: u64,
    timestamp: u64,
    native: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    fungible: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    multi: HashMap<(Address, U256), U256>,
    creators: HashMap<U256, Address>,
    shared_proxies: HashSet<Address>,
    channels: HashSet<(Address, Address)>,
    counters: HashMap<Address, U256>,
    orders: HashMap<B256, SimOrder>,
}

impl SimState {
    fn nonce(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or_default()
    }

    fn native_of(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    fn fungible_of(&self, account: Address) -> U256 {
        self.fungible.get(&account).copied().unwrap_or_default()
    }

    fn multi_of(&self, account: Address, id: U256) -> U256 {
        self.multi.get(&(account, id)).copied().unwrap_or_default()
    }

    fn counter(&self, offerer: Address) -> U256 {
        self.counters.get(&offerer).copied().unwrap_or_default()
    }

    fn move_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), RevertReason> {
        let balance = self.native_of(from);
        if balance < amount {
            return Err(revert("native transfer exceeds balance"));
        }
        self.native.insert(from, balance - amount);
        *self.native.entry(to).or_default() += amount;
        Ok(())
    }
}

/// Everything a contract sees about the current call.
struct Frame<'a> {
    from: Address,
    to: Address,
    data: &'a [u8],
    value: U256,
}

#[derive(Default)]
struct Output {
    data: Vec<u8>,
    logs: Vec<LogEntry>,
}

impl Output {
    fn data(data: Vec<u8>) -> Self {
        Self {
            data,
            logs: Vec::new(),
        }
    }
}

type Exec = Result<Output, RevertReason>;

fn revert(message: &str) -> RevertReason {
    RevertReason::decode(Revert::from(message).abi_encode())
}

fn custom<E: SolError>(error: E) -> RevertReason {
    RevertReason::decode(error.abi_encode())
}

fn bad_calldata(contract: &str) -> RevertReason {
    revert(&format!("{contract}: unrecognised calldata"))
}

/// Recover the signer of a 65-byte `r || s || v` signature over `digest`.
fn recover_signer(signature: &[u8], digest: B256) -> Option<Address> {
    if signature.len() != 65 {
        return None;
    }
    let r = U256::from_be_slice(&signature[..32]);
    let s = U256::from_be_slice(&signature[32..64]);
    let parity = match signature[64] {
        0 | 27 => false,
        1 | 28 => true,
        _ => return None,
    };
    PrimitiveSignature::new(r, s, parity)
        .recover_address_from_prehash(&digest)
        .ok()
}

/// Amount of a possibly decaying item at `now`, rounded down.
fn current_amount(start: U256, end: U256, start_time: U256, end_time: U256, now: U256) -> U256 {
    if start == end || end_time <= start_time {
        return start;
    }
    let duration = end_time - start_time;
    let elapsed = now.saturating_sub(start_time).min(duration);
    (start * (duration - elapsed) + end * elapsed) / duration
}

struct Chain {
    state: SimState,
    receipts: HashMap<B256, TxReceipt>,
    reverts: HashMap<B256, RevertReason>,
    sent: Vec<(Address, B256)>,
    hold_receipts: bool,
    next_send_error: Option<LedgerError>,
}

/// In-memory ledger implementing [`LedgerClient`].
pub struct SimLedger {
    config: SimConfig,
    domain: Eip712Domain,
    chain: Mutex<Chain>,
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimLedger {
    pub fn new(config: SimConfig) -> Self {
        let domain = exchange_domain(&config.exchange_version, config.chain_id, config.exchange);
        let state = SimState {
            timestamp: config.genesis_timestamp,
            ..SimState::default()
        };
        Self {
            config,
            domain,
            chain: Mutex::new(Chain {
                state,
                receipts: HashMap::new(),
                reverts: HashMap::new(),
                sent: Vec::new(),
                hold_receipts: false,
                next_send_error: None,
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ---- setup ----

    pub fn fund_native(&self, account: Address, amount: U256) {
        *self.chain.lock().state.native.entry(account).or_default() += amount;
    }

    pub fn set_fungible_balance(&self, account: Address, amount: U256) {
        self.chain.lock().state.fungible.insert(account, amount);
    }

    /// Mint `amount` of multi-asset `id` to `to`, recording `creator`.
    pub fn mint_multi(&self, creator: Address, to: Address, id: U256, amount: U256) {
        let mut chain = self.chain.lock();
        chain.state.creators.entry(id).or_insert(creator);
        *chain.state.multi.entry((to, id)).or_default() += amount;
    }

    pub fn set_channel(&self, conduit: Address, account: Address, open: bool) {
        let mut chain = self.chain.lock();
        if open {
            chain.state.channels.insert((conduit, account));
        } else {
            chain.state.channels.remove(&(conduit, account));
        }
    }

    pub fn cancel_order(&self, order_hash: B256) {
        self.chain
            .lock()
            .state
            .orders
            .entry(order_hash)
            .or_default()
            .cancelled = true;
    }

    pub fn set_timestamp(&self, timestamp: u64) {
        self.chain.lock().state.timestamp = timestamp;
    }

    pub fn advance_time(&self, seconds: u64) {
        self.chain.lock().state.timestamp += seconds;
    }

    /// While set, transactions are mined but their receipts are not served.
    pub fn hold_receipts(&self, hold: bool) {
        self.chain.lock().hold_receipts = hold;
    }

    /// Fail the next `send_transaction` with `error` without mining it.
    pub fn fail_next_send(&self, error: LedgerError) {
        self.chain.lock().next_send_error = Some(error);
    }

    // ---- inspection ----

    pub fn native_balance_of(&self, account: Address) -> U256 {
        self.chain.lock().state.native_of(account)
    }

    pub fn fungible_balance_of(&self, account: Address) -> U256 {
        self.chain.lock().state.fungible_of(account)
    }

    pub fn multi_balance_of(&self, account: Address, id: U256) -> U256 {
        self.chain.lock().state.multi_of(account, id)
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> U256 {
        self.chain
            .lock()
            .state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn channel_open(&self, conduit: Address, account: Address) -> bool {
        self.chain.lock().state.channels.contains(&(conduit, account))
    }

    pub fn is_shared_proxy(&self, proxy: Address) -> bool {
        self.chain.lock().state.shared_proxies.contains(&proxy)
    }

    pub fn order_filled(&self, order_hash: B256) -> bool {
        self.chain
            .lock()
            .state
            .orders
            .get(&order_hash)
            .is_some_and(|o| o.filled)
    }

    /// Hashes of accepted transactions sent by `account`, in order.
    pub fn transactions_from(&self, account: Address) -> Vec<B256> {
        self.chain
            .lock()
            .sent
            .iter()
            .filter(|(from, _)| *from == account)
            .map(|(_, hash)| *hash)
            .collect()
    }

    // ---- execution ----

    fn call_sync(&self, call: &CallRequest) -> LedgerResult<Bytes> {
        let mut state = self.chain.lock().state.clone();
        *state.native.entry(call.to).or_default() += call.value;
        let frame = Frame {
            from: call.from.unwrap_or(Address::ZERO),
            to: call.to,
            data: &call.data,
            value: call.value,
        };
        self.execute(&mut state, &frame)
            .map(|out| Bytes::from(out.data))
            .map_err(LedgerError::Reverted)
    }

    fn send_sync(&self, tx: &TransactionRequest) -> LedgerResult<B256> {
        let mut chain = self.chain.lock();
        if let Some(error) = chain.next_send_error.take() {
            return Err(error);
        }

        let expected = chain.state.nonce(tx.from);
        let nonce = tx.nonce.unwrap_or(expected);
        if nonce < expected {
            return Err(LedgerError::NonceTooLow(format!(
                "nonce too low: next nonce {expected}, tx nonce {nonce}"
            )));
        }
        if nonce > expected {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: format!("nonce too high: next nonce {expected}, tx nonce {nonce}"),
            });
        }

        let gas_price = tx.gas_price.unwrap_or(self.config.gas_price);
        let fee = U256::from(self.config.gas_per_tx) * gas_price;
        if chain.state.native_of(tx.from) < fee + tx.value {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }

        let hash = keccak256(
            [
                tx.from.as_slice(),
                &nonce.to_be_bytes()[..],
                &self.config.chain_id.to_be_bytes()[..],
                &tx.data[..],
            ]
            .concat(),
        );

        // Fee and nonce apply whatever the outcome.
        let mut base = chain.state.clone();
        base.native.insert(tx.from, base.native_of(tx.from) - fee);
        base.nonces.insert(tx.from, nonce + 1);
        base.block_number += 1;

        let mut working = base.clone();
        let frame = Frame {
            from: tx.from,
            to: tx.to,
            data: &tx.data,
            value: tx.value,
        };
        let outcome = working
            .move_native(tx.from, tx.to, tx.value)
            .and_then(|()| self.execute(&mut working, &frame));

        let (state, status, logs) = match outcome {
            Ok(out) => (working, true, out.logs),
            Err(reason) => {
                if self.config.reject_reverting {
                    return Err(LedgerError::Reverted(reason));
                }
                debug!(%hash, reason = %reason, "Simulated transaction reverted");
                chain.reverts.insert(hash, reason);
                (base, false, Vec::new())
            }
        };

        let receipt = TxReceipt {
            transaction_hash: hash,
            block_number: state.block_number,
            status,
            gas_used: self.config.gas_per_tx,
            effective_gas_price: gas_price,
            logs,
        };
        chain.state = state;
        chain.receipts.insert(hash, receipt);
        chain.sent.push((tx.from, hash));
        Ok(hash)
    }

    fn execute(&self, state: &mut SimState, frame: &Frame<'_>) -> Exec {
        let to = frame.to;
        if to == self.config.exchange {
            self.exchange(state, frame)
        } else if to == self.config.conduit_controller {
            self.controller(state, frame)
        } else if to == self.config.fungible {
            self.fungible(state, frame)
        } else if to == self.config.asset_contract {
            self.asset_contract(state, frame)
        } else if frame.data.is_empty() {
            Ok(Output::default())
        } else {
            Err(revert("call to non-contract address"))
        }
    }

    fn controller(&self, state: &mut SimState, frame: &Frame<'_>) -> Exec {
        use IConduitController::IConduitControllerCalls as Calls;

        match Calls::abi_decode(frame.data, true).map_err(|_| bad_calldata("controller"))? {
            Calls::getChannelStatus(call) => {
                let open = state.channels.contains(&(call.conduit, call.channel));
                Ok(Output::data(
                    IConduitController::getChannelStatusCall::abi_encode_returns(&(open,)),
                ))
            }
            Calls::updateChannel(call) => {
                if frame.from != self.config.controller_owner {
                    return Err(custom(IConduitController::CallerIsNotOwner {
                        conduit: call.conduit,
                    }));
                }
                if call.isOpen {
                    state.channels.insert((call.conduit, call.channel));
                } else {
                    state.channels.remove(&(call.conduit, call.channel));
                }
                Ok(Output::default())
            }
        }
    }

    fn fungible(&self, state: &mut SimState, frame: &Frame<'_>) -> Exec {
        use IWrappedNative::IWrappedNativeCalls as Calls;

        match Calls::abi_decode(frame.data, true).map_err(|_| bad_calldata("fungible"))? {
            Calls::balanceOf(call) => Ok(Output::data(IWrappedNative::balanceOfCall::abi_encode_returns(
                &(state.fungible_of(call.account),),
            ))),
            Calls::allowance(call) => {
                let remaining = state
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(Output::data(IWrappedNative::allowanceCall::abi_encode_returns(&(remaining,))))
            }
            Calls::deposit(_) => {
                // The attached value already sits on the token contract.
                *state.fungible.entry(frame.from).or_default() += frame.value;
                Ok(Output::default())
            }
            Calls::approve(call) => {
                state
                    .allowances
                    .insert((frame.from, call.spender), call.amount);
                Ok(Output::data(IWrappedNative::approveCall::abi_encode_returns(&(true,))))
            }
        }
    }

    fn asset_contract(&self, state: &mut SimState, frame: &Frame<'_>) -> Exec {
        use IAssetContractShared::IAssetContractSharedCalls as Calls;

        match Calls::abi_decode(frame.data, true).map_err(|_| bad_calldata("asset contract"))? {
            Calls::balanceOf(call) => Ok(Output::data(
                IAssetContractShared::balanceOfCall::abi_encode_returns(&(
                    state.multi_of(call.account, call.id),
                )),
            )),
            Calls::creator(call) => {
                let owner = state.creators.get(&call.id).copied().unwrap_or_default();
                Ok(Output::data(IAssetContractShared::creatorCall::abi_encode_returns(&(owner,))))
            }
            Calls::sharedProxyAddresses(call) => {
                let registered = state.shared_proxies.contains(&call.proxy);
                Ok(Output::data(
                    IAssetContractShared::sharedProxyAddressesCall::abi_encode_returns(&(registered,)),
                ))
            }
            Calls::addSharedProxyAddress(call) => {
                if frame.from != self.config.asset_admin {
                    return Err(revert("AssetContractShared: caller is not the admin"));
                }
                state.shared_proxies.insert(call.proxy);
                Ok(Output::default())
            }
        }
    }

    fn exchange(&self, state: &mut SimState, frame: &Frame<'_>) -> Exec {
        use ISeaport::ISeaportCalls as Calls;

        match Calls::abi_decode(frame.data, true).map_err(|_| bad_calldata("exchange"))? {
            Calls::getCounter(call) => Ok(Output::data(ISeaport::getCounterCall::abi_encode_returns(
                &(state.counter(call.offerer),),
            ))),
            Calls::getOrderHash(call) => Ok(Output::data(
                ISeaport::getOrderHashCall::abi_encode_returns(&(call.order.eip712_hash_struct(),)),
            )),
            Calls::getOrderStatus(call) => {
                let order = state.orders.get(&call.orderHash).copied().unwrap_or_default();
                let (filled, size) = if order.filled {
                    (U256::from(1u8), U256::from(1u8))
                } else {
                    (U256::ZERO, U256::ZERO)
                };
                Ok(Output::data(ISeaport::getOrderStatusCall::abi_encode_returns(&(
                    order.filled,
                    order.cancelled,
                    filled,
                    size,
                ))))
            }
            Calls::fulfillOrder(call) => self.fulfill_order(state, frame, call),
        }
    }

    fn fulfill_order(
        &self,
        state: &mut SimState,
        frame: &Frame<'_>,
        call: ISeaport::fulfillOrderCall,
    ) -> Exec {
        let params = &call.order.parameters;
        let now = U256::from(state.timestamp);
        if now < params.startTime || now >= params.endTime {
            return Err(custom(ISeaport::InvalidTime {
                startTime: params.startTime,
                endTime: params.endTime,
            }));
        }

        let components = OrderComponents::from_parameters(params, state.counter(params.offerer));
        let order_hash = components.eip712_hash_struct();
        let status = state.orders.get(&order_hash).copied().unwrap_or_default();
        if status.cancelled {
            return Err(custom(ISeaport::OrderIsCancelled { orderHash: order_hash }));
        }
        if status.filled {
            return Err(custom(ISeaport::OrderAlreadyFilled { orderHash: order_hash }));
        }

        if frame.from != params.offerer {
            let digest = components.eip712_signing_hash(&self.domain);
            if recover_signer(&call.order.signature, digest) != Some(params.offerer) {
                return Err(custom(ISeaport::InvalidSigner {}));
            }
        }

        if params.totalOriginalConsiderationItems < U256::from(params.consideration.len()) {
            return Err(custom(ISeaport::MissingOriginalConsiderationItems {}));
        }

        for key in [params.conduitKey, call.fulfillerConduitKey] {
            if !key.is_zero() && key != self.config.conduit_key {
                return Err(custom(ISeaport::InvalidConduit {
                    conduitKey: key,
                    conduit: Address::ZERO,
                }));
            }
        }

        let amount_at = |start: U256, end: U256| {
            current_amount(start, end, params.startTime, params.endTime, now)
        };

        let required = params
            .consideration
            .iter()
            .filter(|item| item.itemType == ItemType::Native.as_u8())
            .fold(U256::ZERO, |acc, item| acc + amount_at(item.startAmount, item.endAmount));
        if frame.value < required {
            return Err(custom(ISeaport::InsufficientNativeTokensSupplied {}));
        }

        let fulfiller = frame.from;
        let mut spent = Vec::with_capacity(params.offer.len());
        for item in &params.offer {
            if item.itemType == ItemType::Native.as_u8() {
                return Err(revert("native offer items are not supported"));
            }
            let amount = amount_at(item.startAmount, item.endAmount);
            self.transfer_item(
                state,
                item.itemType,
                item.token,
                item.identifierOrCriteria,
                amount,
                params.offerer,
                fulfiller,
            )?;
            spent.push(SpentItem {
                itemType: item.itemType,
                token: item.token,
                identifier: item.identifierOrCriteria,
                amount,
            });
        }

        let mut received = Vec::with_capacity(params.consideration.len());
        for item in &params.consideration {
            let amount = amount_at(item.startAmount, item.endAmount);
            self.transfer_item(
                state,
                item.itemType,
                item.token,
                item.identifierOrCriteria,
                amount,
                fulfiller,
                item.recipient,
            )?;
            received.push(ReceivedItem {
                itemType: item.itemType,
                token: item.token,
                identifier: item.identifierOrCriteria,
                amount,
                recipient: item.recipient,
            });
        }

        // Unused native value goes back to the fulfiller.
        let refund = frame.value - required;
        if !refund.is_zero() {
            state.move_native(self.config.exchange, fulfiller, refund)?;
        }

        state.orders.entry(order_hash).or_default().filled = true;

        let event = ISeaport::OrderFulfilled {
            orderHash: order_hash,
            offerer: params.offerer,
            zone: params.zone,
            recipient: fulfiller,
            offer: spent,
            consideration: received,
        };
        let log_data = event.encode_log_data();
        Ok(Output {
            data: ISeaport::fulfillOrderCall::abi_encode_returns(&(true,)),
            logs: vec![LogEntry {
                address: self.config.exchange,
                topics: log_data.topics().to_vec(),
                data: log_data.data,
            }],
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn transfer_item(
        &self,
        state: &mut SimState,
        item_type: u8,
        token: Address,
        id: U256,
        amount: U256,
        from: Address,
        to: Address,
    ) -> Result<(), RevertReason> {
        match ItemType::from_u8(item_type) {
            // Native consideration is paid out of the value attached to the call.
            Ok(ItemType::Native) => state.move_native(self.config.exchange, to, amount),
            Ok(ItemType::Erc20) => {
                if token != self.config.fungible {
                    return Err(revert("unknown fungible token"));
                }
                let allowed = state
                    .allowances
                    .get(&(from, self.config.exchange))
                    .copied()
                    .unwrap_or_default();
                if allowed < amount {
                    return Err(revert("ERC20: insufficient allowance"));
                }
                let balance = state.fungible_of(from);
                if balance < amount {
                    return Err(revert("ERC20: transfer amount exceeds balance"));
                }
                if allowed != U256::MAX {
                    state
                        .allowances
                        .insert((from, self.config.exchange), allowed - amount);
                }
                state.fungible.insert(from, balance - amount);
                *state.fungible.entry(to).or_default() += amount;
                Ok(())
            }
            Ok(ItemType::Erc1155) => {
                if token == self.config.storefront {
                    if !state.shared_proxies.contains(&self.config.storefront) {
                        return Err(revert("storefront is not a shared proxy"));
                    }
                } else if token != self.config.asset_contract {
                    return Err(revert("unknown multi-asset token"));
                }
                if !state.channels.contains(&(self.config.conduit, from)) {
                    return Err(revert("conduit channel is closed for owner"));
                }
                let balance = state.multi_of(from, id);
                if balance < amount {
                    return Err(revert("ERC1155: insufficient balance for transfer"));
                }
                state.multi.insert((from, id), balance - amount);
                *state.multi.entry((to, id)).or_default() += amount;
                Ok(())
            }
            _ => Err(revert("unsupported item type")),
        }
    }
}

impl LedgerClient for SimLedger {
    fn chain_id(&self) -> BoxFuture<'_, LedgerResult<u64>> {
        let chain_id = self.config.chain_id;
        Box::pin(async move { Ok(chain_id) })
    }

    fn block_timestamp(&self) -> BoxFuture<'_, LedgerResult<u64>> {
        Box::pin(async move { Ok(self.chain.lock().state.timestamp) })
    }

    fn gas_price(&self) -> BoxFuture<'_, LedgerResult<U256>> {
        let price = self.config.gas_price;
        Box::pin(async move { Ok(price) })
    }

    fn transaction_count(&self, account: Address) -> BoxFuture<'_, LedgerResult<u64>> {
        Box::pin(async move { Ok(self.chain.lock().state.nonce(account)) })
    }

    fn native_balance(&self, account: Address) -> BoxFuture<'_, LedgerResult<U256>> {
        Box::pin(async move { Ok(self.native_balance_of(account)) })
    }

    fn call(&self, call: CallRequest) -> BoxFuture<'_, LedgerResult<Bytes>> {
        Box::pin(async move { self.call_sync(&call) })
    }

    fn send_transaction(&self, tx: TransactionRequest) -> BoxFuture<'_, LedgerResult<B256>> {
        Box::pin(async move { self.send_sync(&tx) })
    }

    fn transaction_receipt(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<TxReceipt>>> {
        Box::pin(async move {
            let chain = self.chain.lock();
            if chain.hold_receipts {
                return Ok(None);
            }
            Ok(chain.receipts.get(&hash).cloned())
        })
    }

    fn revert_reason(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<RevertReason>>> {
        Box::pin(async move { Ok(self.chain.lock().reverts.get(&hash).cloned()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ContractCall;
    use crate::contracts::{ConduitControllerContract, FungibleTokenContract, MultiAssetContract};
    use crate::DynLedger;
    use std::sync::Arc;

    fn user() -> Address {
        Address::repeat_byte(0x11)
    }

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u8))
    }

    fn tx(from: Address, call: ContractCall) -> TransactionRequest {
        TransactionRequest::from_call(from, call)
    }

    #[tokio::test]
    async fn test_deposit_credits_fungible_and_charges_gas() {
        let sim = Arc::new(SimLedger::default());
        sim.fund_native(user(), ether(1));
        let ledger: DynLedger = sim.clone();
        let token = FungibleTokenContract::new(ledger.clone(), sim.config().fungible);

        let amount = U256::from(1_000u64);
        let hash = ledger.send_transaction(tx(user(), token.deposit(amount))).await.unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();

        assert!(receipt.status);
        assert_eq!(token.balance_of(user()).await.unwrap(), amount);
        assert_eq!(sim.native_balance_of(user()), ether(1) - amount - receipt.cost());
        assert_eq!(ledger.transaction_count(user()).await.unwrap(), 1);
    }

    #[test]
    fn test_nonce_checks() {
        let sim = SimLedger::default();
        sim.fund_native(user(), ether(1));
        let mut request = tx(user(), ContractCall::new(Address::repeat_byte(0x77), Vec::<u8>::new()));
        request.nonce = Some(0);
        sim.send_sync(&request).unwrap();

        let err = sim.send_sync(&request).unwrap_err();
        assert!(matches!(err, LedgerError::NonceTooLow(_)));

        request.nonce = Some(5);
        let err = sim.send_sync(&request).unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { .. }));
    }

    #[tokio::test]
    async fn test_update_channel_owner_only() {
        let sim = Arc::new(SimLedger::default());
        let owner = sim.config().controller_owner;
        let conduit = sim.config().conduit;
        sim.fund_native(owner, ether(1));
        sim.fund_native(user(), ether(1));
        let ledger: DynLedger = sim.clone();
        let controller = ConduitControllerContract::new(ledger.clone(), sim.config().conduit_controller);

        let hash = ledger
            .send_transaction(tx(user(), controller.update_channel(conduit, user(), true)))
            .await
            .unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.status);
        let reason = ledger.revert_reason(hash).await.unwrap().unwrap();
        assert!(reason.is("CallerIsNotOwner"));
        assert!(!controller.channel_status(conduit, user()).await.unwrap());

        ledger
            .send_transaction(tx(owner, controller.update_channel(conduit, user(), true)))
            .await
            .unwrap();
        assert!(controller.channel_status(conduit, user()).await.unwrap());
    }

    #[tokio::test]
    async fn test_reverted_transaction_keeps_nonce_and_gas_only() {
        let sim = Arc::new(SimLedger::default());
        sim.fund_native(user(), ether(1));
        let ledger: DynLedger = sim.clone();
        let assets = MultiAssetContract::new(ledger.clone(), sim.config().asset_contract);

        // Not the admin.
        let hash = ledger
            .send_transaction(tx(user(), assets.add_shared_proxy(sim.config().storefront)))
            .await
            .unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.status);
        assert!(!sim.is_shared_proxy(sim.config().storefront));
        assert_eq!(sim.native_balance_of(user()), ether(1) - receipt.cost());
        assert_eq!(ledger.transaction_count(user()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reject_reverting_does_not_mine() {
        let sim = Arc::new(SimLedger::new(SimConfig {
            reject_reverting: true,
            ..SimConfig::default()
        }));
        sim.fund_native(user(), ether(1));
        let ledger: DynLedger = sim.clone();
        let assets = MultiAssetContract::new(ledger.clone(), sim.config().asset_contract);

        let err = ledger
            .send_transaction(tx(user(), assets.add_shared_proxy(sim.config().storefront)))
            .await
            .unwrap_err();
        assert!(err.revert_reason().unwrap().is("Error"));
        assert_eq!(ledger.transaction_count(user()).await.unwrap(), 0);
        assert!(sim.transactions_from(user()).is_empty());
    }

    #[tokio::test]
    async fn test_hold_receipts() {
        let sim = SimLedger::default();
        sim.fund_native(user(), ether(1));
        sim.hold_receipts(true);
        let hash = sim
            .send_sync(&tx(user(), ContractCall::new(Address::repeat_byte(0x77), Vec::<u8>::new())))
            .unwrap();
        assert!(sim.transaction_receipt(hash).await.unwrap().is_none());
        sim.hold_receipts(false);
        assert!(sim.transaction_receipt(hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insufficient_funds_rejected() {
        let sim = SimLedger::default();
        let err = sim
            .send_sync(&tx(user(), ContractCall::new(Address::repeat_byte(0x77), Vec::<u8>::new())))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { code: -32000, .. }));
    }

    #[test]
    fn test_current_amount_decays_linearly() {
        let start_time = U256::from(100u64);
        let end_time = U256::from(200u64);
        let at = |now: u64| {
            current_amount(
                U256::from(1_000u64),
                U256::from(500u64),
                start_time,
                end_time,
                U256::from(now),
            )
        };
        assert_eq!(at(100), U256::from(1_000u64));
        assert_eq!(at(150), U256::from(750u64));
        assert_eq!(at(199), U256::from(505u64));
    }

    #[test]
    fn test_recover_signer_rejects_bad_length() {
        assert_eq!(recover_signer(&[0u8; 64], B256::ZERO), None);
    }
}
