//! End-to-end trade flow: a buyer offers fungible tokens for a multi-asset
//! item held by a seller, who fulfills the order.
//!
//! Stages run in a fixed order enforced by the types: each stage takes the
//! witness produced by the previous one, and witnesses cannot be built
//! outside this module.
//!
//! ```text
//! permissions() -> Permitted
//! fund(&Permitted) -> Funded
//! build(&Funded) -> Built
//! fulfill(Built) -> TradeOutcome
//! ```

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use seafill_core::{AssetRef, ConsiderationItem, OfferItem, OrderType, TimeWindow, TradeId};
use seafill_ledger::{
    ConduitControllerContract, DynLedger, ExchangeContract, FungibleTokenContract,
    MultiAssetContract,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::balance::{AllowanceOutcome, BalanceOutcome, BalanceReconciler};
use crate::builder::{BuiltOrder, HashCheck, OrderBuilder, OrderRequest};
use crate::confirm::WaitOptions;
use crate::error::{EngineError, EngineResult, Step};
use crate::permission::{ChannelOutcome, PermissionGate, ProxyOutcome};
use crate::session::AccountSession;
use crate::submitter::{FulfillmentSubmitter, SettlementReceipt};

/// Contract addresses of one exchange deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub exchange: Address,
    /// EIP-712 domain version of the exchange.
    pub exchange_version: String,
    pub conduit_controller: Address,
    pub conduit: Address,
    pub conduit_key: B256,
    /// Wrapped native token used for payment.
    pub fungible: Address,
    pub asset_contract: Address,
    /// Storefront adapter; the multi-asset token address used in orders.
    pub storefront: Address,
}

/// Stage components wired to one deployment.
pub struct TradeServices {
    pub gate: PermissionGate,
    pub reconciler: BalanceReconciler,
    pub builder: OrderBuilder,
    pub submitter: FulfillmentSubmitter,
    pub asset_contract: MultiAssetContract,
}

impl TradeServices {
    /// Wire every component to `deployment` over `ledger`. `controller_owner`
    /// is the session allowed to open channels.
    pub fn connect(
        ledger: DynLedger,
        deployment: &Deployment,
        controller_owner: Arc<AccountSession>,
        chain_id: u64,
        hash_check: HashCheck,
        wait: WaitOptions,
    ) -> Self {
        let exchange = ExchangeContract::new(ledger.clone(), deployment.exchange);
        let controller = ConduitControllerContract::new(ledger.clone(), deployment.conduit_controller);
        let token = FungibleTokenContract::new(ledger.clone(), deployment.fungible);
        Self {
            gate: PermissionGate::new(controller, controller_owner, wait.clone()),
            reconciler: BalanceReconciler::new(token, wait.clone()),
            builder: OrderBuilder::new(
                exchange.clone(),
                &deployment.exchange_version,
                chain_id,
                hash_check,
            ),
            submitter: FulfillmentSubmitter::new(exchange, wait),
            asset_contract: MultiAssetContract::new(ledger, deployment.asset_contract),
        }
    }
}

/// Sessions of the accounts taking part in a trade.
#[derive(Clone)]
pub struct TradeParties {
    /// Registers the shared proxy on the asset contract.
    pub admin: Arc<AccountSession>,
    /// Offerer: pays with the fungible token, receives the item.
    pub buyer: Arc<AccountSession>,
    /// Fulfiller: delivers the item, receives the payment.
    pub seller: Arc<AccountSession>,
}

/// What is traded and on which terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePlan {
    pub conduit: Address,
    /// Conduit key written into the order.
    pub conduit_key: B256,
    /// Conduit key the fulfiller routes its own transfers through.
    pub fulfiller_conduit_key: B256,
    /// Registered as a shared proxy first when set.
    pub shared_proxy: Option<Address>,
    /// Item the buyer receives.
    pub asset: AssetRef,
    pub asset_amount: U256,
    /// Fungible amount the buyer pays.
    pub price: U256,
    /// Extra fungible balance kept on both sides.
    pub spare: U256,
    pub order_type: OrderType,
    pub window: TimeWindow,
}

/// Permissions in place.
#[derive(Debug, Clone, Serialize)]
pub struct Permitted {
    pub shared_proxy: Option<ProxyOutcome>,
    pub buyer_channel: ChannelOutcome,
    pub seller_channel: ChannelOutcome,
    #[serde(skip)]
    _seal: (),
}

/// Balances and allowance in place.
#[derive(Debug, Clone, Serialize)]
pub struct Funded {
    pub allowance: AllowanceOutcome,
    pub buyer_balance: BalanceOutcome,
    pub seller_balance: BalanceOutcome,
    #[serde(skip)]
    _seal: (),
}

/// Signed order, ready to fulfill once.
///
/// Not `Clone`: [`TradePipeline::fulfill`] consumes it.
///
/// ```compile_fail
/// fn duplicate(built: &seafill_executor::Built) -> seafill_executor::Built {
///     built.clone()
/// }
/// ```
#[derive(Debug)]
pub struct Built {
    pub order: BuiltOrder,
    _seal: (),
}

#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub trade_id: TradeId,
    pub order_hash: B256,
    pub value: U256,
    pub receipt: SettlementReceipt,
}

/// Every stage output of a completed run.
#[derive(Debug, Clone)]
pub struct TradeReport {
    pub permitted: Permitted,
    pub funded: Funded,
    pub outcome: TradeOutcome,
}

impl TradeReport {
    pub fn to_json(&self) -> Value {
        json!({
            "trade_id": self.outcome.trade_id.as_str(),
            "permissions": self.permitted,
            "funding": self.funded,
            "order_hash": format!("0x{}", hex::encode(self.outcome.order_hash)),
            "value": self.outcome.value.to_string(),
            "settlement": self.outcome.receipt.to_json(),
        })
    }
}

/// One trade between a buyer and a seller.
pub struct TradePipeline {
    trade_id: TradeId,
    services: Arc<TradeServices>,
    parties: TradeParties,
    plan: TradePlan,
}

impl TradePipeline {
    pub fn new(services: Arc<TradeServices>, parties: TradeParties, plan: TradePlan) -> Self {
        Self {
            trade_id: TradeId::new(),
            services,
            parties,
            plan,
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    pub fn services(&self) -> &TradeServices {
        &self.services
    }

    pub fn plan(&self) -> &TradePlan {
        &self.plan
    }

    /// Shared proxy (if planned) and conduit channels for both parties.
    pub async fn permissions(&self) -> EngineResult<Permitted> {
        let gate = &self.services.gate;
        let shared_proxy = match self.plan.shared_proxy {
            Some(proxy) => Some(
                gate.ensure_shared_proxy(&self.services.asset_contract, &self.parties.admin, proxy)
                    .await?,
            ),
            None => None,
        };
        let buyer_channel = gate
            .ensure_channel(self.plan.conduit, self.parties.buyer.address())
            .await?;
        let seller_channel = gate
            .ensure_channel(self.plan.conduit, self.parties.seller.address())
            .await?;

        info!(
            trade_id = %self.trade_id,
            shared_proxy = ?shared_proxy,
            buyer_channel = ?buyer_channel,
            seller_channel = ?seller_channel,
            "Permissions in place"
        );
        Ok(Permitted {
            shared_proxy,
            buyer_channel,
            seller_channel,
            _seal: (),
        })
    }

    /// Buyer allowance to the exchange and fungible balances on both sides.
    ///
    /// The buyer's target is `price + spare`; an overflowing sum fails with
    /// `Validation` before anything is submitted.
    pub async fn fund(&self, _permitted: &Permitted) -> EngineResult<Funded> {
        let reconciler = &self.services.reconciler;
        let buyer = &self.parties.buyer;
        let seller = &self.parties.seller;
        let buyer_target = self.plan.price.checked_add(self.plan.spare).ok_or_else(|| {
            EngineError::Validation {
                step: Step::Deposit,
                reason: format!(
                    "price {} plus spare {} overflows 256 bits",
                    self.plan.price, self.plan.spare
                ),
            }
        })?;

        let allowance = reconciler
            .ensure_allowance(buyer, self.services.builder.exchange(), self.plan.price)
            .await?;
        let buyer_balance = reconciler.ensure_balance(buyer, buyer_target).await?;
        let seller_balance = reconciler.ensure_balance(seller, self.plan.spare).await?;

        info!(
            trade_id = %self.trade_id,
            allowance = %allowance.allowance,
            buyer_balance = %buyer_balance.balance,
            buyer_deposited = %buyer_balance.deposited,
            seller_balance = %seller_balance.balance,
            seller_deposited = %seller_balance.deposited,
            "Funding in place"
        );
        Ok(Funded {
            allowance,
            buyer_balance,
            seller_balance,
            _seal: (),
        })
    }

    /// Buyer's signed offer: `price` of the fungible token for the item.
    pub async fn build(&self, _funded: &Funded) -> EngineResult<Built> {
        let buyer = &self.parties.buyer;
        let request = OrderRequest::new(
            vec![OfferItem::fixed(
                AssetRef::erc20(self.services.reconciler.token()),
                self.plan.price,
            )],
            vec![ConsiderationItem::fixed(
                self.plan.asset,
                self.plan.asset_amount,
                buyer.address(),
            )],
        )
        .with_order_type(self.plan.order_type)
        .with_window(self.plan.window)
        .with_conduit_key(self.plan.conduit_key);

        let order = self.services.builder.build(buyer, request).await?;
        info!(
            trade_id = %self.trade_id,
            order_hash = %order.order_hash,
            counter = %order.counter,
            value = %order.value,
            "Order signed"
        );
        Ok(Built { order, _seal: () })
    }

    /// Seller fulfills the order.
    pub async fn fulfill(&self, built: Built) -> EngineResult<TradeOutcome> {
        let receipt = self
            .services
            .submitter
            .fulfill(&self.parties.seller, &built.order, self.plan.fulfiller_conduit_key)
            .await?;
        info!(
            trade_id = %self.trade_id,
            tx_hash = %receipt.tx_hash,
            order_hash = %receipt.order_hash,
            gas_used = receipt.gas_used,
            "Trade settled"
        );
        Ok(TradeOutcome {
            trade_id: self.trade_id.clone(),
            order_hash: built.order.order_hash,
            value: built.order.value,
            receipt,
        })
    }

    /// All stages in order.
    pub async fn run(&self) -> EngineResult<TradeReport> {
        info!(
            trade_id = %self.trade_id,
            buyer = %self.parties.buyer.address(),
            seller = %self.parties.seller.address(),
            price = %self.plan.price,
            "Trade started"
        );
        let permitted = self.permissions().await?;
        let funded = self.fund(&permitted).await?;
        let built = self.build(&funded).await?;
        let outcome = self.fulfill(built).await?;
        Ok(TradeReport {
            permitted,
            funded,
            outcome,
        })
    }
}
