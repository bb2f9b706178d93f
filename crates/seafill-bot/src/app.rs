//! Application wiring.
//!
//! Coordinates:
//! - Ledger connection (JSON-RPC, or any injected [`DynLedger`])
//! - Credential loading into one session per account
//! - Trade pipeline and holdings report

use std::sync::Arc;

use seafill_executor::{
    AccountSession, HoldingsReport, SessionRegistry, TradeParties, TradePipeline, TradeReport,
    TradeServices,
};
use seafill_ledger::{DynLedger, LedgerClient, MultiAssetContract, RpcLedger};
use tracing::info;

use crate::config::{AccountConfig, AppConfig};
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    ledger: DynLedger,
    registry: SessionRegistry,
}

impl Application {
    /// Connect to the configured JSON-RPC node.
    pub fn connect(config: AppConfig) -> AppResult<Self> {
        let ledger: DynLedger = Arc::new(RpcLedger::new(&config.rpc_url)?);
        info!(rpc_url = %config.rpc_url, "Ledger client created");
        Self::with_ledger(config, ledger)
    }

    /// Run against an already constructed ledger client.
    pub fn with_ledger(config: AppConfig, ledger: DynLedger) -> AppResult<Self> {
        config.validate()?;
        let registry = SessionRegistry::new(ledger.clone(), config.fee.policy()?);
        Ok(Self {
            config,
            ledger,
            registry,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn chain_id(&self) -> AppResult<u64> {
        match self.config.chain_id {
            Some(chain_id) => Ok(chain_id),
            None => Ok(self.ledger.chain_id().await?),
        }
    }

    fn session(&self, role: &str, account: &AccountConfig) -> AppResult<Arc<AccountSession>> {
        let key = account.account_key()?;
        let source = match &account.key {
            Some(credential) => credential.key_source().to_string(),
            None => "node".to_string(),
        };
        info!(role, address = %key.address(), source = %source, "Account loaded");
        Ok(self.registry.register(key))
    }

    fn parties(&self) -> AppResult<TradeParties> {
        let accounts = &self.config.accounts;
        Ok(TradeParties {
            admin: self.session("admin", &accounts.admin)?,
            buyer: self.session("buyer", &accounts.buyer)?,
            seller: self.session("seller", &accounts.seller)?,
        })
    }

    /// Run the full trade flow once.
    pub async fn fulfill(&self) -> AppResult<TradeReport> {
        let chain_id = self.chain_id().await?;
        let now = self.ledger.block_timestamp().await?;
        let deployment = self.config.deployment()?;
        let parties = self.parties()?;
        let plan = self.config.trade_plan_at(now)?;

        info!(
            chain_id,
            exchange = %deployment.exchange,
            token_id = %self.config.trade.token_id,
            price = %self.config.trade.price,
            "Starting fulfillment"
        );
        let services = Arc::new(TradeServices::connect(
            self.ledger.clone(),
            &deployment,
            parties.admin.clone(),
            chain_id,
            self.config.hash_check,
            self.config.wait.options(),
        ));
        let pipeline = TradePipeline::new(services, parties, plan);
        Ok(pipeline.run().await?)
    }

    /// Multi-asset holdings of the seller and buyer.
    ///
    /// Read-only: configured addresses are used as-is, and keys are loaded
    /// only for accounts configured without one.
    pub async fn check_transfer(&self) -> AppResult<HoldingsReport> {
        let deployment = self.config.deployment()?;
        let contract = MultiAssetContract::new(self.ledger.clone(), deployment.asset_contract);
        let accounts = [
            self.config.accounts.seller.resolve_address()?,
            self.config.accounts.buyer.resolve_address()?,
        ];
        let ids = self.config.holding_ids()?;
        Ok(HoldingsReport::collect(&contract, &accounts, &ids).await?)
    }
}
