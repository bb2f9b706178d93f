//! Application configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use seafill_core::{parse_units, to_key, AssetRef, OrderType, TimeWindow, NATIVE_DECIMALS};
use seafill_executor::{
    AccountKey, Deployment, FeePolicy, HashCheck, KeySource, TradePlan, WaitOptions,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const GWEI_DECIMALS: u32 = 9;

/// Where an account's private key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialConfig {
    /// Hex key in an environment variable.
    Env { var: String },
    /// Hex key in a file (recommend 0600 permissions).
    File { path: PathBuf },
}

impl CredentialConfig {
    pub fn key_source(&self) -> KeySource {
        match self {
            Self::Env { var } => KeySource::EnvVar {
                var_name: var.clone(),
            },
            Self::File { path } => KeySource::File { path: path.clone() },
        }
    }
}

/// One account. Without a `key` the account is node-managed: the node signs
/// its transactions and it cannot sign orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub key: Option<CredentialConfig>,
    /// Expected address; loading fails if the key derives another one.
    /// Required when `key` is absent.
    #[serde(default)]
    pub address: Option<String>,
}

impl AccountConfig {
    pub fn expected_address(&self) -> AppResult<Option<Address>> {
        self.address
            .as_deref()
            .map(|a| parse_address("address", a))
            .transpose()
    }

    /// Signing identity: the configured key, or a node-managed account.
    pub fn account_key(&self) -> AppResult<AccountKey> {
        let expected = self.expected_address()?;
        match (&self.key, expected) {
            (Some(key), expected) => Ok(AccountKey::load(&key.key_source(), expected)?),
            (None, Some(address)) => Ok(AccountKey::node_managed(address)),
            (None, None) => Err(AppError::Config(MISSING_IDENTITY.to_string())),
        }
    }

    /// Account address, read from config when given so no key is loaded.
    pub fn resolve_address(&self) -> AppResult<Address> {
        match self.expected_address()? {
            Some(address) => Ok(address),
            None => Ok(self.account_key()?.address()),
        }
    }

    fn validate(&self, role: &str) -> AppResult<()> {
        if self.key.is_none() && self.address.is_none() {
            return Err(AppError::Config(format!("accounts.{role}: {MISSING_IDENTITY}")));
        }
        self.expected_address().map(|_| ())
    }
}

const MISSING_IDENTITY: &str = "account needs a key or an address";

/// Accounts taking part in a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Conduit controller owner and asset contract admin.
    pub admin: AccountConfig,
    /// Offerer.
    pub buyer: AccountConfig,
    /// Fulfiller.
    pub seller: AccountConfig,
}

/// Deployed contract addresses (hex strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub exchange: String,
    /// EIP-712 domain version of the exchange.
    #[serde(default = "default_exchange_version")]
    pub exchange_version: String,
    pub conduit_controller: String,
    pub conduit: String,
    pub conduit_key: String,
    /// Wrapped native token.
    pub fungible: String,
    pub asset_contract: String,
    pub storefront: String,
}

fn default_exchange_version() -> String {
    "1.1".to_string()
}

/// Trade terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Multi-asset id bought (decimal or 0x hex).
    pub token_id: String,
    #[serde(default = "default_token_amount")]
    pub amount: u64,
    /// Price in wrapped native units, e.g. "0.1".
    #[serde(default = "default_price")]
    pub price: Decimal,
    /// Extra wrapped balance kept on both sides.
    #[serde(default = "default_spare")]
    pub spare: Decimal,
    /// Numeric fulfiller conduit key.
    #[serde(default)]
    pub fulfiller_conduit_key: u64,
    /// Register the storefront as a shared proxy before trading.
    #[serde(default = "default_register_shared_proxy")]
    pub register_shared_proxy: bool,
    /// 0 = full open, 1 = partial open, 2/3 = restricted variants.
    #[serde(default = "default_order_type")]
    pub order_type: u8,
    /// Order validity in seconds from now; open-ended when absent.
    #[serde(default)]
    pub valid_for_secs: Option<u64>,
}

fn default_token_amount() -> u64 {
    1
}

fn default_price() -> Decimal {
    Decimal::new(1, 1)
}

fn default_spare() -> Decimal {
    Decimal::new(1, 1)
}

fn default_register_shared_proxy() -> bool {
    true
}

fn default_order_type() -> u8 {
    OrderType::PartialOpen.as_u8()
}

/// Fee price policy. Prices in gwei.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FeeConfig {
    #[default]
    Network,
    Fixed {
        gwei: Decimal,
    },
    Bounded {
        floor_gwei: Decimal,
        ceiling_gwei: Decimal,
    },
}

impl FeeConfig {
    pub fn policy(&self) -> AppResult<FeePolicy> {
        let gwei = |field: &str, value: Decimal| {
            parse_units(value, GWEI_DECIMALS)
                .map_err(|e| AppError::Config(format!("fee.{field}: {e}")))
        };
        match self {
            Self::Network => Ok(FeePolicy::Network),
            Self::Fixed { gwei: price } => Ok(FeePolicy::Fixed(gwei("gwei", *price)?)),
            Self::Bounded {
                floor_gwei,
                ceiling_gwei,
            } => {
                let floor = gwei("floor_gwei", *floor_gwei)?;
                let ceiling = gwei("ceiling_gwei", *ceiling_gwei)?;
                if floor > ceiling {
                    return Err(AppError::Config(
                        "fee.floor_gwei must not exceed fee.ceiling_gwei".to_string(),
                    ));
                }
                Ok(FeePolicy::Bounded { floor, ceiling })
            }
        }
    }
}

/// Confirmation waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// No timeout when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WaitConfig {
    pub fn options(&self) -> WaitOptions {
        let options =
            WaitOptions::default().with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        match self.timeout_ms {
            Some(ms) => options.with_timeout(Duration::from_millis(ms)),
            None => options,
        }
    }
}

/// Holdings report targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingsConfig {
    /// Token ids to report; the trade token id when empty.
    #[serde(default)]
    pub token_ids: Vec<String>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Read from the node when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub contracts: ContractsConfig,
    pub accounts: AccountsConfig,
    pub trade: TradeConfig,
    #[serde(default)]
    pub fee: FeeConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub hash_check: HashCheck,
    #[serde(default)]
    pub holdings: HoldingsConfig,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn parse_address(field: &str, value: &str) -> AppResult<Address> {
    Address::from_str(value.trim())
        .map_err(|e| AppError::Config(format!("{field}: invalid address {value:?}: {e}")))
}

fn parse_key(field: &str, value: &str) -> AppResult<B256> {
    B256::from_str(value.trim())
        .map_err(|e| AppError::Config(format!("{field}: invalid bytes32 {value:?}: {e}")))
}

fn parse_id(field: &str, value: &str) -> AppResult<U256> {
    U256::from_str(value.trim())
        .map_err(|e| AppError::Config(format!("{field}: invalid token id {value:?}: {e}")))
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without a node.
    pub fn validate(&self) -> AppResult<()> {
        self.deployment()?;
        self.fee.policy()?;
        self.trade_plan()?;
        self.holding_ids()?;
        let accounts = &self.accounts;
        for (role, account) in [
            ("admin", &accounts.admin),
            ("buyer", &accounts.buyer),
            ("seller", &accounts.seller),
        ] {
            account.validate(role)?;
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(AppError::Config("wait.poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn deployment(&self) -> AppResult<Deployment> {
        let c = &self.contracts;
        Ok(Deployment {
            exchange: parse_address("contracts.exchange", &c.exchange)?,
            exchange_version: c.exchange_version.clone(),
            conduit_controller: parse_address("contracts.conduit_controller", &c.conduit_controller)?,
            conduit: parse_address("contracts.conduit", &c.conduit)?,
            conduit_key: parse_key("contracts.conduit_key", &c.conduit_key)?,
            fungible: parse_address("contracts.fungible", &c.fungible)?,
            asset_contract: parse_address("contracts.asset_contract", &c.asset_contract)?,
            storefront: parse_address("contracts.storefront", &c.storefront)?,
        })
    }

    pub fn token_id(&self) -> AppResult<U256> {
        parse_id("trade.token_id", &self.trade.token_id)
    }

    /// Trade plan with the window starting at ledger time `now`.
    pub fn trade_plan_at(&self, now: u64) -> AppResult<TradePlan> {
        let deployment = self.deployment()?;
        let t = &self.trade;
        let price = parse_units(t.price, NATIVE_DECIMALS)
            .map_err(|e| AppError::Config(format!("trade.price: {e}")))?;
        let spare = parse_units(t.spare, NATIVE_DECIMALS)
            .map_err(|e| AppError::Config(format!("trade.spare: {e}")))?;
        let order_type = OrderType::from_u8(t.order_type)
            .map_err(|e| AppError::Config(format!("trade.order_type: {e}")))?;
        let window = match t.valid_for_secs {
            Some(secs) => TimeWindow::new(U256::from(now), U256::from(now.saturating_add(secs))),
            None => TimeWindow::default(),
        };
        if t.amount == 0 {
            return Err(AppError::Config("trade.amount must be positive".to_string()));
        }

        Ok(TradePlan {
            conduit: deployment.conduit,
            conduit_key: deployment.conduit_key,
            fulfiller_conduit_key: to_key(t.fulfiller_conduit_key),
            shared_proxy: t.register_shared_proxy.then_some(deployment.storefront),
            asset: AssetRef::erc1155(deployment.storefront, self.token_id()?),
            asset_amount: U256::from(t.amount),
            price,
            spare,
            order_type,
            window,
        })
    }

    pub fn trade_plan(&self) -> AppResult<TradePlan> {
        self.trade_plan_at(0)
    }

    pub fn holding_ids(&self) -> AppResult<Vec<U256>> {
        if self.holdings.token_ids.is_empty() {
            return Ok(vec![self.token_id()?]);
        }
        self.holdings
            .token_ids
            .iter()
            .map(|id| parse_id("holdings.token_ids", id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const CONFIG: &str = r#"
rpc_url = "http://localhost:8545"
chain_id = 31337
hash_check = "verify"

[contracts]
exchange = "0x00000000006c3852cbef3e08e8df289169ede581"
conduit_controller = "0x00000000f9490004c11cef243f5400493c00ad63"
conduit = "0x1e0049783f008a0085193e00003d00cd54003c71"
conduit_key = "0x0000007b02230091a7ed01230072f7006a004d60a8d4e71d599b8104250f0000"
fungible = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
asset_contract = "0x495f947276749ce646f68ac8c248420045cb7b5e"
storefront = "0xa5409ec958c83c3f309868babaca7c86dcb077c1"

[accounts.admin]
key = { source = "env", var = "SEAFILL_ADMIN_KEY" }

[accounts.buyer]
key = { source = "file", path = "/run/secrets/buyer.key" }
address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"

[accounts.seller]
key = { source = "env", var = "SEAFILL_SELLER_KEY" }

[trade]
token_id = "42"
price = "0.25"

[fee]
policy = "bounded"
floor_gwei = "1"
ceiling_gwei = "50"

[wait]
timeout_ms = 120000
"#;

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.chain_id, Some(31337));
        assert_eq!(config.hash_check, HashCheck::Verify);
        assert_eq!(config.contracts.exchange_version, "1.1");
        assert_eq!(config.trade.price, dec!(0.25));
        assert_eq!(config.trade.spare, dec!(0.1));
        assert_eq!(config.trade.amount, 1);
        assert_eq!(config.wait.poll_interval_ms, 1_000);
        assert_eq!(
            config.accounts.buyer.key.as_ref().map(CredentialConfig::key_source),
            Some(KeySource::File {
                path: PathBuf::from("/run/secrets/buyer.key")
            })
        );
        assert!(config.accounts.buyer.expected_address().unwrap().is_some());
    }

    #[test]
    fn test_trade_plan_conversion() {
        let config = AppConfig::from_toml(CONFIG).unwrap();
        let plan = config.trade_plan().unwrap();
        let deployment = config.deployment().unwrap();

        assert_eq!(plan.price, parse_units(dec!(0.25), NATIVE_DECIMALS).unwrap());
        assert_eq!(plan.spare, parse_units(dec!(0.1), NATIVE_DECIMALS).unwrap());
        assert_eq!(plan.asset, AssetRef::erc1155(deployment.storefront, U256::from(42u64)));
        assert_eq!(plan.shared_proxy, Some(deployment.storefront));
        assert_eq!(plan.fulfiller_conduit_key, B256::ZERO);
        assert_eq!(plan.order_type, OrderType::PartialOpen);
        assert_eq!(plan.window, TimeWindow::default());
        assert_eq!(config.holding_ids().unwrap(), vec![U256::from(42u64)]);
    }

    #[test]
    fn test_valid_for_sets_window() {
        let mut config = AppConfig::from_toml(CONFIG).unwrap();
        config.trade.valid_for_secs = Some(600);
        let plan = config.trade_plan_at(1_000).unwrap();
        assert_eq!(
            plan.window,
            TimeWindow::new(U256::from(1_000u64), U256::from(1_600u64))
        );
    }

    #[test]
    fn test_fee_policy_conversion() {
        let config = AppConfig::from_toml(CONFIG).unwrap();
        assert_eq!(
            config.fee.policy().unwrap(),
            FeePolicy::Bounded {
                floor: U256::from(1_000_000_000u64),
                ceiling: U256::from(50_000_000_000u64),
            }
        );

        let inverted = FeeConfig::Bounded {
            floor_gwei: dec!(5),
            ceiling_gwei: dec!(1),
        };
        assert!(inverted.policy().is_err());
        assert_eq!(
            FeeConfig::Fixed { gwei: dec!(0.5) }.policy().unwrap(),
            FeePolicy::Fixed(U256::from(500_000_000u64))
        );
    }

    #[test]
    fn test_wait_options() {
        let config = AppConfig::from_toml(CONFIG).unwrap();
        let options = config.wait.options();
        assert_eq!(options.timeout, Some(Duration::from_secs(120)));
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert_eq!(WaitConfig::default().options().timeout, None);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let broken = CONFIG.replace(
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "0xnot-an-address",
        );
        let err = AppConfig::from_toml(&broken).unwrap_err();
        assert!(err.to_string().contains("contracts.fungible"));
    }

    #[test]
    fn test_node_managed_account() {
        let managed = CONFIG.replace(
            "[accounts.seller]\nkey = { source = \"env\", var = \"SEAFILL_SELLER_KEY\" }",
            "[accounts.seller]\naddress = \"0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC\"",
        );
        let config = AppConfig::from_toml(&managed).unwrap();
        let seller = &config.accounts.seller;
        assert!(seller.key.is_none());

        let expected: Address = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".parse().unwrap();
        assert_eq!(seller.resolve_address().unwrap(), expected);
        let key = seller.account_key().unwrap();
        assert_eq!(key.address(), expected);
        assert!(!key.can_sign());
    }

    #[test]
    fn test_account_without_identity_rejected() {
        let anonymous = CONFIG.replace(
            "key = { source = \"env\", var = \"SEAFILL_SELLER_KEY\" }",
            "",
        );
        let err = AppConfig::from_toml(&anonymous).unwrap_err();
        assert!(err.to_string().contains("accounts.seller"), "{err}");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8545");

        assert!(AppConfig::from_file("/nonexistent/seafill.toml").is_err());
    }
}
