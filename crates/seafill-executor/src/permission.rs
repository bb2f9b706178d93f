//! Channel authorization and shared-proxy registration.
//!
//! Both checks are idempotent: when the permission already exists nothing is
//! submitted.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use seafill_ledger::{ConduitControllerContract, LedgerError, MultiAssetContract};
use serde::Serialize;
use tracing::{debug, info};

use crate::confirm::WaitOptions;
use crate::error::{EngineError, EngineResult, Step};
use crate::session::{AccountSession, TxOutcome};

/// Result of [`PermissionGate::ensure_channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    AlreadyOpen,
    Opened {
        #[serde(serialize_with = "crate::serde_hex::b256")]
        tx_hash: B256,
    },
}

impl ChannelOutcome {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::AlreadyOpen => None,
            Self::Opened { tx_hash } => Some(*tx_hash),
        }
    }
}

/// Result of [`PermissionGate::ensure_shared_proxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProxyOutcome {
    AlreadyRegistered,
    Registered {
        #[serde(serialize_with = "crate::serde_hex::b256")]
        tx_hash: B256,
    },
}

impl ProxyOutcome {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::AlreadyRegistered => None,
            Self::Registered { tx_hash } => Some(*tx_hash),
        }
    }
}

// A read failing with a revert means the grant target is wrong, not that the
// transport is down.
fn read_error(step: Step, account: Address) -> impl FnOnce(LedgerError) -> EngineError {
    move |source| match source {
        LedgerError::Reverted(reason) => EngineError::Authorization {
            step,
            account,
            reason: reason.to_string(),
        },
        source => EngineError::Ledger { step, source },
    }
}

/// Checks and grants the permissions the exchange needs to move assets.
pub struct PermissionGate {
    controller: ConduitControllerContract,
    /// Session of the conduit controller's owner; the only account allowed
    /// to update channels.
    owner: Arc<AccountSession>,
    wait: WaitOptions,
}

impl PermissionGate {
    pub fn new(controller: ConduitControllerContract, owner: Arc<AccountSession>, wait: WaitOptions) -> Self {
        Self {
            controller,
            owner,
            wait,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner.address()
    }

    /// Make sure `conduit` may move `account`'s assets.
    ///
    /// # Errors
    /// - `Authorization` if the grant reverted or the channel is still closed
    ///   after a successful grant
    /// - `StatusUnknown` if the grant was not confirmed in time
    pub async fn ensure_channel(&self, conduit: Address, account: Address) -> EngineResult<ChannelOutcome> {
        let step = Step::Channel;
        let open = self
            .controller
            .channel_status(conduit, account)
            .await
            .map_err(read_error(step, account))?;
        if open {
            debug!(%conduit, %account, "Channel already open");
            return Ok(ChannelOutcome::AlreadyOpen);
        }

        info!(%conduit, %account, owner = %self.owner.address(), "Opening channel");
        let call = self.controller.update_channel(conduit, account, true);
        let tx_hash = match self.owner.execute(step, call, &self.wait).await? {
            TxOutcome::Mined(receipt) => receipt.transaction_hash,
            TxOutcome::Reverted { reason, .. } => {
                return Err(EngineError::Authorization {
                    step,
                    account,
                    reason: reason.to_string(),
                });
            }
        };

        let open = self
            .controller
            .channel_status(conduit, account)
            .await
            .map_err(read_error(step, account))?;
        if !open {
            return Err(EngineError::Authorization {
                step,
                account,
                reason: format!("channel still closed after grant {tx_hash}"),
            });
        }

        info!(%conduit, %account, %tx_hash, "Channel opened");
        Ok(ChannelOutcome::Opened { tx_hash })
    }

    /// Make sure `proxy` is a shared proxy on `asset_contract`, registering it
    /// from `admin` when absent.
    ///
    /// # Errors
    /// Same as [`ensure_channel`](Self::ensure_channel).
    pub async fn ensure_shared_proxy(
        &self,
        asset_contract: &MultiAssetContract,
        admin: &AccountSession,
        proxy: Address,
    ) -> EngineResult<ProxyOutcome> {
        let step = Step::SharedProxy;
        let account = admin.address();
        let registered = asset_contract
            .is_shared_proxy(proxy)
            .await
            .map_err(read_error(step, account))?;
        if registered {
            debug!(%proxy, "Shared proxy already registered");
            return Ok(ProxyOutcome::AlreadyRegistered);
        }

        info!(%proxy, admin = %account, contract = %asset_contract.address(), "Registering shared proxy");
        let call = asset_contract.add_shared_proxy(proxy);
        let tx_hash = match admin.execute(step, call, &self.wait).await? {
            TxOutcome::Mined(receipt) => receipt.transaction_hash,
            TxOutcome::Reverted { reason, .. } => {
                return Err(EngineError::Authorization {
                    step,
                    account,
                    reason: reason.to_string(),
                });
            }
        };

        let registered = asset_contract
            .is_shared_proxy(proxy)
            .await
            .map_err(read_error(step, account))?;
        if !registered {
            return Err(EngineError::Authorization {
                step,
                account,
                reason: format!("proxy {proxy} still unregistered after {tx_hash}"),
            });
        }
        Ok(ProxyOutcome::Registered { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeePolicy;
    use crate::keys::AccountKey;
    use alloy::primitives::U256;
    use seafill_ledger::{SimConfig, SimLedger};
    use std::time::Duration;

    struct Fixture {
        sim: Arc<SimLedger>,
        gate: PermissionGate,
        owner: Arc<AccountSession>,
    }

    fn fixture() -> Fixture {
        let owner_key = AccountKey::random();
        let config = SimConfig {
            controller_owner: owner_key.address(),
            asset_admin: owner_key.address(),
            ..SimConfig::default()
        };
        let sim = Arc::new(SimLedger::new(config));
        sim.fund_native(owner_key.address(), U256::from(10u64).pow(U256::from(18u8)));

        let owner = Arc::new(AccountSession::new(owner_key, sim.clone(), FeePolicy::Network));
        let controller = ConduitControllerContract::new(sim.clone(), sim.config().conduit_controller);
        let wait = WaitOptions::default().with_poll_interval(Duration::from_millis(5));
        let gate = PermissionGate::new(controller, owner.clone(), wait);
        Fixture { sim, gate, owner }
    }

    #[tokio::test]
    async fn test_ensure_channel_is_idempotent() {
        let Fixture { sim, gate, owner } = fixture();
        let conduit = sim.config().conduit;
        let account = Address::repeat_byte(0x33);

        let first = gate.ensure_channel(conduit, account).await.unwrap();
        assert!(matches!(first, ChannelOutcome::Opened { .. }));
        assert!(sim.channel_open(conduit, account));

        let second = gate.ensure_channel(conduit, account).await.unwrap();
        assert_eq!(second, ChannelOutcome::AlreadyOpen);
        assert_eq!(sim.transactions_from(owner.address()).len(), 1);
    }

    #[tokio::test]
    async fn test_non_owner_grant_is_authorization_error() {
        let Fixture { sim, .. } = fixture();
        let intruder = AccountKey::random();
        sim.fund_native(intruder.address(), U256::from(10u64).pow(U256::from(18u8)));
        let intruder = Arc::new(AccountSession::new(intruder, sim.clone(), FeePolicy::Network));
        let controller = ConduitControllerContract::new(sim.clone(), sim.config().conduit_controller);
        let gate = PermissionGate::new(
            controller,
            intruder,
            WaitOptions::default().with_poll_interval(Duration::from_millis(5)),
        );

        let account = Address::repeat_byte(0x44);
        let err = gate
            .ensure_channel(sim.config().conduit, account)
            .await
            .unwrap_err();
        match err {
            EngineError::Authorization { step, account: a, reason } => {
                assert_eq!(step, Step::Channel);
                assert_eq!(a, account);
                assert!(reason.contains("CallerIsNotOwner"));
            }
            other => panic!("expected Authorization, got {other:?}"),
        }
        assert!(!sim.channel_open(sim.config().conduit, account));
    }

    #[tokio::test]
    async fn test_ensure_shared_proxy() {
        let Fixture { sim, gate, owner } = fixture();
        let asset = MultiAssetContract::new(sim.clone(), sim.config().asset_contract);
        let proxy = sim.config().storefront;

        let first = gate.ensure_shared_proxy(&asset, &owner, proxy).await.unwrap();
        assert!(first.tx_hash().is_some());
        assert!(sim.is_shared_proxy(proxy));

        let second = gate.ensure_shared_proxy(&asset, &owner, proxy).await.unwrap();
        assert_eq!(second, ProxyOutcome::AlreadyRegistered);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(ChannelOutcome::AlreadyOpen).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "already_open" }));

        let opened = ChannelOutcome::Opened {
            tx_hash: B256::repeat_byte(0x01),
        };
        let value = serde_json::to_value(opened).unwrap();
        assert_eq!(value["status"], "opened");
        assert_eq!(value["tx_hash"], format!("0x{}", "01".repeat(32)));
    }
}
