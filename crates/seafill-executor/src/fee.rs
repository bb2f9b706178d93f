//! Fee-price policy applied to every submission of a session.

use alloy::primitives::U256;
use seafill_ledger::{LedgerClient, LedgerResult};

/// How the gas price of a transaction is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    /// Use the node's suggested price.
    #[default]
    Network,
    /// Always use this price.
    Fixed(U256),
    /// Node price clamped to `[floor, ceiling]`.
    Bounded { floor: U256, ceiling: U256 },
}

impl FeePolicy {
    /// Apply the policy to a node-suggested price.
    pub fn apply(&self, network_price: U256) -> U256 {
        match *self {
            Self::Network => network_price,
            Self::Fixed(price) => price,
            Self::Bounded { floor, ceiling } => network_price.max(floor).min(ceiling),
        }
    }

    /// Whether the node needs to be asked for a price.
    pub fn needs_network_price(&self) -> bool {
        !matches!(self, Self::Fixed(_))
    }

    /// Resolve the price for the next submission.
    pub async fn resolve(&self, ledger: &dyn LedgerClient) -> LedgerResult<U256> {
        if !self.needs_network_price() {
            return Ok(self.apply(U256::ZERO));
        }
        let network_price = ledger.gas_price().await?;
        Ok(self.apply(network_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seafill_ledger::SimLedger;

    fn gwei(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000u64)
    }

    #[test]
    fn test_apply() {
        assert_eq!(FeePolicy::Network.apply(gwei(3)), gwei(3));
        assert_eq!(FeePolicy::Fixed(gwei(7)).apply(gwei(3)), gwei(7));

        let bounded = FeePolicy::Bounded {
            floor: gwei(2),
            ceiling: gwei(5),
        };
        assert_eq!(bounded.apply(gwei(1)), gwei(2));
        assert_eq!(bounded.apply(gwei(3)), gwei(3));
        assert_eq!(bounded.apply(gwei(9)), gwei(5));
    }

    #[tokio::test]
    async fn test_resolve_uses_node_price() {
        let sim = SimLedger::default();
        let node_price = sim.config().gas_price;
        assert_eq!(FeePolicy::Network.resolve(&sim).await.unwrap(), node_price);
        assert_eq!(
            FeePolicy::Fixed(gwei(42)).resolve(&sim).await.unwrap(),
            gwei(42)
        );
    }
}
