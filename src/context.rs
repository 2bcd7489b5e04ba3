//! Process-wide operation context.
//!
//! One [`OpsContext`] is constructed at process start and passed to every
//! operation; nothing is cached in module-level state.

use std::time::Duration;

use alloy_primitives::Address;

use crate::chain::ChainClient;
use crate::store::{DeploymentStore, StoreError};

/// Contract addresses the operations act against
#[derive(Clone, Copy, Debug)]
pub struct Deployment {
    /// Options vault being operated
    pub vault: Address,
    /// Option factory/adapter used for identity resolution
    pub adapter: Address,
    /// Swap settlement contract signed orders are bound to
    pub swap: Address,
}

impl Deployment {
    /// Pull the address set for a network out of the address book.
    ///
    /// Every entry is required; a missing one names the contract in the
    /// error instead of surfacing later as a call against the zero address.
    pub fn from_store(store: &dyn DeploymentStore, network: &str) -> Result<Self, StoreError> {
        Ok(Self {
            vault: required(store, network, "vault")?,
            adapter: required(store, network, "adapter")?,
            swap: required(store, network, "swap")?,
        })
    }
}

fn required(
    store: &dyn DeploymentStore,
    network: &str,
    contract: &str,
) -> Result<Address, StoreError> {
    store
        .get(network, contract)?
        .ok_or_else(|| StoreError::Missing {
            network: network.into(),
            contract: contract.into(),
        })
}

/// Everything an operation needs: the chain capability, the address set,
/// and the confirmation policy.
pub struct OpsContext<C: ChainClient> {
    /// Chain read/write capability (one operator key per context)
    pub chain: C,
    /// Deployed contract addresses
    pub deployment: Deployment,
    /// Chain id, bound into typed-data signatures
    pub chain_id: u64,
    /// Confirmations to wait for after submitting
    pub confirmations: u64,
    /// Bound on any single confirmation wait
    pub tx_timeout: Duration,
}

impl<C: ChainClient> OpsContext<C> {
    /// Context with the default confirmation policy (1 confirmation,
    /// 120 second wait bound)
    pub fn new(chain: C, deployment: Deployment, chain_id: u64) -> Self {
        Self {
            chain,
            deployment,
            chain_id,
            confirmations: 1,
            tx_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use alloy_primitives::address;

    #[test]
    fn deployment_requires_every_contract() {
        let store = InMemoryStore::new();
        store
            .put(
                "mainnet",
                "vault",
                address!("2000000000000000000000000000000000000002"),
            )
            .unwrap();
        store
            .put(
                "mainnet",
                "adapter",
                address!("4000000000000000000000000000000000000004"),
            )
            .unwrap();

        let err = Deployment::from_store(&store, "mainnet").unwrap_err();
        assert_eq!(err.to_string(), "no address recorded for swap on mainnet");

        store
            .put(
                "mainnet",
                "swap",
                address!("5000000000000000000000000000000000000005"),
            )
            .unwrap();
        let deployment = Deployment::from_store(&store, "mainnet").unwrap();
        assert_eq!(
            deployment.swap,
            address!("5000000000000000000000000000000000000005")
        );
    }
}
