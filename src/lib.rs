//! Off-Chain Roll Coordination for On-Chain Options Vaults
//!
//! The vault contract owns the money and the state machine; this crate
//! drives its option lifecycle from the outside: resolve the next option's
//! identity, commit it, wait out the mandatory delay, roll into it, and
//! sell the minted position through a signed peer-to-peer swap order.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // 1. Build the context once per process
//! let store = JsonFileStore::new("deployments.json");
//! let deployment = Deployment::from_store(&store, "mainnet")?;
//! let ctx = OpsContext::new(rpc_client, deployment, 1);
//!
//! // 2. Commit the next option, wait out the delay, roll
//! commit_and_close(&ctx, &terms).await?;
//! // ...at least MINIMUM_COMMIT_DELAY_SECS later...
//! roll_to_next_option(&ctx).await?;
//!
//! // 3. Sell the position via a signed order
//! let order = build_and_sign(&swap_config, &order_spec, Some(&key))?;
//! println!("{}", serde_json::to_string(&order)?);
//! ```
//!
//! Each operation is a short, straight-line `async fn`; there is no
//! internal concurrency, and one operator key must drive one vault at a
//! time.

#![warn(missing_docs)]

// === Core Types ===
mod context;
mod errors;
mod terms;

// === Chain Boundary ===
pub mod abi;
mod chain;

// === Operations ===
mod resolver;
mod roll;
mod swap;

// === Reporting ===
mod report;

// === Storage ===
mod store;

// === Re-exports ===

// Types
pub use context::{Deployment, OpsContext};
pub use terms::{OptionTerms, OptionType};

// Chain boundary
pub use chain::{
    submit_and_wait, BlockInfo, ChainClient, ChainError, InMemoryChain, TxReceipt, TxRequest,
};

// Errors
pub use errors::OpsError;

// Resolution
pub use resolver::{resolve_option_address, verify_identity};

// Roll scheduling
pub use roll::{
    commit_and_close, fetch_lock_ratio, fetch_roll_state, roll_to_next_option, RollPhase,
    VaultRollState, MINIMUM_COMMIT_DELAY_SECS,
};

// Signed orders
pub use swap::{
    build_and_sign, order_signing_hash, OrderParty, OrderSignature, OrderSpec, SignedOrder,
    SwapConfig, SIGNATURE_VERSION_TYPED_DATA,
};

// Reporting
pub use report::{is_weekly_expiry, verify_vault_otoken, Check, Outcome, VaultReport};

// Storage
pub use store::{DeploymentStore, InMemoryStore, JsonFileStore, StoreError};

/// Install a plain `tracing` subscriber for harness runs.
///
/// Repeated calls are fine; only the first installation wins.
#[cfg(feature = "test-harness")]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}
