//! Chain connector capability and transaction confirmation plumbing.
//!
//! The connector is a consumed capability: operations receive something
//! implementing [`ChainClient`] and never construct a provider themselves.
//! [`InMemoryChain`] is the scripted double used by this crate's tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;

/// Interval between receipt polls while waiting for confirmation
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors from the chain boundary
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Transport-level fault (connection, RPC, serialization)
    #[error("rpc error: {0}")]
    Rpc(Box<str>),
    /// Execution reverted; the payload is the on-chain reason, verbatim
    #[error("execution reverted: {0}")]
    Revert(Box<str>),
    /// Return data could not be decoded against the expected ABI
    #[error("abi decode error: {0}")]
    Decode(Box<str>),
    /// Transaction was not confirmed within the allotted wait
    #[error("timed out waiting for confirmation of {0}")]
    ConfirmationTimeout(B256),
}

/// A transaction ready for submission
#[derive(Clone, Debug)]
pub struct TxRequest {
    /// Target contract
    pub to: Address,
    /// ABI-encoded calldata
    pub data: Bytes,
    /// Optional gas price override; `None` lets the connector decide
    pub gas_price: Option<U256>,
}

impl TxRequest {
    /// Plain call with no gas override
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            gas_price: None,
        }
    }
}

/// Inclusion proof for a submitted transaction
#[derive(Clone, Debug)]
pub struct TxReceipt {
    /// Hash of the submitted transaction
    pub tx_hash: B256,
    /// Block the transaction was mined in
    pub block_number: u64,
    /// Whether execution succeeded
    pub success: bool,
}

/// Header fields the operations care about
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockInfo {
    /// Block number
    pub number: u64,
    /// Block timestamp (Unix seconds), the clock every precondition uses
    pub timestamp: u64,
}

/// Read/write capability against deployed contracts.
///
/// Implementations wrap a JSON-RPC provider and a funded signer key; a
/// single implementation instance corresponds to a single operator account,
/// so transactions it submits are nonce-ordered by construction.
#[allow(async_fn_in_trait)]
pub trait ChainClient: Send + Sync {
    /// Read-only contract call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Submit a transaction, returning its hash without waiting for inclusion
    async fn send(&self, tx: TxRequest) -> Result<B256, ChainError>;

    /// Receipt for a transaction, `None` while still pending
    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError>;

    /// Latest block header fields
    async fn latest_block(&self) -> Result<BlockInfo, ChainError>;
}

/// Submit a transaction and wait until it has the requested number of
/// confirmations.
///
/// There is no in-flight cancellation: on [`ChainError::ConfirmationTimeout`]
/// the transaction may still land later, and the operator re-runs or
/// inspects manually. Dependent transactions must not be submitted until
/// this returns.
pub async fn submit_and_wait<C: ChainClient>(
    chain: &C,
    tx: TxRequest,
    confirmations: u64,
    timeout: Duration,
) -> Result<TxReceipt, ChainError> {
    let tx_hash = chain.send(tx).await?;
    tracing::info!(tx_hash = %tx_hash, "transaction submitted");

    let wait = async {
        loop {
            if let Some(receipt) = chain.receipt(tx_hash).await? {
                let latest = chain.latest_block().await?;
                if latest.number + 1 >= receipt.block_number + confirmations {
                    if !receipt.success {
                        return Err(ChainError::Revert(
                            format!("transaction {tx_hash} reverted on-chain").into(),
                        ));
                    }
                    tracing::info!(
                        tx_hash = %tx_hash,
                        block = receipt.block_number,
                        "transaction confirmed"
                    );
                    return Ok(receipt);
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::ConfirmationTimeout(tx_hash)),
    }
}

// === Typed read helpers ===

pub(crate) async fn call_address<C: ChainClient>(
    chain: &C,
    to: Address,
    data: Vec<u8>,
) -> Result<Address, ChainError> {
    let ret = chain.call(to, data.into()).await?;
    Address::abi_decode(&ret).map_err(|e| ChainError::Decode(e.to_string().into()))
}

pub(crate) async fn call_u256<C: ChainClient>(
    chain: &C,
    to: Address,
    data: Vec<u8>,
) -> Result<U256, ChainError> {
    let ret = chain.call(to, data.into()).await?;
    U256::abi_decode(&ret).map_err(|e| ChainError::Decode(e.to_string().into()))
}

pub(crate) async fn call_bool<C: ChainClient>(
    chain: &C,
    to: Address,
    data: Vec<u8>,
) -> Result<bool, ChainError> {
    let ret = chain.call(to, data.into()).await?;
    bool::abi_decode(&ret).map_err(|e| ChainError::Decode(e.to_string().into()))
}

// === In-memory double ===

#[derive(Default)]
struct ChainScript {
    call_returns: HashMap<(Address, [u8; 4]), Bytes>,
    send_reverts: HashMap<[u8; 4], Box<str>>,
    sent: Vec<TxRequest>,
    receipts: HashMap<B256, TxReceipt>,
    block: BlockInfo,
    hold_receipts: bool,
    mine_next_as_failed: bool,
    tx_counter: u64,
}

/// Scripted in-memory chain for testing.
///
/// Call responses are keyed by `(contract, selector)`; sends are recorded
/// and mined into the next block unless a revert is scripted for their
/// selector.
pub struct InMemoryChain {
    script: Mutex<ChainScript>,
}

impl InMemoryChain {
    /// Chain whose latest block starts at the given header
    pub fn new(block: BlockInfo) -> Self {
        Self {
            script: Mutex::new(ChainScript {
                block,
                ..ChainScript::default()
            }),
        }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, ChainScript>, ChainError> {
        self.script
            .lock()
            .map_err(|e| ChainError::Rpc(e.to_string().into()))
    }

    /// Script the return data for a `(contract, selector)` call
    pub fn set_call_return(&self, to: Address, selector: [u8; 4], ret: impl Into<Bytes>) {
        if let Ok(mut script) = self.script.lock() {
            script.call_returns.insert((to, selector), ret.into());
        }
    }

    /// Script a send of the given selector to revert with a reason
    pub fn revert_on_send(&self, selector: [u8; 4], reason: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.send_reverts.insert(selector, reason.into());
        }
    }

    /// Move the latest block
    pub fn set_block(&self, number: u64, timestamp: u64) {
        if let Ok(mut script) = self.script.lock() {
            script.block = BlockInfo { number, timestamp };
        }
    }

    /// Accept sends but never produce receipts
    pub fn hold_receipts(&self) {
        if let Ok(mut script) = self.script.lock() {
            script.hold_receipts = true;
        }
    }

    /// Mine the next send as a failed execution
    pub fn mine_next_as_failed(&self) {
        if let Ok(mut script) = self.script.lock() {
            script.mine_next_as_failed = true;
        }
    }

    /// Transactions submitted so far
    pub fn sent(&self) -> Vec<TxRequest> {
        self.script
            .lock()
            .map(|script| script.sent.clone())
            .unwrap_or_default()
    }
}

fn selector_of(data: &[u8]) -> Result<[u8; 4], ChainError> {
    data.get(..4)
        .map(|s| {
            let mut sel = [0u8; 4];
            sel.copy_from_slice(s);
            sel
        })
        .ok_or_else(|| ChainError::Rpc("calldata shorter than a selector".into()))
}

impl ChainClient for InMemoryChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let selector = selector_of(&data)?;
        let script = self.locked()?;
        script
            .call_returns
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| {
                ChainError::Rpc(
                    format!("no scripted response for {to} selector 0x{}", hex(selector)).into(),
                )
            })
    }

    async fn send(&self, tx: TxRequest) -> Result<B256, ChainError> {
        let selector = selector_of(&tx.data)?;
        let mut script = self.locked()?;
        if let Some(reason) = script.send_reverts.get(&selector) {
            return Err(ChainError::Revert(reason.clone()));
        }

        script.tx_counter += 1;
        let tx_hash = B256::from(U256::from(script.tx_counter));
        script.sent.push(tx);

        if !script.hold_receipts {
            script.block.number += 1;
            let success = !script.mine_next_as_failed;
            script.mine_next_as_failed = false;
            let receipt = TxReceipt {
                tx_hash,
                block_number: script.block.number,
                success,
            };
            script.receipts.insert(tx_hash, receipt);
        }
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        Ok(self.locked()?.receipts.get(&tx_hash).cloned())
    }

    async fn latest_block(&self) -> Result<BlockInfo, ChainError> {
        Ok(self.locked()?.block)
    }
}

fn hex(selector: [u8; 4]) -> String {
    selector.iter().map(|b| format!("{b:02x}")).collect()
}
