//! Signed order builder: monetize the vault's option position through a
//! peer-to-peer swap settlement contract.
//!
//! Naming follows the settlement contract's wire schema, where the roles
//! read backwards: the `signer` party is the counterparty paying premium,
//! and the `sender` party is the vault selling option tokens. The contract
//! validates by field position, so the asymmetry is preserved exactly.
//!
//! Signing is local. Nothing here touches the chain; the JSON order is
//! handed off out-of-band and the counterparty submits it.

use std::borrow::Cow;

use alloy_primitives::{Address, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::errors::OpsError;

/// Typed-data scheme tag carried in the signature envelope
pub const SIGNATURE_VERSION_TYPED_DATA: u8 = 0x01;

const DOMAIN_NAME: &str = "SWAP";
const DOMAIN_VERSION: &str = "2";

sol! {
    /// One side of a swap order
    struct Party {
        address wallet;
        address token;
        uint256 amount;
    }

    /// Digest layout the settlement contract verifies
    struct Order {
        uint256 nonce;
        uint256 expiry;
        Party signer;
        Party sender;
        address affiliate;
    }
}

/// Fixed swap-protocol configuration.
///
/// The settlement contract here is the only address a signature can bind
/// to; it is never a per-order argument.
#[derive(Clone, Copy, Debug)]
pub struct SwapConfig {
    /// Swap settlement contract (the signature's `validator`)
    pub settlement: Address,
    /// Chain id bound into the typed-data domain
    pub chain_id: u64,
    /// Fixed fee-referral address
    pub affiliate: Address,
}

impl SwapConfig {
    /// Configuration with no affiliate
    pub fn new(settlement: Address, chain_id: u64) -> Self {
        Self {
            settlement,
            chain_id,
            affiliate: Address::ZERO,
        }
    }
}

/// Parameters of a single order, fresh per trade
#[derive(Clone, Copy, Debug)]
pub struct OrderSpec {
    /// Vault address (the selling side's wallet)
    pub vault: Address,
    /// Counterparty wallet providing the premium
    pub counterparty: Address,
    /// Token the vault sells (the currently active option)
    pub sell_token: Address,
    /// Token the premium is paid in
    pub buy_token: Address,
    /// Amount of option tokens sold
    pub sell_amount: U256,
    /// Premium amount bought
    pub buy_amount: U256,
    /// Anti-replay value
    pub nonce: u64,
    /// Timestamp after which the order is invalid
    pub expiry: u64,
}

/// One party of the JSON wire order; amounts travel as decimal strings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParty {
    /// Wallet on this side of the trade
    pub wallet: Address,
    /// Token this side delivers
    pub token: Address,
    /// Decimal-string token amount
    pub amount: String,
}

/// Signature envelope of the wire order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSignature {
    /// Account that produced the signature
    pub signatory: Address,
    /// Settlement contract the signature is bound to
    pub validator: Address,
    /// Signing scheme tag ([`SIGNATURE_VERSION_TYPED_DATA`])
    pub version: u8,
    /// Recovery id (27 or 28)
    pub v: u8,
    /// Signature r value
    pub r: B256,
    /// Signature s value
    pub s: B256,
}

/// JSON-serializable signed order, ready for out-of-band hand-off
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    /// Anti-replay value, decimal string
    pub nonce: String,
    /// Order expiry timestamp, decimal string
    pub expiry: String,
    /// Counterparty side (premium in)
    pub signer: OrderParty,
    /// Vault side (option tokens out)
    pub sender: OrderParty,
    /// Fee-referral address
    pub affiliate: Address,
    /// Typed-data signature over the order
    pub signature: OrderSignature,
}

fn domain(config: &SwapConfig) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(DOMAIN_NAME)),
        Some(Cow::Borrowed(DOMAIN_VERSION)),
        Some(U256::from(config.chain_id)),
        Some(config.settlement),
        None,
    )
}

fn typed_order(config: &SwapConfig, spec: &OrderSpec) -> Order {
    Order {
        nonce: U256::from(spec.nonce),
        expiry: U256::from(spec.expiry),
        signer: Party {
            wallet: spec.counterparty,
            token: spec.buy_token,
            amount: spec.buy_amount,
        },
        sender: Party {
            wallet: spec.vault,
            token: spec.sell_token,
            amount: spec.sell_amount,
        },
        affiliate: config.affiliate,
    }
}

/// EIP-712 signing hash of an order under the fixed settlement domain.
///
/// Exposed so the settlement binding is directly checkable: a different
/// settlement contract yields a different hash for identical order fields.
pub fn order_signing_hash(config: &SwapConfig, spec: &OrderSpec) -> B256 {
    typed_order(config, spec).eip712_signing_hash(&domain(config))
}

/// Build an order and sign it with the operator key.
///
/// Fails with [`OpsError::SigningKeyMissing`] before doing anything else if
/// the key is absent, blank, or unparseable; an order must never be built
/// around an empty signature.
pub fn build_and_sign(
    config: &SwapConfig,
    spec: &OrderSpec,
    signing_key: Option<&str>,
) -> Result<SignedOrder, OpsError> {
    let key = signing_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(OpsError::SigningKeyMissing)?;
    let signer: PrivateKeySigner = key.parse().map_err(|_| OpsError::SigningKeyMissing)?;

    let hash = order_signing_hash(config, spec);
    let signature = signer
        .sign_hash_sync(&hash)
        .map_err(|_| OpsError::SigningKeyMissing)?;

    tracing::debug!(signatory = %signer.address(), validator = %config.settlement, "order signed");

    Ok(SignedOrder {
        nonce: spec.nonce.to_string(),
        expiry: spec.expiry.to_string(),
        signer: OrderParty {
            wallet: spec.counterparty,
            token: spec.buy_token,
            amount: spec.buy_amount.to_string(),
        },
        sender: OrderParty {
            wallet: spec.vault,
            token: spec.sell_token,
            amount: spec.sell_amount.to_string(),
        },
        affiliate: config.affiliate,
        signature: OrderSignature {
            signatory: signer.address(),
            validator: config.settlement,
            version: SIGNATURE_VERSION_TYPED_DATA,
            v: if signature.v() { 28 } else { 27 },
            r: B256::from(signature.r()),
            s: B256::from(signature.s()),
        },
    })
}
