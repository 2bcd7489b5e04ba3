//! Roll scheduler: the two-phase commit/roll protocol with a mandatory
//! delay between the phases.
//!
//! The vault contract owns the roll state; these operations only trigger
//! transitions and read the results. Commit must precede roll within a
//! cycle, and the on-chain state has no compare-and-swap, so both calls for
//! a given vault must come from a single operator process holding a single
//! key. A race produces a wasted-gas revert, not corruption, and this
//! module does nothing to referee one.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::abi::IOptionsVault;
use crate::chain::{call_address, call_u256, submit_and_wait, ChainClient, TxReceipt, TxRequest};
use crate::context::OpsContext;
use crate::errors::OpsError;
use crate::resolver;
use crate::terms::OptionTerms;

/// Mandatory delay between committing a next option and rolling into it
pub const MINIMUM_COMMIT_DELAY_SECS: u64 = 3600;

/// Roll state read from the vault; zero addresses become `None`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultRollState {
    /// Option currently held and collateralized
    pub current_option: Option<Address>,
    /// Expiry of the current option, 0 when none
    pub current_option_expiry: u64,
    /// Option proposed via commit, not yet active
    pub next_option: Option<Address>,
    /// Timestamp after which the next option may be activated, 0 when none
    pub next_option_ready_at: u64,
}

impl VaultRollState {
    /// Where the vault sits in the commit/roll cycle
    pub fn phase(&self) -> RollPhase {
        match (self.current_option, self.next_option) {
            (None, None) => RollPhase::Idle,
            (_, Some(_)) => RollPhase::Committed,
            (Some(_), None) => RollPhase::Active,
        }
    }
}

/// Phase classification of [`VaultRollState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollPhase {
    /// No current and no next option
    Idle,
    /// A next option is committed and the delay timer is running
    Committed,
    /// A current option is active and collateral is locked
    Active,
}

impl std::fmt::Display for RollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollPhase::Idle => write!(f, "idle"),
            RollPhase::Committed => write!(f, "committed"),
            RollPhase::Active => write!(f, "active"),
        }
    }
}

/// Read the vault's roll state
pub async fn fetch_roll_state<C: ChainClient>(
    ctx: &OpsContext<C>,
) -> Result<VaultRollState, OpsError> {
    let vault = ctx.deployment.vault;
    let current = call_address(
        &ctx.chain,
        vault,
        IOptionsVault::currentOptionCall {}.abi_encode(),
    )
    .await?;
    let expiry = call_u256(
        &ctx.chain,
        vault,
        IOptionsVault::currentOptionExpiryCall {}.abi_encode(),
    )
    .await?;
    let next = call_address(
        &ctx.chain,
        vault,
        IOptionsVault::nextOptionCall {}.abi_encode(),
    )
    .await?;
    let ready_at = call_u256(
        &ctx.chain,
        vault,
        IOptionsVault::nextOptionReadyAtCall {}.abi_encode(),
    )
    .await?;

    Ok(VaultRollState {
        current_option: non_zero(current),
        current_option_expiry: expiry.saturating_to::<u64>(),
        next_option: non_zero(next),
        next_option_ready_at: ready_at.saturating_to::<u64>(),
    })
}

/// Read the vault's collateral-lock ratio (1e18-scaled fraction).
///
/// The ratio lives on the vault, not in this crate; operators display it,
/// the vault applies it when the roll mints the position.
pub async fn fetch_lock_ratio<C: ChainClient>(ctx: &OpsContext<C>) -> Result<U256, OpsError> {
    Ok(call_u256(
        &ctx.chain,
        ctx.deployment.vault,
        IOptionsVault::lockedRatioCall {}.abi_encode(),
    )
    .await?)
}

/// Close the expired current option (if any) and commit the next one.
///
/// Pre-checks that the terms leave room for the mandatory delay, so
/// doomed transactions never spend gas. Vault-configuration failures
/// (wrong role, asset mismatch, wrong option kind) are left to the chain
/// and surface as verbatim revert reasons. After confirmation the vault's
/// recorded `nextOption` is verified against the factory derivation; drift
/// there is fatal because the roll would lock collateral against it.
pub async fn commit_and_close<C: ChainClient>(
    ctx: &OpsContext<C>,
    terms: &OptionTerms,
) -> Result<TxReceipt, OpsError> {
    let resolved = resolver::resolve_option_address(ctx, terms).await?;

    let block = ctx.chain.latest_block().await?;
    if terms.expiry < block.timestamp + MINIMUM_COMMIT_DELAY_SECS {
        tracing::warn!(
            expiry = terms.expiry,
            block_time = block.timestamp,
            "commit rejected before submission"
        );
        return Err(OpsError::ExpiryTooSoon {
            expiry: terms.expiry,
            now: block.timestamp,
            min_delay: MINIMUM_COMMIT_DELAY_SECS,
        });
    }

    let tx = TxRequest::new(
        ctx.deployment.vault,
        IOptionsVault::commitAndCloseCall {
            terms: terms.to_vault_tuple(),
        }
        .abi_encode(),
    );
    let receipt = submit_and_wait(&ctx.chain, tx, ctx.confirmations, ctx.tx_timeout).await?;

    let committed = call_address(
        &ctx.chain,
        ctx.deployment.vault,
        IOptionsVault::nextOptionCall {}.abi_encode(),
    )
    .await?;
    if committed != resolved {
        return Err(OpsError::IdentityMismatch {
            resolved,
            claimed: committed,
        });
    }

    tracing::info!(
        tx_hash = %receipt.tx_hash,
        next_option = %resolved,
        "next option committed"
    );
    Ok(receipt)
}

/// Activate the committed next option, locking collateral behind it.
///
/// Not idempotent: a second call without an intervening commit fails with
/// [`OpsError::NoOptionFound`], which right after a successful roll means
/// "already rolled": treat it as terminal, never as a reason to retry.
pub async fn roll_to_next_option<C: ChainClient>(
    ctx: &OpsContext<C>,
) -> Result<TxReceipt, OpsError> {
    let state = fetch_roll_state(ctx).await?;
    let next = state.next_option.ok_or(OpsError::NoOptionFound)?;

    let block = ctx.chain.latest_block().await?;
    if block.timestamp < state.next_option_ready_at {
        tracing::warn!(
            ready_at = state.next_option_ready_at,
            block_time = block.timestamp,
            "roll rejected before submission"
        );
        return Err(OpsError::CannotRollBeforeDelay {
            ready_at: state.next_option_ready_at,
            now: block.timestamp,
        });
    }

    let tx = TxRequest::new(
        ctx.deployment.vault,
        IOptionsVault::rollToNextOptionCall {}.abi_encode(),
    );
    let receipt = submit_and_wait(&ctx.chain, tx, ctx.confirmations, ctx.tx_timeout).await?;

    tracing::info!(tx_hash = %receipt.tx_hash, option = %next, "rolled to next option");
    Ok(receipt)
}

fn non_zero(address: Address) -> Option<Address> {
    (!address.is_zero()).then_some(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::IOptionsFactory;
    use crate::chain::{BlockInfo, ChainError, InMemoryChain};
    use crate::context::Deployment;
    use crate::terms::OptionType;
    use alloy_primitives::{address, U256};
    use alloy_sol_types::SolValue;

    const VAULT: Address = address!("2000000000000000000000000000000000000002");
    const ADAPTER: Address = address!("4000000000000000000000000000000000000004");
    const OTOKEN: Address = address!("6000000000000000000000000000000000000006");

    // Friday 2020-10-16 08:00:00 UTC
    const EXPIRY: u64 = 1_602_835_200;

    fn ctx(block_timestamp: u64) -> OpsContext<InMemoryChain> {
        let chain = InMemoryChain::new(BlockInfo {
            number: 100,
            timestamp: block_timestamp,
        });
        let deployment = Deployment {
            vault: VAULT,
            adapter: ADAPTER,
            swap: address!("5000000000000000000000000000000000000005"),
        };
        OpsContext::new(chain, deployment, 1)
    }

    fn terms() -> OptionTerms {
        OptionTerms {
            underlying: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            strike_asset: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            collateral_asset: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            expiry: EXPIRY,
            strike_price: U256::from(960u64) * U256::from(10u64).pow(U256::from(18u64)),
            option_type: OptionType::Call,
            payment_token: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        }
    }

    fn script_roll_state(
        chain: &InMemoryChain,
        current: Address,
        expiry: u64,
        next: Address,
        ready_at: u64,
    ) {
        chain.set_call_return(
            VAULT,
            IOptionsVault::currentOptionCall::SELECTOR,
            current.abi_encode(),
        );
        chain.set_call_return(
            VAULT,
            IOptionsVault::currentOptionExpiryCall::SELECTOR,
            U256::from(expiry).abi_encode(),
        );
        chain.set_call_return(
            VAULT,
            IOptionsVault::nextOptionCall::SELECTOR,
            next.abi_encode(),
        );
        chain.set_call_return(
            VAULT,
            IOptionsVault::nextOptionReadyAtCall::SELECTOR,
            U256::from(ready_at).abi_encode(),
        );
    }

    fn script_factory(chain: &InMemoryChain, identity: Address) {
        chain.set_call_return(
            ADAPTER,
            IOptionsFactory::getOptionsAddressCall::SELECTOR,
            identity.abi_encode(),
        );
    }

    #[test]
    fn phase_classification() {
        let idle = VaultRollState {
            current_option: None,
            current_option_expiry: 0,
            next_option: None,
            next_option_ready_at: 0,
        };
        assert_eq!(idle.phase(), RollPhase::Idle);

        let committed = VaultRollState {
            next_option: Some(OTOKEN),
            next_option_ready_at: 10,
            ..idle
        };
        assert_eq!(committed.phase(), RollPhase::Committed);

        let active = VaultRollState {
            current_option: Some(OTOKEN),
            current_option_expiry: EXPIRY,
            next_option: None,
            next_option_ready_at: 0,
        };
        assert_eq!(active.phase(), RollPhase::Active);
    }

    #[tokio::test]
    async fn commit_rejects_expiry_inside_delay_window() {
        let ctx = ctx(EXPIRY - MINIMUM_COMMIT_DELAY_SECS + 1);
        script_factory(&ctx.chain, OTOKEN);

        let err = commit_and_close(&ctx, &terms()).await.unwrap_err();
        assert!(matches!(err, OpsError::ExpiryTooSoon { .. }));
        assert!(ctx.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn commit_accepts_expiry_exactly_at_the_delay_boundary() {
        let ctx = ctx(EXPIRY - MINIMUM_COMMIT_DELAY_SECS);
        script_factory(&ctx.chain, OTOKEN);
        ctx.chain.set_call_return(
            VAULT,
            IOptionsVault::nextOptionCall::SELECTOR,
            OTOKEN.abi_encode(),
        );

        let receipt = commit_and_close(&ctx, &terms()).await.unwrap();
        assert!(receipt.success);

        let sent = ctx.chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, VAULT);

        // The vault receives the 18-decimal strike; rescaling is the
        // factory boundary's job.
        let call = IOptionsVault::commitAndCloseCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(call.terms.strikePrice, terms().strike_price);
        assert_eq!(call.terms.optionType, 2);
    }

    #[tokio::test]
    async fn commit_fails_hard_when_vault_records_a_different_identity() {
        let ctx = ctx(EXPIRY - 7 * 24 * 3600);
        script_factory(&ctx.chain, OTOKEN);
        ctx.chain.set_call_return(
            VAULT,
            IOptionsVault::nextOptionCall::SELECTOR,
            address!("7000000000000000000000000000000000000007").abi_encode(),
        );

        let err = commit_and_close(&ctx, &terms()).await.unwrap_err();
        assert!(matches!(err, OpsError::IdentityMismatch { .. }));
    }

    #[tokio::test]
    async fn commit_surfaces_onchain_revert_reason_verbatim() {
        let ctx = ctx(EXPIRY - 7 * 24 * 3600);
        script_factory(&ctx.chain, OTOKEN);
        ctx.chain
            .revert_on_send(IOptionsVault::commitAndCloseCall::SELECTOR, "Vault: !manager");

        let err = commit_and_close(&ctx, &terms()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "execution reverted: Vault: !manager"
        );
        assert!(matches!(err, OpsError::Chain(ChainError::Revert(_))));
    }

    #[tokio::test]
    async fn roll_fails_one_second_before_the_delay_elapses() {
        let ready_at = 1_602_230_400u64;
        let ctx = ctx(ready_at - 1);
        script_roll_state(&ctx.chain, Address::ZERO, 0, OTOKEN, ready_at);

        let err = roll_to_next_option(&ctx).await.unwrap_err();
        match err {
            OpsError::CannotRollBeforeDelay { ready_at: r, now } => {
                assert_eq!(r, ready_at);
                assert_eq!(now, ready_at - 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn roll_succeeds_once_the_delay_has_elapsed() {
        let ready_at = 1_602_230_400u64;
        let ctx = ctx(ready_at + 1);
        script_roll_state(&ctx.chain, Address::ZERO, 0, OTOKEN, ready_at);

        let receipt = roll_to_next_option(&ctx).await.unwrap();
        assert!(receipt.success);

        let sent = ctx.chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].data.as_ref()[..4],
            IOptionsVault::rollToNextOptionCall::SELECTOR
        );
    }

    #[tokio::test]
    async fn second_roll_without_commit_is_no_option_found() {
        let ready_at = 1_602_230_400u64;
        let ctx = ctx(ready_at + 1);
        script_roll_state(&ctx.chain, Address::ZERO, 0, OTOKEN, ready_at);

        roll_to_next_option(&ctx).await.unwrap();

        // The vault cleared nextOption when it activated the roll.
        script_roll_state(&ctx.chain, OTOKEN, EXPIRY, Address::ZERO, 0);
        let err = roll_to_next_option(&ctx).await.unwrap_err();
        assert!(matches!(err, OpsError::NoOptionFound));
        assert_eq!(ctx.chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn lock_ratio_is_read_from_the_vault() {
        let ctx = ctx(0);
        let ratio = U256::from(9u64) * U256::from(10u64).pow(U256::from(17u64));
        ctx.chain.set_call_return(
            VAULT,
            IOptionsVault::lockedRatioCall::SELECTOR,
            ratio.abi_encode(),
        );

        assert_eq!(fetch_lock_ratio(&ctx).await.unwrap(), ratio);
    }
}
