//! Option term resolution: terms in, on-chain identity out.
//!
//! The factory derives option addresses deterministically from their terms,
//! deployed or not, so resolution is a pure read. Identity checks here are
//! the last line of defense before collateral is locked against the wrong
//! instrument.

use alloy_primitives::Address;
use alloy_sol_types::{SolCall, SolValue};

use crate::abi::IOptionsFactory;
use crate::chain::ChainClient;
use crate::context::OpsContext;
use crate::errors::OpsError;
use crate::terms::OptionTerms;

/// Derive the on-chain identity the factory assigns to the given terms.
///
/// The strike is rescaled to the factory's 8-decimal convention on the way
/// out. A transport fault, an undecodable reply, or the zero identity all
/// surface as [`OpsError::ResolutionFailed`]; nothing is retried here.
pub async fn resolve_option_address<C: ChainClient>(
    ctx: &OpsContext<C>,
    terms: &OptionTerms,
) -> Result<Address, OpsError> {
    let call = IOptionsFactory::getOptionsAddressCall {
        terms: terms.to_factory_tuple(),
    };
    let ret = ctx
        .chain
        .call(ctx.deployment.adapter, call.abi_encode().into())
        .await
        .map_err(|e| resolution_failed(terms, e.to_string()))?;
    let identity = Address::abi_decode(&ret)
        .map_err(|e| resolution_failed(terms, format!("undecodable factory reply: {e}")))?;
    if identity.is_zero() {
        return Err(resolution_failed(
            terms,
            "terms resolve to the zero identity".to_owned(),
        ));
    }
    tracing::debug!(%identity, "option identity resolved");
    Ok(identity)
}

/// Check a claimed identity against the factory derivation.
///
/// `Address` equality is byte equality, so hex casing of the claimed value
/// never matters once parsed. A mismatch is the hard
/// [`OpsError::IdentityMismatch`] error, never silently corrected.
pub async fn verify_identity<C: ChainClient>(
    ctx: &OpsContext<C>,
    terms: &OptionTerms,
    claimed: Address,
) -> Result<Address, OpsError> {
    let resolved = resolve_option_address(ctx, terms).await?;
    if resolved != claimed {
        return Err(OpsError::IdentityMismatch { resolved, claimed });
    }
    Ok(resolved)
}

fn resolution_failed(terms: &OptionTerms, reason: String) -> OpsError {
    OpsError::ResolutionFailed {
        terms: terms.to_string().into(),
        reason: reason.into(),
    }
}
