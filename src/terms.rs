//! Option terms: the abstract description of an option instrument

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Decimal gap between the internal 18-decimal strike representation and the
/// factory's 8-decimal convention: `external = internal / 10^10`.
const STRIKE_RESCALE_DIVISOR: u64 = 10_000_000_000;

/// Call/put flag in the factory's `uint8` encoding.
///
/// The factory reserves `0` for the unset value, so the wire codes start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to sell the underlying at the strike
    Put,
    /// Right to buy the underlying at the strike
    Call,
}

impl OptionType {
    /// Wire code used by the factory/adapter tuple encoding
    pub fn factory_code(&self) -> u8 {
        match self {
            OptionType::Put => 1,
            OptionType::Call => 2,
        }
    }

    /// Whether these terms describe a put
    pub fn is_put(&self) -> bool {
        matches!(self, OptionType::Put)
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Put => write!(f, "put"),
            OptionType::Call => write!(f, "call"),
        }
    }
}

/// Abstract terms of an option instrument.
///
/// Immutable once constructed: a different option is a different
/// `OptionTerms` value, never an in-place edit. Field order here is the one
/// canonical schema; positional encoding happens only at the chain boundary
/// in [`crate::abi`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTerms {
    /// Underlying asset the option references
    pub underlying: Address,
    /// Asset denominating the strike
    pub strike_asset: Address,
    /// Asset locked as collateral/margin
    pub collateral_asset: Address,
    /// Expiry as a Unix timestamp (weekly cadence, Friday 08:00 UTC)
    pub expiry: u64,
    /// Strike price in the internal 18-decimal fixed-point representation
    pub strike_price: U256,
    /// Call or put
    pub option_type: OptionType,
    /// Asset the premium is paid in (often equals `underlying`)
    pub payment_token: Address,
}

impl OptionTerms {
    /// Strike price rescaled to the factory's 8-decimal convention.
    ///
    /// Floor division, matching the on-chain factory's integer truncation.
    /// Rounding here would derive a different option identity.
    pub fn strike_price_e8(&self) -> U256 {
        self.strike_price / U256::from(STRIKE_RESCALE_DIVISOR)
    }
}

impl std::fmt::Display for OptionTerms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} strike={} expiry={} collateral={}",
            self.underlying, self.option_type, self.strike_price, self.expiry, self.collateral_asset
        )
    }
}
