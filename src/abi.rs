//! Contract surfaces reached through the chain connector.
//!
//! The one place option terms become a positional tuple. Everything above
//! this boundary works with the typed [`OptionTerms`] value.

use alloy_primitives::U256;
use alloy_sol_types::sol;

use crate::terms::OptionTerms;

sol! {
    /// Positional terms tuple in the canonical field order the factory and
    /// vault share.
    struct OptionTermsData {
        address underlying;
        address strikeAsset;
        address collateralAsset;
        uint256 expiry;
        uint256 strikePrice;
        uint8 optionType;
        address paymentToken;
    }

    /// Roll surface of the options vault.
    interface IOptionsVault {
        function currentOption() external view returns (address);
        function nextOption() external view returns (address);
        function nextOptionReadyAt() external view returns (uint256);
        function currentOptionExpiry() external view returns (uint256);
        function asset() external view returns (address);
        function underlying() external view returns (address);
        function isPut() external view returns (bool);
        function lockedRatio() external view returns (uint256);
        function commitAndClose(OptionTermsData terms) external;
        function rollToNextOption() external;
    }

    /// Deterministic option-identity lookup on the factory/adapter.
    interface IOptionsFactory {
        function getOptionsAddress(OptionTermsData terms) external view returns (address);
    }

    /// Metadata surface of a deployed option token.
    interface IOtoken {
        function underlyingAsset() external view returns (address);
        function strikeAsset() external view returns (address);
        function collateralAsset() external view returns (address);
        function strikePrice() external view returns (uint256);
        function expiryTimestamp() external view returns (uint256);
        function isPut() external view returns (bool);
    }
}

impl OptionTerms {
    /// Tuple for the factory/adapter, strike rescaled to 8 decimals.
    pub(crate) fn to_factory_tuple(&self) -> OptionTermsData {
        OptionTermsData {
            underlying: self.underlying,
            strikeAsset: self.strike_asset,
            collateralAsset: self.collateral_asset,
            expiry: U256::from(self.expiry),
            strikePrice: self.strike_price_e8(),
            optionType: self.option_type.factory_code(),
            paymentToken: self.payment_token,
        }
    }

    /// Tuple for the vault, strike kept in the 18-decimal internal form.
    ///
    /// The vault rescales internally when it talks to the factory; handing
    /// it the e8 value would shrink the strike by 10 decimal places.
    pub(crate) fn to_vault_tuple(&self) -> OptionTermsData {
        OptionTermsData {
            underlying: self.underlying,
            strikeAsset: self.strike_asset,
            collateralAsset: self.collateral_asset,
            expiry: U256::from(self.expiry),
            strikePrice: self.strike_price,
            optionType: self.option_type.factory_code(),
            paymentToken: self.payment_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::OptionType;
    use alloy_primitives::address;

    #[test]
    fn factory_tuple_rescales_strike_and_vault_tuple_does_not() {
        let terms = OptionTerms {
            underlying: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            strike_asset: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            collateral_asset: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            expiry: 1_602_835_200,
            strike_price: U256::from(960u64) * U256::from(10u64).pow(U256::from(18u64)),
            option_type: OptionType::Call,
            payment_token: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        };

        let factory = terms.to_factory_tuple();
        let vault = terms.to_vault_tuple();

        assert_eq!(factory.strikePrice, U256::from(96_000_000_000u64));
        assert_eq!(vault.strikePrice, terms.strike_price);
        assert_eq!(factory.optionType, 2);
        assert_eq!(factory.expiry, U256::from(terms.expiry));
    }
}
