//! Read-only verification of live vault and option state.
//!
//! Operators run this before acting. Data mismatches are report lines, not
//! errors: the tool is diagnostic and must keep printing whatever else it
//! can check. Only chain faults abort it.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::abi::{IOptionsVault, IOtoken};
use crate::chain::{call_address, call_bool, call_u256, ChainClient};
use crate::context::OpsContext;
use crate::errors::OpsError;
use crate::resolver;
use crate::terms::{OptionTerms, OptionType};

const WEEK_SECS: u64 = 604_800;
// The Unix epoch opened on a Thursday; Friday 08:00 UTC sits one day and
// eight hours into the week.
const FRIDAY_0800_UTC_OFFSET: u64 = 115_200;
const MAX_EXPIRY_HORIZON_SECS: u64 = 7 * 86_400;

/// Whether a timestamp falls on the weekly expiry slot (Friday 08:00 UTC)
pub fn is_weekly_expiry(timestamp: u64) -> bool {
    timestamp % WEEK_SECS == FRIDAY_0800_UTC_OFFSET
}

/// Result of a single verification check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Value matches expectations
    Ok,
    /// On-chain value differs from the vault's configuration
    Mismatch {
        /// What the vault configuration expects
        expected: String,
        /// What the option actually carries
        actual: String,
    },
    /// Value fails a protocol rule outright
    Invalid(String),
}

impl Outcome {
    fn of_eq<T: PartialEq + std::fmt::Display>(expected: T, actual: T) -> Self {
        if expected == actual {
            Outcome::Ok
        } else {
            Outcome::Mismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ok => write!(f, "Ok"),
            Outcome::Mismatch { expected, actual } => {
                write!(f, "Mismatch (expected {expected}, got {actual})")
            }
            Outcome::Invalid(reason) => write!(f, "Invalid ({reason})"),
        }
    }
}

/// One labelled verification line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Check {
    /// What was checked
    pub label: &'static str,
    /// How it came out
    pub outcome: Outcome,
}

/// Advisory report over a vault's option state
#[derive(Clone, Debug)]
pub struct VaultReport {
    /// Vault the report describes
    pub vault: Address,
    /// Option that was inspected (`next` preferred over `current`), if any
    pub option: Option<Address>,
    /// Verification lines
    pub checks: Vec<Check>,
}

impl VaultReport {
    /// True when every check passed
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.outcome == Outcome::Ok)
    }
}

impl std::fmt::Display for VaultReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.option {
            None => write!(f, "vault {}: no option set, nothing to verify", self.vault),
            Some(option) => {
                writeln!(f, "vault {}: verifying option {}", self.vault, option)?;
                for check in &self.checks {
                    writeln!(f, "  {}: {}", check.label, check.outcome)?;
                }
                write!(
                    f,
                    "  => {}",
                    if self.all_ok() { "all checks passed" } else { "ATTENTION REQUIRED" }
                )
            }
        }
    }
}

/// Compare the vault's live option against its configuration and the
/// protocol's expiry rules.
///
/// Prefers the committed `nextOption` (the one about to matter) over the
/// active `currentOption`. Never fails on a mismatch; see module docs.
pub async fn verify_vault_otoken<C: ChainClient>(
    ctx: &OpsContext<C>,
    vault: Address,
) -> Result<VaultReport, OpsError> {
    let chain = &ctx.chain;
    let next = call_address(chain, vault, IOptionsVault::nextOptionCall {}.abi_encode()).await?;
    let current =
        call_address(chain, vault, IOptionsVault::currentOptionCall {}.abi_encode()).await?;

    let option = [next, current].into_iter().find(|a| !a.is_zero());
    let Some(otoken) = option else {
        return Ok(VaultReport {
            vault,
            option: None,
            checks: Vec::new(),
        });
    };

    let vault_asset = call_address(chain, vault, IOptionsVault::assetCall {}.abi_encode()).await?;
    let vault_underlying =
        call_address(chain, vault, IOptionsVault::underlyingCall {}.abi_encode()).await?;
    let vault_is_put = call_bool(chain, vault, IOptionsVault::isPutCall {}.abi_encode()).await?;

    let o_underlying =
        call_address(chain, otoken, IOtoken::underlyingAssetCall {}.abi_encode()).await?;
    let o_strike_asset =
        call_address(chain, otoken, IOtoken::strikeAssetCall {}.abi_encode()).await?;
    let o_collateral =
        call_address(chain, otoken, IOtoken::collateralAssetCall {}.abi_encode()).await?;
    let o_strike_e8 = call_u256(chain, otoken, IOtoken::strikePriceCall {}.abi_encode()).await?;
    let o_expiry = call_u256(chain, otoken, IOtoken::expiryTimestampCall {}.abi_encode())
        .await?
        .saturating_to::<u64>();
    let o_is_put = call_bool(chain, otoken, IOtoken::isPutCall {}.abi_encode()).await?;

    let mut checks = vec![
        Check {
            label: "collateral asset",
            outcome: Outcome::of_eq(vault_asset, o_collateral),
        },
        Check {
            label: "underlying asset",
            outcome: Outcome::of_eq(vault_underlying, o_underlying),
        },
        Check {
            label: "option kind",
            outcome: Outcome::of_eq(kind(vault_is_put), kind(o_is_put)),
        },
        Check {
            label: "expiry cadence",
            outcome: if is_weekly_expiry(o_expiry) {
                Outcome::Ok
            } else {
                Outcome::Invalid("does not fall on Friday 08:00 UTC".to_owned())
            },
        },
    ];

    let now = chain.latest_block().await?.timestamp;
    checks.push(Check {
        label: "expiry horizon",
        outcome: if o_expiry <= now {
            Outcome::Invalid("already expired".to_owned())
        } else if o_expiry > now + MAX_EXPIRY_HORIZON_SECS {
            Outcome::Invalid("more than 7 days out".to_owned())
        } else {
            Outcome::Ok
        },
    });

    // Rebuild terms from the otoken's own metadata and ask the factory
    // which identity they derive; disagreement means the vault holds an
    // instrument the factory would not have produced for these terms.
    let terms = OptionTerms {
        underlying: o_underlying,
        strike_asset: o_strike_asset,
        collateral_asset: o_collateral,
        expiry: o_expiry,
        strike_price: o_strike_e8 * U256::from(10u64).pow(U256::from(10u64)),
        option_type: if o_is_put {
            OptionType::Put
        } else {
            OptionType::Call
        },
        payment_token: vault_underlying,
    };
    let identity_outcome = match resolver::resolve_option_address(ctx, &terms).await {
        Ok(derived) => Outcome::of_eq(derived, otoken),
        Err(e) => Outcome::Invalid(e.to_string()),
    };
    checks.push(Check {
        label: "factory identity",
        outcome: identity_outcome,
    });

    let report = VaultReport {
        vault,
        option: Some(otoken),
        checks,
    };
    if !report.all_ok() {
        tracing::warn!(vault = %vault, otoken = %otoken, "verification found problems");
    }
    Ok(report)
}

fn kind(is_put: bool) -> &'static str {
    if is_put {
        "put"
    } else {
        "call"
    }
}
