//! Error taxonomy for vault operations

use alloy_primitives::Address;

use crate::chain::ChainError;

/// Errors surfaced by the operator-facing operations.
///
/// Precondition and state errors carry the exact values that failed the
/// check; on-chain revert reasons arrive verbatim inside
/// [`ChainError::Revert`] and are never reworded.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// The factory/adapter could not produce an identity for the terms.
    ///
    /// Not retryable without changing inputs; the offending terms ride along.
    #[error("option resolution failed for [{terms}]: {reason}")]
    ResolutionFailed {
        /// Rendered terms the resolution was attempted for
        terms: Box<str>,
        /// What went wrong (transport fault, decode fault, or zero identity)
        reason: Box<str>,
    },

    /// Resolved identity differs from the claimed one.
    ///
    /// Always fatal: collateral must never be locked against the wrong
    /// instrument.
    #[error("resolved option {resolved} does not match claimed {claimed}")]
    IdentityMismatch {
        /// Identity the factory derives for the terms
        resolved: Address,
        /// Identity the caller claimed
        claimed: Address,
    },

    /// Terms expire inside the mandatory commit delay window
    #[error("terms expire at {expiry}, before now ({now}) + {min_delay}s commit delay")]
    ExpiryTooSoon {
        /// Expiry carried by the terms
        expiry: u64,
        /// Latest block timestamp at pre-check time
        now: u64,
        /// Mandatory delay in seconds
        min_delay: u64,
    },

    /// Roll attempted before the commit delay elapsed
    #[error("cannot roll before delay elapses: ready at {ready_at}, block time {now}")]
    CannotRollBeforeDelay {
        /// Timestamp after which the next option may be activated
        ready_at: u64,
        /// Latest block timestamp
        now: u64,
    },

    /// No next option is committed.
    ///
    /// Right after a roll this means "already rolled" and must not be
    /// retried blindly.
    #[error("no option found: commit a next option before rolling")]
    NoOptionFound,

    /// Signing key absent or unparseable; raised before any network call
    #[error("signing key missing or invalid")]
    SigningKeyMissing,

    /// Chain transport or execution fault, surfaced as-is
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl OpsError {
    /// Whether retrying with identical inputs could ever succeed.
    ///
    /// Only transport-level faults qualify; retries remain an explicit
    /// operator action either way.
    pub fn is_transient(&self) -> bool {
        matches!(self, OpsError::Chain(ChainError::Rpc(_)))
    }
}
