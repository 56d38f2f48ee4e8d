//! Error taxonomy shared by every reserve crate.
//!
//! Callers should switch on [`ReserveError::kind`] first: a `Precondition`
//! means the call itself was wrong and can be corrected and resubmitted, a
//! `Configuration` means the operator-managed parameters reject the call,
//! `Economic` marks benign no-op outcomes, `Arithmetic` is an overflow.

use crate::address::{Address, ClassId};
use thiserror::Error;

/// Coarse grouping of [`ReserveError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Configuration,
    Economic,
    Arithmetic,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReserveError {
    // --- Precondition ---
    #[error("queue is empty")]
    EmptyQueue,

    #[error("bond {0} is already queued")]
    DuplicateItem(Address),

    #[error("index {index} out of bounds for queue of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("tranche {0} does not belong to the bond")]
    TrancheNotFound(Address),

    #[error("curve range straddles both breakpoints")]
    UnsupportedRange,

    #[error("curve range lower bound {lower} exceeds upper bound {upper}")]
    InvalidRange { lower: i64, upper: i64 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("no mintable bond is queued")]
    NoMintableBond,

    #[error("tranche {0} is not part of the mintable bond")]
    TrancheNotMintable(Address),

    #[error("tranche {0} is not held in reserve")]
    TrancheNotInReserve(Address),

    #[error("tranche {0} belongs to the mintable bond and cannot be rolled out")]
    RolloverFromMintableBond(Address),

    #[error("unknown tranche {0}")]
    UnknownTranche(Address),

    #[error("bond {0} is queued but has no record")]
    UnknownBond(Address),

    #[error("bond {0} was already dequeued and cannot be queued again")]
    BondRetired(Address),

    #[error("insufficient balance of {token} for {owner}: need {needed}, have {available}")]
    InsufficientBalance {
        token: Address,
        owner: Address,
        needed: u64,
        available: u64,
    },

    #[error("fee reserve cannot cover rebate of {needed} (have {available})")]
    InsufficientFeeReserve { needed: u64, available: u64 },

    // --- Configuration ---
    #[error("yield row for class {class} expects {expected} rates, got {got}")]
    YieldRowLengthMismatch {
        class: ClassId,
        expected: usize,
        got: usize,
    },

    #[error("bond {0} does not match the configured mint class")]
    BondNotConfigured(Address),

    #[error("bond {bond} matures at {maturity}, not after {threshold}")]
    BondMaturesTooSoon {
        bond: Address,
        maturity: u64,
        threshold: u64,
    },

    #[error("bond {bond} matures at {maturity}, after the window end {limit}")]
    BondMaturesTooLate {
        bond: Address,
        maturity: u64,
        limit: u64,
    },

    #[error("bond {bond} matures at {maturity}, before the current tail at {tail_maturity}")]
    MaturityOutOfOrder {
        bond: Address,
        maturity: u64,
        tail_maturity: u64,
    },

    #[error("invalid maturity window: min {min_secs}s exceeds max {max_secs}s")]
    InvalidMaturityWindow { min_secs: u64, max_secs: u64 },

    #[error("fee pair leaks value: mint {mint_pct} + burn {burn_pct} at x={at} is not positive")]
    FeePairLeaksValue { mint_pct: i64, burn_pct: i64, at: i64 },

    #[error("invalid curve: {0}")]
    InvalidCurve(&'static str),

    #[error("invalid bond layout: {0}")]
    InvalidBond(&'static str),

    // --- Economic ---
    #[error("tranche {0} has no configured yield")]
    ZeroYield(Address),

    #[error("deposit is too small to mint any perp")]
    NothingToMint,

    #[error("rollover moves no value")]
    NothingToRollover,

    // --- Arithmetic ---
    #[error("arithmetic overflow")]
    Overflow,
}

impl ReserveError {
    pub fn kind(&self) -> ErrorKind {
        use ReserveError::*;
        match self {
            EmptyQueue
            | DuplicateItem(_)
            | IndexOutOfBounds { .. }
            | TrancheNotFound(_)
            | UnsupportedRange
            | InvalidRange { .. }
            | ZeroAmount
            | NoMintableBond
            | TrancheNotMintable(_)
            | TrancheNotInReserve(_)
            | RolloverFromMintableBond(_)
            | UnknownTranche(_)
            | UnknownBond(_)
            | BondRetired(_)
            | InsufficientBalance { .. }
            | InsufficientFeeReserve { .. } => ErrorKind::Precondition,
            YieldRowLengthMismatch { .. }
            | BondNotConfigured(_)
            | BondMaturesTooSoon { .. }
            | BondMaturesTooLate { .. }
            | MaturityOutOfOrder { .. }
            | InvalidMaturityWindow { .. }
            | FeePairLeaksValue { .. }
            | InvalidCurve(_)
            | InvalidBond(_) => ErrorKind::Configuration,
            ZeroYield(_) | NothingToMint | NothingToRollover => ErrorKind::Economic,
            Overflow => ErrorKind::Arithmetic,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReserveError>;
