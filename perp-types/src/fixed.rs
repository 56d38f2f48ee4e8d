//! Fixed-point scales and the checked integer helpers built on them.

use crate::error::{ReserveError, Result};

/// 100% in signed fee/reward percentages (six decimals of percent).
pub const PERC_ONE: i64 = 100_000_000;

/// A yield of 1.0: one tranche unit mints one perp unit.
pub const YIELD_ONE: u64 = 1_000_000;

/// A deviation ratio of 1.0: the reserve sits exactly on target.
pub const DR_ONE: i64 = 100_000_000;

/// `floor(a * b / d)` with a `u128` intermediate.
pub fn mul_div(a: u64, b: u64, d: u64) -> Result<u64> {
    if d == 0 {
        return Err(ReserveError::Overflow);
    }
    let v = (a as u128)
        .checked_mul(b as u128)
        .ok_or(ReserveError::Overflow)?
        / d as u128;
    u64::try_from(v).map_err(|_| ReserveError::Overflow)
}

/// `ceil(a * b / d)` with a `u128` intermediate.
pub fn mul_div_up(a: u64, b: u64, d: u64) -> Result<u64> {
    if d == 0 {
        return Err(ReserveError::Overflow);
    }
    let n = (a as u128).checked_mul(b as u128).ok_or(ReserveError::Overflow)?;
    let v = n / d as u128 + u128::from(n % d as u128 != 0);
    u64::try_from(v).map_err(|_| ReserveError::Overflow)
}

/// `sign(pct) * (|pct| * amount / PERC_ONE)`.
///
/// The magnitude is truncated before the sign is applied, so a rebate rounds
/// toward zero exactly like a charge does.
pub fn signed_perc_of(pct: i64, amount: u64) -> Result<i128> {
    let magnitude = (pct.unsigned_abs() as u128)
        .checked_mul(amount as u128)
        .ok_or(ReserveError::Overflow)?
        / PERC_ONE as u128;
    let magnitude = i128::try_from(magnitude).map_err(|_| ReserveError::Overflow)?;
    Ok(if pct < 0 { -magnitude } else { magnitude })
}

/// Converts a non-negative signed amount back to a token amount.
pub fn to_amount(v: i128) -> Result<u64> {
    u64::try_from(v.unsigned_abs()).map_err(|_| ReserveError::Overflow)
}
