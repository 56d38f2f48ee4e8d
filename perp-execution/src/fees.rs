//! Mint fee, burn fee and rollover reward.
//!
//! All three are signed: positive is charged to the caller, negative is paid
//! to the caller. A schedule where mint or burn can go negative is only
//! accepted if the opposite side always overcompensates, otherwise a
//! mint→burn loop with no net position would drain the fee reserve. That is
//! a property of the parameter pair, so it is checked once in
//! [`FeePolicy::new`] and never at call time.

use perp_types::fixed::{mul_div, signed_perc_of};
use perp_types::{PiecewiseCurve, ReserveError, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeSchedule {
    Fixed {
        mint_fee_pct: i64,
        burn_fee_pct: i64,
        rollover_reward_pct: i64,
    },
    /// Percentages read off curves over the deviation ratio, clamped to
    /// `domain`.
    Curve {
        mint: PiecewiseCurve,
        burn: PiecewiseCurve,
        rollover: PiecewiseCurve,
        domain: (i64, i64),
    },
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule::Fixed {
            mint_fee_pct: 0,
            burn_fee_pct: 0,
            rollover_reward_pct: 0,
        }
    }
}

/// Deviation ratio observed before and after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationRange {
    pub before: i64,
    pub after: i64,
}

impl DeviationRange {
    pub fn ordered(&self) -> (i64, i64) {
        (self.before.min(self.after), self.before.max(self.after))
    }
}

/// A [`FeeSchedule`] that passed validation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(try_from = "FeeSchedule", into = "FeeSchedule")]
pub struct FeePolicy {
    schedule: FeeSchedule,
}

impl TryFrom<FeeSchedule> for FeePolicy {
    type Error = ReserveError;

    fn try_from(schedule: FeeSchedule) -> Result<Self> {
        FeePolicy::new(schedule)
    }
}

impl From<FeePolicy> for FeeSchedule {
    fn from(policy: FeePolicy) -> Self {
        policy.schedule
    }
}

impl FeePolicy {
    pub fn new(schedule: FeeSchedule) -> Result<Self> {
        match &schedule {
            FeeSchedule::Fixed {
                mint_fee_pct,
                burn_fee_pct,
                ..
            } => check_pair(*mint_fee_pct, *burn_fee_pct, 0)?,
            FeeSchedule::Curve {
                mint,
                burn,
                rollover,
                domain,
            } => {
                if domain.0 > domain.1 {
                    return Err(ReserveError::InvalidCurve("domain bounds out of order"));
                }
                mint.validate()?;
                burn.validate()?;
                rollover.validate()?;
                for x in vertices(&[mint, burn], *domain) {
                    check_pair(left_value(mint, x)?, left_value(burn, x)?, x)?;
                    check_pair(right_value(mint, x)?, right_value(burn, x)?, x)?;
                }
            }
        }
        Ok(Self { schedule })
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    pub fn mint_fee(&self, amount: u64, dr: DeviationRange) -> Result<i128> {
        let pct = match &self.schedule {
            FeeSchedule::Fixed { mint_fee_pct, .. } => *mint_fee_pct,
            FeeSchedule::Curve { mint, domain, .. } => curve_pct(mint, *domain, dr)?,
        };
        signed_perc_of(pct, amount)
    }

    pub fn burn_fee(&self, amount: u64, dr: DeviationRange) -> Result<i128> {
        let pct = match &self.schedule {
            FeeSchedule::Fixed { burn_fee_pct, .. } => *burn_fee_pct,
            FeeSchedule::Curve { burn, domain, .. } => curve_pct(burn, *domain, dr)?,
        };
        signed_perc_of(pct, amount)
    }

    /// Percentage of the caller's pro-rata share of the reward pool, where
    /// the share is `pool_balance * amount / perp_supply`.
    pub fn rollover_reward(&self, amount: u64, pool_balance: u64, perp_supply: u64, dr: DeviationRange) -> Result<i128> {
        if perp_supply == 0 {
            return Ok(0);
        }
        let pct = match &self.schedule {
            FeeSchedule::Fixed {
                rollover_reward_pct, ..
            } => *rollover_reward_pct,
            FeeSchedule::Curve { rollover, domain, .. } => curve_pct(rollover, *domain, dr)?,
        };
        let share = mul_div(pool_balance, amount, perp_supply)?;
        signed_perc_of(pct, share)
    }
}

fn check_pair(mint_pct: i64, burn_pct: i64, at: i64) -> Result<()> {
    let rebate_possible = mint_pct < 0 || burn_pct < 0;
    if rebate_possible && (mint_pct as i128 + burn_pct as i128) <= 0 {
        return Err(ReserveError::FeePairLeaksValue { mint_pct, burn_pct, at });
    }
    Ok(())
}

fn curve_pct(curve: &PiecewiseCurve, domain: (i64, i64), dr: DeviationRange) -> Result<i64> {
    let (lo, hi) = dr.ordered();
    curve.average(lo.clamp(domain.0, domain.1), hi.clamp(domain.0, domain.1))
}

/// Domain ends plus every breakpoint inside the domain. Between two
/// consecutive vertices both curves are linear, so their sum is extremal at
/// these points.
fn vertices(curves: &[&PiecewiseCurve], domain: (i64, i64)) -> Vec<i64> {
    let mut xs = vec![domain.0, domain.1];
    for c in curves {
        for b in [c.breakpoints.0, c.breakpoints.1] {
            if b > domain.0 && b < domain.1 {
                xs.push(b);
            }
        }
    }
    xs.sort_unstable();
    xs.dedup();
    xs
}

fn left_value(c: &PiecewiseCurve, x: i64) -> Result<i64> {
    let (b1, b2) = c.breakpoints;
    if x <= b1 {
        c.seg1.evaluate(x)
    } else if x <= b2 {
        c.seg2.evaluate(x)
    } else {
        c.seg3.evaluate(x)
    }
}

fn right_value(c: &PiecewiseCurve, x: i64) -> Result<i64> {
    let (b1, b2) = c.breakpoints;
    if x < b1 {
        c.seg1.evaluate(x)
    } else if x < b2 {
        c.seg2.evaluate(x)
    } else {
        c.seg3.evaluate(x)
    }
}
