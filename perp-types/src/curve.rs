//! Three-segment piecewise-linear curves over signed fixed-point values.
//!
//! Used to turn a before/after deviation ratio into a fee or reward
//! percentage that varies continuously across the breakpoints.

use crate::error::{ReserveError, Result};
use serde::{Deserialize, Serialize};

/// Line through `(x1, y1)` and `(x2, y2)`, extended in both directions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl LineSegment {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Result<Self> {
        let seg = Self { x1, y1, x2, y2 };
        seg.validate()?;
        Ok(seg)
    }

    pub const fn flat(y: i64) -> Self {
        Self { x1: 0, y1: y, x2: 1, y2: y }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_flat() && self.x1 == self.x2 {
            return Err(ReserveError::InvalidCurve("vertical segment"));
        }
        Ok(())
    }

    pub fn is_flat(&self) -> bool {
        self.y1 == self.y2
    }

    /// `y` at `x`. Flat segments return `y1` without dividing.
    pub fn evaluate(&self, x: i64) -> Result<i64> {
        if self.is_flat() {
            return Ok(self.y1);
        }
        self.interpolate(x as i128 - self.x1 as i128, 1)
    }

    /// Mean height over `[x_lower, x_upper]`, i.e. the line at the midpoint.
    pub fn average_y(&self, x_lower: i64, x_upper: i64) -> Result<i64> {
        if self.is_flat() {
            return Ok(self.y1);
        }
        // Midpoint offset is kept doubled so the halving folds into the
        // single division.
        let doubled = x_lower as i128 + x_upper as i128 - 2 * self.x1 as i128;
        self.interpolate(doubled, 2)
    }

    fn interpolate(&self, dx: i128, dx_scale: i128) -> Result<i64> {
        let run = (self.x2 as i128 - self.x1 as i128) * dx_scale;
        if run == 0 {
            return Err(ReserveError::InvalidCurve("vertical segment"));
        }
        let rise = self.y2 as i128 - self.y1 as i128;
        let y = self.y1 as i128 + rise.checked_mul(dx).ok_or(ReserveError::Overflow)? / run;
        i64::try_from(y).map_err(|_| ReserveError::Overflow)
    }
}

/// Where a range `[lower, upper]` sits relative to the two breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    Below,
    StraddleLower,
    Middle,
    StraddleUpper,
    Above,
}

impl RangePosition {
    pub fn classify(breakpoints: (i64, i64), lower: i64, upper: i64) -> Result<Self> {
        let (b1, b2) = breakpoints;
        if lower > upper {
            return Err(ReserveError::InvalidRange { lower, upper });
        }
        if upper <= b1 {
            Ok(Self::Below)
        } else if lower >= b2 {
            Ok(Self::Above)
        } else if lower >= b1 && upper <= b2 {
            Ok(Self::Middle)
        } else if lower < b1 && upper <= b2 {
            Ok(Self::StraddleLower)
        } else if lower >= b1 && upper > b2 {
            Ok(Self::StraddleUpper)
        } else {
            Err(ReserveError::UnsupportedRange)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiecewiseCurve {
    pub seg1: LineSegment,
    pub seg2: LineSegment,
    pub seg3: LineSegment,
    /// `(lower, upper)`; `seg1` applies up to `lower`, `seg3` from `upper`.
    pub breakpoints: (i64, i64),
}

impl PiecewiseCurve {
    pub fn new(seg1: LineSegment, seg2: LineSegment, seg3: LineSegment, breakpoints: (i64, i64)) -> Result<Self> {
        let curve = Self {
            seg1,
            seg2,
            seg3,
            breakpoints,
        };
        curve.validate()?;
        Ok(curve)
    }

    /// A curve that is `y` everywhere.
    pub const fn constant(y: i64) -> Self {
        Self {
            seg1: LineSegment::flat(y),
            seg2: LineSegment::flat(y),
            seg3: LineSegment::flat(y),
            breakpoints: (0, 0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.breakpoints.0 > self.breakpoints.1 {
            return Err(ReserveError::InvalidCurve("breakpoints out of order"));
        }
        self.seg1.validate()?;
        self.seg2.validate()?;
        self.seg3.validate()
    }

    pub fn evaluate(&self, x: i64) -> Result<i64> {
        let (b1, b2) = self.breakpoints;
        if x <= b1 {
            self.seg1.evaluate(x)
        } else if x >= b2 {
            self.seg3.evaluate(x)
        } else {
            self.seg2.evaluate(x)
        }
    }

    pub fn average(&self, lower: i64, upper: i64) -> Result<i64> {
        piecewise_average(&self.seg1, &self.seg2, &self.seg3, self.breakpoints, (lower, upper))
    }
}

/// Width-weighted mean of the segments the range overlaps. A range may
/// cross at most one breakpoint.
pub fn piecewise_average(
    seg1: &LineSegment,
    seg2: &LineSegment,
    seg3: &LineSegment,
    breakpoints: (i64, i64),
    range: (i64, i64),
) -> Result<i64> {
    let (lower, upper) = range;
    let (b1, b2) = breakpoints;
    match RangePosition::classify(breakpoints, lower, upper)? {
        RangePosition::Below => seg1.average_y(lower, upper),
        RangePosition::Middle => seg2.average_y(lower, upper),
        RangePosition::Above => seg3.average_y(lower, upper),
        RangePosition::StraddleLower => blend(
            (seg1.average_y(lower, b1)?, b1 as i128 - lower as i128),
            (seg2.average_y(b1, upper)?, upper as i128 - b1 as i128),
        ),
        RangePosition::StraddleUpper => blend(
            (seg2.average_y(lower, b2)?, b2 as i128 - lower as i128),
            (seg3.average_y(b2, upper)?, upper as i128 - b2 as i128),
        ),
    }
}

fn blend((y_a, w_a): (i64, i128), (y_b, w_b): (i64, i128)) -> Result<i64> {
    let num = (y_a as i128)
        .checked_mul(w_a)
        .and_then(|a| (y_b as i128).checked_mul(w_b).and_then(|b| a.checked_add(b)))
        .ok_or(ReserveError::Overflow)?;
    // Straddling ranges always have positive width on both sides.
    let y = num / (w_a + w_b);
    i64::try_from(y).map_err(|_| ReserveError::Overflow)
}
