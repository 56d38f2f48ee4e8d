#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use perp_types::{LineSegment, PiecewiseCurve, ReserveError};

#[derive(Arbitrary, Debug)]
struct CurveInput {
    ys: [i32; 6],
    b1: i32,
    gap: u16,
    lower: i32,
    width: u32,
}

fuzz_target!(|data: CurveInput| {
    let b1 = data.b1 as i64;
    let b2 = b1 + data.gap as i64;
    let y = data.ys.map(|v| v as i64);
    // Continuous at both breakpoints.
    let seg1 = LineSegment::flat(y[0]);
    let Ok(seg2) = LineSegment::new(b1, y[0], b2, y[1]) else {
        return;
    };
    let seg3 = LineSegment::flat(y[1]);
    let Ok(curve) = PiecewiseCurve::new(seg1, seg2, seg3, (b1, b2)) else {
        return;
    };

    let lower = data.lower as i64;
    let upper = lower + data.width as i64;
    match curve.average(lower, upper) {
        Ok(avg) => {
            let lo = y[0].min(y[1]);
            let hi = y[0].max(y[1]);
            assert!(avg >= lo && avg <= hi, "average {avg} outside [{lo}, {hi}]");
        }
        Err(ReserveError::UnsupportedRange) => assert!(lower < b1 && upper > b2),
        Err(ReserveError::Overflow) => {}
        Err(e) => panic!("unexpected error {e:?}"),
    }
});
