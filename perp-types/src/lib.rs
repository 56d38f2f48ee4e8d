pub mod address;
pub mod bond;
pub mod curve;
pub mod error;
pub mod fixed;
pub mod queue;

pub use address::{Address, ClassId};
pub use bond::{BondInstance, Tranche, TRANCHE_RATIO_GRANULARITY};
pub use curve::{piecewise_average, LineSegment, PiecewiseCurve, RangePosition};
pub use error::{ErrorKind, ReserveError, Result};
pub use queue::BondQueue;
