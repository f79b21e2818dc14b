//! Poisson-process changepoint math utilities.

pub mod math;

pub use math::gamma::*;
pub use math::sampling::*;
pub use math::stable::*;
