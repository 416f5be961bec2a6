//! Small-number floors used to guard divisions by degenerate geometric quantities.
//!
//! The values are configurable rather than hard-coded: meshes routinely contain
//! near-degenerate faces and cells, and the floor that keeps a computation finite
//! depends on the floating-point precision in use. Changing a floor changes results
//! in the last bits, so two runs are only comparable when they use the same values.
use crate::Real;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tolerances<T> {
    /// Relative tolerance used when comparing quantities of order one.
    pub small: T,
    /// Smallest magnitude treated as non-zero in divisions.
    pub vsmall: T,
    /// Square root of `vsmall`, for quantities that are squared before use.
    pub rootvsmall: T,
}

impl<T: Real> Tolerances<T> {
    pub fn new(small: T, vsmall: T, rootvsmall: T) -> Self {
        assert!(small > T::zero(), "small must be positive");
        assert!(vsmall > T::zero(), "vsmall must be positive");
        assert!(rootvsmall > T::zero(), "rootvsmall must be positive");
        Self {
            small,
            vsmall,
            rootvsmall,
        }
    }

    /// Returns `value` with its magnitude raised to at least `vsmall`, keeping the sign.
    pub fn floor_vsmall(&self, value: T) -> T {
        floor_magnitude(value, self.vsmall)
    }

    /// Returns `value` with its magnitude raised to at least `rootvsmall`, keeping the sign.
    pub fn floor_rootvsmall(&self, value: T) -> T {
        floor_magnitude(value, self.rootvsmall)
    }
}

fn floor_magnitude<T: Real>(value: T, floor: T) -> T {
    if value.abs() >= floor {
        value
    } else if value < T::zero() {
        -floor
    } else {
        floor
    }
}

impl Default for Tolerances<f64> {
    fn default() -> Self {
        Self::new(1.0e-15, 1.0e-300, 1.0e-150)
    }
}

impl Default for Tolerances<f32> {
    fn default() -> Self {
        Self::new(1.0e-6, 1.0e-37, 1.0e-18)
    }
}
