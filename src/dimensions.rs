//! Physical dimensions as exponents of the seven SI base units.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

/// Exponents of `[mass, length, time, temperature, moles, current, luminous intensity]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensions([i8; 7]);

impl Dimensions {
    pub const DIMLESS: Self = Self([0; 7]);
    pub const MASS: Self = Self([1, 0, 0, 0, 0, 0, 0]);
    pub const LENGTH: Self = Self([0, 1, 0, 0, 0, 0, 0]);
    pub const TIME: Self = Self([0, 0, 1, 0, 0, 0, 0]);
    pub const TEMPERATURE: Self = Self([0, 0, 0, 1, 0, 0, 0]);
    pub const AREA: Self = Self([0, 2, 0, 0, 0, 0, 0]);
    pub const VOLUME: Self = Self([0, 3, 0, 0, 0, 0, 0]);
    pub const VELOCITY: Self = Self([0, 1, -1, 0, 0, 0, 0]);
    pub const DENSITY: Self = Self([1, -3, 0, 0, 0, 0, 0]);
    pub const PRESSURE: Self = Self([1, -1, -2, 0, 0, 0, 0]);
    /// Kinematic viscosity or diffusivity, `m^2/s`.
    pub const DIFFUSIVITY: Self = Self([0, 2, -1, 0, 0, 0, 0]);
    /// Volumetric face flux, `m^3/s`.
    pub const VOLUMETRIC_FLUX: Self = Self([0, 3, -1, 0, 0, 0, 0]);

    pub const fn new(
        mass: i8,
        length: i8,
        time: i8,
        temperature: i8,
        moles: i8,
        current: i8,
        luminous_intensity: i8,
    ) -> Self {
        Self([mass, length, time, temperature, moles, current, luminous_intensity])
    }

    pub fn exponents(&self) -> [i8; 7] {
        self.0
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::DIMLESS
    }

    pub fn pow(&self, n: i8) -> Self {
        Self(self.0.map(|e| e * n))
    }

    pub fn recip(&self) -> Self {
        Self::DIMLESS / *self
    }
}

impl Mul for Dimensions {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut exponents = self.0;
        for (e, r) in exponents.iter_mut().zip(rhs.0) {
            *e += r;
        }
        Self(exponents)
    }
}

impl Div for Dimensions {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let mut exponents = self.0;
        for (e, r) in exponents.iter_mut().zip(rhs.0) {
            *e -= r;
        }
        Self(exponents)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [m, l, t, k, n, a, j] = self.0;
        write!(f, "[{} {} {} {} {} {} {}]", m, l, t, k, n, a, j)
    }
}

/// A named, dimensioned uniform value, such as a constant diffusivity.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimensioned<T> {
    pub name: String,
    pub dimensions: Dimensions,
    pub value: T,
}

impl<T> Dimensioned<T> {
    pub fn new(name: impl Into<String>, dimensions: Dimensions, value: T) -> Self {
        Self {
            name: name.into(),
            dimensions,
            value,
        }
    }
}
