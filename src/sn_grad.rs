//! Surface-normal gradient schemes.
//!
//! The normal gradient of a face is split into an implicit part, the difference of the
//! neighbour and owner values times the scheme's distance coefficients, and an optional
//! explicit correction for non-orthogonal meshes computed from the cell gradient.
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::fvc;
use crate::interpolation::linear_interpolate;
use crate::schemes::{FvSchemes, SchemeFamily, SchemeStream, SchemeValue};
use crate::Real;
use itertools::izip;
use log::debug;
use std::fmt::Debug;

pub trait SnGradScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn name(&self) -> &'static str;

    /// Coefficients multiplying the difference of the neighbour and owner values.
    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> SurfaceField<T, T>;

    /// Whether the scheme adds an explicit correction.
    fn corrected(&self) -> bool {
        false
    }

    fn correction(&self, _fv_mesh: &FvMesh<T>, _vf: &VolField<T, V>) -> eyre::Result<Option<SurfaceField<T, V>>> {
        Ok(None)
    }

    /// The full explicit normal gradient, named `snGrad(<name of vf>)`.
    fn sn_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<SurfaceField<T, V>> {
        let mut sn_grad = sn_grad_with_delta_coeffs(fv_mesh, vf, &self.delta_coeffs(fv_mesh, vf));
        if self.corrected() {
            if let Some(correction) = self.correction(fv_mesh, vf)? {
                sn_grad.add_field(&correction);
            }
        }
        sn_grad.rename(format!("snGrad({})", vf.name()));
        Ok(sn_grad)
    }
}

/// `(φ_N - φ_P) δ` on internal faces. Patch faces take the normal gradient of the boundary
/// condition; coupled patches use the given `δ` like internal faces.
pub fn sn_grad_with_delta_coeffs<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    delta_coeffs: &SurfaceField<T, T>,
) -> SurfaceField<T, V> {
    let mesh = fv_mesh.mesh();
    let values = vf.internal_values();
    let internal = izip!(mesh.owner(), mesh.neighbour(), delta_coeffs.internal_values())
        .map(|(&own, &nei, &delta)| (values[nei] - values[own]) * delta)
        .collect();
    let boundary = vf
        .boundary_field()
        .iter()
        .enumerate()
        .map(|(patch, patch_field)| patch_field.sn_grad_with(fv_mesh, delta_coeffs.boundary_values(patch), values))
        .collect();
    SurfaceField::new(
        mesh,
        format!("snGrad({})", vf.name()),
        vf.dimensions() / Dimensions::LENGTH,
        internal,
        boundary,
    )
    .expect("Internal error: normal gradient must match mesh sizes")
}

/// The non-orthogonal correction `k · (grad φ)_f`, with the correction vectors `k` of the
/// mesh and the linearly interpolated cell gradient of the `grad(<name>)` scheme.
pub fn full_gradient_correction<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<SurfaceField<T, V>> {
    let grad = fvc::grad(fv_mesh, vf)?;
    let face_grad = linear_interpolate(fv_mesh, &grad);
    let interpolation = fv_mesh.interpolation();
    Ok(interpolation.non_orth_correction_vectors().zip_map(
        &face_grad,
        format!("snGradCorr({})", vf.name()),
        vf.dimensions() / Dimensions::LENGTH,
        |k, g| V::grad_dot(&k, &g),
    ))
}

/// Implicit part only, with the non-orthogonal distance coefficients.
#[derive(Debug, Copy, Clone, Default)]
pub struct Uncorrected;

impl<T: Real, V: SchemeValue<T>> SnGradScheme<T, V> for Uncorrected {
    fn name(&self) -> &'static str {
        "uncorrected"
    }

    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, _: &VolField<T, V>) -> SurfaceField<T, T> {
        fv_mesh.interpolation().non_orth_delta_coeffs().clone()
    }
}

/// Implicit part only, with the plain inverse centre distances. Only consistent on
/// orthogonal meshes.
#[derive(Debug, Copy, Clone, Default)]
pub struct Orthogonal;

impl<T: Real, V: SchemeValue<T>> SnGradScheme<T, V> for Orthogonal {
    fn name(&self) -> &'static str {
        "orthogonal"
    }

    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, _: &VolField<T, V>) -> SurfaceField<T, T> {
        fv_mesh.interpolation().delta_coeffs().clone()
    }
}

/// Implicit part plus the full explicit non-orthogonal correction.
#[derive(Debug, Copy, Clone, Default)]
pub struct Corrected;

impl<T: Real, V: SchemeValue<T>> SnGradScheme<T, V> for Corrected {
    fn name(&self) -> &'static str {
        "corrected"
    }

    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, _: &VolField<T, V>) -> SurfaceField<T, T> {
        fv_mesh.interpolation().non_orth_delta_coeffs().clone()
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<Option<SurfaceField<T, V>>> {
        full_gradient_correction(fv_mesh, vf).map(Some)
    }
}

/// Limits the correction of another scheme to at most `ψ / (1 - ψ)` times the implicit part.
///
/// `ψ = 0` gives the uncorrected scheme, `ψ = 1` the full correction.
#[derive(Debug)]
pub struct LimitedSnGrad<T: Real, V: SchemeValue<T>> {
    corrected: Box<dyn SnGradScheme<T, V>>,
    limit_coeff: T,
}

impl<T: Real, V: SchemeValue<T>> LimitedSnGrad<T, V> {
    pub fn new(corrected: Box<dyn SnGradScheme<T, V>>, limit_coeff: T) -> Self {
        Self {
            corrected,
            limit_coeff,
        }
    }

    pub fn limit_coeff(&self) -> T {
        self.limit_coeff
    }
}

impl<T: Real, V: SchemeValue<T>> SnGradScheme<T, V> for LimitedSnGrad<T, V> {
    fn name(&self) -> &'static str {
        "limited"
    }

    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> SurfaceField<T, T> {
        self.corrected.delta_coeffs(fv_mesh, vf)
    }

    fn corrected(&self) -> bool {
        self.corrected.corrected()
    }

    fn correction(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<Option<SurfaceField<T, V>>> {
        let correction = match self.corrected.correction(fv_mesh, vf)? {
            Some(correction) => correction,
            None => return Ok(None),
        };
        let small = fv_mesh.mesh().tolerances().small;
        let uncorrected = sn_grad_with_delta_coeffs(fv_mesh, vf, &self.delta_coeffs(fv_mesh, vf));
        let psi = self.limit_coeff;
        let limiter = uncorrected.zip_map(&correction, "limiter", Dimensions::DIMLESS, |sn, corr| {
            (psi * sn.mag() / ((T::one() - psi) * corr.mag() + small)).min(T::one())
        });
        Ok(Some(limiter.zip_map(
            &correction,
            correction.name().to_string(),
            correction.dimensions(),
            |l, corr| corr * l,
        )))
    }
}

/// Scales the explicit correction of another scheme by a constant factor, leaving the
/// implicit part unchanged.
#[derive(Debug)]
pub struct RelaxedSnGrad<T: Real, V: SchemeValue<T>> {
    corrected: Box<dyn SnGradScheme<T, V>>,
    factor: T,
}

impl<T: Real, V: SchemeValue<T>> RelaxedSnGrad<T, V> {
    pub fn new(corrected: Box<dyn SnGradScheme<T, V>>, factor: T) -> Self {
        Self { corrected, factor }
    }

    pub fn factor(&self) -> T {
        self.factor
    }
}

impl<T: Real, V: SchemeValue<T>> SnGradScheme<T, V> for RelaxedSnGrad<T, V> {
    fn name(&self) -> &'static str {
        "relaxed"
    }

    fn delta_coeffs(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> SurfaceField<T, T> {
        self.corrected.delta_coeffs(fv_mesh, vf)
    }

    fn corrected(&self) -> bool {
        self.corrected.corrected()
    }

    fn correction(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<Option<SurfaceField<T, V>>> {
        let mut correction = self.corrected.correction(fv_mesh, vf)?;
        if let Some(correction) = &mut correction {
            correction.scale(self.factor);
        }
        Ok(correction)
    }
}

/// Reads the corrected scheme wrapped by `limited` and `relaxed`: either a scheme name, or
/// nothing (meaning `corrected`) before the coefficient.
fn parse_wrapped<T: Real, V: SchemeValue<T>>(
    schemes: &FvSchemes<T>,
    stream: &mut SchemeStream<'_>,
) -> Result<Box<dyn SnGradScheme<T, V>>, SchemeError> {
    if stream.peek_is_number() {
        Ok(Box::new(Corrected))
    } else {
        V::registry(schemes).sn_grad.parse(schemes, stream)
    }
}

pub(crate) fn register_sn_grad_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn SnGradScheme<T, V>>>,
) {
    family.register("uncorrected", |_, _| Ok(Box::new(Uncorrected)));
    family.register("orthogonal", |_, _| Ok(Box::new(Orthogonal)));
    family.register("corrected", |_, _| Ok(Box::new(Corrected)));
    family.register("limited", |schemes, stream| {
        let corrected = parse_wrapped::<T, V>(schemes, stream)?;
        let limit_coeff = stream.read_unit_coefficient("limitCoeff")?;
        debug!("Limited snGrad with limitCoeff {}", limit_coeff);
        Ok(Box::new(LimitedSnGrad::new(corrected, limit_coeff)))
    });
    family.register("relaxed", |schemes, stream| {
        let corrected = parse_wrapped::<T, V>(schemes, stream)?;
        let factor: T = stream.read_number("relaxation factor")?;
        if factor < T::zero() {
            return Err(SchemeError::CoefficientOutOfRange {
                coefficient: "relaxation factor",
                value: format!("{}", factor),
                range: "[0, inf)",
            });
        }
        Ok(Box::new(RelaxedSnGrad::new(corrected, factor)))
    });
}
