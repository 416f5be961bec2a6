//! Face interpolation and convection schemes.
//!
//! An [`InterpolationScheme`] produces owner weights for every face, optionally together with
//! an explicit correction of the interpolated values. A [`ConvectionScheme`] uses an
//! interpolation scheme to discretise `div(phi, vf)`, either implicitly into an
//! [`FvMatrix`] or explicitly.
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::fvc;
use crate::interpolation::interpolate_with_weights;
use crate::matrix::FvMatrix;
use crate::schemes::{SchemeFamily, SchemeValue};
use crate::Real;
use eyre::WrapErr;
use itertools::izip;
use numeric_literals::replace_float_literals;
use std::fmt::Debug;

mod limited;
mod multivariate;

pub use limited::{limiter_from_stream, LimitedLinear, LimitedScheme, Limiter, Minmod, Muscl, SuperBee, VanLeer};
pub use multivariate::MultivariateScheme;

/// One for non-negative values, zero otherwise.
pub(crate) fn pos0<T: Real>(x: T) -> T {
    if x >= T::zero() {
        T::one()
    } else {
        T::zero()
    }
}

fn require_flux<'a, T: Real>(
    flux: Option<&'a SurfaceField<T, T>>,
    scheme: &'static str,
) -> Result<&'a SurfaceField<T, T>, SchemeError> {
    flux.ok_or(SchemeError::FluxRequired { scheme })
}

/// Owner weights `pos0(phi)`: the owner value where the flux leaves the owner.
pub(crate) fn upwind_weights<T: Real>(phi: &SurfaceField<T, T>) -> SurfaceField<T, T> {
    phi.map("upwindWeights", Dimensions::DIMLESS, pos0)
}

/// Interpolation of cell values to faces.
pub trait InterpolationScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn name(&self) -> &'static str;

    /// Owner weights of every face. Schemes that depend on the flow direction require `flux`.
    fn weights(
        &self,
        fv_mesh: &FvMesh<T>,
        vf: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, T>>;

    /// Whether the scheme adds an explicit correction to the weighted values.
    fn corrected(&self) -> bool {
        false
    }

    fn correction(
        &self,
        _fv_mesh: &FvMesh<T>,
        _vf: &VolField<T, V>,
        _flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<Option<SurfaceField<T, V>>> {
        Ok(None)
    }

    /// The limiter of limited schemes: one means the underlying high order scheme, zero upwind.
    fn limiter(
        &self,
        _fv_mesh: &FvMesh<T>,
        _vf: &VolField<T, V>,
        _flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<Option<SurfaceField<T, T>>> {
        Ok(None)
    }

    fn interpolate(
        &self,
        fv_mesh: &FvMesh<T>,
        vf: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, V>> {
        let weights = self.weights(fv_mesh, vf, flux)?;
        let mut face_values = interpolate_with_weights(fv_mesh, vf, &weights);
        if self.corrected() {
            if let Some(correction) = self.correction(fv_mesh, vf, flux)? {
                face_values.add_field(&correction);
            }
        }
        Ok(face_values)
    }
}

/// Central differencing with the geometric weights.
#[derive(Debug, Copy, Clone, Default)]
pub struct Linear;

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn weights(&self, fv_mesh: &FvMesh<T>, _: &VolField<T, V>, _: Option<&SurfaceField<T, T>>) -> eyre::Result<SurfaceField<T, T>> {
        Ok(fv_mesh.interpolation().weights().clone())
    }
}

/// Arithmetic mean of the two adjacent cells, regardless of geometry.
#[derive(Debug, Copy, Clone, Default)]
pub struct MidPoint;

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for MidPoint {
    fn name(&self) -> &'static str {
        "midPoint"
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn weights(&self, fv_mesh: &FvMesh<T>, _: &VolField<T, V>, _: Option<&SurfaceField<T, T>>) -> eyre::Result<SurfaceField<T, T>> {
        let mesh = fv_mesh.mesh();
        Ok(SurfaceField::from_face_fn(mesh, "midPointWeights", Dimensions::DIMLESS, |face| {
            let coupled = mesh
                .face_patch(face)
                .map_or(true, |patch| mesh.patch(patch).is_coupled());
            if coupled {
                0.5
            } else {
                1.0
            }
        }))
    }
}

/// First order upwind: the face takes the value of the cell the flux comes from.
#[derive(Debug, Copy, Clone, Default)]
pub struct Upwind;

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for Upwind {
    fn name(&self) -> &'static str {
        "upwind"
    }

    fn weights(
        &self,
        _fv_mesh: &FvMesh<T>,
        _: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, T>> {
        let phi = require_flux(flux, "upwind")?;
        Ok(upwind_weights(phi))
    }
}

/// The face takes the value of the cell the flux goes to. Unconditionally unstable on its own.
#[derive(Debug, Copy, Clone, Default)]
pub struct Downwind;

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for Downwind {
    fn name(&self) -> &'static str {
        "downwind"
    }

    fn weights(
        &self,
        _fv_mesh: &FvMesh<T>,
        _: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, T>> {
        let phi = require_flux(flux, "downwind")?;
        Ok(phi.map("downwindWeights", Dimensions::DIMLESS, |f| T::one() - pos0(f)))
    }
}

/// Upwind weights with a second order correction extrapolating the upwind cell value to the
/// face with the cell gradient.
#[derive(Debug, Clone)]
pub struct LinearUpwind {
    grad_key: String,
}

impl LinearUpwind {
    /// `grad_key` names the `gradSchemes` entry used for the cell gradient.
    pub fn new(grad_key: impl Into<String>) -> Self {
        Self {
            grad_key: grad_key.into(),
        }
    }

    pub fn grad_key(&self) -> &str {
        &self.grad_key
    }
}

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for LinearUpwind {
    fn name(&self) -> &'static str {
        "linearUpwind"
    }

    fn weights(
        &self,
        _fv_mesh: &FvMesh<T>,
        _: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, T>> {
        let phi = require_flux(flux, "linearUpwind")?;
        Ok(upwind_weights(phi))
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(
        &self,
        fv_mesh: &FvMesh<T>,
        vf: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<Option<SurfaceField<T, V>>> {
        let phi = require_flux(flux, "linearUpwind")?;
        let grad = fvc::grad_with_key(fv_mesh, vf, &self.grad_key)?;
        let mesh = fv_mesh.mesh();
        let centres = mesh.cell_centres();
        let face_centres = mesh.face_centres();
        let g = grad.internal_values();

        let internal = izip!(phi.internal_values(), mesh.owner(), mesh.neighbour())
            .enumerate()
            .map(|(face, (&flux, &own, &nei))| {
                if flux > T::zero() {
                    V::grad_dot(&(face_centres[face] - centres[own]), &g[own])
                } else {
                    V::grad_dot(&(face_centres[face] - centres[nei]), &g[nei])
                }
            })
            .collect();

        let interpolation = fv_mesh.interpolation();
        let boundary = (0..mesh.patches().len())
            .map(|patch| {
                let info = mesh.patch(patch);
                let face_cells = mesh.patch_face_cells(patch);
                match grad.patch_neighbour_values(fv_mesh, patch) {
                    Some(neighbour_grad) if info.is_coupled() => izip!(
                        info.face_range(),
                        face_cells,
                        phi.boundary_values(patch),
                        &neighbour_grad,
                        interpolation.deltas().boundary_values(patch)
                    )
                    .map(|(face, &cell, &flux, g_nei, d)| {
                        if flux > T::zero() {
                            V::grad_dot(&(face_centres[face] - centres[cell]), &g[cell])
                        } else {
                            let neighbour_centre = centres[cell] + d;
                            V::grad_dot(&(face_centres[face] - neighbour_centre), g_nei)
                        }
                    })
                    .collect(),
                    _ => vec![V::zero(); info.size()],
                }
            })
            .collect();

        let correction = SurfaceField::new(mesh, "linearUpwindCorrection", vf.dimensions(), internal, boundary)?;
        Ok(Some(correction))
    }
}

/// Interpolation with precomputed weights, e.g. the shared weights of a multivariate selection.
#[derive(Debug, Clone)]
pub struct FixedWeights<T: Real> {
    name: &'static str,
    weights: SurfaceField<T, T>,
}

impl<T: Real> FixedWeights<T> {
    pub fn new(name: &'static str, weights: SurfaceField<T, T>) -> Self {
        Self { name, weights }
    }
}

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for FixedWeights<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn weights(&self, _: &FvMesh<T>, _: &VolField<T, V>, _: Option<&SurfaceField<T, T>>) -> eyre::Result<SurfaceField<T, T>> {
        Ok(self.weights.clone())
    }
}

/// Discretisation of the convection term `div(phi, vf)`.
pub trait ConvectionScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn interpolation_scheme(&self) -> &dyn InterpolationScheme<T, V>;

    /// Face values of `vf` transported by `phi`.
    fn interpolate(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<SurfaceField<T, V>> {
        self.interpolation_scheme().interpolate(fv_mesh, vf, Some(phi))
    }

    /// Face fluxes `phi * vf_f`.
    fn flux(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<SurfaceField<T, V>> {
        let face_values = self.interpolate(fv_mesh, phi, vf)?;
        Ok(phi.zip_map(
            &face_values,
            format!("flux({},{})", phi.name(), vf.name()),
            phi.dimensions() * vf.dimensions(),
            |flux, value| value * flux,
        ))
    }

    fn fvm_div(&self, fv_mesh: &FvMesh<T>, phi: &SurfaceField<T, T>, vf: &VolField<T, V>)
        -> eyre::Result<FvMatrix<T, V>>;

    fn fvc_div(&self, fv_mesh: &FvMesh<T>, phi: &SurfaceField<T, T>, vf: &VolField<T, V>)
        -> eyre::Result<VolField<T, V>> {
        let flux = self.flux(fv_mesh, phi, vf)?;
        let mut div = fvc::surface_integrate(fv_mesh, &flux)?;
        div.rename(format!("div({},{})", phi.name(), vf.name()));
        Ok(div)
    }
}

/// Gauss theorem with face values from an interpolation scheme.
#[derive(Debug)]
pub struct GaussConvectionScheme<T: Real, V: SchemeValue<T>> {
    interpolation: Box<dyn InterpolationScheme<T, V>>,
}

impl<T: Real, V: SchemeValue<T>> GaussConvectionScheme<T, V> {
    pub fn new(interpolation: Box<dyn InterpolationScheme<T, V>>) -> Self {
        Self { interpolation }
    }
}

impl<T: Real, V: SchemeValue<T>> ConvectionScheme<T, V> for GaussConvectionScheme<T, V> {
    fn interpolation_scheme(&self) -> &dyn InterpolationScheme<T, V> {
        self.interpolation.as_ref()
    }

    fn fvm_div(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let mesh = fv_mesh.mesh();
        let weights = self
            .interpolation
            .weights(fv_mesh, vf, Some(phi))
            .wrap_err_with(|| format!("Failed to compute {} weights for `{}`", self.interpolation.name(), vf.name()))?;

        let mut matrix = FvMatrix::new(mesh, vf.name(), phi.dimensions() * vf.dimensions());
        let lower: Vec<T> = izip!(weights.internal_values(), phi.internal_values())
            .map(|(&w, &flux)| -w * flux)
            .collect();
        let upper: Vec<T> = izip!(&lower, phi.internal_values())
            .map(|(&lower, &flux)| lower + flux)
            .collect();
        matrix.lower_mut().copy_from_slice(&lower);
        matrix.upper_mut().copy_from_slice(&upper);
        matrix.neg_sum_diag(mesh);

        for patch in 0..mesh.patches().len() {
            let patch_field = vf.patch_field(patch);
            let patch_weights = weights.boundary_values(patch);
            let patch_flux = phi.boundary_values(patch);
            let internal_coeffs = patch_field.value_internal_coeffs(fv_mesh, patch_weights)?;
            let boundary_coeffs = patch_field.value_boundary_coeffs(fv_mesh, patch_weights, vf.internal_values())?;
            matrix.internal_coeffs_mut(patch).copy_from_slice(
                &izip!(internal_coeffs, patch_flux)
                    .map(|(c, &flux)| c * flux)
                    .collect::<Vec<_>>(),
            );
            matrix.boundary_coeffs_mut(patch).copy_from_slice(
                &izip!(boundary_coeffs, patch_flux)
                    .map(|(c, &flux)| -(c * flux))
                    .collect::<Vec<_>>(),
            );
        }

        if self.interpolation.corrected() {
            if let Some(correction) = self.interpolation.correction(fv_mesh, vf, Some(phi))? {
                let corrected_flux = phi.zip_map(&correction, "fluxCorrection", matrix.dimensions(), |flux, c| c * flux);
                matrix.add_explicit(fv_mesh, &fvc::surface_integrate_values(fv_mesh, &corrected_flux));
            }
        }
        Ok(matrix)
    }
}

/// Convection with the continuity error `div(phi) vf` removed, for fluxes that are only
/// conservative at convergence.
#[derive(Debug)]
pub struct BoundedConvectionScheme<T: Real, V: SchemeValue<T>> {
    inner: Box<dyn ConvectionScheme<T, V>>,
}

impl<T: Real, V: SchemeValue<T>> BoundedConvectionScheme<T, V> {
    pub fn new(inner: Box<dyn ConvectionScheme<T, V>>) -> Self {
        Self { inner }
    }
}

impl<T: Real, V: SchemeValue<T>> ConvectionScheme<T, V> for BoundedConvectionScheme<T, V> {
    fn interpolation_scheme(&self) -> &dyn InterpolationScheme<T, V> {
        self.inner.interpolation_scheme()
    }

    fn interpolate(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<SurfaceField<T, V>> {
        self.inner.interpolate(fv_mesh, phi, vf)
    }

    fn fvm_div(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let mut matrix = self.inner.fvm_div(fv_mesh, phi, vf)?;
        let div_phi = fvc::surface_integrate_values(fv_mesh, phi);
        let volumes = fv_mesh.mesh().cell_volumes();
        for (diag, &div, &volume) in izip!(matrix.diag_mut(), &div_phi, volumes) {
            *diag -= volume * div;
        }
        Ok(matrix)
    }

    fn fvc_div(
        &self,
        fv_mesh: &FvMesh<T>,
        phi: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let mut div = self.inner.fvc_div(fv_mesh, phi, vf)?;
        let div_phi = fvc::surface_integrate_values(fv_mesh, phi);
        for (value, &d, &v) in izip!(div.internal_values_mut(), &div_phi, vf.internal_values()) {
            *value -= v * d;
        }
        div.correct_boundary_conditions(fv_mesh)?;
        Ok(div)
    }
}

pub(crate) fn register_interpolation_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn InterpolationScheme<T, V>>>,
) {
    family.register("linear", |_, _| Ok(Box::new(Linear)));
    family.register("midPoint", |_, _| Ok(Box::new(MidPoint)));
    family.register("upwind", |_, _| Ok(Box::new(Upwind)));
    family.register("downwind", |_, _| Ok(Box::new(Downwind)));
    family.register("linearUpwind", |schemes, stream| {
        let grad_key = stream.next_word("gradient scheme key")?;
        // Resolving the gradient scheme here reports a bad entry at selection time
        schemes.grad_scheme::<V>(grad_key)?;
        Ok(Box::new(LinearUpwind::new(grad_key)))
    });
    limited::register_limited_schemes(family);
}

pub(crate) fn register_convection_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn ConvectionScheme<T, V>>>,
) {
    family.register("Gauss", |schemes, stream| {
        let interpolation = V::registry(schemes).interpolation.parse(schemes, stream)?;
        Ok(Box::new(GaussConvectionScheme::new(interpolation)))
    });
    family.register("bounded", |schemes, stream| {
        let inner = V::registry(schemes).convection.parse(schemes, stream)?;
        Ok(Box::new(BoundedConvectionScheme::new(inner)))
    });
}
