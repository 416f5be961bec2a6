//! Cell gradient schemes.
//!
//! A [`GradScheme`] computes the gradient of a cell field in every cell. The boundary values
//! of the resulting field are the gradients of the adjacent cells, with the normal component
//! replaced by the normal gradient of the boundary condition (see [`gradient_field`]).
use crate::convection::{InterpolationScheme, Linear};
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{patch_internal_values, Differentiable, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::schemes::{FvSchemes, SchemeFamily, SchemeStream, SchemeValue};
use crate::Real;
use eyre::WrapErr;
use itertools::izip;
use num::Zero;
use std::fmt::Debug;

mod least_squares;
mod limited;

pub use least_squares::{least_squares_vectors, LeastSquaresGrad, LeastSquaresVectors};
pub use limited::{CellLimitedGrad, CellMdLimitedGrad, FaceLimitedGrad};

pub trait GradScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn name(&self) -> &'static str;

    /// The gradient of `vf`, named `grad(<name of vf>)`.
    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>>;
}

/// Builds the gradient field from its cell values.
///
/// Coupled patches are evaluated like any derived field. On all other patches (except empty
/// ones) the gradient of the adjacent cell is corrected so that its normal component equals
/// the normal gradient of the boundary condition of `vf`.
pub fn gradient_field<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    cell_gradients: Vec<V::Gradient>,
) -> eyre::Result<VolField<T, V::Gradient>> {
    let mesh = fv_mesh.mesh();
    let mut grad = VolField::from_internal(
        fv_mesh,
        format!("grad({})", vf.name()),
        vf.dimensions() / Dimensions::LENGTH,
        cell_gradients,
    );
    grad.correct_boundary_conditions(fv_mesh)
        .wrap_err_with(|| format!("Failed to evaluate boundary conditions of `{}`", grad.name()))?;

    for patch in 0..mesh.patches().len() {
        let info = mesh.patch(patch);
        if info.is_coupled() || info.kind().is_empty() {
            continue;
        }
        let normals = fv_mesh.patch_normals(patch);
        let sn_grad = vf.patch_field(patch).sn_grad(fv_mesh, vf.internal_values());
        let cell_grad = patch_internal_values(mesh, patch, grad.internal_values());
        let corrected: Vec<_> = izip!(&normals, &sn_grad, &cell_grad)
            .map(|(n, &sn, g)| *g + V::outer(n, &(sn - V::grad_dot(n, g))))
            .collect();
        grad.patch_field_mut(patch).assign(&corrected);
    }
    Ok(grad)
}

/// Gauss theorem: the sum of face values times face area vectors, divided by the cell volume.
///
/// Faces of empty patches do not contribute.
pub fn gauss_grad_values<T: Real, V: Differentiable<T>>(
    fv_mesh: &FvMesh<T>,
    face_values: &SurfaceField<T, V>,
) -> Vec<V::Gradient> {
    let mesh = fv_mesh.mesh();
    let areas = mesh.face_areas();
    let mut grad = vec![V::Gradient::zero(); mesh.num_cells()];
    for (face, (&own, &nei, value)) in izip!(mesh.owner(), mesh.neighbour(), face_values.internal_values()).enumerate() {
        let flux = V::outer(&areas[face], value);
        grad[own] += flux;
        grad[nei] -= flux;
    }
    for (patch, info) in mesh.patches().iter().enumerate() {
        if info.kind().is_empty() {
            continue;
        }
        for (face, &cell, value) in izip!(info.face_range(), mesh.patch_face_cells(patch), face_values.boundary_values(patch)) {
            grad[cell] += V::outer(&areas[face], value);
        }
    }
    let tolerances = mesh.tolerances();
    for (g, &volume) in grad.iter_mut().zip(mesh.cell_volumes()) {
        *g *= T::one() / tolerances.floor_vsmall(volume);
    }
    grad
}

/// Gauss gradient with face values from an interpolation scheme.
#[derive(Debug)]
pub struct GaussGrad<T: Real, V: SchemeValue<T>> {
    interpolation: Box<dyn InterpolationScheme<T, V>>,
}

impl<T: Real, V: SchemeValue<T>> GaussGrad<T, V> {
    pub fn new(interpolation: Box<dyn InterpolationScheme<T, V>>) -> Self {
        Self { interpolation }
    }

    pub fn linear() -> Self {
        Self::new(Box::new(Linear))
    }

    pub fn interpolation_scheme(&self) -> &dyn InterpolationScheme<T, V> {
        self.interpolation.as_ref()
    }
}

impl<T: Real, V: SchemeValue<T>> GradScheme<T, V> for GaussGrad<T, V> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>> {
        let face_values = self
            .interpolation
            .interpolate(fv_mesh, vf, None)
            .wrap_err_with(|| format!("Failed to interpolate `{}` for its Gauss gradient", vf.name()))?;
        gradient_field(fv_mesh, vf, gauss_grad_values(fv_mesh, &face_values))
    }
}

/// The Gauss gradient with linear interpolation, independent of the scheme configuration.
pub(crate) fn gauss_linear_grad<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V::Gradient>> {
    GaussGrad::<T, V>::linear().calc_grad(fv_mesh, vf)
}

fn parse_gauss<T: Real, V: SchemeValue<T>>(
    schemes: &FvSchemes<T>,
    stream: &mut SchemeStream<'_>,
) -> Result<GaussGrad<T, V>, SchemeError> {
    // Without an interpolation scheme (possibly followed by a limiter coefficient) the
    // interpolation is linear
    if stream.is_empty() || stream.peek_is_number() {
        Ok(GaussGrad::linear())
    } else {
        let interpolation = V::registry(schemes).interpolation.parse(schemes, stream)?;
        Ok(GaussGrad::new(interpolation))
    }
}

pub(crate) fn register_grad_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn GradScheme<T, V>>>,
) {
    family.register("Gauss", |schemes, stream| Ok(Box::new(parse_gauss::<T, V>(schemes, stream)?)));
    family.register("leastSquares", |_, _| Ok(Box::new(LeastSquaresGrad)));
    family.register("cellLimited", |schemes, stream| {
        let inner = V::registry(schemes).grad.parse(schemes, stream)?;
        let k = stream.read_unit_coefficient("k")?;
        Ok(Box::new(CellLimitedGrad::new(inner, k)))
    });
    family.register("cellMDLimited", |schemes, stream| {
        let inner = V::registry(schemes).grad.parse(schemes, stream)?;
        let k = stream.read_unit_coefficient("k")?;
        Ok(Box::new(CellMdLimitedGrad::new(inner, k)))
    });
    family.register("faceLimited", |schemes, stream| {
        let inner = V::registry(schemes).grad.parse(schemes, stream)?;
        let k = stream.read_unit_coefficient("k")?;
        Ok(Box::new(FaceLimitedGrad::new(inner, k)))
    });
}
