//! Gradient limiters that keep values extrapolated from the cell centre to its faces within
//! the range of the surrounding cell values.
//!
//! All limiters wrap another gradient scheme and act on every component of the value
//! separately. The coefficient `k ∈ [0, 1]` widens the admissible range by
//! `(1/k - 1)` times its width: `k = 1` enforces strict boundedness and `k = 0` switches
//! limiting off.
use crate::field::{FieldValue, VolField};
use crate::fv_mesh::FvMesh;
use crate::grad::{gradient_field, GradScheme};
use crate::schemes::SchemeValue;
use crate::Real;
use itertools::izip;
use nalgebra::Vector3;
use std::fmt::Debug;

/// Reduces `limiter` so that `extrapolate` stays within `[min_delta, max_delta]`.
fn limit_face<T: Real>(limiter: &mut T, max_delta: T, min_delta: T, extrapolate: T, vsmall: T) {
    if extrapolate > max_delta + vsmall {
        *limiter = limiter.min(max_delta / extrapolate);
    } else if extrapolate < min_delta - vsmall {
        *limiter = limiter.min(min_delta / extrapolate);
    }
}

/// Scales the columns of a gradient with the per-component limiter.
fn apply_limiter<T: Real, V: SchemeValue<T>>(gradient: &mut V::Gradient, limiter: &V) {
    for j in 0..V::NUM_COMPONENTS {
        let g = V::gradient_component(gradient, j) * limiter.component(j);
        V::set_gradient_component(gradient, j, g);
    }
}

/// Values of the faces used to bound the cell values: neighbour values on coupled patches,
/// boundary values elsewhere. Empty patches give `None`.
fn bounding_patch_values<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    patch: usize,
) -> Option<Vec<V>> {
    if fv_mesh.mesh().patch(patch).kind().is_empty() {
        return None;
    }
    Some(
        vf.patch_neighbour_values(fv_mesh, patch)
            .unwrap_or_else(|| vf.boundary_values(patch).to_vec()),
    )
}

/// Minimum and maximum of every cell value and its face neighbours' values.
fn cell_bounds<T: Real, V: SchemeValue<T>>(fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> (Vec<V>, Vec<V>) {
    let mesh = fv_mesh.mesh();
    let values = vf.internal_values();
    let mut min_values = values.to_vec();
    let mut max_values = values.to_vec();
    for (&own, &nei) in izip!(mesh.owner(), mesh.neighbour()) {
        max_values[own] = max_values[own].cmpt_max(&values[nei]);
        min_values[own] = min_values[own].cmpt_min(&values[nei]);
        max_values[nei] = max_values[nei].cmpt_max(&values[own]);
        min_values[nei] = min_values[nei].cmpt_min(&values[own]);
    }
    for patch in 0..mesh.patches().len() {
        if let Some(patch_values) = bounding_patch_values(fv_mesh, vf, patch) {
            for (&cell, value) in mesh.patch_face_cells(patch).iter().zip(&patch_values) {
                max_values[cell] = max_values[cell].cmpt_max(value);
                min_values[cell] = min_values[cell].cmpt_min(value);
            }
        }
    }
    (min_values, max_values)
}

/// Widens the ranges `[min, max]` around the values by `(1/k - 1)` times their width, and
/// returns them relative to the values.
fn relative_bounds<T: Real, V: FieldValue<T>>(values: &[V], min_values: &mut [V], max_values: &mut [V], k: T) {
    let widen = T::one() / k - T::one();
    for (&value, min, max) in izip!(values, min_values.iter_mut(), max_values.iter_mut()) {
        let width = (*max - *min) * widen;
        *max = *max - value + width;
        *min = *min - value - width;
    }
}

/// Limits the gradient with one scalar factor per cell and component, such that no face
/// value extrapolated from the cell centre exceeds the extremes of the cell and its
/// neighbours.
#[derive(Debug)]
pub struct CellLimitedGrad<T: Real, V: SchemeValue<T>> {
    inner: Box<dyn GradScheme<T, V>>,
    k: T,
}

impl<T: Real, V: SchemeValue<T>> CellLimitedGrad<T, V> {
    pub fn new(inner: Box<dyn GradScheme<T, V>>, k: T) -> Self {
        Self { inner, k }
    }

    pub fn k(&self) -> T {
        self.k
    }
}

impl<T: Real, V: SchemeValue<T>> GradScheme<T, V> for CellLimitedGrad<T, V> {
    fn name(&self) -> &'static str {
        "cellLimited"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>> {
        let grad = self.inner.calc_grad(fv_mesh, vf)?;
        if self.k == T::zero() {
            return Ok(grad);
        }

        let mesh = fv_mesh.mesh();
        let vsmall = mesh.tolerances().vsmall;
        let centres = mesh.cell_centres();
        let face_centres = mesh.face_centres();
        let values = vf.internal_values();
        let (mut min_delta, mut max_delta) = cell_bounds(fv_mesh, vf);
        relative_bounds(values, &mut min_delta, &mut max_delta, self.k);

        let mut g = grad.internal_values().to_vec();
        let mut limiter = vec![V::splat(T::one()); mesh.num_cells()];
        let mut limit_cell = |cell: usize, face: usize| {
            let d = face_centres[face] - centres[cell];
            for j in 0..V::NUM_COMPONENTS {
                let mut l = limiter[cell].component(j);
                let extrapolate = d.dot(&V::gradient_component(&g[cell], j));
                limit_face(
                    &mut l,
                    max_delta[cell].component(j),
                    min_delta[cell].component(j),
                    extrapolate,
                    vsmall,
                );
                limiter[cell].set_component(j, l);
            }
        };

        for (face, (&own, &nei)) in izip!(mesh.owner(), mesh.neighbour()).enumerate() {
            limit_cell(own, face);
            limit_cell(nei, face);
        }
        for (patch, info) in mesh.patches().iter().enumerate() {
            if info.kind().is_empty() {
                continue;
            }
            for (face, &cell) in info.face_range().zip(mesh.patch_face_cells(patch)) {
                limit_cell(cell, face);
            }
        }

        for (gradient, l) in g.iter_mut().zip(&limiter) {
            apply_limiter::<T, V>(gradient, l);
        }
        gradient_field(fv_mesh, vf, g)
    }
}

/// Multi-directional limiter: instead of scaling the whole gradient, removes the part of the
/// gradient along each offending cell-to-face direction.
#[derive(Debug)]
pub struct CellMdLimitedGrad<T: Real, V: SchemeValue<T>> {
    inner: Box<dyn GradScheme<T, V>>,
    k: T,
}

impl<T: Real, V: SchemeValue<T>> CellMdLimitedGrad<T, V> {
    pub fn new(inner: Box<dyn GradScheme<T, V>>, k: T) -> Self {
        Self { inner, k }
    }

    pub fn k(&self) -> T {
        self.k
    }
}

fn limit_face_md<T: Real>(gradient: &mut Vector3<T>, max_delta: T, min_delta: T, d: &Vector3<T>, vsmall: T) {
    let extrapolate = d.dot(gradient);
    let mag_sqr_d = d.norm_squared().max(vsmall);
    if extrapolate > max_delta {
        *gradient += d * ((max_delta - extrapolate) / mag_sqr_d);
    } else if extrapolate < min_delta {
        *gradient += d * ((min_delta - extrapolate) / mag_sqr_d);
    }
}

impl<T: Real, V: SchemeValue<T>> GradScheme<T, V> for CellMdLimitedGrad<T, V> {
    fn name(&self) -> &'static str {
        "cellMDLimited"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>> {
        let grad = self.inner.calc_grad(fv_mesh, vf)?;
        if self.k == T::zero() {
            return Ok(grad);
        }

        let mesh = fv_mesh.mesh();
        let vsmall = mesh.tolerances().vsmall;
        let centres = mesh.cell_centres();
        let face_centres = mesh.face_centres();
        let (mut min_delta, mut max_delta) = cell_bounds(fv_mesh, vf);
        relative_bounds(vf.internal_values(), &mut min_delta, &mut max_delta, self.k);

        let mut g = grad.internal_values().to_vec();
        let mut limit_cell = |cell: usize, face: usize| {
            let d = face_centres[face] - centres[cell];
            for j in 0..V::NUM_COMPONENTS {
                let mut component_grad = V::gradient_component(&g[cell], j);
                limit_face_md(
                    &mut component_grad,
                    max_delta[cell].component(j),
                    min_delta[cell].component(j),
                    &d,
                    vsmall,
                );
                V::set_gradient_component(&mut g[cell], j, component_grad);
            }
        };

        for (face, (&own, &nei)) in izip!(mesh.owner(), mesh.neighbour()).enumerate() {
            limit_cell(own, face);
            limit_cell(nei, face);
        }
        for (patch, info) in mesh.patches().iter().enumerate() {
            if info.kind().is_empty() {
                continue;
            }
            for (face, &cell) in info.face_range().zip(mesh.patch_face_cells(patch)) {
                limit_cell(cell, face);
            }
        }
        gradient_field(fv_mesh, vf, g)
    }
}

/// Limits the gradient face by face: the values extrapolated to a face from both adjacent
/// cells must lie between the two cell values.
///
/// On non-coupled patches only boundary conditions that fix the value bound the gradient.
#[derive(Debug)]
pub struct FaceLimitedGrad<T: Real, V: SchemeValue<T>> {
    inner: Box<dyn GradScheme<T, V>>,
    k: T,
}

impl<T: Real, V: SchemeValue<T>> FaceLimitedGrad<T, V> {
    pub fn new(inner: Box<dyn GradScheme<T, V>>, k: T) -> Self {
        Self { inner, k }
    }

    pub fn k(&self) -> T {
        self.k
    }
}

impl<T: Real, V: SchemeValue<T>> GradScheme<T, V> for FaceLimitedGrad<T, V> {
    fn name(&self) -> &'static str {
        "faceLimited"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>> {
        let grad = self.inner.calc_grad(fv_mesh, vf)?;
        if self.k == T::zero() {
            return Ok(grad);
        }

        let mesh = fv_mesh.mesh();
        let vsmall = mesh.tolerances().vsmall;
        let centres = mesh.cell_centres();
        let face_centres = mesh.face_centres();
        let values = vf.internal_values();
        let widen = T::one() / self.k - T::one();
        let g = grad.internal_values();

        let mut limiter = vec![V::splat(T::one()); mesh.num_cells()];
        // Limits the gradient of `cell` for the face values `value` and `other`
        let mut limit_cell = |cell: usize, face: usize, value: &V, other: &V| {
            let d = face_centres[face] - centres[cell];
            for j in 0..V::NUM_COMPONENTS {
                let (a, b) = (value.component(j), other.component(j));
                let width = (a.max(b) - a.min(b)) * widen;
                let max_face = a.max(b) + width;
                let min_face = a.min(b) - width;
                let mut l = limiter[cell].component(j);
                let extrapolate = d.dot(&V::gradient_component(&g[cell], j));
                limit_face(&mut l, max_face - a, min_face - a, extrapolate, vsmall);
                limiter[cell].set_component(j, l);
            }
        };

        for (face, (&own, &nei)) in izip!(mesh.owner(), mesh.neighbour()).enumerate() {
            limit_cell(own, face, &values[own], &values[nei]);
            limit_cell(nei, face, &values[nei], &values[own]);
        }
        for (patch, info) in mesh.patches().iter().enumerate() {
            let patch_field = vf.patch_field(patch);
            if info.kind().is_empty() || !(patch_field.is_coupled() || patch_field.fixes_value()) {
                continue;
            }
            if let Some(patch_values) = bounding_patch_values(fv_mesh, vf, patch) {
                for (face, &cell, other) in izip!(info.face_range(), mesh.patch_face_cells(patch), &patch_values) {
                    limit_cell(cell, face, &values[cell], other);
                }
            }
        }

        let mut limited = g.to_vec();
        for (gradient, l) in limited.iter_mut().zip(&limiter) {
            apply_limiter::<T, V>(gradient, l);
        }
        gradient_field(fv_mesh, vf, limited)
    }
}
