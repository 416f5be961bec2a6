use crate::field::VolField;
use crate::fv_mesh::FvMesh;
use crate::grad::{gradient_field, GradScheme};
use crate::schemes::SchemeValue;
use crate::Real;
use itertools::izip;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use num::Zero;
use std::rc::Rc;

/// Per-face vectors of the least-squares gradient.
///
/// With the inverse-distance-squared weights `w = 1/|d|²`, the gradient of cell `P` is
/// `Σ_f v_f (φ_f - φ_P)`, with `v_f = w (Σ_g w_g d_g ⊗ d_g)⁻¹ d_f` over all faces of `P`.
/// Directions without any neighbour (as in 1-D and 2-D meshes) are removed with a
/// pseudo-inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresVectors<T: Real> {
    owner: Vec<Vector3<T>>,
    neighbour: Vec<Vector3<T>>,
    boundary: Vec<Vec<Vector3<T>>>,
}

impl<T: Real> LeastSquaresVectors<T> {
    pub fn new(fv_mesh: &FvMesh<T>) -> Self {
        let mesh = fv_mesh.mesh();
        let tolerances = mesh.tolerances();
        let interpolation = fv_mesh.interpolation();
        let deltas = interpolation.deltas();
        let weight = |d: &Vector3<T>| T::one() / tolerances.floor_vsmall(d.norm_squared());

        let mut dd = vec![Matrix3::zero(); mesh.num_cells()];
        for (&own, &nei, d) in izip!(mesh.owner(), mesh.neighbour(), deltas.internal_values()) {
            let wdd = d * d.transpose() * weight(d);
            dd[own] += wdd;
            dd[nei] += wdd;
        }
        for (patch, info) in mesh.patches().iter().enumerate() {
            if info.kind().is_empty() {
                continue;
            }
            for (&cell, d) in mesh.patch_face_cells(patch).iter().zip(deltas.boundary_values(patch)) {
                dd[cell] += d * d.transpose() * weight(d);
            }
        }

        let inv_dd: Vec<_> = dd
            .iter()
            .map(|m| invert_or_pseudo_invert(m, tolerances.small))
            .collect();

        let owner = izip!(mesh.owner(), deltas.internal_values())
            .map(|(&own, d)| inv_dd[own] * d * weight(d))
            .collect();
        let neighbour = izip!(mesh.neighbour(), deltas.internal_values())
            .map(|(&nei, d)| -(inv_dd[nei] * d * weight(d)))
            .collect();
        let boundary = mesh
            .patches()
            .iter()
            .enumerate()
            .map(|(patch, info)| {
                if info.kind().is_empty() {
                    return vec![Vector3::zeros(); info.size()];
                }
                mesh.patch_face_cells(patch)
                    .iter()
                    .zip(deltas.boundary_values(patch))
                    .map(|(&cell, d)| inv_dd[cell] * d * weight(d))
                    .collect()
            })
            .collect();

        Self {
            owner,
            neighbour,
            boundary,
        }
    }

    /// Vectors of the owner side of the internal faces.
    pub fn owner_vectors(&self) -> &[Vector3<T>] {
        &self.owner
    }

    /// Vectors of the neighbour side of the internal faces.
    pub fn neighbour_vectors(&self) -> &[Vector3<T>] {
        &self.neighbour
    }

    pub fn boundary_vectors(&self, patch: usize) -> &[Vector3<T>] {
        &self.boundary[patch]
    }
}

fn invert_or_pseudo_invert<T: Real>(m: &Matrix3<T>, small: T) -> Matrix3<T> {
    let scale = m.norm();
    if scale == T::zero() {
        return Matrix3::zeros();
    }
    // Nearly singular matrices are inverted only in the directions that carry information
    if m.determinant().abs() > small * scale * scale * scale {
        if let Some(inverse) = m.try_inverse() {
            return inverse;
        }
    }
    m.pseudo_inverse(small * scale)
        .unwrap_or_else(|_| Matrix3::zeros())
}

/// The least-squares vectors of a mesh, recomputed only when the mesh changes.
pub fn least_squares_vectors<T: Real>(fv_mesh: &FvMesh<T>) -> Rc<LeastSquaresVectors<T>> {
    fv_mesh.cache().get_or_compute(fv_mesh.generation_key(), || {
        debug!("Computing least-squares gradient vectors");
        LeastSquaresVectors::new(fv_mesh)
    })
}

/// Least-squares fit of the differences to the neighbouring cells.
///
/// Exact for linear fields on arbitrary meshes. On non-coupled patches the boundary value
/// takes the place of the neighbour value.
#[derive(Debug, Copy, Clone, Default)]
pub struct LeastSquaresGrad;

impl<T: Real, V: SchemeValue<T>> GradScheme<T, V> for LeastSquaresGrad {
    fn name(&self) -> &'static str {
        "leastSquares"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V::Gradient>> {
        let mesh = fv_mesh.mesh();
        let vectors = least_squares_vectors(fv_mesh);
        let values = vf.internal_values();

        let mut grad = vec![V::Gradient::zero(); mesh.num_cells()];
        for (&own, &nei, v_own, v_nei) in izip!(
            mesh.owner(),
            mesh.neighbour(),
            vectors.owner_vectors(),
            vectors.neighbour_vectors()
        ) {
            let delta = values[nei] - values[own];
            grad[own] += V::outer(v_own, &delta);
            grad[nei] -= V::outer(v_nei, &delta);
        }

        for (patch, info) in mesh.patches().iter().enumerate() {
            if info.kind().is_empty() {
                continue;
            }
            let patch_values = vf
                .patch_neighbour_values(fv_mesh, patch)
                .unwrap_or_else(|| vf.boundary_values(patch).to_vec());
            for (&cell, v, &value) in izip!(mesh.patch_face_cells(patch), vectors.boundary_vectors(patch), &patch_values) {
                grad[cell] += V::outer(v, &(value - values[cell]));
            }
        }

        gradient_field(fv_mesh, vf, grad)
    }
}
