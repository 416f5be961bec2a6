//! Geometric interpolation factors of the faces of a mesh.
//!
//! For every face the owner-to-neighbour vector `d = C_N - C_P` determines
//!
//! - the linear interpolation weight `w`, such that a face value is `w φ_P + (1 - w) φ_N`,
//! - the distance coefficient `1 / |d|`,
//! - the non-orthogonal distance coefficient `1 / max(n·d, 0.05 |d|)`,
//! - the non-orthogonal correction vector `n - d / max(n·d, 0.05 |d|)`.
//!
//! On non-coupled patches `d = C_f - C_P`, the weight is one and the correction vector is
//! zero. Both distance coefficients are the inverse normal distance `1 / (n·d)`, so the
//! normal gradient of a boundary face only sees the component of `d` along the normal.
//! On coupled patches the neighbour centre is provided by the coupling.
use crate::dimensions::Dimensions;
use crate::field::{FieldValue, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::Real;
use nalgebra::{Point3, Vector3};
use numeric_literals::replace_float_literals;

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInterpolation<T: Real> {
    weights: SurfaceField<T, T>,
    delta_coeffs: SurfaceField<T, T>,
    non_orth_delta_coeffs: SurfaceField<T, T>,
    non_orth_correction_vectors: SurfaceField<T, Vector3<T>>,
    deltas: SurfaceField<T, Vector3<T>>,
}

struct FaceFactors<T: Real> {
    weight: T,
    delta_coeff: T,
    non_orth_delta_coeff: T,
    correction_vector: Vector3<T>,
    delta: Vector3<T>,
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn face_factors<T: Real>(
    fv_mesh: &FvMesh<T>,
    face: usize,
    owner_centre: &Point3<T>,
    neighbour_centre: &Point3<T>,
) -> FaceFactors<T> {
    let mesh = fv_mesh.mesh();
    let tolerances = mesh.tolerances();
    let sf = mesh.face_areas()[face];
    let cf = mesh.face_centres()[face];
    let n = mesh.face_normal(face);
    let d = neighbour_centre - owner_centre;

    let sfd_own = sf.dot(&(cf - owner_centre)).abs();
    let sfd_nei = sf.dot(&(neighbour_centre - cf)).abs();
    let weight = if sfd_own + sfd_nei > tolerances.rootvsmall {
        sfd_nei / (sfd_own + sfd_nei)
    } else {
        0.5
    };

    let mag_d = d.norm();
    let delta_coeff = 1.0 / mag_d.max(tolerances.rootvsmall);
    let non_orth_delta_coeff = 1.0 / n.dot(&d).max(0.05 * mag_d).max(tolerances.rootvsmall);
    FaceFactors {
        weight,
        delta_coeff,
        non_orth_delta_coeff,
        correction_vector: n - d * non_orth_delta_coeff,
        delta: d,
    }
}

impl<T: Real> SurfaceInterpolation<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn new(fv_mesh: &FvMesh<T>) -> Self {
        let mesh = fv_mesh.mesh();
        let centres = mesh.cell_centres();

        let internal: Vec<_> = (0..mesh.num_internal_faces())
            .map(|face| {
                let own = mesh.owner()[face];
                let nei = mesh.neighbour()[face];
                face_factors(fv_mesh, face, &centres[own], &centres[nei])
            })
            .collect();

        let boundary: Vec<Vec<_>> = (0..mesh.patches().len())
            .map(|patch| {
                let face_range = mesh.patch(patch).face_range();
                let face_cells = mesh.patch_face_cells(patch);
                match fv_mesh.coupled_neighbour_centres(patch) {
                    Some(neighbour_centres) => face_range
                        .zip(face_cells)
                        .zip(&neighbour_centres)
                        .map(|((face, &cell), cn)| face_factors(fv_mesh, face, &centres[cell], cn))
                        .collect(),
                    None => face_range
                        .zip(face_cells)
                        .map(|(face, &cell)| {
                            let cf = mesh.face_centres()[face];
                            let normal_distance = mesh.face_normal(face).dot(&(cf - centres[cell]));
                            let delta_coeff = 1.0 / normal_distance.max(mesh.tolerances().rootvsmall);
                            FaceFactors {
                                weight: 1.0,
                                delta_coeff,
                                non_orth_delta_coeff: delta_coeff,
                                correction_vector: Vector3::zeros(),
                                delta: cf - centres[cell],
                            }
                        })
                        .collect(),
                }
            })
            .collect();

        let field = |name: &str, dimensions, f: &dyn Fn(&FaceFactors<T>) -> T| {
            SurfaceField::new(
                mesh,
                name,
                dimensions,
                internal.iter().map(f).collect(),
                boundary.iter().map(|p| p.iter().map(f).collect()).collect(),
            )
            .expect("Internal error: interpolation factors must match mesh sizes")
        };
        let vector_field = |name: &str, dimensions, f: &dyn Fn(&FaceFactors<T>) -> Vector3<T>| {
            SurfaceField::new(
                mesh,
                name,
                dimensions,
                internal.iter().map(f).collect(),
                boundary.iter().map(|p| p.iter().map(f).collect()).collect(),
            )
            .expect("Internal error: interpolation factors must match mesh sizes")
        };

        let inverse_length = Dimensions::LENGTH.recip();
        Self {
            weights: field("weights", Dimensions::DIMLESS, &|f| f.weight),
            delta_coeffs: field("deltaCoeffs", inverse_length, &|f| f.delta_coeff),
            non_orth_delta_coeffs: field("nonOrthDeltaCoeffs", inverse_length, &|f| f.non_orth_delta_coeff),
            non_orth_correction_vectors: vector_field("nonOrthCorrectionVectors", Dimensions::DIMLESS, &|f| {
                f.correction_vector
            }),
            deltas: vector_field("deltas", Dimensions::LENGTH, &|f| f.delta),
        }
    }

    /// Linear interpolation weights of the owner cell.
    pub fn weights(&self) -> &SurfaceField<T, T> {
        &self.weights
    }

    pub fn delta_coeffs(&self) -> &SurfaceField<T, T> {
        &self.delta_coeffs
    }

    pub fn non_orth_delta_coeffs(&self) -> &SurfaceField<T, T> {
        &self.non_orth_delta_coeffs
    }

    pub fn non_orth_correction_vectors(&self) -> &SurfaceField<T, Vector3<T>> {
        &self.non_orth_correction_vectors
    }

    /// Owner-to-neighbour vectors, and owner-to-face vectors on non-coupled patches.
    pub fn deltas(&self) -> &SurfaceField<T, Vector3<T>> {
        &self.deltas
    }
}

/// Interpolates a volume field to the faces with the given owner weights.
///
/// Non-coupled patches take the boundary values of the field. Coupled patches blend the
/// patch internal values with the values across the coupling.
pub fn interpolate_with_weights<T: Real, V: FieldValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    weights: &SurfaceField<T, T>,
) -> SurfaceField<T, V> {
    let mesh = fv_mesh.mesh();
    let values = vf.internal_values();
    let internal = weights
        .internal_values()
        .iter()
        .zip(mesh.owner().iter().zip(mesh.neighbour()))
        .map(|(&w, (&own, &nei))| values[own] * w + values[nei] * (T::one() - w))
        .collect();

    let boundary = (0..mesh.patches().len())
        .map(|patch| {
            let patch_field = vf.patch_field(patch);
            match patch_field.patch_neighbour_values(fv_mesh, values) {
                Some(neighbour_values) => mesh
                    .patch_face_cells(patch)
                    .iter()
                    .zip(&neighbour_values)
                    .zip(weights.boundary_values(patch))
                    .map(|((&cell, &nbr), &w)| values[cell] * w + nbr * (T::one() - w))
                    .collect(),
                None => patch_field.values().to_vec(),
            }
        })
        .collect();

    SurfaceField::new(
        mesh,
        format!("interpolate({})", vf.name()),
        vf.dimensions(),
        internal,
        boundary,
    )
    .expect("Internal error: interpolated field must match mesh sizes")
}

/// Interpolates a volume field with the geometric (linear) weights of the mesh.
pub fn linear_interpolate<T: Real, V: FieldValue<T>>(fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> SurfaceField<T, V> {
    let interpolation = fv_mesh.interpolation();
    interpolate_with_weights(fv_mesh, vf, interpolation.weights())
}
