use crate::ddt::{ddt_field, ddt_matrix_dimensions, DdtScheme};
use crate::field::{FieldValue, VolField};
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::schemes::SchemeValue;
use crate::Real;
use itertools::izip;

/// Second order backward differencing with variable time steps.
///
/// With `Δt` the current and `Δt0` the previous time step,
///
/// ```text
/// ddt(φ) = (c φ - c0 φ0 + c00 φ00) / Δt,
/// c = 1 + Δt/(Δt + Δt0),  c00 = Δt² / (Δt0 (Δt + Δt0)),  c0 = c + c00.
/// ```
///
/// Until the field has two old time levels the scheme reduces to Euler. The bounded
/// variant limits the extrapolated old-time value `φ0 + (c00/c)(φ0 - φ00)` to the range
/// of `φ0` in the cell and its neighbours, which removes new extrema caused by the
/// old-old contribution.
#[derive(Debug, Copy, Clone, Default)]
pub struct Backward {
    bounded: bool,
}

struct Coefficients<T> {
    rdelta_t: T,
    coefft: T,
    coefft00: T,
}

impl Backward {
    pub fn new() -> Self {
        Self { bounded: false }
    }

    pub fn bounded() -> Self {
        Self { bounded: true }
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    fn coefficients<T: Real, V: SchemeValue<T>>(fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> Coefficients<T> {
        let time = fv_mesh.time();
        let delta_t = time.delta_t();
        if vf.num_old_times() < 2 {
            return Coefficients {
                rdelta_t: time.rdelta_t(),
                coefft: T::one(),
                coefft00: T::zero(),
            };
        }
        let delta_t0 = time.delta_t0();
        Coefficients {
            rdelta_t: time.rdelta_t(),
            coefft: T::one() + delta_t / (delta_t + delta_t0),
            coefft00: delta_t * delta_t / (delta_t0 * (delta_t + delta_t0)),
        }
    }

    /// `φ0 + (c00/c)(φ0 - φ00)` for every cell, limited to the local range of `φ0` if
    /// the scheme is bounded. The old-time contribution to the derivative is `c` times
    /// this value.
    fn extrapolated_old<T: Real, V: FieldValue<T>>(
        &self,
        fv_mesh: &FvMesh<T>,
        coefficients: &Coefficients<T>,
        old: &[V],
        old_old: &[V],
    ) -> Vec<V> {
        let ratio = coefficients.coefft00 / coefficients.coefft;
        let extrapolated = izip!(old, old_old).map(|(&o, &oo)| o + (o - oo) * ratio);
        if !self.bounded {
            return extrapolated.collect();
        }
        let mesh = fv_mesh.mesh();
        extrapolated
            .enumerate()
            .map(|(cell, value)| {
                let (min, max) = mesh
                    .cell_cells(cell)
                    .iter()
                    .fold((old[cell], old[cell]), |(min, max), &nbr| {
                        (min.cmpt_min(&old[nbr]), max.cmpt_max(&old[nbr]))
                    });
                value.cmpt_max(&min).cmpt_min(&max)
            })
            .collect()
    }

    /// [`extrapolated_old`](Self::extrapolated_old) for the faces of a patch. The bounded
    /// variant limits each face to the range of its own old value and the old value of
    /// the adjacent cell.
    fn extrapolated_patch_old<T: Real, V: FieldValue<T>>(
        &self,
        fv_mesh: &FvMesh<T>,
        coefficients: &Coefficients<T>,
        patch: usize,
        old_cells: &[V],
        old: &[V],
        old_old: &[V],
    ) -> Vec<V> {
        let ratio = coefficients.coefft00 / coefficients.coefft;
        let face_cells = fv_mesh.mesh().patch_face_cells(patch);
        izip!(old, old_old, face_cells)
            .map(|(&o, &oo, &cell)| {
                let value = o + (o - oo) * ratio;
                if self.bounded {
                    let neighbour = old_cells[cell];
                    value.cmpt_max(&o.cmpt_min(&neighbour)).cmpt_min(&o.cmpt_max(&neighbour))
                } else {
                    value
                }
            })
            .collect()
    }

    /// Old-time terms `ρ0 φ0` and `ρ00 φ00` (or `φ0` and `φ00`) of the cells.
    fn old_levels<T: Real, V: SchemeValue<T>>(rho: Option<&VolField<T, T>>, vf: &VolField<T, V>) -> (Vec<V>, Vec<V>) {
        let old = vf.old_internal_values();
        let old_old = vf.old_old_internal_values().unwrap_or(old);
        match rho {
            None => (old.to_vec(), old_old.to_vec()),
            Some(rho) => {
                let rho_old = rho.old_internal_values();
                let rho_old_old = rho.old_old_internal_values().unwrap_or(rho_old);
                (weighted(old, Some(rho_old)), weighted(old_old, Some(rho_old_old)))
            }
        }
    }

    /// Old-time terms of the faces of a patch.
    fn old_patch_levels<T: Real, V: SchemeValue<T>>(
        rho: Option<&VolField<T, T>>,
        vf: &VolField<T, V>,
        patch: usize,
    ) -> (Vec<V>, Vec<V>) {
        let old = vf.old_boundary_values(patch);
        let old_old = vf
            .old_old_time()
            .map_or(old, |snapshot| snapshot.boundary_values(patch));
        match rho {
            None => (old.to_vec(), old_old.to_vec()),
            Some(rho) => {
                let rho_old = rho.old_boundary_values(patch);
                let rho_old_old = rho
                    .old_old_time()
                    .map_or(rho_old, |s| s.boundary_values(patch));
                (weighted(old, Some(rho_old)), weighted(old_old, Some(rho_old_old)))
            }
        }
    }

    fn fvm<T: Real, V: SchemeValue<T>>(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: Option<&VolField<T, T>>,
        vf: &VolField<T, V>,
    ) -> FvMatrix<T, V> {
        let mesh = fv_mesh.mesh();
        let c = Self::coefficients(fv_mesh, vf);
        let (old, old_old) = Self::old_levels(rho, vf);
        let extrapolated = self.extrapolated_old(fv_mesh, &c, &old, &old_old);

        let mut matrix = FvMatrix::new(
            mesh,
            vf.name(),
            ddt_matrix_dimensions(rho.map(|rho| rho.dimensions()), vf.dimensions()),
        );
        for (cell, &volume) in mesh.cell_volumes().iter().enumerate() {
            let coeff = c.coefft * c.rdelta_t * volume;
            matrix.diag_mut()[cell] = rho.map_or(coeff, |rho| coeff * rho.internal_values()[cell]);
            matrix.source_mut()[cell] = extrapolated[cell] * coeff;
        }
        matrix
    }

    fn fvc<T: Real, V: SchemeValue<T>>(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: Option<&VolField<T, T>>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let mesh = fv_mesh.mesh();
        let c = Self::coefficients(fv_mesh, vf);
        let scale = c.coefft * c.rdelta_t;

        let (old, old_old) = Self::old_levels(rho, vf);
        let extrapolated = self.extrapolated_old(fv_mesh, &c, &old, &old_old);
        let current = weighted(vf.internal_values(), rho.map(|rho| rho.internal_values()));
        let internal = izip!(current, extrapolated)
            .map(|(now, old)| (now - old) * scale)
            .collect();

        let boundary = (0..mesh.patches().len())
            .map(|patch| {
                let (patch_old, patch_old_old) = Self::old_patch_levels(rho, vf, patch);
                let extrapolated = self.extrapolated_patch_old(fv_mesh, &c, patch, &old, &patch_old, &patch_old_old);
                let current = weighted(vf.boundary_values(patch), rho.map(|rho| rho.boundary_values(patch)));
                izip!(current, extrapolated)
                    .map(|(now, old)| (now - old) * scale)
                    .collect()
            })
            .collect();
        ddt_field(fv_mesh, rho, vf, internal, boundary)
    }
}

/// `ρ φ` element-wise, or a copy of `φ` without a density.
fn weighted<T: Real, V: FieldValue<T>>(values: &[V], rho: Option<&[T]>) -> Vec<V> {
    match rho {
        Some(rho) => izip!(values, rho).map(|(&v, &r)| v * r).collect(),
        None => values.to_vec(),
    }
}

impl<T: Real, V: SchemeValue<T>> DdtScheme<T, V> for Backward {
    fn name(&self) -> &'static str {
        "backward"
    }

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
        Ok(self.fvm(fv_mesh, None, vf))
    }

    fn fvm_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        Ok(self.fvm(fv_mesh, Some(rho), vf))
    }

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
        self.fvc(fv_mesh, None, vf)
    }

    fn fvc_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        self.fvc(fv_mesh, Some(rho), vf)
    }
}
