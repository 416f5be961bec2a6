use crate::error::MatrixError;
use crate::field::{FieldValue, VolField};
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::Real;
use itertools::izip;
use log::debug;

impl<T: Real, V: FieldValue<T>> FvMatrix<T, V> {
    /// Implicit under-relaxation with factor `alpha` in `(0, 1]`.
    ///
    /// The diagonal is first made at least diagonally dominant, then divided by `alpha`. The
    /// added diagonal contribution is compensated in the source with the current values of
    /// `psi`, so a converged solution of the relaxed system is a solution of the original.
    pub fn relax(&mut self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>, alpha: T) -> Result<(), MatrixError> {
        if !(alpha > T::zero() && alpha <= T::one()) {
            return Err(MatrixError::InvalidRelaxationFactor {
                alpha: alpha.to_string(),
            });
        }
        let mesh = fv_mesh.mesh();
        let d0 = self.diag.clone();
        let mut d = self.diag.clone();
        let mut sum_off = self.sum_mag_off_diag(mesh);

        // Boundary contributions to the diagonal and to the off-diagonal magnitude
        for (patch, (internal_coeffs, boundary_coeffs)) in
            self.internal_coeffs.iter().zip(&self.boundary_coeffs).enumerate()
        {
            let cells = mesh.patch_face_cells(patch);
            if mesh.patch(patch).is_coupled() {
                for (&cell, ic, bc) in izip!(cells, internal_coeffs, boundary_coeffs) {
                    d[cell] += ic.component(0);
                    sum_off[cell] += bc.component(0).abs();
                }
            } else {
                for (&cell, ic) in cells.iter().zip(internal_coeffs) {
                    d[cell] += ic.cmpt_mag().cmpt_max_value();
                }
            }
        }

        let mut num_non_dominant = 0;
        for (d, &sum_off) in d.iter_mut().zip(&sum_off) {
            if d.abs() < sum_off {
                num_non_dominant += 1;
            }
            *d = d.abs().max(sum_off) / alpha;
        }
        if num_non_dominant > 0 {
            debug!(
                "Relaxing {}: {} cells were not diagonally dominant",
                self.field_name, num_non_dominant
            );
        }

        // The patch internal coefficients are added back when the matrix is used
        for (patch, internal_coeffs) in self.internal_coeffs.iter().enumerate() {
            let cells = mesh.patch_face_cells(patch);
            let coupled = mesh.patch(patch).is_coupled();
            for (&cell, ic) in cells.iter().zip(internal_coeffs) {
                d[cell] -= if coupled { ic.component(0) } else { ic.cmpt_min_value() };
            }
        }

        for (source, &d, &d0, &value) in izip!(&mut self.source, &d, &d0, psi.internal_values()) {
            *source += value * (d - d0);
        }
        self.diag = d;
        Ok(())
    }

    /// Relaxes with the equation relaxation factor configured for the field. Does nothing
    /// if no factor is configured.
    pub fn relax_from_config(&mut self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> Result<(), MatrixError> {
        match fv_mesh.solution().equation_relaxation_factor(psi.name()) {
            Some(alpha) => {
                let alpha = T::from_f64(alpha).ok_or_else(|| MatrixError::InvalidRelaxationFactor {
                    alpha: alpha.to_string(),
                })?;
                self.relax(fv_mesh, psi, alpha)
            }
            None => Ok(()),
        }
    }
}
