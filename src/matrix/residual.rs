use crate::dimensions::Dimensions;
use crate::field::{FieldValue, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::mesh::Mesh;
use crate::Real;
use itertools::izip;

impl<T: Real, V: FieldValue<T>> FvMatrix<T, V> {
    /// The diagonal of one component, including the internal coefficients of all patches.
    pub(crate) fn diag_with_boundary(&self, mesh: &Mesh<T>, component: usize) -> Vec<T> {
        let mut diag = self.diag.clone();
        for (patch, coeffs) in self.internal_coeffs.iter().enumerate() {
            for (&cell, coeff) in mesh.patch_face_cells(patch).iter().zip(coeffs) {
                diag[cell] += coeff.component(component);
            }
        }
        diag
    }

    /// The source plus the boundary coefficients of non-coupled patches. With `couples`, the
    /// boundary coefficients of coupled patches multiplied by the values across the patch
    /// are added as well.
    pub(crate) fn source_with_boundary(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>, couples: bool) -> Vec<V> {
        let mesh = fv_mesh.mesh();
        let mut source = self.source.clone();
        for (patch, coeffs) in self.boundary_coeffs.iter().enumerate() {
            let cells = mesh.patch_face_cells(patch);
            if mesh.patch(patch).is_coupled() {
                if !couples {
                    continue;
                }
                let neighbour = psi
                    .patch_neighbour_values(fv_mesh, patch)
                    .unwrap_or_else(|| psi.boundary_values(patch).to_vec());
                for (&cell, coeff, value) in izip!(cells, coeffs, &neighbour) {
                    source[cell] += coeff.cmpt_multiply(value);
                }
            } else {
                for (&cell, &coeff) in cells.iter().zip(coeffs) {
                    source[cell] += coeff;
                }
            }
        }
        source
    }

    /// `Σ_N a_N ψ_N` for every cell, over the internal faces.
    pub(crate) fn off_diag_product(&self, mesh: &Mesh<T>, psi: &[V]) -> Vec<V> {
        let mut product = vec![V::zero(); self.diag.len()];
        for (&own, &nei, &lower, &upper) in izip!(mesh.owner(), mesh.neighbour(), &self.lower, &self.upper) {
            product[own] += psi[nei] * upper;
            product[nei] += psi[own] * lower;
        }
        product
    }

    /// The central coefficient per unit volume, with the component average of the internal
    /// coefficients of the patches.
    pub fn a(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> VolField<T, T> {
        let mesh = fv_mesh.mesh();
        let mut diag = self.diag.clone();
        for (patch, coeffs) in self.internal_coeffs.iter().enumerate() {
            for (&cell, coeff) in mesh.patch_face_cells(patch).iter().zip(coeffs) {
                diag[cell] += coeff.cmpt_av();
            }
        }
        for (d, &volume) in diag.iter_mut().zip(mesh.cell_volumes()) {
            *d /= mesh.tolerances().floor_vsmall(volume);
        }
        VolField::from_internal(
            fv_mesh,
            format!("A({})", psi.name()),
            self.dimensions / (psi.dimensions() * Dimensions::VOLUME),
            diag,
        )
    }

    /// The off-diagonal part of the equation moved to the right-hand side, per unit volume:
    /// `H(ψ) = (b - Σ_N a_N ψ_N) / V`, such that `A ψ = H` at convergence.
    ///
    /// The component-wise deviation of the patch internal coefficients from their average
    /// (which [`a`](Self::a) includes) is part of `H`.
    pub fn h(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> VolField<T, V> {
        let mesh = fv_mesh.mesh();
        let values = psi.internal_values();
        let mut h = self.source_with_boundary(fv_mesh, psi, true);
        for (h, off_diag) in h.iter_mut().zip(self.off_diag_product(mesh, values)) {
            *h -= off_diag;
        }
        for (patch, coeffs) in self.internal_coeffs.iter().enumerate() {
            for (&cell, &coeff) in mesh.patch_face_cells(patch).iter().zip(coeffs) {
                let deviation = coeff - V::splat(coeff.cmpt_av());
                h[cell] -= deviation.cmpt_multiply(&values[cell]);
            }
        }
        for (h, &volume) in h.iter_mut().zip(mesh.cell_volumes()) {
            *h *= T::one() / mesh.tolerances().floor_vsmall(volume);
        }
        VolField::from_internal(
            fv_mesh,
            format!("H({})", psi.name()),
            self.dimensions / Dimensions::VOLUME,
            h,
        )
    }

    /// The residual `b - A ψ` of every cell, including all boundary contributions.
    pub fn residual(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> Vec<V> {
        let mesh = fv_mesh.mesh();
        let values = psi.internal_values();
        let mut residual = self.source_with_boundary(fv_mesh, psi, true);
        for (r, off_diag, &diag, &value) in izip!(
            &mut residual,
            self.off_diag_product(mesh, values),
            &self.diag,
            values
        ) {
            *r -= off_diag + value * diag;
        }
        for (patch, coeffs) in self.internal_coeffs.iter().enumerate() {
            for (&cell, coeff) in mesh.patch_face_cells(patch).iter().zip(coeffs) {
                residual[cell] -= coeff.cmpt_multiply(&values[cell]);
            }
        }
        residual
    }

    /// Face fluxes consistent with the matrix coefficients, positive out of the owner.
    ///
    /// The sum of the fluxes over the faces of a cell equals the off-diagonal and boundary
    /// part of its equation.
    pub fn flux(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> SurfaceField<T, V> {
        let mesh = fv_mesh.mesh();
        let values = psi.internal_values();
        let internal = izip!(mesh.owner(), mesh.neighbour(), &self.lower, &self.upper)
            .map(|(&own, &nei, &lower, &upper)| values[nei] * upper - values[own] * lower)
            .collect();
        let boundary = (0..mesh.patches().len())
            .map(|patch| {
                let cells = mesh.patch_face_cells(patch);
                let internal_coeffs = &self.internal_coeffs[patch];
                let boundary_coeffs = &self.boundary_coeffs[patch];
                let neighbour = if mesh.patch(patch).is_coupled() {
                    psi.patch_neighbour_values(fv_mesh, patch)
                } else {
                    None
                };
                izip!(cells, internal_coeffs, boundary_coeffs)
                    .enumerate()
                    .map(|(i, (&cell, ic, bc))| {
                        let internal = ic.cmpt_multiply(&values[cell]);
                        match &neighbour {
                            Some(neighbour) => internal - bc.cmpt_multiply(&neighbour[i]),
                            None => internal - *bc,
                        }
                    })
                    .collect()
            })
            .collect();
        let mut flux = SurfaceField::new(mesh, format!("flux({})", psi.name()), self.dimensions, internal, boundary)
            .expect("Internal error: matrix coefficients must match the mesh");
        if let Some(correction) = &self.face_flux_correction {
            flux.add_field(correction);
        }
        flux
    }
}
