//! Implicit operators.
//!
//! Every operator returns the [`FvMatrix`] of the discretised term for the field `vf`, with
//! the scheme looked up in the schemes of the mesh under the conventional key of the term
//! (`ddt(T)`, `div(phi,T)`, `laplacian(DT,T)`). Before assembly the boundary coefficients of
//! `vf` are updated, which is where patch fields with a separate update step (e.g.
//! `fixedFluxPressure`) report sequencing errors.
//!
//! Terms are combined into an equation with the arithmetic operators of [`FvMatrix`]:
//!
//! ```ignore
//! let mut eqn = fvm::ddt(&fv_mesh, &mut t)? + fvm::div(&fv_mesh, &phi, &mut t)?
//!     - fvm::laplacian(&fv_mesh, &dt, &mut t)?;
//! eqn.solve(&fv_mesh, &mut t)?;
//! ```
use crate::convection::MultivariateScheme;
use crate::dimensions::{Dimensioned, Dimensions};
use crate::field::{SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::schemes::SchemeValue;
use crate::Real;
use eyre::WrapErr;
use itertools::izip;

fn update_coeffs<T: Real, V: SchemeValue<T>>(fv_mesh: &FvMesh<T>, vf: &mut VolField<T, V>) -> eyre::Result<()> {
    vf.update_boundary_coeffs(fv_mesh)
        .wrap_err_with(|| format!("Failed to update boundary coefficients of `{}`", vf.name()))
}

/// `ddt(vf)`.
pub fn ddt<T: Real, V: SchemeValue<T>>(fv_mesh: &FvMesh<T>, vf: &mut VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
    update_coeffs(fv_mesh, vf)?;
    let key = format!("ddt({})", vf.name());
    let scheme = fv_mesh.schemes().ddt_scheme::<V>(&key)?;
    scheme
        .fvm_ddt(fv_mesh, vf)
        .wrap_err_with(|| format!("Failed to assemble `{}`", key))
}

/// `ddt(rho, vf)`.
pub fn ddt_rho<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    rho: &VolField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    update_coeffs(fv_mesh, vf)?;
    let key = format!("ddt({},{})", rho.name(), vf.name());
    let scheme = fv_mesh.schemes().ddt_scheme::<V>(&key)?;
    scheme
        .fvm_ddt_rho(fv_mesh, rho, vf)
        .wrap_err_with(|| format!("Failed to assemble `{}`", key))
}

/// `div(phi, vf)`, the convection of `vf` by the face flux `phi`.
///
/// The flux is passed on to the patch fields of `vf` before their coefficients are updated.
pub fn div<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    phi: &SurfaceField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    vf.set_patch_flux(phi);
    update_coeffs(fv_mesh, vf)?;
    let key = format!("div({},{})", phi.name(), vf.name());
    let scheme = fv_mesh.schemes().div_scheme::<V>(&key)?;
    scheme
        .fvm_div(fv_mesh, phi, vf)
        .wrap_err_with(|| format!("Failed to assemble `{}`", key))
}

/// `div(phi, vf)` with the shared weights of a multivariate selection.
pub fn div_multivariate<T: Real>(
    fv_mesh: &FvMesh<T>,
    scheme: &MultivariateScheme<T>,
    phi: &SurfaceField<T, T>,
    vf: &mut VolField<T, T>,
) -> eyre::Result<FvMatrix<T, T>> {
    vf.set_patch_flux(phi);
    update_coeffs(fv_mesh, vf)?;
    scheme
        .convection_scheme()
        .fvm_div(fv_mesh, phi, vf)
        .wrap_err_with(|| format!("Failed to assemble multivariate `div({},{})`", phi.name(), vf.name()))
}

/// `laplacian(gamma, vf)` with a cell diffusivity, interpolated to the faces by the scheme.
pub fn laplacian<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &VolField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    update_coeffs(fv_mesh, vf)?;
    let key = format!("laplacian({},{})", gamma.name(), vf.name());
    let scheme = fv_mesh.schemes().laplacian_scheme::<V>(&key)?;
    let gamma = scheme.interpolate_gamma(fv_mesh, gamma)?;
    scheme
        .fvm_laplacian(fv_mesh, &gamma, vf)
        .wrap_err_with(|| format!("Failed to assemble `{}`", key))
}

/// `laplacian(gamma, vf)` with a face diffusivity.
pub fn laplacian_surface<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &SurfaceField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    update_coeffs(fv_mesh, vf)?;
    let key = format!("laplacian({},{})", gamma.name(), vf.name());
    let scheme = fv_mesh.schemes().laplacian_scheme::<V>(&key)?;
    scheme
        .fvm_laplacian(fv_mesh, gamma, vf)
        .wrap_err_with(|| format!("Failed to assemble `{}`", key))
}

/// `laplacian(gamma, vf)` with a uniform diffusivity.
pub fn laplacian_uniform<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &Dimensioned<T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    let gamma = SurfaceField::uniform(fv_mesh.mesh(), gamma.name.clone(), gamma.dimensions, gamma.value);
    laplacian_surface(fv_mesh, &gamma, vf)
}

fn check_size<T: Real, V: SchemeValue<T>, U>(fv_mesh: &FvMesh<T>, what: &str, values: &[U], vf: &VolField<T, V>) -> eyre::Result<()> {
    let num_cells = fv_mesh.mesh().num_cells();
    if values.len() != num_cells {
        eyre::bail!(
            "{} for `{}` has {} values, but the mesh has {} cells",
            what,
            vf.name(),
            values.len(),
            num_cells
        );
    }
    Ok(())
}

/// Implicit source `sp vf`, added to the diagonal.
pub fn sp<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    sp: &VolField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    check_size(fv_mesh, "Implicit source", sp.internal_values(), vf)?;
    update_coeffs(fv_mesh, vf)?;
    let mesh = fv_mesh.mesh();
    let mut matrix = FvMatrix::new(mesh, vf.name(), sp.dimensions() * vf.dimensions() * Dimensions::VOLUME);
    for (d, &sp, &volume) in izip!(matrix.diag_mut(), sp.internal_values(), mesh.cell_volumes()) {
        *d += sp * volume;
    }
    Ok(matrix)
}

/// Explicit source `su`.
pub fn su<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    su: &VolField<T, V>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    check_size(fv_mesh, "Explicit source", su.internal_values(), vf)?;
    update_coeffs(fv_mesh, vf)?;
    let mut matrix = FvMatrix::new(fv_mesh.mesh(), vf.name(), su.dimensions() * Dimensions::VOLUME);
    matrix.add_explicit(fv_mesh, su.internal_values());
    Ok(matrix)
}

/// Source `susp vf`, implicit where `susp` is positive and explicit elsewhere.
pub fn su_sp<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    susp: &VolField<T, T>,
    vf: &mut VolField<T, V>,
) -> eyre::Result<FvMatrix<T, V>> {
    check_size(fv_mesh, "Source", susp.internal_values(), vf)?;
    update_coeffs(fv_mesh, vf)?;
    let mesh = fv_mesh.mesh();
    let mut matrix = FvMatrix::new(mesh, vf.name(), susp.dimensions() * vf.dimensions() * Dimensions::VOLUME);
    for (cell, (&s, &volume, &value)) in izip!(susp.internal_values(), mesh.cell_volumes(), vf.internal_values()).enumerate() {
        matrix.diag_mut()[cell] += s.max(T::zero()) * volume;
        matrix.source_mut()[cell] -= value * (s.min(T::zero()) * volume);
    }
    Ok(matrix)
}
