//! Explicit operators.
//!
//! The operators evaluate discretised terms of known fields. Those that depend on a scheme
//! look it up under the conventional key of the term (`grad(T)`, `interpolate(T)`, `snGrad(T)`,
//! `div(phi,T)`, `laplacian(DT,T)`, `ddt(T)`).
use crate::dimensions::{Dimensioned, Dimensions};
use crate::field::{FieldValue, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::parallel::{all_reduce_max, all_reduce_sum};
use crate::schemes::SchemeValue;
use crate::Real;
use eyre::WrapErr;
use itertools::izip;
use numeric_literals::replace_float_literals;

/// The gradient of `vf` with the scheme of the entry `grad(<name>)`.
pub fn grad<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V::Gradient>> {
    grad_with_key(fv_mesh, vf, &format!("grad({})", vf.name()))
}

/// The gradient of `vf` with the scheme of the given `gradSchemes` entry.
pub fn grad_with_key<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    key: &str,
) -> eyre::Result<VolField<T, V::Gradient>> {
    let scheme = fv_mesh.schemes().grad_scheme::<V>(key)?;
    scheme
        .calc_grad(fv_mesh, vf)
        .wrap_err_with(|| format!("Failed to compute `{}` with {}", key, scheme.name()))
}

/// Face values of `vf` with the scheme of the entry `interpolate(<name>)`.
///
/// Schemes that depend on the flow direction cannot be used here, see
/// [`interpolate_with_flux`].
pub fn interpolate<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<SurfaceField<T, V>> {
    let key = format!("interpolate({})", vf.name());
    let scheme = fv_mesh.schemes().interpolation_scheme::<V>(&key)?;
    scheme
        .interpolate(fv_mesh, vf, None)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// Face values of `vf` with the scheme of the entry `interpolate(<name>)`, for the flow
/// direction given by `phi`.
pub fn interpolate_with_flux<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    phi: &SurfaceField<T, T>,
) -> eyre::Result<SurfaceField<T, V>> {
    let key = format!("interpolate({})", vf.name());
    let scheme = fv_mesh.schemes().interpolation_scheme::<V>(&key)?;
    scheme
        .interpolate(fv_mesh, vf, Some(phi))
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// The face normal gradient of `vf` with the scheme of the entry `snGrad(<name>)`,
/// including the explicit correction of the scheme.
pub fn sn_grad<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<SurfaceField<T, V>> {
    let key = format!("snGrad({})", vf.name());
    let scheme = fv_mesh.schemes().sn_grad_scheme::<V>(&key)?;
    scheme
        .sn_grad(fv_mesh, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// Sum of the face values over the faces of every cell, signed by the face orientation
/// (positive out of the cell), divided by the cell volume.
///
/// Faces of empty patches do not contribute.
pub fn surface_integrate_values<T: Real, V: FieldValue<T>>(fv_mesh: &FvMesh<T>, ssf: &SurfaceField<T, V>) -> Vec<V> {
    let mesh = fv_mesh.mesh();
    let mut sum = vec![V::zero(); mesh.num_cells()];
    for (&own, &nei, &value) in izip!(mesh.owner(), mesh.neighbour(), ssf.internal_values()) {
        sum[own] += value;
        sum[nei] -= value;
    }
    for (patch, info) in mesh.patches().iter().enumerate() {
        if info.kind().is_empty() {
            continue;
        }
        for (&cell, &value) in mesh.patch_face_cells(patch).iter().zip(ssf.boundary_values(patch)) {
            sum[cell] += value;
        }
    }
    let tolerances = mesh.tolerances();
    for (s, &volume) in sum.iter_mut().zip(mesh.cell_volumes()) {
        *s *= T::one() / tolerances.floor_vsmall(volume);
    }
    sum
}

/// [`surface_integrate_values`] as a field, with boundary values extrapolated from the cells.
pub fn surface_integrate<T: Real, V: FieldValue<T>>(
    fv_mesh: &FvMesh<T>,
    ssf: &SurfaceField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let mut vf = VolField::from_internal(
        fv_mesh,
        format!("surfaceIntegrate({})", ssf.name()),
        ssf.dimensions() / Dimensions::VOLUME,
        surface_integrate_values(fv_mesh, ssf),
    );
    vf.correct_boundary_conditions(fv_mesh)
        .wrap_err_with(|| format!("Failed to evaluate boundary conditions of `{}`", vf.name()))?;
    Ok(vf)
}

/// Sum of the face values over the faces of every cell, without orientation.
pub fn surface_sum<T: Real, V: FieldValue<T>>(
    fv_mesh: &FvMesh<T>,
    ssf: &SurfaceField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let mesh = fv_mesh.mesh();
    let mut sum = vec![V::zero(); mesh.num_cells()];
    for (&own, &nei, &value) in izip!(mesh.owner(), mesh.neighbour(), ssf.internal_values()) {
        sum[own] += value;
        sum[nei] += value;
    }
    for (patch, info) in mesh.patches().iter().enumerate() {
        if info.kind().is_empty() {
            continue;
        }
        for (&cell, &value) in mesh.patch_face_cells(patch).iter().zip(ssf.boundary_values(patch)) {
            sum[cell] += value;
        }
    }
    let mut vf = VolField::from_internal(fv_mesh, format!("surfaceSum({})", ssf.name()), ssf.dimensions(), sum);
    vf.correct_boundary_conditions(fv_mesh)
        .wrap_err_with(|| format!("Failed to evaluate boundary conditions of `{}`", vf.name()))?;
    Ok(vf)
}

/// The divergence of a face flux field.
pub fn div<T: Real, V: FieldValue<T>>(fv_mesh: &FvMesh<T>, ssf: &SurfaceField<T, V>) -> eyre::Result<VolField<T, V>> {
    let mut div = surface_integrate(fv_mesh, ssf)?;
    div.rename(format!("div({})", ssf.name()));
    Ok(div)
}

/// `div(phi, vf)` with the scheme of the corresponding `divSchemes` entry.
pub fn div_flux<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    phi: &SurfaceField<T, T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let key = format!("div({},{})", phi.name(), vf.name());
    let scheme = fv_mesh.schemes().div_scheme::<V>(&key)?;
    scheme
        .fvc_div(fv_mesh, phi, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// The face fluxes `phi vf_f` of the convection scheme of the entry `div(phi,<name>)`.
pub fn flux<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    phi: &SurfaceField<T, T>,
    vf: &VolField<T, V>,
) -> eyre::Result<SurfaceField<T, V>> {
    let key = format!("div({},{})", phi.name(), vf.name());
    let scheme = fv_mesh.schemes().div_scheme::<V>(&key)?;
    scheme
        .flux(fv_mesh, phi, vf)
        .wrap_err_with(|| format!("Failed to evaluate the flux of `{}`", key))
}

/// `laplacian(gamma, vf)` with a cell diffusivity.
pub fn laplacian<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &VolField<T, T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let key = format!("laplacian({},{})", gamma.name(), vf.name());
    let scheme = fv_mesh.schemes().laplacian_scheme::<V>(&key)?;
    let gamma = scheme.interpolate_gamma(fv_mesh, gamma)?;
    scheme
        .fvc_laplacian(fv_mesh, &gamma, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// `laplacian(gamma, vf)` with a face diffusivity.
pub fn laplacian_surface<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &SurfaceField<T, T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let key = format!("laplacian({},{})", gamma.name(), vf.name());
    let scheme = fv_mesh.schemes().laplacian_scheme::<V>(&key)?;
    scheme
        .fvc_laplacian(fv_mesh, gamma, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

pub fn laplacian_uniform<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    gamma: &Dimensioned<T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let gamma = SurfaceField::uniform(fv_mesh.mesh(), gamma.name.clone(), gamma.dimensions, gamma.value);
    laplacian_surface(fv_mesh, &gamma, vf)
}

/// `ddt(vf)` from the current and old time levels of `vf`.
pub fn ddt<T: Real, V: SchemeValue<T>>(fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
    let key = format!("ddt({})", vf.name());
    let scheme = fv_mesh.schemes().ddt_scheme::<V>(&key)?;
    scheme
        .fvc_ddt(fv_mesh, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

pub fn ddt_rho<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    rho: &VolField<T, T>,
    vf: &VolField<T, V>,
) -> eyre::Result<VolField<T, V>> {
    let key = format!("ddt({},{})", rho.name(), vf.name());
    let scheme = fv_mesh.schemes().ddt_scheme::<V>(&key)?;
    scheme
        .fvc_ddt_rho(fv_mesh, rho, vf)
        .wrap_err_with(|| format!("Failed to evaluate `{}`", key))
}

/// `∫ vf dV` over the whole (possibly decomposed) domain.
pub fn domain_integrate<T: Real, V: FieldValue<T>>(fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<V> {
    let local = izip!(vf.internal_values(), fv_mesh.mesh().cell_volumes())
        .fold(V::zero(), |sum, (&value, &volume)| sum + value * volume);
    let mut components: Vec<T> = (0..V::NUM_COMPONENTS).map(|i| local.component(i)).collect();
    all_reduce_sum(fv_mesh.transport(), &mut components)
        .wrap_err_with(|| format!("Failed to reduce the integral of `{}`", vf.name()))?;
    Ok(V::from_components(&components))
}

/// Maximum and volume-weighted mean Courant number over all ranks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CourantNumber<T> {
    pub mean: T,
    pub max: T,
}

/// Courant number `Co = 0.5 Δt Σ|phi| / V` of the cells for the volumetric flux `phi`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn courant_number<T: Real>(fv_mesh: &FvMesh<T>, phi: &SurfaceField<T, T>) -> eyre::Result<CourantNumber<T>> {
    let mesh = fv_mesh.mesh();
    let delta_t = fv_mesh.time().delta_t();
    let sum_phi = surface_sum(fv_mesh, &phi.map("magPhi", phi.dimensions(), |flux| flux.abs()))?;

    let mut max = [izip!(sum_phi.internal_values(), mesh.cell_volumes())
        .map(|(&sum, &volume)| 0.5 * sum / mesh.tolerances().floor_vsmall(volume) * delta_t)
        .fold(0.0, |a, b| a.max(b))];
    let mut totals = [
        sum_phi.internal_values().iter().fold(T::zero(), |a, &b| a + b),
        mesh.cell_volumes().iter().fold(T::zero(), |a, &b| a + b),
    ];
    all_reduce_max(fv_mesh.transport(), &mut max).wrap_err("Failed to reduce the maximum Courant number")?;
    all_reduce_sum(fv_mesh.transport(), &mut totals).wrap_err("Failed to reduce the mean Courant number")?;

    let mean = if totals[1] > 0.0 {
        0.5 * totals[0] / totals[1] * delta_t
    } else {
        0.0
    };
    Ok(CourantNumber { mean, max: max[0] })
}
