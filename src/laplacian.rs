//! Laplacian (diffusion) schemes.
use crate::convection::InterpolationScheme;
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::fvc;
use crate::matrix::FvMatrix;
use crate::schemes::{FvSchemes, SchemeFamily, SchemeStream, SchemeValue};
use crate::sn_grad::SnGradScheme;
use crate::Real;
use eyre::WrapErr;
use itertools::izip;
use std::fmt::Debug;

/// Discretisation of `laplacian(gamma, vf)` with a scalar diffusivity.
pub trait LaplacianScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn name(&self) -> &'static str;

    fn sn_grad_scheme(&self) -> &dyn SnGradScheme<T, V>;

    /// Interpolation of a cell diffusivity to the faces.
    fn gamma_interpolation(&self) -> &dyn InterpolationScheme<T, T>;

    fn interpolate_gamma(&self, fv_mesh: &FvMesh<T>, gamma: &VolField<T, T>) -> eyre::Result<SurfaceField<T, T>> {
        self.gamma_interpolation()
            .interpolate(fv_mesh, gamma, None)
            .wrap_err_with(|| format!("Failed to interpolate diffusivity `{}`", gamma.name()))
    }

    fn fvm_laplacian(
        &self,
        fv_mesh: &FvMesh<T>,
        gamma: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>>;

    fn fvc_laplacian(
        &self,
        fv_mesh: &FvMesh<T>,
        gamma: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>>;
}

/// `gamma |S|` on every face.
pub fn gamma_mag_sf<T: Real>(fv_mesh: &FvMesh<T>, gamma: &SurfaceField<T, T>) -> SurfaceField<T, T> {
    let mesh = fv_mesh.mesh();
    let areas = mesh.face_area_magnitudes();
    let mag_sf = SurfaceField::from_face_fn(mesh, "magSf", Dimensions::AREA, |face| areas[face]);
    gamma.zip_map(
        &mag_sf,
        format!("{}*magSf", gamma.name()),
        gamma.dimensions() * Dimensions::AREA,
        |g, s| g * s,
    )
}

/// Gauss theorem applied to the face normal gradient.
#[derive(Debug)]
pub struct GaussLaplacian<T: Real, V: SchemeValue<T>> {
    gamma_interpolation: Box<dyn InterpolationScheme<T, T>>,
    sn_grad: Box<dyn SnGradScheme<T, V>>,
}

impl<T: Real, V: SchemeValue<T>> GaussLaplacian<T, V> {
    pub fn new(gamma_interpolation: Box<dyn InterpolationScheme<T, T>>, sn_grad: Box<dyn SnGradScheme<T, V>>) -> Self {
        Self {
            gamma_interpolation,
            sn_grad,
        }
    }
}

impl<T: Real, V: SchemeValue<T>> LaplacianScheme<T, V> for GaussLaplacian<T, V> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn sn_grad_scheme(&self) -> &dyn SnGradScheme<T, V> {
        self.sn_grad.as_ref()
    }

    fn gamma_interpolation(&self) -> &dyn InterpolationScheme<T, T> {
        self.gamma_interpolation.as_ref()
    }

    fn fvm_laplacian(
        &self,
        fv_mesh: &FvMesh<T>,
        gamma: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let mesh = fv_mesh.mesh();
        let gamma_mag_sf = gamma_mag_sf(fv_mesh, gamma);
        let delta_coeffs = self.sn_grad.delta_coeffs(fv_mesh, vf);

        let mut matrix = FvMatrix::new(
            mesh,
            vf.name(),
            gamma.dimensions() * vf.dimensions() * Dimensions::LENGTH,
        );
        let coeffs: Vec<T> = izip!(gamma_mag_sf.internal_values(), delta_coeffs.internal_values())
            .map(|(&g, &delta)| g * delta)
            .collect();
        matrix.upper_mut().copy_from_slice(&coeffs);
        matrix.lower_mut().copy_from_slice(&coeffs);
        matrix.neg_sum_diag(mesh);

        for patch in 0..mesh.patches().len() {
            let patch_field = vf.patch_field(patch);
            let patch_gamma = gamma_mag_sf.boundary_values(patch);
            let patch_deltas = delta_coeffs.boundary_values(patch);
            let internal_coeffs = patch_field.gradient_internal_coeffs_with(fv_mesh, patch_deltas)?;
            let boundary_coeffs =
                patch_field.gradient_boundary_coeffs_with(fv_mesh, patch_deltas, vf.internal_values())?;
            for (coeff, c, &g) in izip!(matrix.internal_coeffs_mut(patch), internal_coeffs, patch_gamma) {
                *coeff = c * g;
            }
            for (coeff, c, &g) in izip!(matrix.boundary_coeffs_mut(patch), boundary_coeffs, patch_gamma) {
                *coeff = -(c * g);
            }
        }

        if self.sn_grad.corrected() {
            if let Some(correction) = self.sn_grad.correction(fv_mesh, vf)? {
                let flux_correction = gamma_mag_sf.zip_map(
                    &correction,
                    format!("laplacianCorrection({})", vf.name()),
                    matrix.dimensions(),
                    |g, c| c * g,
                );
                matrix.add_explicit(fv_mesh, &fvc::surface_integrate_values(fv_mesh, &flux_correction));
                matrix.set_face_flux_correction(flux_correction);
            }
        }
        Ok(matrix)
    }

    fn fvc_laplacian(
        &self,
        fv_mesh: &FvMesh<T>,
        gamma: &SurfaceField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let sn_grad = self.sn_grad.sn_grad(fv_mesh, vf)?;
        let gamma_mag_sf = gamma_mag_sf(fv_mesh, gamma);
        let flux = gamma_mag_sf.zip_map(
            &sn_grad,
            "laplacianFlux",
            gamma_mag_sf.dimensions() * sn_grad.dimensions(),
            |g, sn| sn * g,
        );
        let mut laplacian = fvc::surface_integrate(fv_mesh, &flux)?;
        laplacian.rename(format!("laplacian({},{})", gamma.name(), vf.name()));
        Ok(laplacian)
    }
}

fn parse_gauss<T: Real, V: SchemeValue<T>>(
    schemes: &FvSchemes<T>,
    stream: &mut SchemeStream<'_>,
) -> Result<GaussLaplacian<T, V>, SchemeError> {
    let gamma_interpolation = schemes.scalar_registry().interpolation.parse(schemes, stream)?;
    let sn_grad = V::registry(schemes).sn_grad.parse(schemes, stream)?;
    Ok(GaussLaplacian::new(gamma_interpolation, sn_grad))
}

pub(crate) fn register_laplacian_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn LaplacianScheme<T, V>>>,
) {
    family.register("Gauss", |schemes, stream| Ok(Box::new(parse_gauss::<T, V>(schemes, stream)?)));
}
