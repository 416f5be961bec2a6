use crate::convection::limited::{limited_weights, limiter_field, LIMITER_NAMES};
use crate::convection::{limiter_from_stream, upwind_weights, ConvectionScheme, FixedWeights, GaussConvectionScheme};
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::interpolation::interpolate_with_weights;
use crate::schemes::SchemeStream;
use crate::Real;
use eyre::WrapErr;
use log::debug;

/// One set of interpolation weights shared by several scalar fields transported by the same
/// flux, so that bounded combinations of the fields (e.g. mass fractions summing to one)
/// remain bounded.
///
/// The selection is `upwind` or one of the limited schemes (`limitedLinear k`, `vanLeer`,
/// `Minmod`, `MUSCL`, `SuperBee`). For limited schemes the shared limiter of a face is the
/// minimum of the limiters of all fields.
#[derive(Debug, Clone)]
pub struct MultivariateScheme<T: Real> {
    selection: String,
    weights: SurfaceField<T, T>,
}

impl<T: Real> MultivariateScheme<T> {
    pub fn new(
        fv_mesh: &FvMesh<T>,
        selection: &str,
        fields: &[&VolField<T, T>],
        phi: &SurfaceField<T, T>,
    ) -> eyre::Result<Self> {
        let weights = shared_weights(fv_mesh, selection, fields, phi)
            .wrap_err_with(|| format!("Invalid multivariate selection `{}`", selection))?;
        debug!(
            "Computed multivariate {} weights for {} fields",
            selection,
            fields.len()
        );
        Ok(Self {
            selection: selection.to_string(),
            weights,
        })
    }

    /// Reads the selection from a `divSchemes` entry of the form
    /// `Gauss multivariateSelection <scheme>`.
    pub fn from_config(
        fv_mesh: &FvMesh<T>,
        key: &str,
        fields: &[&VolField<T, T>],
        phi: &SurfaceField<T, T>,
    ) -> eyre::Result<Self> {
        let scheme = fv_mesh.schemes().div_scheme_string(key)?;
        let mut stream = SchemeStream::new(scheme);
        if !(stream.next_if("Gauss") && stream.next_if("multivariateSelection")) {
            let err = SchemeError::UnknownScheme {
                family: "multivariate convection",
                name: scheme.to_string(),
                available: vec!["Gauss multivariateSelection".to_string()],
            };
            return Err(err.in_entry(key, scheme).into());
        }
        Self::new(fv_mesh, &stream.remaining(), fields, phi)
            .wrap_err_with(|| format!("In entry `{}` of divSchemes", key))
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    pub fn weights(&self) -> &SurfaceField<T, T> {
        &self.weights
    }

    /// Face values of one of the fields with the shared weights.
    pub fn interpolate(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, T>) -> SurfaceField<T, T> {
        interpolate_with_weights(fv_mesh, vf, &self.weights)
    }

    /// A convection scheme using the shared weights.
    pub fn convection_scheme(&self) -> Box<dyn ConvectionScheme<T, T>> {
        let interpolation = FixedWeights::new("multivariateSelection", self.weights.clone());
        Box::new(GaussConvectionScheme::new(Box::new(interpolation)))
    }
}

fn shared_weights<T: Real>(
    fv_mesh: &FvMesh<T>,
    selection: &str,
    fields: &[&VolField<T, T>],
    phi: &SurfaceField<T, T>,
) -> eyre::Result<SurfaceField<T, T>> {
    let mut stream = SchemeStream::new(selection);
    let name = stream.next_word("multivariate scheme")?;
    let weights = if name == "upwind" {
        upwind_weights(phi)
    } else {
        let limiter = limiter_from_stream::<T>(name, &mut stream)?.ok_or_else(|| SchemeError::UnknownScheme {
            family: "multivariateSelection",
            name: name.to_string(),
            available: std::iter::once("upwind")
                .chain(LIMITER_NAMES)
                .map(String::from)
                .collect(),
        })?;

        let mut shared = SurfaceField::uniform(fv_mesh.mesh(), "multivariateLimiter", Dimensions::DIMLESS, T::one());
        for (i, field) in fields.iter().enumerate() {
            let field_limiter = limiter_field(limiter.as_ref(), fv_mesh, *field, phi)?;
            shared = if i == 0 {
                field_limiter
            } else {
                shared.zip_map(&field_limiter, "multivariateLimiter", Dimensions::DIMLESS, |a, b| a.min(b))
            };
        }
        limited_weights(fv_mesh, &shared, phi)
    };
    stream.finish()?;
    Ok(weights)
}
