//! TVD schemes: blends of linear and upwind interpolation controlled by a flux limiter.
//!
//! The limiter is a function of the gradient ratio `r` of the NVD/TVD formulation,
//! `r = 2 (d · grad_C) / (φ_N - φ_P) - 1`, where `grad_C` is the gradient of the upwind
//! cell. A limiter of one recovers linear interpolation, zero recovers upwind.
use crate::convection::{pos0, InterpolationScheme};
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::{Differentiable, FieldValue, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::grad::gauss_linear_grad;
use crate::schemes::{SchemeFamily, SchemeStream, SchemeValue};
use crate::Real;
use itertools::izip;
use nalgebra::Vector3;
use numeric_literals::replace_float_literals;
use std::fmt::Debug;
use std::marker::PhantomData;

pub trait Limiter<T: Real>: Debug {
    fn name(&self) -> &'static str;

    fn limiter(&self, r: T) -> T;
}

/// Linear interpolation limited towards upwind where `r < k / 2`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LimitedLinear<T> {
    k: T,
}

impl<T: Real> LimitedLinear<T> {
    /// `k ∈ [0, 1]`: zero is least limited, one is TVD.
    pub fn new(k: T) -> Self {
        Self { k }
    }

    pub fn k(&self) -> T {
        self.k
    }
}

impl<T: Real> Limiter<T> for LimitedLinear<T> {
    fn name(&self) -> &'static str {
        "limitedLinear"
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn limiter(&self, r: T) -> T {
        let two_by_k = 2.0 / self.k.max(T::default_epsilon());
        (two_by_k * r).min(1.0).max(0.0)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct VanLeer;

impl<T: Real> Limiter<T> for VanLeer {
    fn name(&self) -> &'static str {
        "vanLeer"
    }

    fn limiter(&self, r: T) -> T {
        (r + r.abs()) / (T::one() + r.abs())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Minmod;

impl<T: Real> Limiter<T> for Minmod {
    fn name(&self) -> &'static str {
        "Minmod"
    }

    fn limiter(&self, r: T) -> T {
        r.min(T::one()).max(T::zero())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Muscl;

impl<T: Real> Limiter<T> for Muscl {
    fn name(&self) -> &'static str {
        "MUSCL"
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn limiter(&self, r: T) -> T {
        (2.0 * r).min(0.5 * r + 0.5).min(2.0).max(0.0)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SuperBee;

impl<T: Real> Limiter<T> for SuperBee {
    fn name(&self) -> &'static str {
        "SuperBee"
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn limiter(&self, r: T) -> T {
        (2.0 * r).min(1.0).max(r.min(2.0)).max(0.0)
    }
}

/// Builds the limiter named `name`, reading its coefficients from the stream.
///
/// Returns `None` if there is no limiter of that name.
pub fn limiter_from_stream<T: Real>(
    name: &str,
    stream: &mut SchemeStream<'_>,
) -> Result<Option<Box<dyn Limiter<T>>>, SchemeError> {
    let limiter: Box<dyn Limiter<T>> = match name {
        "limitedLinear" => Box::new(LimitedLinear::new(stream.read_unit_coefficient::<T>("k")?)),
        "vanLeer" => Box::new(VanLeer),
        "Minmod" => Box::new(Minmod),
        "MUSCL" => Box::new(Muscl),
        "SuperBee" => Box::new(SuperBee),
        _ => return Ok(None),
    };
    Ok(Some(limiter))
}

pub(crate) const LIMITER_NAMES: [&str; 5] = ["limitedLinear", "vanLeer", "Minmod", "MUSCL", "SuperBee"];

fn sign<T: Real>(x: T) -> T {
    if x >= T::zero() {
        T::one()
    } else {
        -T::one()
    }
}

/// The NVD/TVD gradient ratio of a face with owner value `phi_p` and neighbour value `phi_n`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub(crate) fn gradient_ratio<T: Real>(
    face_flux: T,
    phi_p: T,
    phi_n: T,
    grad_p: &Vector3<T>,
    grad_n: &Vector3<T>,
    d: &Vector3<T>,
) -> T {
    let gradf = phi_n - phi_p;
    let gradcf = if face_flux > 0.0 { d.dot(grad_p) } else { d.dot(grad_n) };
    if gradcf.abs() >= 1000.0 * gradf.abs() {
        2.0 * 1000.0 * sign(gradcf) * sign(gradf) - 1.0
    } else {
        2.0 * (gradcf / gradf) - 1.0
    }
}

/// The limiter of one face, the minimum over all components of the value.
fn face_limiter<T: Real, V: Differentiable<T>>(
    limiter: &dyn Limiter<T>,
    face_flux: T,
    phi_p: &V,
    phi_n: &V,
    grad_p: &V::Gradient,
    grad_n: &V::Gradient,
    d: &Vector3<T>,
) -> T {
    let component_limiter = |j: usize| {
        let r = gradient_ratio(
            face_flux,
            phi_p.component(j),
            phi_n.component(j),
            &V::gradient_component(grad_p, j),
            &V::gradient_component(grad_n, j),
            d,
        );
        limiter.limiter(r)
    };
    (1..V::NUM_COMPONENTS).fold(component_limiter(0), |min, j| min.min(component_limiter(j)))
}

/// Limiter values of every face for transporting `vf` with `phi`.
///
/// Non-coupled patches are not limited.
pub(crate) fn limiter_field<T: Real, V: SchemeValue<T>>(
    limiter: &dyn Limiter<T>,
    fv_mesh: &FvMesh<T>,
    vf: &VolField<T, V>,
    phi: &SurfaceField<T, T>,
) -> eyre::Result<SurfaceField<T, T>> {
    let mesh = fv_mesh.mesh();
    let grad = gauss_linear_grad(fv_mesh, vf)?;
    let interpolation = fv_mesh.interpolation();
    let deltas = interpolation.deltas();
    let values = vf.internal_values();
    let g = grad.internal_values();

    let internal = izip!(mesh.owner(), mesh.neighbour(), phi.internal_values(), deltas.internal_values())
        .map(|(&own, &nei, &flux, d)| face_limiter(limiter, flux, &values[own], &values[nei], &g[own], &g[nei], d))
        .collect();

    let boundary = (0..mesh.patches().len())
        .map(|patch| {
            let size = mesh.patch(patch).size();
            let neighbour_values = vf.patch_neighbour_values(fv_mesh, patch);
            let neighbour_grads = grad.patch_neighbour_values(fv_mesh, patch);
            match (neighbour_values, neighbour_grads) {
                (Some(phi_n), Some(grad_n)) => izip!(
                    mesh.patch_face_cells(patch),
                    &phi_n,
                    &grad_n,
                    phi.boundary_values(patch),
                    deltas.boundary_values(patch)
                )
                .map(|(&cell, phi_n, grad_n, &flux, d)| {
                    face_limiter(limiter, flux, &values[cell], phi_n, &g[cell], grad_n, d)
                })
                .collect(),
                _ => vec![T::one(); size],
            }
        })
        .collect();

    Ok(SurfaceField::new(
        mesh,
        format!("{}Limiter({})", limiter.name(), vf.name()),
        Dimensions::DIMLESS,
        internal,
        boundary,
    )?)
}

/// Weights `limiter w + (1 - limiter) pos0(phi)` blending linear and upwind interpolation.
pub(crate) fn limited_weights<T: Real>(
    fv_mesh: &FvMesh<T>,
    limiter: &SurfaceField<T, T>,
    phi: &SurfaceField<T, T>,
) -> SurfaceField<T, T> {
    let interpolation = fv_mesh.interpolation();
    let mut weights = limiter.zip_map(interpolation.weights(), "limitedWeights", Dimensions::DIMLESS, |l, w| l * w);
    let upwind = phi.zip_map(limiter, "upwindWeights", Dimensions::DIMLESS, |flux, l| {
        (T::one() - l) * pos0(flux)
    });
    weights.add_field(&upwind);
    weights
}

/// A TVD scheme defined by its limiter.
#[derive(Debug)]
pub struct LimitedScheme<T: Real, V: FieldValue<T>> {
    limiter: Box<dyn Limiter<T>>,
    marker: PhantomData<V>,
}

impl<T: Real, V: FieldValue<T>> LimitedScheme<T, V> {
    pub fn new(limiter: Box<dyn Limiter<T>>) -> Self {
        Self {
            limiter,
            marker: PhantomData,
        }
    }
}

impl<T: Real, V: SchemeValue<T>> InterpolationScheme<T, V> for LimitedScheme<T, V> {
    fn name(&self) -> &'static str {
        self.limiter.name()
    }

    fn weights(
        &self,
        fv_mesh: &FvMesh<T>,
        vf: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<SurfaceField<T, T>> {
        let phi = flux.ok_or(SchemeError::FluxRequired {
            scheme: self.limiter.name(),
        })?;
        let limiter = limiter_field(self.limiter.as_ref(), fv_mesh, vf, phi)?;
        Ok(limited_weights(fv_mesh, &limiter, phi))
    }

    fn limiter(
        &self,
        fv_mesh: &FvMesh<T>,
        vf: &VolField<T, V>,
        flux: Option<&SurfaceField<T, T>>,
    ) -> eyre::Result<Option<SurfaceField<T, T>>> {
        let phi = flux.ok_or(SchemeError::FluxRequired {
            scheme: self.limiter.name(),
        })?;
        Ok(Some(limiter_field(self.limiter.as_ref(), fv_mesh, vf, phi)?))
    }
}

pub(crate) fn register_limited_schemes<T: Real, V: SchemeValue<T>>(
    family: &mut SchemeFamily<T, Box<dyn InterpolationScheme<T, V>>>,
) {
    for name in LIMITER_NAMES {
        family.register(name, move |_, stream| {
            let limiter = limiter_from_stream::<T>(name, stream)?
                .expect("Internal error: every registered limiter name has a limiter");
            Ok(Box::new(LimitedScheme::<T, V>::new(limiter)))
        });
    }
}
