//! Time derivative schemes.
//!
//! All schemes take the old-time values from the field itself (see
//! [`VolField::store_old_time`]) and the time step from the [`Time`](crate::time::Time) of
//! the mesh. Cell volumes are assumed constant in time.
use crate::dimensions::Dimensions;
use crate::error::SchemeError;
use crate::field::VolField;
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::schemes::{SchemeFamily, SchemeValue};
use crate::Real;
use itertools::izip;
use num::Zero;
use std::fmt::Debug;

mod backward;

pub use backward::Backward;

pub trait DdtScheme<T: Real, V: SchemeValue<T>>: Debug {
    fn name(&self) -> &'static str;

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>>;

    /// Implicit `ddt(rho, vf)` with a scalar density.
    fn fvm_ddt_rho(&self, fv_mesh: &FvMesh<T>, rho: &VolField<T, T>, vf: &VolField<T, V>)
        -> eyre::Result<FvMatrix<T, V>>;

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>>;

    fn fvc_ddt_rho(&self, fv_mesh: &FvMesh<T>, rho: &VolField<T, T>, vf: &VolField<T, V>)
        -> eyre::Result<VolField<T, V>>;
}

/// Dimensions of the matrix of `ddt(vf)` (or `ddt(rho, vf)`): the integral over the cell.
pub(crate) fn ddt_matrix_dimensions(rho: Option<Dimensions>, vf: Dimensions) -> Dimensions {
    rho.unwrap_or(Dimensions::DIMLESS) * vf * Dimensions::VOLUME / Dimensions::TIME
}

fn ddt_name<T: Real, V: SchemeValue<T>>(rho: Option<&VolField<T, T>>, vf: &VolField<T, V>) -> String {
    match rho {
        Some(rho) => format!("ddt({},{})", rho.name(), vf.name()),
        None => format!("ddt({})", vf.name()),
    }
}

fn ddt_field<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    rho: Option<&VolField<T, T>>,
    vf: &VolField<T, V>,
    internal: Vec<V>,
    boundary: Vec<Vec<V>>,
) -> eyre::Result<VolField<T, V>> {
    let dimensions = rho.map_or(Dimensions::DIMLESS, |rho| rho.dimensions()) * vf.dimensions() / Dimensions::TIME;
    Ok(VolField::calculated(fv_mesh, ddt_name(rho, vf), dimensions, internal, boundary)?)
}

/// `rho * value`, or `value` without a density.
fn weighted<T: Real, V: SchemeValue<T>>(rho: Option<&[T]>, index: usize, value: V) -> V {
    match rho {
        Some(rho) => value * rho[index],
        None => value,
    }
}

/// Implicit first order backward difference with the reciprocal time step of each cell.
fn euler_fvm<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    rho: Option<&VolField<T, T>>,
    vf: &VolField<T, V>,
    rdelta_t: impl Fn(usize) -> T,
) -> FvMatrix<T, V> {
    let mesh = fv_mesh.mesh();
    let mut matrix = FvMatrix::new(
        mesh,
        vf.name(),
        ddt_matrix_dimensions(rho.map(|rho| rho.dimensions()), vf.dimensions()),
    );
    let rho_now = rho.map(|rho| rho.internal_values());
    let rho_old = rho.map(|rho| rho.old_internal_values());
    for (cell, &volume) in mesh.cell_volumes().iter().enumerate() {
        let coeff = rdelta_t(cell) * volume;
        matrix.diag_mut()[cell] = rho_now.map_or(coeff, |rho| coeff * rho[cell]);
        matrix.source_mut()[cell] = weighted(rho_old, cell, vf.old_internal_values()[cell]) * coeff;
    }
    matrix
}

fn euler_fvc<T: Real, V: SchemeValue<T>>(
    fv_mesh: &FvMesh<T>,
    rho: Option<&VolField<T, T>>,
    vf: &VolField<T, V>,
    rdelta_t: impl Fn(usize) -> T,
) -> eyre::Result<VolField<T, V>> {
    let mesh = fv_mesh.mesh();
    let rho_now = rho.map(|rho| rho.internal_values());
    let rho_old = rho.map(|rho| rho.old_internal_values());
    let internal = izip!(vf.internal_values(), vf.old_internal_values())
        .enumerate()
        .map(|(cell, (&value, &old))| {
            (weighted(rho_now, cell, value) - weighted(rho_old, cell, old)) * rdelta_t(cell)
        })
        .collect();
    let boundary = (0..mesh.patches().len())
        .map(|patch| {
            let rho_now = rho.map(|rho| rho.boundary_values(patch));
            let rho_old = rho.map(|rho| rho.old_boundary_values(patch));
            izip!(
                mesh.patch_face_cells(patch),
                vf.boundary_values(patch),
                vf.old_boundary_values(patch)
            )
            .enumerate()
            .map(|(i, (&cell, &value, &old))| {
                (weighted(rho_now, i, value) - weighted(rho_old, i, old)) * rdelta_t(cell)
            })
            .collect()
        })
        .collect();
    ddt_field(fv_mesh, rho, vf, internal, boundary)
}

/// First order implicit Euler scheme.
#[derive(Debug, Copy, Clone, Default)]
pub struct Euler;

impl<T: Real, V: SchemeValue<T>> DdtScheme<T, V> for Euler {
    fn name(&self) -> &'static str {
        "Euler"
    }

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
        let rdelta_t = fv_mesh.time().rdelta_t();
        Ok(euler_fvm(fv_mesh, None, vf, |_| rdelta_t))
    }

    fn fvm_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let rdelta_t = fv_mesh.time().rdelta_t();
        Ok(euler_fvm(fv_mesh, Some(rho), vf, |_| rdelta_t))
    }

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
        let rdelta_t = fv_mesh.time().rdelta_t();
        euler_fvc(fv_mesh, None, vf, |_| rdelta_t)
    }

    fn fvc_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let rdelta_t = fv_mesh.time().rdelta_t();
        euler_fvc(fv_mesh, Some(rho), vf, |_| rdelta_t)
    }
}

/// Euler scheme with a per-cell time step, for pseudo-transient convergence acceleration.
///
/// The reciprocal time steps are read from [`Time::local_rdelta_t`](crate::time::Time::local_rdelta_t).
#[derive(Debug, Copy, Clone, Default)]
pub struct LocalEuler;

impl LocalEuler {
    fn rdelta_t<T: Real>(fv_mesh: &FvMesh<T>) -> Result<&[T], SchemeError> {
        let num_cells = fv_mesh.mesh().num_cells();
        match fv_mesh.time().local_rdelta_t() {
            Some(rdelta_t) if rdelta_t.len() == num_cells => Ok(rdelta_t),
            other => Err(SchemeError::MissingLocalTimeStep {
                num_cells,
                available: other.map(<[T]>::len),
            }),
        }
    }
}

impl<T: Real, V: SchemeValue<T>> DdtScheme<T, V> for LocalEuler {
    fn name(&self) -> &'static str {
        "localEuler"
    }

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
        let rdelta_t = Self::rdelta_t(fv_mesh)?;
        Ok(euler_fvm(fv_mesh, None, vf, |cell| rdelta_t[cell]))
    }

    fn fvm_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let rdelta_t = Self::rdelta_t(fv_mesh)?;
        Ok(euler_fvm(fv_mesh, Some(rho), vf, |cell| rdelta_t[cell]))
    }

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
        let rdelta_t = Self::rdelta_t(fv_mesh)?;
        euler_fvc(fv_mesh, None, vf, |cell| rdelta_t[cell])
    }

    fn fvc_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let rdelta_t = Self::rdelta_t(fv_mesh)?;
        euler_fvc(fv_mesh, Some(rho), vf, |cell| rdelta_t[cell])
    }
}

/// No time derivative: an empty matrix and a zero field.
#[derive(Debug, Copy, Clone, Default)]
pub struct SteadyState;

impl<T: Real, V: SchemeValue<T>> DdtScheme<T, V> for SteadyState {
    fn name(&self) -> &'static str {
        "steadyState"
    }

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
        Ok(FvMatrix::new(
            fv_mesh.mesh(),
            vf.name(),
            ddt_matrix_dimensions(None, vf.dimensions()),
        ))
    }

    fn fvm_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        Ok(FvMatrix::new(
            fv_mesh.mesh(),
            vf.name(),
            ddt_matrix_dimensions(Some(rho.dimensions()), vf.dimensions()),
        ))
    }

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
        let mut ddt = VolField::uniform(fv_mesh, ddt_name(None, vf), vf.dimensions() / Dimensions::TIME, V::zero());
        ddt.correct_boundary_conditions(fv_mesh)?;
        Ok(ddt)
    }

    fn fvc_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let dimensions = rho.dimensions() * vf.dimensions() / Dimensions::TIME;
        let mut ddt = VolField::uniform(fv_mesh, ddt_name(Some(rho), vf), dimensions, V::zero());
        ddt.correct_boundary_conditions(fv_mesh)?;
        Ok(ddt)
    }
}

/// Removes the part of `ddt(rho, vf)` that stems from the change of `rho`, so that a
/// density that does not satisfy continuity exactly does not produce spurious sources:
/// `ddt(rho, vf) - ddt(rho) vf`.
///
/// Derivatives without a density are passed through.
#[derive(Debug)]
pub struct BoundedDdt<T: Real, V: SchemeValue<T>> {
    inner: Box<dyn DdtScheme<T, V>>,
    density_scheme: Box<dyn DdtScheme<T, T>>,
}

impl<T: Real, V: SchemeValue<T>> BoundedDdt<T, V> {
    /// `density_scheme` evaluates `ddt(rho)` and is normally the scalar version of `inner`.
    pub fn new(inner: Box<dyn DdtScheme<T, V>>, density_scheme: Box<dyn DdtScheme<T, T>>) -> Self {
        Self { inner, density_scheme }
    }

    pub fn inner(&self) -> &dyn DdtScheme<T, V> {
        self.inner.as_ref()
    }
}

impl<T: Real, V: SchemeValue<T>> DdtScheme<T, V> for BoundedDdt<T, V> {
    fn name(&self) -> &'static str {
        "bounded"
    }

    fn fvm_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<FvMatrix<T, V>> {
        self.inner.fvm_ddt(fv_mesh, vf)
    }

    fn fvm_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<FvMatrix<T, V>> {
        let mut matrix = self.inner.fvm_ddt_rho(fv_mesh, rho, vf)?;
        let ddt_rho = self.density_scheme.fvc_ddt(fv_mesh, rho)?;
        let volumes = fv_mesh.mesh().cell_volumes();
        for (diag, &d, &volume) in izip!(matrix.diag_mut(), ddt_rho.internal_values(), volumes) {
            *diag -= d * volume;
        }
        Ok(matrix)
    }

    fn fvc_ddt(&self, fv_mesh: &FvMesh<T>, vf: &VolField<T, V>) -> eyre::Result<VolField<T, V>> {
        self.inner.fvc_ddt(fv_mesh, vf)
    }

    fn fvc_ddt_rho(
        &self,
        fv_mesh: &FvMesh<T>,
        rho: &VolField<T, T>,
        vf: &VolField<T, V>,
    ) -> eyre::Result<VolField<T, V>> {
        let ddt = self.inner.fvc_ddt_rho(fv_mesh, rho, vf)?;
        let ddt_rho = self.density_scheme.fvc_ddt(fv_mesh, rho)?;
        let internal = izip!(ddt.internal_values(), ddt_rho.internal_values(), vf.internal_values())
            .map(|(&ddt, &d, &value)| ddt - value * d)
            .collect();
        let boundary = (0..fv_mesh.mesh().patches().len())
            .map(|patch| {
                izip!(
                    ddt.boundary_values(patch),
                    ddt_rho.boundary_values(patch),
                    vf.boundary_values(patch)
                )
                .map(|(&ddt, &d, &value)| ddt - value * d)
                .collect()
            })
            .collect();
        ddt_field(fv_mesh, Some(rho), vf, internal, boundary)
    }
}

pub(crate) fn register_ddt_schemes<T: Real, V: SchemeValue<T>>(family: &mut SchemeFamily<T, Box<dyn DdtScheme<T, V>>>) {
    family.register("Euler", |_, _| Ok(Box::new(Euler)));
    family.register("backward", |_, _| Ok(Box::new(Backward::new())));
    family.register("steadyState", |_, _| Ok(Box::new(SteadyState)));
    family.register("localEuler", |_, _| Ok(Box::new(LocalEuler)));
    family.register("bounded", |schemes, stream| {
        if stream.next_if("backward") {
            return Ok(Box::new(BoundedDdt::new(
                Box::new(Backward::bounded()),
                Box::new(Backward::bounded()),
            )));
        }
        // The density scheme is the scalar scheme of the same name, read from the same tokens
        let mut density_stream = stream.clone();
        let inner = V::registry(schemes).ddt.parse(schemes, stream)?;
        let density_scheme = schemes.scalar_registry().ddt.parse(schemes, &mut density_stream)?;
        Ok(Box::new(BoundedDdt::new(inner, density_scheme)))
    });
}
