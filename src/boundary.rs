//! Boundary conditions of volume fields.
//!
//! Every patch of a field carries a [`PatchField`]. A patch field goes through the following
//! states:
//!
//! 1. After construction or [`reset`](PatchField::reset) it is not updated.
//! 2. [`update_coeffs`](PatchField::update_coeffs) brings its coefficients up to date for the
//!    current iteration. It is only performed once, until the next evaluation.
//! 3. [`init_evaluate`](PatchField::init_evaluate) and [`evaluate`](PatchField::evaluate)
//!    recompute the boundary values (updating the coefficients first if needed) and
//!    return the patch field to the not-updated state. Coupled patch fields send their
//!    adjacent cell values in the first phase and receive the values of the neighbouring
//!    cells in the second.
//!
//! Matrix assembly uses the coefficient queries: a boundary value is approximated as
//! `value_internal_coeffs ∘ φ_P + value_boundary_coeffs`, and the normal gradient as
//! `gradient_internal_coeffs ∘ φ_P + gradient_boundary_coeffs`. For coupled patches the
//! boundary coefficients multiply the neighbour values instead.
use crate::error::PatchError;
use crate::field::{patch_internal_values, FieldValue};
use crate::fv_mesh::FvMesh;
use crate::mesh::{Mesh, PatchKind};
use crate::Real;
use std::any::Any;
use std::fmt::Debug;

macro_rules! impl_patch_field_common {
    ($type_name:expr, $scalar:ty, $value:ty) => {
        fn type_name(&self) -> &'static str {
            $type_name
        }

        fn base(&self) -> &$crate::boundary::PatchFieldBase<$value> {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::boundary::PatchFieldBase<$value> {
            &mut self.base
        }

        fn clone_box(&self) -> Box<dyn $crate::boundary::PatchField<$scalar, $value>> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub mod basic;
pub mod constraint;
pub mod coupled;
pub mod derived;
pub mod registry;

pub use basic::{
    CalculatedPatchField, FixedGradientPatchField, FixedValuePatchField, MixedPatchField, ZeroGradientPatchField,
};
pub use constraint::{EmptyPatchField, SymmetryPlanePatchField};
pub use coupled::{CyclicPatchField, ProcessorPatchField};
pub use derived::{FixedFluxPressurePatchField, InletOutletPatchField};
pub use registry::{PatchFieldFactory, PatchFieldRegistry};

/// State shared by all patch fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchFieldBase<V> {
    patch: usize,
    patch_name: String,
    values: Vec<V>,
    updated: bool,
}

impl<V: Clone> PatchFieldBase<V> {
    pub fn new<T: Real>(mesh: &Mesh<T>, patch: usize, values: Vec<V>) -> Self {
        let info = mesh.patch(patch);
        assert_eq!(
            values.len(),
            info.size(),
            "Patch values of `{}` must have one value per face",
            info.name()
        );
        Self {
            patch,
            patch_name: info.name().to_string(),
            values,
            updated: false,
        }
    }

    pub fn patch(&self) -> usize {
        self.patch
    }

    pub fn patch_name(&self) -> &str {
        &self.patch_name
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vec<V> {
        &mut self.values
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn set_updated(&mut self, updated: bool) {
        self.updated = updated;
    }
}

/// A boundary condition on one patch of a field with values of type `V`.
pub trait PatchField<T: Real, V: FieldValue<T>>: Debug {
    fn type_name(&self) -> &'static str;

    fn base(&self) -> &PatchFieldBase<V>;

    fn base_mut(&mut self) -> &mut PatchFieldBase<V>;

    fn clone_box(&self) -> Box<dyn PatchField<T, V>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn patch(&self) -> usize {
        self.base().patch()
    }

    fn patch_name(&self) -> &str {
        self.base().patch_name()
    }

    /// The current boundary values, one per patch face.
    fn values(&self) -> &[V] {
        self.base().values()
    }

    fn updated(&self) -> bool {
        self.base().updated()
    }

    fn is_coupled(&self) -> bool {
        false
    }

    /// Whether the boundary value is prescribed, fixing the level of the solution.
    fn fixes_value(&self) -> bool {
        false
    }

    /// Overwrites the boundary values.
    fn assign(&mut self, values: &[V]) {
        self.base_mut().values_mut().copy_from_slice(values);
    }

    /// Receives the boundary values of the face flux, for conditions that depend on the flow
    /// direction. Ignored by all other conditions.
    fn set_patch_flux(&mut self, _phi: &[T]) {}

    fn update_coeffs(&mut self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<(), PatchError> {
        self.base_mut().set_updated(true);
        Ok(())
    }

    fn init_evaluate(&mut self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<(), PatchError> {
        Ok(())
    }

    fn evaluate(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        if !self.updated() {
            self.update_coeffs(fv_mesh, internal)?;
        }
        self.evaluate_values(fv_mesh, internal)?;
        self.base_mut().set_updated(false);
        Ok(())
    }

    /// Recomputes the boundary values from the current coefficients.
    fn evaluate_values(&mut self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<(), PatchError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.base_mut().set_updated(false);
    }

    /// Normal gradient at the patch faces.
    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        self.values()
            .iter()
            .zip(&internal)
            .zip(&delta_coeffs)
            .map(|((&value, &i), &delta)| (value - i) * delta)
            .collect()
    }

    /// Values in the cells across the patch faces, for coupled patches.
    fn patch_neighbour_values(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Option<Vec<V>> {
        None
    }

    fn value_internal_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T]) -> Result<Vec<V>, PatchError>;

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T], internal: &[V]) -> Result<Vec<V>, PatchError>;

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError>;

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<Vec<V>, PatchError>;

    /// Normal gradient with the distance coefficients `delta_coeffs` of a surface-normal
    /// gradient scheme on the patch faces.
    ///
    /// Only coupled conditions depend on the scheme. All others use the normal distance of
    /// the face from the adjacent cell centre.
    fn sn_grad_with(&self, fv_mesh: &FvMesh<T>, _delta_coeffs: &[T], internal: &[V]) -> Vec<V> {
        self.sn_grad(fv_mesh, internal)
    }

    fn gradient_internal_coeffs_with(&self, fv_mesh: &FvMesh<T>, _delta_coeffs: &[T]) -> Result<Vec<V>, PatchError> {
        self.gradient_internal_coeffs(fv_mesh)
    }

    fn gradient_boundary_coeffs_with(
        &self,
        fv_mesh: &FvMesh<T>,
        _delta_coeffs: &[T],
        internal: &[V],
    ) -> Result<Vec<V>, PatchError> {
        self.gradient_boundary_coeffs(fv_mesh, internal)
    }
}

/// Fails unless `values` holds one value per face of the patch.
pub(crate) fn check_patch_size<T: Real, W>(
    mesh: &Mesh<T>,
    patch: usize,
    entry: &str,
    values: &[W],
) -> Result<(), PatchError> {
    let info = mesh.patch(patch);
    if values.len() == info.size() {
        Ok(())
    } else {
        Err(PatchError::InvalidEntry {
            patch: info.name().to_string(),
            entry: entry.to_string(),
            message: format!("expected {} values, got {}", info.size(), values.len()),
        })
    }
}

/// Fails unless the patch is of the kind that the constraint type `type_name` belongs to.
pub(crate) fn require_patch_kind<T: Real>(
    mesh: &Mesh<T>,
    patch: usize,
    type_name: &'static str,
) -> Result<(), PatchError> {
    if mesh.patch(patch).kind().type_name() == type_name {
        Ok(())
    } else {
        Err(constraint_mismatch(mesh, patch, type_name))
    }
}

pub(crate) fn constraint_mismatch<T: Real>(mesh: &Mesh<T>, patch: usize, type_name: &str) -> PatchError {
    let info = mesh.patch(patch);
    PatchError::ConstraintMismatch {
        patch: info.name().to_string(),
        patch_kind: info.kind().type_name(),
        type_name: type_name.to_string(),
    }
}

/// Distance coefficients of the faces of a patch.
///
/// On non-coupled patches this is the inverse normal distance of the face from the adjacent
/// cell centre. On coupled patches it is the non-orthogonal distance coefficient, as for
/// internal faces.
pub(crate) fn patch_delta_coeffs<T: Real>(fv_mesh: &FvMesh<T>, patch: usize) -> Vec<T> {
    fv_mesh
        .interpolation()
        .non_orth_delta_coeffs()
        .boundary_values(patch)
        .to_vec()
}

/// The boundary condition of derived fields: constraint patches get their constraint
/// condition, all other patches are `calculated`.
pub fn calculated_patch_field<T: Real, V: FieldValue<T>>(
    fv_mesh: &FvMesh<T>,
    patch: usize,
    internal: &[V],
    values: Vec<V>,
) -> Result<Box<dyn PatchField<T, V>>, PatchError> {
    let mesh = fv_mesh.mesh();
    check_patch_size(mesh, patch, "value", &values)?;
    let field: Box<dyn PatchField<T, V>> = match mesh.patch(patch).kind() {
        PatchKind::Empty => Box::new(EmptyPatchField::new(mesh, patch, internal)),
        PatchKind::Cyclic { .. } => {
            let mut field = CyclicPatchField::new(mesh, patch, internal)?;
            field.assign(&values);
            Box::new(field)
        }
        PatchKind::Processor { .. } => {
            let mut field = ProcessorPatchField::new(mesh, patch, internal)?;
            field.assign(&values);
            Box::new(field)
        }
        _ => Box::new(CalculatedPatchField::new(mesh, patch, values)?),
    };
    Ok(field)
}
