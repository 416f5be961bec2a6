//! Conditions built on the basic ones, with coefficients set by the solution algorithm.
use crate::boundary::{check_patch_size, FixedGradientPatchField, MixedPatchField, PatchField, PatchFieldBase};
use crate::error::PatchError;
use crate::field::FieldValue;
use crate::fv_mesh::FvMesh;
use crate::Real;
use std::any::Any;

/// Fixed gradient condition for pressure, with the gradient set by the pressure-velocity
/// coupling so that the boundary flux matches the velocity condition.
///
/// The gradient must be provided with [`update_sn_grad`](Self::update_sn_grad) in every time
/// step before the coefficients are updated. Updating the coefficients with a gradient from
/// an earlier time step is an error.
#[derive(Debug, Clone)]
pub struct FixedFluxPressurePatchField<T: Real> {
    inner: FixedGradientPatchField<T, T>,
    sn_grad_time_index: Option<usize>,
}

impl<T: Real> FixedFluxPressurePatchField<T> {
    pub fn new(fv_mesh: &FvMesh<T>, patch: usize, gradient: Vec<T>, internal: &[T]) -> Result<Self, PatchError> {
        Ok(Self {
            inner: FixedGradientPatchField::new(fv_mesh, patch, gradient, internal)?,
            sn_grad_time_index: None,
        })
    }

    pub fn gradient(&self) -> &[T] {
        self.inner.gradient()
    }

    /// Sets the normal gradient for the current time step.
    pub fn update_sn_grad(&mut self, fv_mesh: &FvMesh<T>, gradient: Vec<T>) -> Result<(), PatchError> {
        self.inner.set_gradient(gradient)?;
        self.sn_grad_time_index = Some(fv_mesh.time().time_index());
        Ok(())
    }

    /// Time index of the last call to [`update_sn_grad`](Self::update_sn_grad).
    pub fn sn_grad_time_index(&self) -> Option<usize> {
        self.sn_grad_time_index
    }
}

impl<T: Real> PatchField<T, T> for FixedFluxPressurePatchField<T> {
    fn type_name(&self) -> &'static str {
        "fixedFluxPressure"
    }

    fn base(&self) -> &PatchFieldBase<T> {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut PatchFieldBase<T> {
        self.inner.base_mut()
    }

    fn clone_box(&self) -> Box<dyn PatchField<T, T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn update_coeffs(&mut self, fv_mesh: &FvMesh<T>, internal: &[T]) -> Result<(), PatchError> {
        let time_index = fv_mesh.time().time_index();
        if self.sn_grad_time_index != Some(time_index) {
            return Err(PatchError::SequencingViolation {
                patch: self.patch_name().to_string(),
                type_name: "fixedFluxPressure",
                updated_time_index: self.sn_grad_time_index,
                time_index,
            });
        }
        self.inner.update_coeffs(fv_mesh, internal)
    }

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[T]) -> Result<(), PatchError> {
        self.inner.evaluate_values(fv_mesh, internal)
    }

    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[T]) -> Vec<T> {
        self.inner.sn_grad(fv_mesh, internal)
    }

    fn value_internal_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T]) -> Result<Vec<T>, PatchError> {
        self.inner.value_internal_coeffs(fv_mesh, weights)
    }

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T], internal: &[T]) -> Result<Vec<T>, PatchError> {
        self.inner.value_boundary_coeffs(fv_mesh, weights, internal)
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<T>, PatchError> {
        self.inner.gradient_internal_coeffs(fv_mesh)
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, internal: &[T]) -> Result<Vec<T>, PatchError> {
        self.inner.gradient_boundary_coeffs(fv_mesh, internal)
    }
}

/// Switches between a fixed inlet value where the flux enters the domain and zero gradient
/// where it leaves.
///
/// The flux is provided with [`set_patch_flux`](PatchField::set_patch_flux) (usually through
/// [`VolField::set_patch_flux`](crate::field::VolField::set_patch_flux)) before the
/// coefficients are updated.
#[derive(Debug, Clone)]
pub struct InletOutletPatchField<T: Real, V: FieldValue<T>> {
    inner: MixedPatchField<T, V>,
    phi: Option<Vec<T>>,
}

impl<T: Real, V: FieldValue<T>> InletOutletPatchField<T, V> {
    pub fn new(fv_mesh: &FvMesh<T>, patch: usize, inlet_value: Vec<V>, internal: &[V]) -> Result<Self, PatchError> {
        let mesh = fv_mesh.mesh();
        check_patch_size(mesh, patch, "inletValue", &inlet_value)?;
        let size = mesh.patch(patch).size();
        Ok(Self {
            inner: MixedPatchField::new(
                fv_mesh,
                patch,
                inlet_value,
                vec![V::zero(); size],
                vec![T::zero(); size],
                internal,
            )?,
            phi: None,
        })
    }

    pub fn inlet_value(&self) -> &[V] {
        self.inner.ref_value()
    }

    pub fn inlet_value_mut(&mut self) -> &mut [V] {
        self.inner.ref_value_mut()
    }

    pub fn value_fraction(&self) -> &[T] {
        self.inner.value_fraction()
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for InletOutletPatchField<T, V> {
    fn type_name(&self) -> &'static str {
        "inletOutlet"
    }

    fn base(&self) -> &PatchFieldBase<V> {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut PatchFieldBase<V> {
        self.inner.base_mut()
    }

    fn clone_box(&self) -> Box<dyn PatchField<T, V>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn fixes_value(&self) -> bool {
        self.inner.fixes_value()
    }

    fn set_patch_flux(&mut self, phi: &[T]) {
        self.phi = Some(phi.to_vec());
    }

    fn update_coeffs(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        let phi = self.phi.as_ref().ok_or_else(|| PatchError::MissingEntry {
            patch: self.inner.patch_name().to_string(),
            entry: "phi",
        })?;
        check_patch_size(fv_mesh.mesh(), self.inner.patch(), "phi", phi)?;
        for (fraction, &flux) in self.inner.value_fraction_mut().iter_mut().zip(phi) {
            // Outflow (including zero flux) is zero gradient
            *fraction = if flux >= T::zero() { T::zero() } else { T::one() };
        }
        self.inner.update_coeffs(fv_mesh, internal)
    }

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        self.inner.evaluate_values(fv_mesh, internal)
    }

    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        self.inner.sn_grad(fv_mesh, internal)
    }

    fn value_internal_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T]) -> Result<Vec<V>, PatchError> {
        self.inner.value_internal_coeffs(fv_mesh, weights)
    }

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T], internal: &[V]) -> Result<Vec<V>, PatchError> {
        self.inner.value_boundary_coeffs(fv_mesh, weights, internal)
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        self.inner.gradient_internal_coeffs(fv_mesh)
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<Vec<V>, PatchError> {
        self.inner.gradient_boundary_coeffs(fv_mesh, internal)
    }
}
