//! Basic boundary conditions: prescribed values, prescribed gradients and their mix.
use crate::boundary::{check_patch_size, patch_delta_coeffs, PatchField, PatchFieldBase};
use crate::error::PatchError;
use crate::field::{patch_internal_values, FieldValue};
use crate::fv_mesh::FvMesh;
use crate::mesh::Mesh;
use crate::Real;
use itertools::izip;
use std::marker::PhantomData;

fn one<T: Real, V: FieldValue<T>>() -> V {
    V::splat(T::one())
}

/// Boundary values set explicitly, e.g. computed by an operator. Provides no coefficients
/// for implicit discretisation.
#[derive(Debug, Clone)]
pub struct CalculatedPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> CalculatedPatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, values: Vec<V>) -> Result<Self, PatchError> {
        check_patch_size(mesh, patch, "value", &values)?;
        Ok(Self {
            base: PatchFieldBase::new(mesh, patch, values),
            marker: PhantomData,
        })
    }

    fn not_implicit(&self) -> PatchError {
        PatchError::NotImplicit {
            patch: self.base.patch_name().to_string(),
            type_name: "calculated",
        }
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for CalculatedPatchField<T, V> {
    impl_patch_field_common!("calculated", T, V);

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Err(self.not_implicit())
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Err(self.not_implicit())
    }

    fn gradient_internal_coeffs(&self, _fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Err(self.not_implicit())
    }

    fn gradient_boundary_coeffs(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Err(self.not_implicit())
    }
}

/// Prescribed boundary values (Dirichlet condition).
#[derive(Debug, Clone)]
pub struct FixedValuePatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> FixedValuePatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, values: Vec<V>) -> Result<Self, PatchError> {
        check_patch_size(mesh, patch, "value", &values)?;
        Ok(Self {
            base: PatchFieldBase::new(mesh, patch, values),
            marker: PhantomData,
        })
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for FixedValuePatchField<T, V> {
    impl_patch_field_common!("fixedValue", T, V);

    fn fixes_value(&self) -> bool {
        true
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(vec![V::zero(); self.values().len()])
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(self.values().to_vec())
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(delta_coeffs.iter().map(|&delta| -one::<T, V>() * delta).collect())
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(self
            .values()
            .iter()
            .zip(&delta_coeffs)
            .map(|(&value, &delta)| value * delta)
            .collect())
    }
}

/// Prescribed normal gradient (Neumann condition).
#[derive(Debug, Clone)]
pub struct FixedGradientPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    gradient: Vec<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> FixedGradientPatchField<T, V> {
    pub fn new(fv_mesh: &FvMesh<T>, patch: usize, gradient: Vec<V>, internal: &[V]) -> Result<Self, PatchError> {
        let mesh = fv_mesh.mesh();
        check_patch_size(mesh, patch, "gradient", &gradient)?;
        let mut field = Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            gradient,
            marker: PhantomData,
        };
        field.compute_values(fv_mesh, internal);
        Ok(field)
    }

    pub fn gradient(&self) -> &[V] {
        &self.gradient
    }

    pub fn set_gradient(&mut self, gradient: Vec<V>) -> Result<(), PatchError> {
        if gradient.len() != self.gradient.len() {
            return Err(PatchError::InvalidEntry {
                patch: self.base.patch_name().to_string(),
                entry: "gradient".to_string(),
                message: format!("expected {} values, got {}", self.gradient.len(), gradient.len()),
            });
        }
        self.gradient = gradient;
        Ok(())
    }

    fn compute_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.base.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        for (value, &i, &g, &delta) in izip!(self.base.values_mut().iter_mut(), &internal, &self.gradient, &delta_coeffs) {
            *value = i + g * (T::one() / delta);
        }
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for FixedGradientPatchField<T, V> {
    impl_patch_field_common!("fixedGradient", T, V);

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        self.compute_values(fv_mesh, internal);
        Ok(())
    }

    fn sn_grad(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Vec<V> {
        self.gradient.clone()
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(vec![one::<T, V>(); self.values().len()])
    }

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(self
            .gradient
            .iter()
            .zip(&delta_coeffs)
            .map(|(&g, &delta)| g * (T::one() / delta))
            .collect())
    }

    fn gradient_internal_coeffs(&self, _fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Ok(vec![V::zero(); self.values().len()])
    }

    fn gradient_boundary_coeffs(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(self.gradient.clone())
    }
}

/// Zero normal gradient: the boundary value equals the adjacent cell value.
#[derive(Debug, Clone)]
pub struct ZeroGradientPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> ZeroGradientPatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, internal: &[V]) -> Self {
        Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            marker: PhantomData,
        }
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for ZeroGradientPatchField<T, V> {
    impl_patch_field_common!("zeroGradient", T, V);

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        *self.base.values_mut() = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        Ok(())
    }

    fn sn_grad(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Vec<V> {
        vec![V::zero(); self.values().len()]
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(vec![one::<T, V>(); self.values().len()])
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(vec![V::zero(); self.values().len()])
    }

    fn gradient_internal_coeffs(&self, _fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Ok(vec![V::zero(); self.values().len()])
    }

    fn gradient_boundary_coeffs(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(vec![V::zero(); self.values().len()])
    }
}

/// Blend of a prescribed value and a prescribed gradient, weighted per face by the value
/// fraction `f`: `f = 1` is a fixed value, `f = 0` a fixed gradient.
#[derive(Debug, Clone)]
pub struct MixedPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    ref_value: Vec<V>,
    ref_grad: Vec<V>,
    value_fraction: Vec<T>,
}

impl<T: Real, V: FieldValue<T>> MixedPatchField<T, V> {
    pub fn new(
        fv_mesh: &FvMesh<T>,
        patch: usize,
        ref_value: Vec<V>,
        ref_grad: Vec<V>,
        value_fraction: Vec<T>,
        internal: &[V],
    ) -> Result<Self, PatchError> {
        let mesh = fv_mesh.mesh();
        check_patch_size(mesh, patch, "refValue", &ref_value)?;
        check_patch_size(mesh, patch, "refGradient", &ref_grad)?;
        check_patch_size(mesh, patch, "valueFraction", &value_fraction)?;
        let mut field = Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            ref_value,
            ref_grad,
            value_fraction,
        };
        field.compute_values(fv_mesh, internal);
        Ok(field)
    }

    pub fn ref_value(&self) -> &[V] {
        &self.ref_value
    }

    pub fn ref_value_mut(&mut self) -> &mut [V] {
        &mut self.ref_value
    }

    pub fn ref_grad(&self) -> &[V] {
        &self.ref_grad
    }

    pub fn ref_grad_mut(&mut self) -> &mut [V] {
        &mut self.ref_grad
    }

    pub fn value_fraction(&self) -> &[T] {
        &self.value_fraction
    }

    pub fn value_fraction_mut(&mut self) -> &mut [T] {
        &mut self.value_fraction
    }

    fn compute_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.base.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        let values = izip!(&self.ref_value, &self.ref_grad, &self.value_fraction, &internal, &delta_coeffs)
            .map(|(&r, &g, &f, &i, &delta)| r * f + (i + g * (T::one() / delta)) * (T::one() - f))
            .collect();
        *self.base.values_mut() = values;
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for MixedPatchField<T, V> {
    impl_patch_field_common!("mixed", T, V);

    fn fixes_value(&self) -> bool {
        true
    }

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        self.compute_values(fv_mesh, internal);
        Ok(())
    }

    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        izip!(&self.ref_value, &self.ref_grad, &self.value_fraction, &internal, &delta_coeffs)
            .map(|(&r, &g, &f, &i, &delta)| (r - i) * (f * delta) + g * (T::one() - f))
            .collect()
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(self
            .value_fraction
            .iter()
            .map(|&f| one::<T, V>() * (T::one() - f))
            .collect())
    }

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(izip!(&self.ref_value, &self.ref_grad, &self.value_fraction, &delta_coeffs)
            .map(|(&r, &g, &f, &delta)| r * f + g * ((T::one() - f) / delta))
            .collect())
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(self
            .value_fraction
            .iter()
            .zip(&delta_coeffs)
            .map(|(&f, &delta)| -one::<T, V>() * (f * delta))
            .collect())
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(izip!(&self.ref_value, &self.ref_grad, &self.value_fraction, &delta_coeffs)
            .map(|(&r, &g, &f, &delta)| r * (f * delta) + g * (T::one() - f))
            .collect())
    }
}
