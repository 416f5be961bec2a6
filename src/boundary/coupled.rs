//! Boundary conditions of coupled patches.
//!
//! The boundary value of a coupled face is interpolated between the adjacent cell and the
//! cell across the coupling, exactly like the value of an internal face. The implicit
//! coefficients couple the two cells: the boundary coefficients multiply the neighbour
//! values.
use crate::boundary::{constraint_mismatch, patch_delta_coeffs, require_patch_kind, PatchField, PatchFieldBase};
use crate::error::{ExchangeError, PatchError};
use crate::field::{patch_internal_values, FieldValue};
use crate::fv_mesh::FvMesh;
use crate::mesh::{Mesh, PatchKind};
use crate::Real;
use itertools::izip;
use std::marker::PhantomData;

fn interpolate_coupled<T: Real, V: FieldValue<T>>(weights: &[T], internal: &[V], neighbour: &[V]) -> Vec<V> {
    izip!(weights, internal, neighbour)
        .map(|(&w, &i, &n)| i * w + n * (T::one() - w))
        .collect()
}

fn coupled_sn_grad<T: Real, V: FieldValue<T>>(delta_coeffs: &[T], internal: &[V], neighbour: &[V]) -> Vec<V> {
    izip!(delta_coeffs, internal, neighbour)
        .map(|(&delta, &i, &n)| (n - i) * delta)
        .collect()
}

fn coupled_gradient_internal_coeffs<T: Real, V: FieldValue<T>>(delta_coeffs: &[T]) -> Vec<V> {
    delta_coeffs.iter().map(|&delta| V::splat(-delta)).collect()
}

fn coupled_gradient_boundary_coeffs<T: Real, V: FieldValue<T>>(delta_coeffs: &[T]) -> Vec<V> {
    delta_coeffs.iter().map(|&delta| V::splat(delta)).collect()
}

fn coupled_value_internal_coeffs<T: Real, V: FieldValue<T>>(weights: &[T]) -> Vec<V> {
    weights.iter().map(|&w| V::splat(w)).collect()
}

fn coupled_value_boundary_coeffs<T: Real, V: FieldValue<T>>(weights: &[T]) -> Vec<V> {
    weights.iter().map(|&w| V::splat(T::one() - w)).collect()
}

/// Periodic condition: the cells across the patch are the face cells of the partner patch.
#[derive(Debug, Clone)]
pub struct CyclicPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    neighbour_patch: usize,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> CyclicPatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, internal: &[V]) -> Result<Self, PatchError> {
        let neighbour_patch = match mesh.patch(patch).kind() {
            PatchKind::Cyclic { neighbour_patch, .. } => *neighbour_patch,
            _ => return Err(constraint_mismatch(mesh, patch, "cyclic")),
        };
        Ok(Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            neighbour_patch,
            marker: PhantomData,
        })
    }

    pub fn neighbour_patch(&self) -> usize {
        self.neighbour_patch
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for CyclicPatchField<T, V> {
    impl_patch_field_common!("cyclic", T, V);

    fn is_coupled(&self) -> bool {
        true
    }

    fn patch_neighbour_values(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Option<Vec<V>> {
        Some(patch_internal_values(fv_mesh.mesh(), self.neighbour_patch, internal))
    }

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        let interpolation = fv_mesh.interpolation();
        let weights = interpolation.weights().boundary_values(self.base.patch());
        let own = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        let neighbour = patch_internal_values(fv_mesh.mesh(), self.neighbour_patch, internal);
        *self.base.values_mut() = interpolate_coupled(weights, &own, &neighbour);
        Ok(())
    }

    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        self.sn_grad_with(fv_mesh, &patch_delta_coeffs(fv_mesh, self.patch()), internal)
    }

    fn sn_grad_with(&self, fv_mesh: &FvMesh<T>, delta_coeffs: &[T], internal: &[V]) -> Vec<V> {
        let own = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        let neighbour = patch_internal_values(fv_mesh.mesh(), self.neighbour_patch, internal);
        coupled_sn_grad(delta_coeffs, &own, &neighbour)
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_value_internal_coeffs(weights))
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, weights: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_value_boundary_coeffs(weights))
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_internal_coeffs(&patch_delta_coeffs(fv_mesh, self.patch())))
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_boundary_coeffs(&patch_delta_coeffs(fv_mesh, self.patch())))
    }

    fn gradient_internal_coeffs_with(&self, _: &FvMesh<T>, delta_coeffs: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_internal_coeffs(delta_coeffs))
    }

    fn gradient_boundary_coeffs_with(&self, _: &FvMesh<T>, delta_coeffs: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_boundary_coeffs(delta_coeffs))
    }
}

/// Coupling with the domain of another rank.
///
/// [`init_evaluate`](PatchField::init_evaluate) sends the adjacent cell values to the
/// neighbouring rank, [`evaluate`](PatchField::evaluate) receives the values of the cells on
/// the other side. Until the first evaluation the neighbour values equal the local ones.
#[derive(Debug, Clone)]
pub struct ProcessorPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    neighbour_values: Vec<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> ProcessorPatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, internal: &[V]) -> Result<Self, PatchError> {
        require_patch_kind(mesh, patch, "processor")?;
        let values = patch_internal_values(mesh, patch, internal);
        Ok(Self {
            base: PatchFieldBase::new(mesh, patch, values.clone()),
            neighbour_values: values,
            marker: PhantomData,
        })
    }

    pub fn neighbour_values(&self) -> &[V] {
        &self.neighbour_values
    }

    pub fn set_neighbour_values(&mut self, values: Vec<V>) -> Result<(), PatchError> {
        if values.len() != self.neighbour_values.len() {
            return Err(ExchangeError::BufferSizeMismatch {
                patch: self.base.patch_name().to_string(),
                expected: self.neighbour_values.len(),
                actual: values.len(),
            }
            .into());
        }
        self.neighbour_values = values;
        Ok(())
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for ProcessorPatchField<T, V> {
    impl_patch_field_common!("processor", T, V);

    fn is_coupled(&self) -> bool {
        true
    }

    fn patch_neighbour_values(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Option<Vec<V>> {
        Some(self.neighbour_values.clone())
    }

    fn init_evaluate(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        let transport = fv_mesh.require_transport(self.base.patch())?;
        let plan = fv_mesh
            .exchange_plan(self.base.patch())
            .expect("Internal error: processor patches always have an exchange plan");
        plan.send(transport, internal)?;
        Ok(())
    }

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        let transport = fv_mesh.require_transport(self.base.patch())?;
        let plan = fv_mesh
            .exchange_plan(self.base.patch())
            .expect("Internal error: processor patches always have an exchange plan");
        self.set_neighbour_values(plan.receive(transport)?)?;

        let interpolation = fv_mesh.interpolation();
        let weights = interpolation.weights().boundary_values(self.base.patch());
        let own = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        *self.base.values_mut() = interpolate_coupled(weights, &own, &self.neighbour_values);
        Ok(())
    }

    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        self.sn_grad_with(fv_mesh, &patch_delta_coeffs(fv_mesh, self.patch()), internal)
    }

    fn sn_grad_with(&self, fv_mesh: &FvMesh<T>, delta_coeffs: &[T], internal: &[V]) -> Vec<V> {
        let own = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        coupled_sn_grad(delta_coeffs, &own, &self.neighbour_values)
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_value_internal_coeffs(weights))
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, weights: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_value_boundary_coeffs(weights))
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_internal_coeffs(&patch_delta_coeffs(fv_mesh, self.patch())))
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_boundary_coeffs(&patch_delta_coeffs(fv_mesh, self.patch())))
    }

    fn gradient_internal_coeffs_with(&self, _: &FvMesh<T>, delta_coeffs: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_internal_coeffs(delta_coeffs))
    }

    fn gradient_boundary_coeffs_with(&self, _: &FvMesh<T>, delta_coeffs: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(coupled_gradient_boundary_coeffs(delta_coeffs))
    }
}
