//! Boundary conditions imposed by the kind of patch they are applied to.
use crate::boundary::{patch_delta_coeffs, PatchField, PatchFieldBase};
use crate::error::PatchError;
use crate::field::{patch_internal_values, FieldValue};
use crate::fv_mesh::FvMesh;
use crate::mesh::Mesh;
use crate::Real;
use itertools::izip;
use numeric_literals::replace_float_literals;
use std::marker::PhantomData;

/// Condition on `empty` patches, which bound the directions that are not solved for.
///
/// The faces take no part in the discretisation: all coefficients and the normal gradient
/// are zero. The values mirror the adjacent cells, so that the field remains defined.
#[derive(Debug, Clone)]
pub struct EmptyPatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> EmptyPatchField<T, V> {
    pub fn new(mesh: &Mesh<T>, patch: usize, internal: &[V]) -> Self {
        Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            marker: PhantomData,
        }
    }

    fn zeros(&self) -> Vec<V> {
        vec![V::zero(); self.base.values().len()]
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for EmptyPatchField<T, V> {
    impl_patch_field_common!("empty", T, V);

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        *self.base.values_mut() = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        Ok(())
    }

    fn sn_grad(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Vec<V> {
        self.zeros()
    }

    fn value_internal_coeffs(&self, _fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(self.zeros())
    }

    fn value_boundary_coeffs(&self, _: &FvMesh<T>, _: &[T], _: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(self.zeros())
    }

    fn gradient_internal_coeffs(&self, _fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        Ok(self.zeros())
    }

    fn gradient_boundary_coeffs(&self, _fv_mesh: &FvMesh<T>, _internal: &[V]) -> Result<Vec<V>, PatchError> {
        Ok(self.zeros())
    }
}

/// Mirror symmetry about the patch plane.
///
/// The boundary value is the average of the adjacent cell value and its reflection. Scalars
/// thus get a zero normal gradient, and the normal component of vectors vanishes on the patch.
#[derive(Debug, Clone)]
pub struct SymmetryPlanePatchField<T: Real, V: FieldValue<T>> {
    base: PatchFieldBase<V>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> SymmetryPlanePatchField<T, V> {
    pub fn new(fv_mesh: &FvMesh<T>, patch: usize, internal: &[V]) -> Self {
        let mesh = fv_mesh.mesh();
        let mut field = Self {
            base: PatchFieldBase::new(mesh, patch, patch_internal_values(mesh, patch, internal)),
            marker: PhantomData,
        };
        field.compute_values(fv_mesh, internal);
        field
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn compute_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) {
        let normals = fv_mesh.patch_normals(self.base.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.base.patch(), internal);
        *self.base.values_mut() = internal
            .iter()
            .zip(&normals)
            .map(|(&i, n)| (i + i.reflect(n)) * 0.5)
            .collect();
    }

    fn transform_diag(&self, fv_mesh: &FvMesh<T>) -> Vec<V> {
        fv_mesh
            .patch_normals(self.base.patch())
            .iter()
            .map(V::symmetry_transform_diag)
            .collect()
    }
}

impl<T: Real, V: FieldValue<T>> PatchField<T, V> for SymmetryPlanePatchField<T, V> {
    impl_patch_field_common!("symmetryPlane", T, V);

    fn evaluate_values(&mut self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<(), PatchError> {
        self.compute_values(fv_mesh, internal);
        Ok(())
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn sn_grad(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Vec<V> {
        let normals = fv_mesh.patch_normals(self.patch());
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        let internal = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        izip!(&internal, &normals, &delta_coeffs)
            .map(|(&i, n, &delta)| (i.reflect(n) - i) * (delta * 0.5))
            .collect()
    }

    fn value_internal_coeffs(&self, fv_mesh: &FvMesh<T>, _weights: &[T]) -> Result<Vec<V>, PatchError> {
        Ok(self
            .transform_diag(fv_mesh)
            .into_iter()
            .map(|diag| V::splat(T::one()) - diag)
            .collect())
    }

    fn value_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, weights: &[T], internal: &[V]) -> Result<Vec<V>, PatchError> {
        let internal_coeffs = self.value_internal_coeffs(fv_mesh, weights)?;
        let internal = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        Ok(izip!(self.values(), &internal_coeffs, &internal)
            .map(|(&value, c, i)| value - c.cmpt_multiply(i))
            .collect())
    }

    fn gradient_internal_coeffs(&self, fv_mesh: &FvMesh<T>) -> Result<Vec<V>, PatchError> {
        let delta_coeffs = patch_delta_coeffs(fv_mesh, self.patch());
        Ok(self
            .transform_diag(fv_mesh)
            .into_iter()
            .zip(&delta_coeffs)
            .map(|(diag, &delta)| -diag * delta)
            .collect())
    }

    fn gradient_boundary_coeffs(&self, fv_mesh: &FvMesh<T>, internal: &[V]) -> Result<Vec<V>, PatchError> {
        let internal_coeffs = self.gradient_internal_coeffs(fv_mesh)?;
        let sn_grad = self.sn_grad(fv_mesh, internal);
        let internal = patch_internal_values(fv_mesh.mesh(), self.patch(), internal);
        Ok(izip!(&sn_grad, &internal_coeffs, &internal)
            .map(|(&g, c, i)| g - c.cmpt_multiply(i))
            .collect())
    }
}
