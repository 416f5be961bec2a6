use crate::boundary::registry::PatchFieldRegistry;
use crate::boundary::{calculated_patch_field, PatchField};
use crate::config::{FieldConfig, SolutionConfig};
use crate::dimensions::Dimensions;
use crate::error::{FieldError, PatchError};
use crate::field::{patch_internal_values, value_from_json, FieldValue, SurfaceField};
use crate::fv_mesh::FvMesh;
use crate::Real;
use log::debug;
use serde_json::Value;
use std::any::Any;

/// Internal and boundary values of a field at an earlier time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot<V> {
    internal: Vec<V>,
    boundary: Vec<Vec<V>>,
}

impl<V> FieldSnapshot<V> {
    pub fn internal_values(&self) -> &[V] {
        &self.internal
    }

    pub fn boundary_values(&self, patch: usize) -> &[V] {
        &self.boundary[patch]
    }
}

/// A cell-centred field with one boundary condition per patch.
///
/// Besides the current values, the field keeps the values of the two previous time steps
/// (see [`store_old_time`](Self::store_old_time)) and optionally of the previous iteration,
/// for explicit under-relaxation.
#[derive(Debug)]
pub struct VolField<T: Real, V: FieldValue<T>> {
    name: String,
    dimensions: Dimensions,
    internal: Vec<V>,
    boundary: Vec<Box<dyn PatchField<T, V>>>,
    old: Option<FieldSnapshot<V>>,
    old_old: Option<FieldSnapshot<V>>,
    stored_time_index: Option<usize>,
    prev_iter: Option<Vec<V>>,
}

impl<T: Real, V: FieldValue<T>> Clone for VolField<T, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            dimensions: self.dimensions,
            internal: self.internal.clone(),
            boundary: self.boundary.iter().map(|p| p.clone_box()).collect(),
            old: self.old.clone(),
            old_old: self.old_old.clone(),
            stored_time_index: self.stored_time_index,
            prev_iter: self.prev_iter.clone(),
        }
    }
}

impl<T: Real, V: FieldValue<T>> VolField<T, V> {
    pub fn new(
        fv_mesh: &FvMesh<T>,
        name: impl Into<String>,
        dimensions: Dimensions,
        internal: Vec<V>,
        boundary: Vec<Box<dyn PatchField<T, V>>>,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        let mesh = fv_mesh.mesh();
        let mismatch = |what: String, expected, actual| FieldError::SizeMismatch {
            field: name.clone(),
            what,
            expected,
            actual,
        };
        if internal.len() != mesh.num_cells() {
            return Err(mismatch("internal field".to_string(), mesh.num_cells(), internal.len()));
        }
        if boundary.len() != mesh.patches().len() {
            return Err(mismatch("boundary field".to_string(), mesh.patches().len(), boundary.len()));
        }
        for (index, (patch, patch_field)) in mesh.patches().iter().zip(&boundary).enumerate() {
            if patch_field.patch() != index {
                return Err(FieldError::InvalidValue {
                    field: name.clone(),
                    message: format!(
                        "patch field at position {} belongs to patch {}",
                        index,
                        patch_field.patch()
                    ),
                });
            }
            if patch_field.values().len() != patch.size() {
                return Err(mismatch(
                    format!("patch `{}`", patch.name()),
                    patch.size(),
                    patch_field.values().len(),
                ));
            }
        }

        Ok(Self {
            name,
            dimensions,
            internal,
            boundary,
            old: None,
            old_old: None,
            stored_time_index: None,
            prev_iter: None,
        })
    }

    /// A derived field with the given boundary values.
    ///
    /// Constraint patches get their constraint boundary condition, all other patches are
    /// `calculated`.
    pub fn calculated(
        fv_mesh: &FvMesh<T>,
        name: impl Into<String>,
        dimensions: Dimensions,
        internal: Vec<V>,
        boundary_values: Vec<Vec<V>>,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        let num_patches = fv_mesh.mesh().patches().len();
        if boundary_values.len() != num_patches {
            return Err(FieldError::SizeMismatch {
                field: name,
                what: "boundary field".to_string(),
                expected: num_patches,
                actual: boundary_values.len(),
            });
        }
        if internal.len() != fv_mesh.mesh().num_cells() {
            return Err(FieldError::SizeMismatch {
                field: name,
                what: "internal field".to_string(),
                expected: fv_mesh.mesh().num_cells(),
                actual: internal.len(),
            });
        }
        let boundary = boundary_values
            .into_iter()
            .enumerate()
            .map(|(patch, values)| calculated_patch_field(fv_mesh, patch, &internal, values))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fv_mesh, name, dimensions, internal, boundary)
    }

    /// A derived field whose boundary values equal the adjacent cell values.
    pub fn from_internal(fv_mesh: &FvMesh<T>, name: impl Into<String>, dimensions: Dimensions, internal: Vec<V>) -> Self {
        let mesh = fv_mesh.mesh();
        let boundary_values = (0..mesh.patches().len())
            .map(|patch| patch_internal_values(mesh, patch, &internal))
            .collect();
        Self::calculated(fv_mesh, name, dimensions, internal, boundary_values)
            .expect("Internal error: field built from cell values must be consistent")
    }

    pub fn uniform(fv_mesh: &FvMesh<T>, name: impl Into<String>, dimensions: Dimensions, value: V) -> Self {
        Self::from_internal(fv_mesh, name, dimensions, vec![value; fv_mesh.mesh().num_cells()])
    }

    /// Builds a field from its initial and boundary conditions.
    ///
    /// Every non-constraint patch must have an entry in the boundary field. Constraint
    /// patches without an entry get their constraint type.
    pub fn from_config(
        fv_mesh: &FvMesh<T>,
        name: impl Into<String>,
        config: &FieldConfig,
        registry: &PatchFieldRegistry<T, V>,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        let mesh = fv_mesh.mesh();
        let internal = parse_internal_field(&name, &config.internal_field, mesh.num_cells())?;

        let mut boundary = Vec::with_capacity(mesh.patches().len());
        for (index, patch) in mesh.patches().iter().enumerate() {
            let patch_field = match config.boundary_field.get(patch.name()) {
                Some(patch_config) => registry.create(fv_mesh, index, patch_config, &internal)?,
                None if patch.kind().is_constraint() => registry.create_constraint(fv_mesh, index, &internal)?,
                None => {
                    return Err(PatchError::MissingEntry {
                        patch: patch.name().to_string(),
                        entry: "type",
                    }
                    .into())
                }
            };
            boundary.push(patch_field);
        }
        debug!("Read field `{}` with {} patches", name, boundary.len());
        Self::new(fv_mesh, name, config.dimensions, internal, boundary)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn internal_values(&self) -> &[V] {
        &self.internal
    }

    pub fn internal_values_mut(&mut self) -> &mut [V] {
        &mut self.internal
    }

    pub fn boundary_field(&self) -> &[Box<dyn PatchField<T, V>>] {
        &self.boundary
    }

    pub fn patch_field(&self, patch: usize) -> &dyn PatchField<T, V> {
        self.boundary[patch].as_ref()
    }

    pub fn patch_field_mut(&mut self, patch: usize) -> &mut dyn PatchField<T, V> {
        self.boundary[patch].as_mut()
    }

    /// The patch field of the given patch, if it has the concrete type `P`.
    pub fn patch_field_as_mut<P: Any>(&mut self, patch: usize) -> Option<&mut P> {
        self.boundary[patch].as_any_mut().downcast_mut()
    }

    pub fn boundary_values(&self, patch: usize) -> &[V] {
        self.boundary[patch].values()
    }

    /// Boundary values of every patch.
    pub fn boundary_snapshot(&self) -> Vec<Vec<V>> {
        self.boundary.iter().map(|p| p.values().to_vec()).collect()
    }

    /// Values across the faces of a coupled patch.
    pub fn patch_neighbour_values(&self, fv_mesh: &FvMesh<T>, patch: usize) -> Option<Vec<V>> {
        self.boundary[patch].patch_neighbour_values(fv_mesh, &self.internal)
    }

    /// Updates the coefficients of every patch field that has not been updated yet.
    pub fn update_boundary_coeffs(&mut self, fv_mesh: &FvMesh<T>) -> Result<(), PatchError> {
        for patch_field in &mut self.boundary {
            if !patch_field.updated() {
                patch_field.update_coeffs(fv_mesh, &self.internal)?;
            }
        }
        Ok(())
    }

    /// Evaluates all boundary conditions.
    ///
    /// All patches first start their evaluation (sending values over processor patches),
    /// and then complete it (receiving the neighbour values).
    pub fn correct_boundary_conditions(&mut self, fv_mesh: &FvMesh<T>) -> Result<(), PatchError> {
        for patch_field in &mut self.boundary {
            patch_field.init_evaluate(fv_mesh, &self.internal)?;
        }
        for patch_field in &mut self.boundary {
            patch_field.evaluate(fv_mesh, &self.internal)?;
        }
        Ok(())
    }

    /// Provides the face flux to boundary conditions that depend on the flow direction.
    pub fn set_patch_flux(&mut self, phi: &SurfaceField<T, T>) {
        for (patch, patch_field) in self.boundary.iter_mut().enumerate() {
            patch_field.set_patch_flux(phi.boundary_values(patch));
        }
    }

    /// Returns all boundary conditions to their unevaluated state, as after a mesh change.
    pub fn reset_boundary_conditions(&mut self) {
        for patch_field in &mut self.boundary {
            patch_field.reset();
        }
    }

    /// Stores the current values as the old-time values, once per time index.
    ///
    /// The previous old-time values become the old-old-time values.
    pub fn store_old_time(&mut self, time_index: usize) {
        if self.stored_time_index == Some(time_index) {
            return;
        }
        self.old_old = self.old.take();
        self.old = Some(FieldSnapshot {
            internal: self.internal.clone(),
            boundary: self.boundary_snapshot(),
        });
        self.stored_time_index = Some(time_index);
        debug!(
            "Stored old time of field `{}` at time index {} ({} old times)",
            self.name,
            time_index,
            self.num_old_times()
        );
    }

    pub fn num_old_times(&self) -> usize {
        match (&self.old, &self.old_old) {
            (Some(_), Some(_)) => 2,
            (Some(_), None) => 1,
            _ => 0,
        }
    }

    pub fn old_time(&self) -> Option<&FieldSnapshot<V>> {
        self.old.as_ref()
    }

    pub fn old_old_time(&self) -> Option<&FieldSnapshot<V>> {
        self.old_old.as_ref()
    }

    /// Cell values at the previous time step, or the current values if none are stored.
    pub fn old_internal_values(&self) -> &[V] {
        self.old
            .as_ref()
            .map(|old| old.internal.as_slice())
            .unwrap_or(&self.internal)
    }

    /// Boundary values of a patch at the previous time step, or the current ones.
    pub fn old_boundary_values(&self, patch: usize) -> &[V] {
        self.old
            .as_ref()
            .map(|old| old.boundary[patch].as_slice())
            .unwrap_or_else(|| self.boundary[patch].values())
    }

    pub fn old_old_internal_values(&self) -> Option<&[V]> {
        self.old_old.as_ref().map(|old| old.internal.as_slice())
    }

    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    pub fn prev_iter(&self) -> Option<&[V]> {
        self.prev_iter.as_deref()
    }

    /// Explicit under-relaxation towards the previous iteration: `prev + alpha (current - prev)`.
    ///
    /// Does nothing if no previous iteration has been stored.
    pub fn relax(&mut self, fv_mesh: &FvMesh<T>, alpha: T) -> Result<(), PatchError> {
        if let Some(prev) = &self.prev_iter {
            for (value, &previous) in self.internal.iter_mut().zip(prev) {
                *value = previous + (*value - previous) * alpha;
            }
            self.correct_boundary_conditions(fv_mesh)?;
        }
        Ok(())
    }

    /// Relaxes with the field relaxation factor configured for this field, if any.
    pub fn relax_from_config(&mut self, fv_mesh: &FvMesh<T>, solution: &SolutionConfig) -> Result<(), PatchError> {
        match solution.field_relaxation_factor(&self.name) {
            Some(alpha) => {
                let alpha = T::from_f64(alpha).expect("Internal error: relaxation factor must be representable in T");
                self.relax(fv_mesh, alpha)
            }
            None => Ok(()),
        }
    }
}

fn parse_internal_field<T: Real, V: FieldValue<T>>(
    name: &str,
    json: &Value,
    num_cells: usize,
) -> Result<Vec<V>, FieldError> {
    let invalid = |message: String| FieldError::InvalidValue {
        field: name.to_string(),
        message,
    };
    if let Some(uniform) = value_from_json::<T, V>(json) {
        return Ok(vec![uniform; num_cells]);
    }
    let items = json
        .get("nonuniform")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("internalField must be a {} or a nonuniform list", V::TYPE_NAME)))?;
    if items.len() != num_cells {
        return Err(FieldError::SizeMismatch {
            field: name.to_string(),
            what: "internal field".to_string(),
            expected: num_cells,
            actual: items.len(),
        });
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            value_from_json::<T, V>(item).ok_or_else(|| invalid(format!("invalid {} at cell {}", V::TYPE_NAME, i)))
        })
        .collect()
}
