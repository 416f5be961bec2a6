//! Construction of patch fields from their configuration, by type name.
use crate::boundary::{
    CalculatedPatchField, CyclicPatchField, EmptyPatchField, FixedFluxPressurePatchField, FixedGradientPatchField,
    FixedValuePatchField, InletOutletPatchField, MixedPatchField, PatchField, ProcessorPatchField,
    SymmetryPlanePatchField, ZeroGradientPatchField,
};
use crate::config::PatchFieldConfig;
use crate::error::PatchError;
use crate::field::{patch_internal_values, value_from_json, FieldValue};
use crate::fv_mesh::FvMesh;
use crate::Real;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;

/// Builds a patch field for `(fv_mesh, patch, config, internal field)`.
pub type PatchFieldFactory<T, V> =
    Box<dyn Fn(&FvMesh<T>, usize, &PatchFieldConfig, &[V]) -> Result<Box<dyn PatchField<T, V>>, PatchError>>;

const CONSTRAINT_TYPES: [&str; 4] = ["empty", "symmetryPlane", "cyclic", "processor"];

/// Patch field factories keyed by type name.
pub struct PatchFieldRegistry<T: Real, V: FieldValue<T>> {
    factories: BTreeMap<String, PatchFieldFactory<T, V>>,
}

impl<T: Real, V: FieldValue<T>> Debug for PatchFieldRegistry<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchFieldRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl<T: Real, V: FieldValue<T>> Default for PatchFieldRegistry<T, V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<T: Real, V: FieldValue<T>> PatchFieldRegistry<T, V> {
    /// A registry without any types.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with all conditions that apply to fields of any value type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("calculated", |fv_mesh, patch, config, internal| {
            let values = match config.entry("value") {
                Some(_) => read_values(fv_mesh, patch, config, "value")?,
                None => patch_internal_values(fv_mesh.mesh(), patch, internal),
            };
            Ok(Box::new(CalculatedPatchField::new(fv_mesh.mesh(), patch, values)?))
        });
        registry.register("fixedValue", |fv_mesh, patch, config, _| {
            let values = read_values(fv_mesh, patch, config, "value")?;
            Ok(Box::new(FixedValuePatchField::new(fv_mesh.mesh(), patch, values)?))
        });
        registry.register("fixedGradient", |fv_mesh, patch, config, internal| {
            let gradient = read_values(fv_mesh, patch, config, "gradient")?;
            Ok(Box::new(FixedGradientPatchField::new(fv_mesh, patch, gradient, internal)?))
        });
        registry.register("zeroGradient", |fv_mesh, patch, _, internal| {
            Ok(Box::new(ZeroGradientPatchField::new(fv_mesh.mesh(), patch, internal)))
        });
        registry.register("mixed", |fv_mesh, patch, config, internal| {
            let ref_value = read_values(fv_mesh, patch, config, "refValue")?;
            let ref_grad = read_values(fv_mesh, patch, config, "refGradient")?;
            let value_fraction = read_values::<T, T>(fv_mesh, patch, config, "valueFraction")?;
            if let Some(f) = value_fraction
                .iter()
                .find(|&&f| f < T::zero() || f > T::one())
            {
                return Err(PatchError::InvalidEntry {
                    patch: fv_mesh.mesh().patch(patch).name().to_string(),
                    entry: "valueFraction".to_string(),
                    message: format!("value fraction {} is outside of [0, 1]", f),
                });
            }
            Ok(Box::new(MixedPatchField::new(
                fv_mesh,
                patch,
                ref_value,
                ref_grad,
                value_fraction,
                internal,
            )?))
        });
        registry.register("inletOutlet", |fv_mesh, patch, config, internal| {
            let inlet_value = read_values(fv_mesh, patch, config, "inletValue")?;
            Ok(Box::new(InletOutletPatchField::new(fv_mesh, patch, inlet_value, internal)?))
        });
        registry.register("empty", |fv_mesh, patch, _, internal| {
            Ok(Box::new(EmptyPatchField::new(fv_mesh.mesh(), patch, internal)))
        });
        registry.register("symmetryPlane", |fv_mesh, patch, _, internal| {
            Ok(Box::new(SymmetryPlanePatchField::new(fv_mesh, patch, internal)))
        });
        registry.register("cyclic", |fv_mesh, patch, _, internal| {
            Ok(Box::new(CyclicPatchField::new(fv_mesh.mesh(), patch, internal)?))
        });
        registry.register("processor", |fv_mesh, patch, _, internal| {
            Ok(Box::new(ProcessorPatchField::new(fv_mesh.mesh(), patch, internal)?))
        });
        registry
    }

    /// Adds (or replaces) the factory for a type name.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&FvMesh<T>, usize, &PatchFieldConfig, &[V]) -> Result<Box<dyn PatchField<T, V>>, PatchError> + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Creates the patch field described by `config` on the given patch.
    ///
    /// Constraint patches only accept the patch field type of the same name, and constraint
    /// patch field types are only accepted on constraint patches of that kind.
    pub fn create(
        &self,
        fv_mesh: &FvMesh<T>,
        patch: usize,
        config: &PatchFieldConfig,
        internal: &[V],
    ) -> Result<Box<dyn PatchField<T, V>>, PatchError> {
        let info = fv_mesh.mesh().patch(patch);
        let kind_name = info.kind().type_name();
        let requires_match = info.kind().is_constraint() || CONSTRAINT_TYPES.contains(&config.type_name.as_str());
        if requires_match && config.type_name != kind_name {
            return Err(PatchError::ConstraintMismatch {
                patch: info.name().to_string(),
                patch_kind: kind_name,
                type_name: config.type_name.clone(),
            });
        }

        let factory = self
            .factories
            .get(&config.type_name)
            .ok_or_else(|| PatchError::UnknownType {
                patch: info.name().to_string(),
                type_name: config.type_name.clone(),
            })?;
        factory(fv_mesh, patch, config, internal)
    }

    /// Creates the patch field dictated by a constraint patch.
    pub fn create_constraint(
        &self,
        fv_mesh: &FvMesh<T>,
        patch: usize,
        internal: &[V],
    ) -> Result<Box<dyn PatchField<T, V>>, PatchError> {
        let kind_name = fv_mesh.mesh().patch(patch).kind().type_name();
        self.create(fv_mesh, patch, &PatchFieldConfig::new(kind_name), internal)
    }
}

impl<T: Real> PatchFieldRegistry<T, T> {
    /// The default registry plus the conditions that only apply to scalar fields.
    pub fn with_scalar_defaults() -> Self {
        let mut registry = Self::with_defaults();
        registry.register("fixedFluxPressure", |fv_mesh, patch, config, internal| {
            let gradient = match config.entry("gradient") {
                Some(_) => read_values(fv_mesh, patch, config, "gradient")?,
                None => vec![T::zero(); fv_mesh.mesh().patch(patch).size()],
            };
            Ok(Box::new(FixedFluxPressurePatchField::new(fv_mesh, patch, gradient, internal)?))
        });
        registry
    }
}

/// Reads per-face values of an entry, given either uniformly or as `{"nonuniform": [...]}`.
pub fn read_values<T: Real, W: FieldValue<T>>(
    fv_mesh: &FvMesh<T>,
    patch: usize,
    config: &PatchFieldConfig,
    entry: &'static str,
) -> Result<Vec<W>, PatchError> {
    let info = fv_mesh.mesh().patch(patch);
    let invalid = |message: String| PatchError::InvalidEntry {
        patch: info.name().to_string(),
        entry: entry.to_string(),
        message,
    };
    let json = config.entry(entry).ok_or_else(|| PatchError::MissingEntry {
        patch: info.name().to_string(),
        entry,
    })?;

    if let Some(uniform) = value_from_json::<T, W>(json) {
        return Ok(vec![uniform; info.size()]);
    }
    let items = json
        .get("nonuniform")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("expected a {} or a nonuniform list", W::TYPE_NAME)))?;
    if items.len() != info.size() {
        return Err(invalid(format!(
            "nonuniform list has {} values, but the patch has {} faces",
            items.len(),
            info.size()
        )));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| value_from_json::<T, W>(item).ok_or_else(|| invalid(format!("invalid {} at face {}", W::TYPE_NAME, i))))
        .collect()
}
