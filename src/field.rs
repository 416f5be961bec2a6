//! Cell and face fields.
mod surface;
mod value;
mod vol;

pub use surface::SurfaceField;
pub use value::{value_from_json, Differentiable, FieldValue};
pub use vol::{FieldSnapshot, VolField};

use crate::mesh::Mesh;
use crate::Real;

/// Values of the cells adjacent to the faces of a patch.
pub fn patch_internal_values<T: Real, V: Copy>(mesh: &Mesh<T>, patch: usize, internal: &[V]) -> Vec<V> {
    mesh.patch_face_cells(patch)
        .iter()
        .map(|&cell| internal[cell])
        .collect()
}

/// Extracts one component of every value.
pub fn component<T: Real, V: FieldValue<T>>(values: &[V], component: usize) -> Vec<T> {
    values.iter().map(|v| v.component(component)).collect()
}

/// Sets one component of every value.
pub fn set_component<T: Real, V: FieldValue<T>>(values: &mut [V], component: usize, source: &[T]) {
    assert_eq!(values.len(), source.len());
    for (v, &s) in values.iter_mut().zip(source) {
        v.set_component(component, s);
    }
}
