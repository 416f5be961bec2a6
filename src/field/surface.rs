use crate::dimensions::Dimensions;
use crate::error::FieldError;
use crate::field::FieldValue;
use crate::mesh::Mesh;
use crate::Real;
use std::marker::PhantomData;

/// Values on mesh faces: one per internal face plus one per face of every patch.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceField<T: Real, V: FieldValue<T>> {
    name: String,
    dimensions: Dimensions,
    internal: Vec<V>,
    boundary: Vec<Vec<V>>,
    marker: PhantomData<T>,
}

impl<T: Real, V: FieldValue<T>> SurfaceField<T, V> {
    pub fn new(
        mesh: &Mesh<T>,
        name: impl Into<String>,
        dimensions: Dimensions,
        internal: Vec<V>,
        boundary: Vec<Vec<V>>,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        let mismatch = |what: String, expected, actual| FieldError::SizeMismatch {
            field: name.clone(),
            what,
            expected,
            actual,
        };
        if internal.len() != mesh.num_internal_faces() {
            return Err(mismatch(
                "internal field".to_string(),
                mesh.num_internal_faces(),
                internal.len(),
            ));
        }
        if boundary.len() != mesh.patches().len() {
            return Err(mismatch("boundary field".to_string(), mesh.patches().len(), boundary.len()));
        }
        for (patch, values) in mesh.patches().iter().zip(&boundary) {
            if values.len() != patch.size() {
                return Err(mismatch(format!("patch `{}`", patch.name()), patch.size(), values.len()));
            }
        }
        Ok(Self {
            name,
            dimensions,
            internal,
            boundary,
            marker: PhantomData,
        })
    }

    pub fn uniform(mesh: &Mesh<T>, name: impl Into<String>, dimensions: Dimensions, value: V) -> Self {
        Self::from_face_fn(mesh, name, dimensions, |_| value)
    }

    /// Builds a field by evaluating `f` for every face index of the mesh.
    pub fn from_face_fn(
        mesh: &Mesh<T>,
        name: impl Into<String>,
        dimensions: Dimensions,
        mut f: impl FnMut(usize) -> V,
    ) -> Self {
        let internal = (0..mesh.num_internal_faces()).map(&mut f).collect();
        let boundary = mesh
            .patches()
            .iter()
            .map(|patch| patch.face_range().map(&mut f).collect())
            .collect();
        Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
            marker: PhantomData,
        }
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

    pub fn boundary_values(&self, patch: usize) -> &[V] {
        &self.boundary[patch]
    }

    pub fn boundary_values_mut(&mut self, patch: usize) -> &mut [V] {
        &mut self.boundary[patch]
    }

    pub fn boundary(&self) -> &[Vec<V>] {
        &self.boundary
    }

    /// Value on a face, indexed by global face index.
    pub fn face_value(&self, mesh: &Mesh<T>, face: usize) -> V {
        if mesh.is_internal_face(face) {
            self.internal[face]
        } else {
            let patch = mesh.face_patch(face).expect("Face index out of bounds");
            self.boundary[patch][face - mesh.patch(patch).start()]
        }
    }

    /// Applies `f` to every face value, producing a field of another value type.
    pub fn map<W: FieldValue<T>>(
        &self,
        name: impl Into<String>,
        dimensions: Dimensions,
        mut f: impl FnMut(V) -> W,
    ) -> SurfaceField<T, W> {
        SurfaceField {
            name: name.into(),
            dimensions,
            internal: self.internal.iter().map(|&v| f(v)).collect(),
            boundary: self
                .boundary
                .iter()
                .map(|values| values.iter().map(|&v| f(v)).collect())
                .collect(),
            marker: PhantomData,
        }
    }

    /// Combines two fields face by face.
    pub fn zip_map<U: FieldValue<T>, W: FieldValue<T>>(
        &self,
        other: &SurfaceField<T, U>,
        name: impl Into<String>,
        dimensions: Dimensions,
        mut f: impl FnMut(V, U) -> W,
    ) -> SurfaceField<T, W> {
        let zip = |a: &[V], b: &[U], f: &mut dyn FnMut(V, U) -> W| -> Vec<W> {
            a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
        };
        SurfaceField {
            name: name.into(),
            dimensions,
            internal: zip(&self.internal, &other.internal, &mut f),
            boundary: self
                .boundary
                .iter()
                .zip(&other.boundary)
                .map(|(a, b)| zip(a, b, &mut f))
                .collect(),
            marker: PhantomData,
        }
    }

    /// Adds the values of another field face by face.
    pub fn add_field(&mut self, other: &SurfaceField<T, V>) {
        let own = self.internal.iter_mut().chain(self.boundary.iter_mut().flatten());
        let others = other.internal.iter().chain(other.boundary.iter().flatten());
        for (v, &o) in own.zip(others) {
            *v += o;
        }
    }

    pub fn scale(&mut self, factor: T) {
        for v in self.internal.iter_mut().chain(self.boundary.iter_mut().flatten()) {
            *v *= factor;
        }
    }
}
