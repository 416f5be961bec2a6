//! Exchange of cell values over processor patches.
use crate::error::ExchangeError;
use crate::field::FieldValue;
use crate::mesh::{Mesh, PatchKind};
use crate::parallel::Transport;
use crate::Real;

/// Maps a processor patch tag to the channel used for exchanging geometry, so that geometry
/// and field values never interleave.
pub fn geometry_tag(tag: usize) -> usize {
    tag | 1 << (usize::BITS - 2)
}

/// What a processor patch sends to and receives from its neighbouring rank.
///
/// Values are packed in patch face order, component by component. The neighbouring rank
/// lists the shared faces in the same order, so the received buffer lines up with the
/// local faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePlan {
    patch_name: String,
    face_cells: Vec<usize>,
    neighbour_rank: usize,
    tag: usize,
}

impl ExchangePlan {
    /// The plan of a processor patch, or `None` for any other patch.
    pub fn for_patch<T: Real>(mesh: &Mesh<T>, patch: usize) -> Option<Self> {
        let info = mesh.patch(patch);
        match info.kind() {
            PatchKind::Processor { neighbour_rank, tag } => Some(Self {
                patch_name: info.name().to_string(),
                face_cells: mesh.patch_face_cells(patch).to_vec(),
                neighbour_rank: *neighbour_rank,
                tag: *tag,
            }),
            _ => None,
        }
    }

    pub fn patch_name(&self) -> &str {
        &self.patch_name
    }

    pub fn face_cells(&self) -> &[usize] {
        &self.face_cells
    }

    pub fn neighbour_rank(&self) -> usize {
        self.neighbour_rank
    }

    pub fn tag(&self) -> usize {
        self.tag
    }

    /// Packs the values of the face cells into a flat buffer.
    pub fn pack<T: Real, V: FieldValue<T>>(&self, internal: &[V]) -> Vec<T> {
        let mut buffer = Vec::with_capacity(V::NUM_COMPONENTS * self.face_cells.len());
        for &cell in &self.face_cells {
            let value = internal[cell];
            buffer.extend((0..V::NUM_COMPONENTS).map(|j| value.component(j)));
        }
        buffer
    }

    /// Unpacks one value per face, checking the buffer length.
    pub fn unpack<T: Real, V: FieldValue<T>>(&self, buffer: &[T]) -> Result<Vec<V>, ExchangeError> {
        let expected = V::NUM_COMPONENTS * self.face_cells.len();
        if buffer.len() != expected {
            return Err(ExchangeError::BufferSizeMismatch {
                patch: self.patch_name.clone(),
                expected,
                actual: buffer.len(),
            });
        }
        Ok(buffer
            .chunks_exact(V::NUM_COMPONENTS)
            .map(V::from_components)
            .collect())
    }

    /// Sends the values of the face cells to the neighbouring rank.
    pub fn send<T: Real, V: FieldValue<T>>(
        &self,
        transport: &dyn Transport<T>,
        internal: &[V],
    ) -> Result<(), ExchangeError> {
        transport.send(self.neighbour_rank, self.tag, self.pack(internal))
    }

    /// Sends values that are already given per patch face.
    pub fn send_values<T: Real, V: FieldValue<T>>(
        &self,
        transport: &dyn Transport<T>,
        values: &[V],
    ) -> Result<(), ExchangeError> {
        assert_eq!(values.len(), self.face_cells.len(), "Expected one value per patch face");
        let buffer = values
            .iter()
            .flat_map(|value| (0..V::NUM_COMPONENTS).map(move |j| value.component(j)))
            .collect();
        transport.send(self.neighbour_rank, self.tag, buffer)
    }

    /// Receives the values of the cells across the patch faces.
    pub fn receive<T: Real, V: FieldValue<T>>(&self, transport: &dyn Transport<T>) -> Result<Vec<V>, ExchangeError> {
        let buffer = transport.receive(self.neighbour_rank, self.tag)?;
        self.unpack(&buffer)
    }
}
