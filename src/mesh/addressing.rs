//! Compact storage for variable-length index lists and the cell addressing derived from faces.
use std::fmt;
use std::fmt::Debug;
use std::ops::Range;

/// A list of lists stored in a single contiguous buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct CompactLists<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: Debug> Debug for CompactLists<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for CompactLists<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompactLists<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        let range = self.index_range(index)?;
        self.data.get(range)
    }

    pub fn iter<'a>(&'a self) -> impl 'a + ExactSizeIterator<Item = &'a [T]> {
        self.offsets.windows(2).map(move |w| &self.data[w[0]..w[1]])
    }

    pub fn total_num_elements(&self) -> usize {
        self.data.len()
    }

    /// Appends a new list element by element. The list is closed when the appender is dropped.
    pub fn begin_list(&mut self) -> ListAppender<'_, T> {
        ListAppender { lists: self }
    }

    fn index_range(&self, index: usize) -> Option<Range<usize>> {
        let begin = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        Some(begin..end)
    }
}

impl<T: Clone> CompactLists<T> {
    pub fn push(&mut self, list: &[T]) {
        self.data.extend_from_slice(list);
        self.offsets.push(self.data.len());
    }
}

impl<T: Clone> From<Vec<Vec<T>>> for CompactLists<T> {
    fn from(lists: Vec<Vec<T>>) -> Self {
        let mut result = Self::new();
        for list in &lists {
            result.push(list);
        }
        result
    }
}

impl<T: Clone> From<&CompactLists<T>> for Vec<Vec<T>> {
    fn from(lists: &CompactLists<T>) -> Self {
        lists.iter().map(|list| list.to_vec()).collect()
    }
}

#[derive(Debug)]
pub struct ListAppender<'a, T> {
    lists: &'a mut CompactLists<T>,
}

impl<'a, T> ListAppender<'a, T> {
    pub fn push_single(&mut self, element: T) -> &mut Self {
        self.lists.data.push(element);
        self
    }
}

impl<'a, T> Drop for ListAppender<'a, T> {
    fn drop(&mut self) {
        self.lists.offsets.push(self.lists.data.len());
    }
}

/// Cell-based addressing derived from the face owner/neighbour lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAddressing {
    /// Faces bounding each cell, in increasing face order.
    pub cell_faces: CompactLists<usize>,
    /// Cells sharing an internal face with each cell, in the same order as the internal
    /// faces in `cell_faces`.
    pub cell_cells: CompactLists<usize>,
}

impl CellAddressing {
    pub fn from_owner_neighbour(num_cells: usize, owner: &[usize], neighbour: &[usize]) -> Self {
        let mut faces_per_cell = vec![Vec::new(); num_cells];
        let mut cells_per_cell = vec![Vec::new(); num_cells];
        for (face, &own) in owner.iter().enumerate() {
            faces_per_cell[own].push(face);
            if let Some(&nei) = neighbour.get(face) {
                faces_per_cell[nei].push(face);
            }
        }
        for faces in &mut faces_per_cell {
            faces.sort_unstable();
        }
        for (cell, faces) in faces_per_cell.iter().enumerate() {
            for &face in faces {
                if let Some(&nei) = neighbour.get(face) {
                    let other = if owner[face] == cell { nei } else { owner[face] };
                    cells_per_cell[cell].push(other);
                }
            }
        }
        Self {
            cell_faces: faces_per_cell.into(),
            cell_cells: cells_per_cell.into(),
        }
    }
}
