//! Polyhedral face-based mesh.
//!
//! A mesh is described by its points, its faces (as lists of point indices), the owner cell
//! of every face and the neighbour cell of every internal face. Internal faces come first,
//! followed by the boundary faces grouped into contiguous patches. Face area vectors point
//! out of the owner cell, which for internal faces always has the lower cell index.
use crate::error::MeshError;
use crate::geometry::{compute_polyhedron_volume_and_centre, CellFace, IndexedPolygon, Polygon3d};
use crate::Real;
use finvol_traits::Tolerances;
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod addressing;
pub mod procedural;
pub mod quality;

use addressing::{CellAddressing, CompactLists};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Returns a stamp that is unique within the process.
fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// The physical or numerical role of a boundary patch.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchKind<T: Real> {
    Patch,
    Wall,
    SymmetryPlane,
    /// Faces normal to a direction that is not solved for (1D and 2D cases).
    Empty,
    /// Translational periodic coupling with another patch of the same mesh.
    ///
    /// Face `i` of this patch is paired with face `i` of `neighbour_patch`. The neighbour cell
    /// across face `i` is located at the centre of the partner's face cell plus `separation`.
    Cyclic {
        neighbour_patch: usize,
        separation: Vector3<T>,
    },
    /// Coupling with the domain owned by another rank of a decomposed run.
    Processor { neighbour_rank: usize, tag: usize },
}

impl<T: Real> PatchKind<T> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Wall => "wall",
            Self::SymmetryPlane => "symmetryPlane",
            Self::Empty => "empty",
            Self::Cyclic { .. } => "cyclic",
            Self::Processor { .. } => "processor",
        }
    }

    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Cyclic { .. } | Self::Processor { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Constraint patches dictate the type of every patch field defined on them.
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            Self::SymmetryPlane | Self::Empty | Self::Cyclic { .. } | Self::Processor { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchInfo<T: Real> {
    name: String,
    start: usize,
    size: usize,
    kind: PatchKind<T>,
}

impl<T: Real> PatchInfo<T> {
    pub fn new(name: impl Into<String>, start: usize, size: usize, kind: PatchKind<T>) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> &PatchKind<T> {
        &self.kind
    }

    pub fn face_range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    pub fn is_coupled(&self) -> bool {
        self.kind.is_coupled()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MeshGeometry<T: Real> {
    face_areas: Vec<Vector3<T>>,
    face_area_magnitudes: Vec<T>,
    face_centres: Vec<Point3<T>>,
    cell_volumes: Vec<T>,
    cell_centres: Vec<Point3<T>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh<T: Real> {
    points: Vec<Point3<T>>,
    faces: CompactLists<usize>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    patches: Vec<PatchInfo<T>>,
    num_cells: usize,
    addressing: CellAddressing,
    boundary_face_patch: Vec<usize>,
    geometry: MeshGeometry<T>,
    tolerances: Tolerances<T>,
    geometry_generation: u64,
    topology_generation: u64,
}

impl<T: Real> Mesh<T> {
    pub fn new(
        points: Vec<Point3<T>>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<PatchInfo<T>>,
        tolerances: Tolerances<T>,
    ) -> Result<Self, MeshError> {
        let faces = CompactLists::from(faces);
        let num_cells = validate_topology(points.len(), &faces, &owner, &neighbour, &patches)?;
        let addressing = CellAddressing::from_owner_neighbour(num_cells, &owner, &neighbour);
        for (cell, cell_faces) in addressing.cell_faces.iter().enumerate() {
            if cell_faces.is_empty() {
                return Err(MeshError::CellWithoutFaces { cell });
            }
        }

        let mut boundary_face_patch = vec![0; faces.len() - neighbour.len()];
        for (patch_index, patch) in patches.iter().enumerate() {
            for face in patch.face_range() {
                boundary_face_patch[face - neighbour.len()] = patch_index;
            }
        }

        let geometry = compute_geometry(&points, &faces, &owner, &addressing, &tolerances);
        let topology_generation = next_generation();
        debug!(
            "Constructed mesh with {} points, {} faces ({} internal), {} cells and {} patches",
            points.len(),
            faces.len(),
            neighbour.len(),
            num_cells,
            patches.len()
        );

        Ok(Self {
            points,
            faces,
            owner,
            neighbour,
            patches,
            num_cells,
            addressing,
            boundary_face_patch,
            geometry,
            tolerances,
            geometry_generation: next_generation(),
            topology_generation,
        })
    }

    /// Replaces the point positions and recomputes all geometric quantities.
    pub fn move_points(&mut self, points: Vec<Point3<T>>) -> Result<(), MeshError> {
        if points.len() != self.points.len() {
            return Err(MeshError::SizeMismatch {
                what: "points",
                expected: self.points.len(),
                actual: points.len(),
            });
        }
        self.points = points;
        self.geometry = compute_geometry(
            &self.points,
            &self.faces,
            &self.owner,
            &self.addressing,
            &self.tolerances,
        );
        self.geometry_generation = next_generation();
        debug!("Moved mesh points (geometry generation {})", self.geometry_generation);
        Ok(())
    }

    /// Replaces the complete topology of the mesh, as after refinement or redistribution.
    ///
    /// On failure the mesh is left unchanged.
    pub fn update_topology(
        &mut self,
        points: Vec<Point3<T>>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<PatchInfo<T>>,
    ) -> Result<(), MeshError> {
        *self = Self::new(points, faces, owner, neighbour, patches, self.tolerances)?;
        debug!("Updated mesh topology (topology generation {})", self.topology_generation);
        Ok(())
    }

    pub fn tolerances(&self) -> &Tolerances<T> {
        &self.tolerances
    }

    /// Changes after every call to [`move_points`](Self::move_points) or
    /// [`update_topology`](Self::update_topology).
    pub fn geometry_generation(&self) -> u64 {
        self.geometry_generation
    }

    /// Changes after every call to [`update_topology`](Self::update_topology).
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    pub fn points(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn faces(&self) -> &CompactLists<usize> {
        &self.faces
    }

    pub fn face(&self, face: usize) -> &[usize] {
        self.faces.get(face).expect("Face index out of bounds")
    }

    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    pub fn is_internal_face(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    pub fn patches(&self) -> &[PatchInfo<T>] {
        &self.patches
    }

    pub fn patch(&self, index: usize) -> &PatchInfo<T> {
        &self.patches[index]
    }

    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|patch| patch.name() == name)
    }

    /// The patch containing the given boundary face.
    pub fn face_patch(&self, face: usize) -> Option<usize> {
        face.checked_sub(self.num_internal_faces())
            .and_then(|i| self.boundary_face_patch.get(i))
            .copied()
    }

    /// The cells adjacent to the faces of a patch.
    pub fn patch_face_cells(&self, patch: usize) -> &[usize] {
        &self.owner[self.patches[patch].face_range()]
    }

    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        self.addressing
            .cell_faces
            .get(cell)
            .expect("Cell index out of bounds")
    }

    pub fn cell_cells(&self, cell: usize) -> &[usize] {
        self.addressing
            .cell_cells
            .get(cell)
            .expect("Cell index out of bounds")
    }

    /// Face area vectors `Sf`.
    pub fn face_areas(&self) -> &[Vector3<T>] {
        &self.geometry.face_areas
    }

    /// Face area magnitudes `|Sf|`.
    pub fn face_area_magnitudes(&self) -> &[T] {
        &self.geometry.face_area_magnitudes
    }

    pub fn face_centres(&self) -> &[Point3<T>] {
        &self.geometry.face_centres
    }

    pub fn cell_volumes(&self) -> &[T] {
        &self.geometry.cell_volumes
    }

    pub fn cell_centres(&self) -> &[Point3<T>] {
        &self.geometry.cell_centres
    }

    /// Unit normal of a face, with the magnitude floored at `rootvsmall`.
    pub fn face_normal(&self, face: usize) -> Vector3<T> {
        let mag = self.tolerances.floor_rootvsmall(self.geometry.face_area_magnitudes[face]);
        self.geometry.face_areas[face] / mag
    }
}

fn validate_topology<T: Real>(
    num_points: usize,
    faces: &CompactLists<usize>,
    owner: &[usize],
    neighbour: &[usize],
    patches: &[PatchInfo<T>],
) -> Result<usize, MeshError> {
    if owner.len() != faces.len() {
        return Err(MeshError::SizeMismatch {
            what: "owner",
            expected: faces.len(),
            actual: owner.len(),
        });
    }
    if neighbour.len() > faces.len() {
        return Err(MeshError::SizeMismatch {
            what: "neighbour",
            expected: faces.len(),
            actual: neighbour.len(),
        });
    }

    for (face, vertices) in faces.iter().enumerate() {
        if vertices.len() < 3 {
            return Err(MeshError::DegenerateFace {
                face,
                num_vertices: vertices.len(),
            });
        }
        if let Some(&vertex) = vertices.iter().find(|&&v| v >= num_points) {
            return Err(MeshError::VertexIndexOutOfBounds {
                face,
                vertex,
                num_points,
            });
        }
    }

    for (face, (&own, &nei)) in owner.iter().zip(neighbour).enumerate() {
        if own >= nei {
            return Err(MeshError::OwnerNotLowerThanNeighbour {
                face,
                owner: own,
                neighbour: nei,
            });
        }
    }

    let mut names = HashSet::new();
    let mut expected_start = neighbour.len();
    for patch in patches {
        if !names.insert(patch.name()) {
            return Err(MeshError::DuplicatePatchName {
                name: patch.name().to_string(),
            });
        }
        if patch.start() != expected_start {
            return Err(MeshError::InvalidPatchLayout {
                patch: patch.name().to_string(),
                message: format!("starts at face {}, expected {}", patch.start(), expected_start),
            });
        }
        expected_start += patch.size();
    }
    if expected_start != faces.len() {
        let patch = patches.last().map(|p| p.name().to_string()).unwrap_or_default();
        return Err(MeshError::InvalidPatchLayout {
            patch,
            message: format!(
                "patches cover faces up to {}, but the mesh has {} faces",
                expected_start,
                faces.len()
            ),
        });
    }

    for (index, patch) in patches.iter().enumerate() {
        if let PatchKind::Cyclic { neighbour_patch, .. } = patch.kind() {
            let invalid = |message: String| MeshError::InvalidCyclicPairing {
                patch: patch.name().to_string(),
                message,
            };
            let partner = patches
                .get(*neighbour_patch)
                .ok_or_else(|| invalid(format!("neighbour patch {} does not exist", neighbour_patch)))?;
            if *neighbour_patch == index {
                return Err(invalid("patch is paired with itself".to_string()));
            }
            match partner.kind() {
                PatchKind::Cyclic {
                    neighbour_patch: back, ..
                } if *back == index => {}
                _ => {
                    return Err(invalid(format!(
                        "neighbour patch `{}` is not a cyclic patch paired with this one",
                        partner.name()
                    )))
                }
            }
            if partner.size() != patch.size() {
                return Err(invalid(format!(
                    "size {} differs from neighbour patch `{}` of size {}",
                    patch.size(),
                    partner.name(),
                    partner.size()
                )));
            }
        }
    }

    let num_cells = owner
        .iter()
        .chain(neighbour)
        .max()
        .map(|&max| max + 1)
        .unwrap_or(0);
    Ok(num_cells)
}

fn compute_geometry<T: Real>(
    points: &[Point3<T>],
    faces: &CompactLists<usize>,
    owner: &[usize],
    addressing: &CellAddressing,
    tolerances: &Tolerances<T>,
) -> MeshGeometry<T> {
    let face_geometry: Vec<_> = faces
        .iter()
        .map(|vertices| IndexedPolygon::new(points, vertices).compute_centre_and_area_vector(tolerances.rootvsmall))
        .collect();

    let face_areas: Vec<_> = face_geometry.iter().map(|g| g.area_vector).collect();
    let face_area_magnitudes = face_areas.iter().map(|s| s.norm()).collect();
    let face_centres = face_geometry.iter().map(|g| g.centre).collect();

    let mut cell_volumes = Vec::with_capacity(addressing.cell_faces.len());
    let mut cell_centres = Vec::with_capacity(addressing.cell_faces.len());
    for (cell, cell_faces) in addressing.cell_faces.iter().enumerate() {
        let faces = cell_faces.iter().map(|&face| CellFace {
            geometry: face_geometry[face],
            outward: owner[face] == cell,
        });
        let geometry = compute_polyhedron_volume_and_centre(faces, tolerances.vsmall);
        cell_volumes.push(geometry.volume);
        cell_centres.push(geometry.centre);
    }

    let num_non_positive = cell_volumes.iter().filter(|&&v| v <= T::zero()).count();
    if num_non_positive > 0 {
        warn!("Mesh has {} cells with non-positive volume", num_non_positive);
    }

    MeshGeometry {
        face_areas,
        face_area_magnitudes,
        face_centres,
        cell_volumes,
        cell_centres,
    }
}
