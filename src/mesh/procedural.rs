//! Basic procedural mesh generation routines.
//!
//! Meshes are axis-aligned boxes of uniform hexahedral cells. Each of the six sides of the
//! box is assigned to a named patch; sides sharing a name are merged into a single patch.
//! Together with `empty` patches this covers 1D and 2D test cases, and with `cyclic` and
//! `processor` patches it covers periodic and decomposed cases.
use crate::error::MeshError;
use crate::mesh::{Mesh, PatchInfo, PatchKind};
use crate::Real;
use finvol_traits::Tolerances;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BoxSide {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl BoxSide {
    pub const ALL: [BoxSide; 6] = [
        BoxSide::XMin,
        BoxSide::XMax,
        BoxSide::YMin,
        BoxSide::YMax,
        BoxSide::ZMin,
        BoxSide::ZMax,
    ];

    fn index(&self) -> usize {
        *self as usize
    }

    fn axis(&self) -> usize {
        self.index() / 2
    }

    fn is_max(&self) -> bool {
        self.index() % 2 == 1
    }

    fn default_name(&self) -> &'static str {
        ["xMin", "xMax", "yMin", "yMax", "zMin", "zMax"][self.index()]
    }
}

/// Patch kind of a box side. Cyclic partners are referred to by patch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideKind {
    Patch,
    Wall,
    SymmetryPlane,
    Empty,
    Cyclic { neighbour: String },
    Processor { neighbour_rank: usize, tag: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePatch {
    pub name: String,
    pub kind: SideKind,
}

impl SidePatch {
    pub fn new(name: impl Into<String>, kind: SideKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn patch(name: impl Into<String>) -> Self {
        Self::new(name, SideKind::Patch)
    }

    pub fn wall(name: impl Into<String>) -> Self {
        Self::new(name, SideKind::Wall)
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, SideKind::Empty)
    }

    pub fn symmetry_plane(name: impl Into<String>) -> Self {
        Self::new(name, SideKind::SymmetryPlane)
    }

    pub fn cyclic(name: impl Into<String>, neighbour: impl Into<String>) -> Self {
        Self::new(
            name,
            SideKind::Cyclic {
                neighbour: neighbour.into(),
            },
        )
    }

    pub fn processor(name: impl Into<String>, neighbour_rank: usize, tag: usize) -> Self {
        Self::new(name, SideKind::Processor { neighbour_rank, tag })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxMeshSpec<T: Real> {
    pub origin: Point3<T>,
    pub size: Vector3<T>,
    pub cells: [usize; 3],
    /// Patches of the sides, in the order of [`BoxSide::ALL`].
    pub sides: [SidePatch; 6],
    pub tolerances: Tolerances<T>,
}

impl<T: Real> BoxMeshSpec<T>
where
    Tolerances<T>: Default,
{
    /// A box with one `patch` per side, named `xMin`, `xMax`, ..., `zMax`.
    pub fn new(origin: Point3<T>, size: Vector3<T>, cells: [usize; 3]) -> Self {
        Self {
            origin,
            size,
            cells,
            sides: BoxSide::ALL.map(|side| SidePatch::patch(side.default_name())),
            tolerances: Tolerances::default(),
        }
    }
}

impl<T: Real> BoxMeshSpec<T> {
    pub fn with_side(mut self, side: BoxSide, patch: SidePatch) -> Self {
        self.sides[side.index()] = patch;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances<T>) -> Self {
        self.tolerances = tolerances;
        self
    }

    fn side_coordinate(&self, side: BoxSide) -> T {
        let axis = side.axis();
        if side.is_max() {
            self.origin[axis] + self.size[axis]
        } else {
            self.origin[axis]
        }
    }
}

/// A line of `num_cells` cubes with edge length `cell_size` along the x-axis.
///
/// The ends are the patches `left` and `right`, all other sides form the `empty` patch
/// `frontAndBack`.
pub fn create_line_mesh<T: Real>(num_cells: usize, cell_size: T) -> Mesh<T>
where
    Tolerances<T>: Default,
{
    let n = T::from_usize(num_cells).expect("Must be able to fit usize in T");
    let spec = BoxMeshSpec::new(
        Point3::origin(),
        Vector3::new(n * cell_size, cell_size, cell_size),
        [num_cells, 1, 1],
    )
    .with_side(BoxSide::XMin, SidePatch::patch("left"))
    .with_side(BoxSide::XMax, SidePatch::patch("right"))
    .with_side(BoxSide::YMin, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::YMax, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::ZMin, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::ZMax, SidePatch::empty("frontAndBack"));
    create_box_mesh(&spec).expect("Internal error: line mesh specification must be valid")
}

/// The unit cube with `cells_per_dim` cells in each direction and one patch per side.
pub fn create_unit_cube_mesh<T: Real>(cells_per_dim: usize) -> Mesh<T>
where
    Tolerances<T>: Default,
{
    let n = cells_per_dim;
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::repeat(T::one()), [n, n, n]);
    create_box_mesh(&spec).expect("Internal error: unit cube specification must be valid")
}

struct GroupedPatch<'a> {
    name: &'a str,
    kind: &'a SideKind,
    sides: Vec<BoxSide>,
}

pub fn create_box_mesh<T: Real>(spec: &BoxMeshSpec<T>) -> Result<Mesh<T>, MeshError> {
    let [nx, ny, nz] = spec.cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshError::SizeMismatch {
            what: "cells per direction (must be positive)",
            expected: 1,
            actual: nx.min(ny).min(nz),
        });
    }

    let point_index = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
    let cell_index = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

    let coordinate = |axis: usize, index: usize, count: usize| {
        let to_real = |n: usize| T::from_usize(n).expect("Must be able to fit usize in T");
        spec.origin[axis] + spec.size[axis] * to_real(index) / to_real(count)
    };
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                points.push(Point3::new(
                    coordinate(0, i, nx),
                    coordinate(1, j, ny),
                    coordinate(2, k, nz),
                ));
            }
        }
    }

    let mut faces = Vec::new();
    let mut owner = Vec::new();
    let mut neighbour = Vec::new();

    // Internal faces, ordered by owner and then by neighbour
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let cell = cell_index(i, j, k);
                if i + 1 < nx {
                    faces.push(vec![
                        point_index(i + 1, j, k),
                        point_index(i + 1, j + 1, k),
                        point_index(i + 1, j + 1, k + 1),
                        point_index(i + 1, j, k + 1),
                    ]);
                    owner.push(cell);
                    neighbour.push(cell_index(i + 1, j, k));
                }
                if j + 1 < ny {
                    faces.push(vec![
                        point_index(i, j + 1, k),
                        point_index(i, j + 1, k + 1),
                        point_index(i + 1, j + 1, k + 1),
                        point_index(i + 1, j + 1, k),
                    ]);
                    owner.push(cell);
                    neighbour.push(cell_index(i, j + 1, k));
                }
                if k + 1 < nz {
                    faces.push(vec![
                        point_index(i, j, k + 1),
                        point_index(i + 1, j, k + 1),
                        point_index(i + 1, j + 1, k + 1),
                        point_index(i, j + 1, k + 1),
                    ]);
                    owner.push(cell);
                    neighbour.push(cell_index(i, j, k + 1));
                }
            }
        }
    }

    let mut groups: Vec<GroupedPatch> = Vec::new();
    for side in BoxSide::ALL {
        let side_patch = &spec.sides[side.index()];
        match groups.iter_mut().find(|g| g.name == side_patch.name) {
            Some(group) if group.kind == &side_patch.kind => group.sides.push(side),
            Some(_) => {
                return Err(MeshError::InvalidPatchLayout {
                    patch: side_patch.name.clone(),
                    message: "sides merged into one patch must have the same kind".to_string(),
                })
            }
            None => groups.push(GroupedPatch {
                name: &side_patch.name,
                kind: &side_patch.kind,
                sides: vec![side],
            }),
        }
    }

    let mut patches = Vec::with_capacity(groups.len());
    for group in &groups {
        let start = faces.len();
        for &side in &group.sides {
            push_side_faces(side, spec.cells, &point_index, &cell_index, &mut faces, &mut owner);
        }
        let kind = patch_kind(spec, group, &groups)?;
        patches.push(PatchInfo::new(group.name, start, faces.len() - start, kind));
    }

    Mesh::new(points, faces, owner, neighbour, patches, spec.tolerances)
}

fn patch_kind<T: Real>(
    spec: &BoxMeshSpec<T>,
    group: &GroupedPatch,
    groups: &[GroupedPatch],
) -> Result<PatchKind<T>, MeshError> {
    Ok(match group.kind {
        SideKind::Patch => PatchKind::Patch,
        SideKind::Wall => PatchKind::Wall,
        SideKind::SymmetryPlane => PatchKind::SymmetryPlane,
        SideKind::Empty => PatchKind::Empty,
        SideKind::Processor { neighbour_rank, tag } => PatchKind::Processor {
            neighbour_rank: *neighbour_rank,
            tag: *tag,
        },
        SideKind::Cyclic { neighbour } => {
            let invalid = |message: &str| MeshError::InvalidCyclicPairing {
                patch: group.name.to_string(),
                message: message.to_string(),
            };
            let neighbour_patch = groups
                .iter()
                .position(|g| g.name == neighbour.as_str())
                .ok_or_else(|| invalid("neighbour patch does not exist"))?;
            let partner = &groups[neighbour_patch];
            match (group.sides.as_slice(), partner.sides.as_slice()) {
                ([own_side], [partner_side]) if own_side.axis() == partner_side.axis() => {
                    let axis = own_side.axis();
                    let mut separation = Vector3::zeros();
                    separation[axis] = spec.side_coordinate(*own_side) - spec.side_coordinate(*partner_side);
                    PatchKind::Cyclic {
                        neighbour_patch,
                        separation,
                    }
                }
                _ => return Err(invalid("cyclic patches must pair two opposite sides of the box")),
            }
        }
    })
}

/// Appends the faces of one side of the box, oriented out of the box.
fn push_side_faces(
    side: BoxSide,
    [nx, ny, nz]: [usize; 3],
    point_index: &impl Fn(usize, usize, usize) -> usize,
    cell_index: &impl Fn(usize, usize, usize) -> usize,
    faces: &mut Vec<Vec<usize>>,
    owner: &mut Vec<usize>,
) {
    let p = point_index;
    match side {
        BoxSide::XMin | BoxSide::XMax => {
            let (i, cell_i) = if side.is_max() { (nx, nx - 1) } else { (0, 0) };
            for k in 0..nz {
                for j in 0..ny {
                    let mut face = vec![p(i, j, k), p(i, j + 1, k), p(i, j + 1, k + 1), p(i, j, k + 1)];
                    if !side.is_max() {
                        face[1..].reverse();
                    }
                    faces.push(face);
                    owner.push(cell_index(cell_i, j, k));
                }
            }
        }
        BoxSide::YMin | BoxSide::YMax => {
            let (j, cell_j) = if side.is_max() { (ny, ny - 1) } else { (0, 0) };
            for k in 0..nz {
                for i in 0..nx {
                    let mut face = vec![p(i, j, k), p(i, j, k + 1), p(i + 1, j, k + 1), p(i + 1, j, k)];
                    if !side.is_max() {
                        face[1..].reverse();
                    }
                    faces.push(face);
                    owner.push(cell_index(i, cell_j, k));
                }
            }
        }
        BoxSide::ZMin | BoxSide::ZMax => {
            let (k, cell_k) = if side.is_max() { (nz, nz - 1) } else { (0, 0) };
            for j in 0..ny {
                for i in 0..nx {
                    let mut face = vec![p(i, j, k), p(i + 1, j, k), p(i + 1, j + 1, k), p(i, j + 1, k)];
                    if !side.is_max() {
                        face[1..].reverse();
                    }
                    faces.push(face);
                    owner.push(cell_index(i, j, cell_k));
                }
            }
        }
    }
}
