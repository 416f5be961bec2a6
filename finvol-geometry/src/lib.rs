//! Geometric primitives for polyhedral finite volume meshes.
//!
//! Faces are arbitrary (possibly non-planar) polygons and cells are arbitrary polyhedra
//! bounded by such faces. Face quantities are computed by decomposing the face into a fan of
//! triangles around an estimated centre, and cell quantities by decomposing the cell into
//! pyramids with their apex at an estimated cell centre. Both decompositions are exact for
//! planar faces and convex cells, and give consistent, conservative values otherwise.
use finvol_traits::Real;
use nalgebra::{Point3, Vector3};
use numeric_literals::replace_float_literals;
use std::fmt::Debug;

/// A polygon in 3D with vertices ordered counter-clockwise around its area vector.
pub trait Polygon3d<T: Real>: Debug {
    fn num_vertices(&self) -> usize;
    fn get_vertex(&self, index: usize) -> Option<Point3<T>>;

    /// The arithmetic mean of the vertices.
    fn compute_vertex_average(&self) -> Point3<T> {
        let n = self.num_vertices();
        assert!(n > 0, "Polygon must have at least one vertex.");
        let mut sum = Vector3::zeros();
        for i in 0..n {
            sum += self.get_vertex(i).unwrap().coords;
        }
        Point3::from(sum / T::from_usize(n).unwrap())
    }

    /// Computes the centroid and the area vector of the polygon.
    ///
    /// The area vector is normal to the polygon, follows the right-hand rule with respect to
    /// the vertex ordering, and has magnitude equal to the polygon area. If the polygon is
    /// degenerate (total area below `rootvsmall`), the centroid falls back to the vertex
    /// average.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn compute_centre_and_area_vector(&self, rootvsmall: T) -> FaceGeometry<T> {
        let n = self.num_vertices();
        assert!(n >= 3, "Polygons must have at least 3 vertices.");

        if n == 3 {
            let a = self.get_vertex(0).unwrap();
            let b = self.get_vertex(1).unwrap();
            let c = self.get_vertex(2).unwrap();
            let centre = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            let area_vector = (b - a).cross(&(c - a)) * 0.5;
            return FaceGeometry { centre, area_vector };
        }

        let estimate = self.compute_vertex_average();
        let mut sum_n = Vector3::zeros();
        let mut sum_a = T::zero();
        let mut sum_ac = Vector3::zeros();

        for i in 0..n {
            let p = self.get_vertex(i).unwrap();
            let q = self.get_vertex((i + 1) % n).unwrap();
            let c = p.coords + q.coords + estimate.coords;
            let tri_n = (q - p).cross(&(estimate - p));
            let a = tri_n.norm();
            sum_n += tri_n;
            sum_a += a;
            sum_ac += c * a;
        }

        let centre = if sum_a < rootvsmall {
            estimate
        } else {
            Point3::from(sum_ac / (sum_a * 3.0))
        };

        FaceGeometry {
            centre,
            area_vector: sum_n * 0.5,
        }
    }
}

/// Centre and area vector of a single face.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FaceGeometry<T: Real> {
    pub centre: Point3<T>,
    pub area_vector: Vector3<T>,
}

/// A polygon described by indices into a shared vertex array.
#[derive(Debug, Copy, Clone)]
pub struct IndexedPolygon<'a, T: Real> {
    all_vertices: &'a [Point3<T>],
    vertex_indices: &'a [usize],
}

impl<'a, T: Real> IndexedPolygon<'a, T> {
    pub fn new(all_vertices: &'a [Point3<T>], vertex_indices: &'a [usize]) -> Self {
        Self {
            all_vertices,
            vertex_indices,
        }
    }
}

impl<'a, T: Real> Polygon3d<T> for IndexedPolygon<'a, T> {
    fn num_vertices(&self) -> usize {
        self.vertex_indices.len()
    }

    fn get_vertex(&self, index: usize) -> Option<Point3<T>> {
        let v = self
            .all_vertices
            .get(*self.vertex_indices.get(index)?)
            .expect("Internal error: Vertex must always exist if the local index is valid.");
        Some(*v)
    }
}

/// A face of a polyhedral cell, seen from that cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellFace<T: Real> {
    pub geometry: FaceGeometry<T>,
    /// Whether the area vector of the face points out of the cell.
    pub outward: bool,
}

/// Volume and centroid of a single cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellGeometry<T: Real> {
    pub centre: Point3<T>,
    pub volume: T,
}

/// Computes the volume and centroid of a polyhedron from its bounding faces.
///
/// The polyhedron is decomposed into pyramids, one per face, with their common apex at the
/// average of the face centres. The signed pyramid volumes are summed, and the centroid is the
/// volume-weighted average of the pyramid centroids. The volume is floored at `vsmall` before
/// dividing, so that a degenerate cell does not produce a non-finite centre.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn compute_polyhedron_volume_and_centre<T, I>(faces: I, vsmall: T) -> CellGeometry<T>
where
    T: Real,
    I: IntoIterator<Item = CellFace<T>>,
    I::IntoIter: Clone,
{
    let faces = faces.into_iter();

    let mut num_faces = 0usize;
    let mut estimate = Vector3::zeros();
    for face in faces.clone() {
        estimate += face.geometry.centre.coords;
        num_faces += 1;
    }
    assert!(num_faces > 0, "Polyhedron must have at least one face.");
    let estimate = estimate / T::from_usize(num_faces).unwrap();

    let mut volume_times_three = T::zero();
    let mut weighted_centre = Vector3::zeros();
    for face in faces {
        let FaceGeometry { centre, area_vector } = face.geometry;
        let pyramid_volume_times_three = if face.outward {
            area_vector.dot(&(centre.coords - estimate))
        } else {
            area_vector.dot(&(estimate - centre.coords))
        };
        let pyramid_centre = centre.coords * 0.75 + estimate * 0.25;
        weighted_centre += pyramid_centre * pyramid_volume_times_three;
        volume_times_three += pyramid_volume_times_three;
    }

    let centre = if volume_times_three.abs() > vsmall {
        Point3::from(weighted_centre / volume_times_three)
    } else {
        Point3::from(estimate)
    };

    CellGeometry {
        centre,
        volume: volume_times_three / 3.0,
    }
}
