//! Strategies for property-based tests of meshes and fields.
use crate::mesh::procedural::{create_box_mesh, BoxMeshSpec};
use crate::mesh::Mesh;
use ::proptest::prelude::*;
use nalgebra::{Point3, Vector3};

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    // Pick a reasonably small range to pick coordinates from, so that linear fields
    // evaluated at these points stay well within floating point precision
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range.clone()].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

pub fn vector3() -> impl Strategy<Value = Vector3<f64>> {
    point3().prop_map(|p| p.coords)
}

/// Boxes of 1 to `max_cells_per_dim` cells per direction with one patch per side.
pub fn box_mesh_spec(max_cells_per_dim: usize) -> impl Strategy<Value = BoxMeshSpec<f64>> {
    let cells = 1..=max_cells_per_dim.max(1);
    let extent = 0.5..3.0;
    (
        point3(),
        [extent.clone(), extent.clone(), extent],
        [cells.clone(), cells.clone(), cells],
    )
        .prop_map(|(origin, [sx, sy, sz], cells)| BoxMeshSpec::new(origin, Vector3::new(sx, sy, sz), cells))
}

pub fn box_mesh(max_cells_per_dim: usize) -> impl Strategy<Value = Mesh<f64>> {
    box_mesh_spec(max_cells_per_dim)
        .prop_filter_map("box mesh specification must be valid", |spec| create_box_mesh(&spec).ok())
}

/// Box meshes whose interior points are displaced by up to `max_relative_displacement`
/// times the smallest cell edge, which makes the cells non-orthogonal and skewed.
pub fn perturbed_box_mesh(
    max_cells_per_dim: usize,
    max_relative_displacement: f64,
) -> impl Strategy<Value = Mesh<f64>> {
    box_mesh_spec(max_cells_per_dim)
        .prop_flat_map(move |spec| {
            let num_points = spec.cells.iter().map(|n| n + 1).product::<usize>();
            let r = max_relative_displacement.abs();
            let displacement = [-r..=r, -r..=r, -r..=r];
            (Just(spec), prop::collection::vec(displacement, num_points))
        })
        .prop_filter_map("perturbed mesh must be valid", |(spec, displacements)| {
            let mut mesh = create_box_mesh(&spec).ok()?;
            let h = (0..3)
                .map(|i| spec.size[i] / spec.cells[i] as f64)
                .fold(f64::INFINITY, f64::min);
            let lower = spec.origin;
            let upper = spec.origin + spec.size;
            let is_interior = |p: &Point3<f64>| (0..3).all(|i| p[i] > lower[i] + 1e-9 && p[i] < upper[i] - 1e-9);
            let points = mesh
                .points()
                .iter()
                .zip(&displacements)
                .map(|(p, &[dx, dy, dz])| {
                    if is_interior(p) {
                        p + Vector3::new(dx, dy, dz) * h
                    } else {
                        *p
                    }
                })
                .collect();
            mesh.move_points(points).ok()?;
            Some(mesh)
        })
}

/// Coefficients `(a, b)` of a linear function `a + b·x`.
pub fn linear_function() -> impl Strategy<Value = (f64, Vector3<f64>)> {
    (-10.0..10.0, vector3())
}
