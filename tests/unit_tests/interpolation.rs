use finvol::fv_mesh::FvMesh;
use finvol::fvc;
use finvol::mesh::procedural::{create_box_mesh, create_line_mesh};
use finvol::proptest::{box_mesh, box_mesh_spec, linear_function, perturbed_box_mesh};
use matrixcompare::assert_scalar_eq;
use nalgebra::Point3;
use proptest::prelude::*;
use std::rc::Rc;

#[test]
fn uniform_line_has_midpoint_weights() {
    let fv_mesh = FvMesh::new(create_line_mesh::<f64>(4, 0.5));
    let interpolation = fv_mesh.interpolation();
    for &w in interpolation.weights().internal_values() {
        assert_scalar_eq!(w, 0.5, comp = abs, tol = 1e-14);
    }
    for &delta_coeff in interpolation.delta_coeffs().internal_values() {
        assert_scalar_eq!(delta_coeff, 2.0, comp = abs, tol = 1e-12);
    }

    let left = fv_mesh.mesh().find_patch("left").unwrap();
    assert_eq!(interpolation.weights().boundary_values(left), &[1.0]);
    // Boundary faces are half a cell away from the cell centre
    assert_scalar_eq!(interpolation.delta_coeffs().boundary_values(left)[0], 4.0, comp = abs, tol = 1e-12);
}

#[test]
fn moving_points_invalidates_cached_geometry() {
    let mut fv_mesh = FvMesh::new(create_line_mesh::<f64>(2, 1.0));
    let before = fv_mesh.interpolation();
    assert!(Rc::ptr_eq(&before, &fv_mesh.interpolation()));
    assert_scalar_eq!(before.weights().internal_values()[0], 0.5, comp = abs, tol = 1e-14);

    let points = fv_mesh
        .mesh()
        .points()
        .iter()
        .map(|p| {
            if (p.x - 1.0).abs() < 1e-12 {
                Point3::new(1.5, p.y, p.z)
            } else {
                *p
            }
        })
        .collect();
    fv_mesh.move_points(points).unwrap();

    let after = fv_mesh.interpolation();
    assert!(!Rc::ptr_eq(&before, &after));
    // Owner centre at 0.75 and neighbour centre at 1.75 with the face at 1.5
    assert_scalar_eq!(after.weights().internal_values()[0], 0.25, comp = abs, tol = 1e-14);
    assert_scalar_eq!(after.delta_coeffs().internal_values()[0], 1.0, comp = abs, tol = 1e-12);
    // Values computed before the move are left intact
    assert_scalar_eq!(before.weights().internal_values()[0], 0.5, comp = abs, tol = 1e-14);
}

proptest! {
    #[test]
    fn weights_are_convex(mesh in perturbed_box_mesh(3, 0.25)) {
        let fv_mesh = FvMesh::new(mesh);
        let interpolation = fv_mesh.interpolation();
        for &w in interpolation.weights().internal_values() {
            prop_assert!((0.0..=1.0).contains(&w));
        }
        for &coeff in interpolation.non_orth_delta_coeffs().internal_values() {
            prop_assert!(coeff > 0.0);
        }
    }

    #[test]
    fn orthogonal_meshes_need_no_correction(mesh in box_mesh(4)) {
        let fv_mesh = FvMesh::new(mesh);
        let interpolation = fv_mesh.interpolation();
        for correction in interpolation.non_orth_correction_vectors().internal_values() {
            prop_assert!(correction.norm() < 1e-12);
        }
        for (&coeff, &non_orth_coeff) in interpolation
            .delta_coeffs()
            .internal_values()
            .iter()
            .zip(interpolation.non_orth_delta_coeffs().internal_values())
        {
            prop_assert!((coeff - non_orth_coeff).abs() <= 1e-9 * coeff);
        }
    }

    #[test]
    fn linear_interpolation_is_exact_on_boxes(spec in box_mesh_spec(4), (a, b) in linear_function()) {
        let fv_mesh = FvMesh::new(create_box_mesh(&spec).unwrap())
            .with_schemes(crate::default_schemes());
        let f = |p: &Point3<f64>| a + b.dot(&p.coords);
        let vf = crate::sampled_field(&fv_mesh, "T", f);
        let faces = fvc::interpolate(&fv_mesh, &vf).unwrap();

        let mesh = fv_mesh.mesh();
        for face in 0..mesh.num_faces() {
            let expected = f(&mesh.face_centres()[face]);
            let actual = faces.face_value(mesh, face);
            prop_assert!((actual - expected).abs() <= 1e-9 * (1.0 + expected.abs()),
                "face {}: {} != {}", face, actual, expected);
        }
    }
}
