use finvol::dimensions::{Dimensioned, Dimensions};
use finvol::fv_mesh::FvMesh;
use finvol::mesh::procedural::{create_box_mesh, BoxMeshSpec, BoxSide, SidePatch};
use finvol::mesh::Mesh;
use finvol::proptest::{linear_function, perturbed_box_mesh};
use finvol::{fvc, fvm};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

fn fv_mesh_with_sn_grad_scheme(mesh: Mesh<f64>, scheme: &str) -> FvMesh<f64> {
    let mut schemes = crate::default_schemes();
    schemes.grad_schemes = crate::scheme_table(&[("default", "leastSquares")]);
    schemes.sn_grad_schemes = crate::scheme_table(&[("default", scheme)]);
    FvMesh::new(mesh).with_schemes(schemes)
}

/// A 3x3x1 box sheared by `x += y / 2`.
fn sheared_box() -> Mesh<f64> {
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::new(3.0, 3.0, 1.0), [3, 3, 1]);
    crate::sheared(create_box_mesh(&spec).unwrap())
}

/// Normal gradients of `T = x` on the internal faces, split into faces normal to y and
/// the slanted faces between cells in the x direction.
fn internal_sn_grads(scheme: &str) -> (Vec<f64>, Vec<f64>) {
    let fv_mesh = fv_mesh_with_sn_grad_scheme(sheared_box(), scheme);
    let vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);
    let sn_grad = fvc::sn_grad(&fv_mesh, &vf).unwrap();

    let mesh = fv_mesh.mesh();
    let (mut y_faces, mut x_faces) = (Vec::new(), Vec::new());
    for (face, &value) in sn_grad.internal_values().iter().enumerate() {
        let n = mesh.face_normal(face);
        // Orient every face along +y and +x respectively
        if n.y.abs() > 0.99 {
            y_faces.push(value * n.y.signum());
        } else {
            x_faces.push(value * n.x.signum());
        }
    }
    assert!(!y_faces.is_empty() && !x_faces.is_empty());
    (y_faces, x_faces)
}

fn assert_all_eq(values: &[f64], expected: f64) {
    for &value in values {
        assert_scalar_eq!(value, expected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn boundary_distance_is_measured_along_the_normal() {
    let fv_mesh = fv_mesh_with_sn_grad_scheme(sheared_box(), "corrected");
    let mesh = fv_mesh.mesh();
    let y_min = mesh.find_patch("yMin").unwrap();
    let y_max = mesh.find_patch("yMax").unwrap();

    // The cell centres are half a cell away from the y faces but offset in x
    let interpolation = fv_mesh.interpolation();
    assert_all_eq(interpolation.delta_coeffs().boundary_values(y_min), 2.0);
    assert_all_eq(interpolation.non_orth_delta_coeffs().boundary_values(y_min), 2.0);

    let vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.y);
    let sn_grad = fvc::sn_grad(&fv_mesh, &vf).unwrap();
    assert_all_eq(sn_grad.boundary_values(y_min), -1.0);
    assert_all_eq(sn_grad.boundary_values(y_max), 1.0);
}

#[test]
fn corrected_sn_grad_removes_the_non_orthogonal_error() {
    let slanted_normal_x = 1.0 / 1.25f64.sqrt();

    let (y_faces, x_faces) = internal_sn_grads("uncorrected");
    assert_all_eq(&y_faces, 0.5);
    assert_all_eq(&x_faces, 1.0 / slanted_normal_x);

    let (y_faces, x_faces) = internal_sn_grads("corrected");
    assert_all_eq(&y_faces, 0.0);
    assert_all_eq(&x_faces, slanted_normal_x);
}

#[test]
fn limited_sn_grad_caps_the_correction() {
    // With limitCoeff 1/4 the correction is at most a third of the implicit part
    let (y_faces, x_faces) = internal_sn_grads("limited corrected 0.25");
    assert_all_eq(&y_faces, 0.5 - 0.5 / 3.0);
    // Small corrections pass unchanged
    assert_all_eq(&x_faces, 1.0 / 1.25f64.sqrt());

    let (uncorrected_y, uncorrected_x) = internal_sn_grads("uncorrected");
    let (y_faces, x_faces) = internal_sn_grads("limited 0");
    assert_eq!(y_faces.len(), uncorrected_y.len());
    for (&limited, &uncorrected) in y_faces.iter().chain(&x_faces).zip(uncorrected_y.iter().chain(&uncorrected_x)) {
        assert_scalar_eq!(limited, uncorrected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn relaxed_sn_grad_scales_the_correction() {
    let (uncorrected_y, uncorrected_x) = internal_sn_grads("uncorrected");
    let (corrected_y, corrected_x) = internal_sn_grads("corrected");
    let (y_faces, x_faces) = internal_sn_grads("relaxed 0.5");

    let relaxed = y_faces.iter().chain(&x_faces);
    let uncorrected = uncorrected_y.iter().chain(&uncorrected_x);
    let corrected = corrected_y.iter().chain(&corrected_x);
    for ((&r, &u), &c) in relaxed.zip(uncorrected).zip(corrected) {
        assert_scalar_eq!(r, 0.5 * (u + c), comp = abs, tol = 1e-10);
    }
}

#[test]
fn cyclic_coefficients_match_internal_faces_on_sheared_meshes() {
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::new(4.0, 4.0, 1.0), [4, 4, 1])
        .with_side(BoxSide::XMin, SidePatch::cyclic("left", "right"))
        .with_side(BoxSide::XMax, SidePatch::cyclic("right", "left"))
        .with_side(BoxSide::ZMin, SidePatch::empty("frontAndBack"))
        .with_side(BoxSide::ZMax, SidePatch::empty("frontAndBack"));
    let fv_mesh = fv_mesh_with_sn_grad_scheme(crate::sheared(create_box_mesh(&spec).unwrap()), "uncorrected");
    let mesh = fv_mesh.mesh();
    // The column index of the cell containing p
    let column = |p: &Point3<f64>| (p.x - 0.5 * p.y).floor();
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", column);
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 1.0);
    let matrix = fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap();

    // |Sf| = sqrt(1.25) and 1 / (n · d) = sqrt(1.25) on the slanted faces
    let slanted_coeff = 1.25;
    let x_face_coeffs: Vec<_> = (0..mesh.num_internal_faces())
        .filter(|&face| mesh.face_normal(face).x.abs() > 0.5)
        .map(|face| matrix.upper()[face])
        .collect();
    assert_eq!(x_face_coeffs.len(), 3 * 4);
    assert_all_eq(&x_face_coeffs, slanted_coeff);

    for name in ["left", "right"] {
        let patch = mesh.find_patch(name).unwrap();
        assert_eq!(matrix.internal_coeffs(patch).len(), 4);
        for (&internal, &boundary) in matrix.internal_coeffs(patch).iter().zip(matrix.boundary_coeffs(patch)) {
            assert_scalar_eq!(internal.abs(), slanted_coeff, comp = abs, tol = 1e-10);
            assert_scalar_eq!(boundary.abs(), slanted_coeff, comp = abs, tol = 1e-10);
        }
    }

    // Across the coupling the cells of columns 0 and 3 meet, at the same normal distance
    // as internal faces
    vf.correct_boundary_conditions(&fv_mesh).unwrap();
    let sn_grad = fvc::sn_grad(&fv_mesh, &vf).unwrap();
    let left = mesh.find_patch("left").unwrap();
    let right = mesh.find_patch("right").unwrap();
    assert_all_eq(sn_grad.boundary_values(left), 3.0 * 1.25f64.sqrt());
    assert_all_eq(sn_grad.boundary_values(right), -3.0 * 1.25f64.sqrt());
}

proptest! {
    #[test]
    fn corrected_sn_grad_is_exact_for_linear_fields(mesh in perturbed_box_mesh(3, 0.25), (a, b) in linear_function()) {
        let fv_mesh = fv_mesh_with_sn_grad_scheme(mesh, "corrected");
        let vf = crate::fixed_value_field(&fv_mesh, "T", |p| a + b.dot(&p.coords));
        let sn_grad = fvc::sn_grad(&fv_mesh, &vf).unwrap();

        let mesh = fv_mesh.mesh();
        for (face, &value) in sn_grad.internal_values().iter().enumerate() {
            let expected = mesh.face_normal(face).dot(&b);
            prop_assert!((value - expected).abs() <= 1e-8 * (1.0 + b.norm()),
                "face {}: {} != {}", face, value, expected);
        }
    }
}
