use finvol::dimensions::Dimensions;
use finvol::field::VolField;
use finvol::fv_mesh::FvMesh;
use finvol::fvc;
use finvol::mesh::procedural::{create_box_mesh, create_line_mesh, BoxMeshSpec};
use finvol::mesh::Mesh;
use finvol::proptest::{box_mesh, box_mesh_spec, linear_function, perturbed_box_mesh};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use proptest::collection::vec;
use proptest::prelude::*;

fn fv_mesh_with_grad_scheme(mesh: Mesh<f64>, scheme: &str) -> FvMesh<f64> {
    let mut schemes = crate::default_schemes();
    schemes.grad_schemes = crate::scheme_table(&[("default", scheme)]);
    FvMesh::new(mesh).with_schemes(schemes)
}

fn assert_gradients_eq(actual: &[Vector3<f64>], expected: &Vector3<f64>, tol: f64) -> Result<(), TestCaseError> {
    for (cell, g) in actual.iter().enumerate() {
        prop_assert!(
            (g - expected).norm() <= tol * (1.0 + expected.norm()),
            "cell {}: {} != {}",
            cell,
            g,
            expected
        );
    }
    Ok(())
}

#[test]
fn gradient_of_vector_field() {
    let mesh = create_box_mesh(&finvol::mesh::procedural::BoxMeshSpec::new(
        Point3::origin(),
        Vector3::new(1.0, 2.0, 1.0),
        [3, 4, 2],
    ))
    .unwrap();
    let fv_mesh = fv_mesh_with_grad_scheme(mesh, "Gauss linear");
    let u = crate::sampled_field(&fv_mesh, "U", |p| Vector3::new(2.0 * p.x, 3.0 * p.y, 0.0));
    let grad = fvc::grad(&fv_mesh, &u).unwrap();

    assert_eq!(grad.name(), "grad(U)");
    for g in grad.internal_values() {
        assert_scalar_eq!(g[(0, 0)], 2.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(g[(1, 1)], 3.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(g[(2, 2)], 0.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(g[(0, 1)], 0.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(g[(1, 0)], 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn cell_limited_gradient_on_line() {
    let values = vec![3.0, 5.0, 7.0];

    let fv_mesh = fv_mesh_with_grad_scheme(create_line_mesh(3, 1.0), "Gauss linear");
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
    let unlimited = fvc::grad(&fv_mesh, &vf).unwrap();
    let unlimited_x: Vec<_> = unlimited.internal_values().iter().map(|g| g.x).collect();
    assert_scalar_eq!(unlimited_x[0], 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(unlimited_x[1], 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(unlimited_x[2], 1.0, comp = abs, tol = 1e-12);

    // Extrapolating to the boundary faces of the end cells leaves the local range
    let fv_mesh = fv_mesh_with_grad_scheme(create_line_mesh(3, 1.0), "cellLimited Gauss linear 1");
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values);
    let limited = fvc::grad(&fv_mesh, &vf).unwrap();
    let limited_x: Vec<_> = limited.internal_values().iter().map(|g| g.x).collect();
    assert_scalar_eq!(limited_x[0], 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(limited_x[1], 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(limited_x[2], 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn cell_limited_gradient_stays_within_neighbour_values() {
    // Cell 1 has the value 5 and the neighbours 0, 2 and 4 with the values 3, 7 and 4
    let values = vec![3.0, 5.0, 7.0, 4.0, 4.0, 4.0];
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::new(3.0, 2.0, 1.0), [3, 2, 1]);
    let fv_mesh = fv_mesh_with_grad_scheme(create_box_mesh(&spec).unwrap(), "cellLimited Gauss linear 1");
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
    let grad = fvc::grad(&fv_mesh, &vf).unwrap();

    let mesh = fv_mesh.mesh();
    let mut neighbours = mesh.cell_cells(1).to_vec();
    neighbours.sort_unstable();
    assert_eq!(neighbours, vec![0, 2, 4]);
    for &face in mesh.cell_faces(1) {
        let d = mesh.face_centres()[face] - mesh.cell_centres()[1];
        let extrapolated = values[1] + d.dot(&grad.internal_values()[1]);
        assert!(extrapolated >= 3.0 - 1e-12 && extrapolated <= 7.0 + 1e-12);
    }
}

#[test]
fn face_limited_gradient_is_not_bounded_by_calculated_boundaries() {
    // Unlike cellLimited, only the internal faces bound the end cells
    let fv_mesh = fv_mesh_with_grad_scheme(create_line_mesh(3, 1.0), "faceLimited Gauss linear 1");
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, vec![3.0, 5.0, 7.0]);
    let grad = fvc::grad(&fv_mesh, &vf).unwrap();
    let grad_x: Vec<_> = grad.internal_values().iter().map(|g| g.x).collect();
    assert_scalar_eq!(grad_x[0], 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(grad_x[1], 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(grad_x[2], 1.0, comp = abs, tol = 1e-12);

    // The unlimited gradient 2 of the middle cell extrapolates to 2.5 on its left face,
    // below the neighbour value 3
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, vec![3.0, 3.5, 7.0]);
    let grad = fvc::grad(&fv_mesh, &vf).unwrap();
    assert_scalar_eq!(grad.internal_values()[1].x, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn cell_md_limited_gradient_keeps_the_admissible_direction() {
    // Cell 1 has the value 5, the x neighbours 0 and 6 and the y neighbour 5.2. Its Gauss
    // gradient (3, 0.1, 0) overshoots the maximum 6 on the face shared with cell 2.
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::new(3.0, 2.0, 1.0), [3, 2, 1]);
    let values = vec![0.0, 5.0, 6.0, 5.0, 5.2, 5.0];
    let cell_grad = |scheme: &str| {
        let fv_mesh = fv_mesh_with_grad_scheme(create_box_mesh(&spec).unwrap(), scheme);
        let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
        fvc::grad(&fv_mesh, &vf).unwrap().internal_values()[1]
    };

    let unlimited = cell_grad("Gauss linear");
    assert_scalar_eq!(unlimited.x, 3.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(unlimited.y, 0.1, comp = abs, tol = 1e-12);

    // Only the x component is reduced, to reach 6 exactly on the face
    let md_limited = cell_grad("cellMDLimited Gauss linear 1");
    assert_scalar_eq!(md_limited.x, 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(md_limited.y, 0.1, comp = abs, tol = 1e-12);
    assert_scalar_eq!(md_limited.z, 0.0, comp = abs, tol = 1e-12);

    // cellLimited scales the whole gradient instead
    let cell_limited = cell_grad("cellLimited Gauss linear 1");
    assert_scalar_eq!(cell_limited.x, 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(cell_limited.y, 0.1 * 2.0 / 3.0, comp = abs, tol = 1e-12);
}

fn mesh_and_values(max_cells_per_dim: usize) -> impl Strategy<Value = (Mesh<f64>, Vec<f64>)> {
    box_mesh(max_cells_per_dim).prop_flat_map(|mesh| {
        let num_cells = mesh.num_cells();
        (Just(mesh), vec(-1.0..1.0, num_cells))
    })
}

proptest! {
    #[test]
    fn least_squares_is_exact_for_linear_fields(mesh in perturbed_box_mesh(3, 0.25), (a, b) in linear_function()) {
        let fv_mesh = fv_mesh_with_grad_scheme(mesh, "leastSquares");
        let vf = crate::sampled_field(&fv_mesh, "T", |p| a + b.dot(&p.coords));
        let grad = fvc::grad(&fv_mesh, &vf).unwrap();
        assert_gradients_eq(grad.internal_values(), &b, 1e-8)?;
    }

    #[test]
    fn gauss_is_exact_for_linear_fields_on_boxes(spec in box_mesh_spec(4), (a, b) in linear_function()) {
        let fv_mesh = fv_mesh_with_grad_scheme(create_box_mesh(&spec).unwrap(), "Gauss linear");
        let vf = crate::sampled_field(&fv_mesh, "T", |p| a + b.dot(&p.coords));
        let grad = fvc::grad(&fv_mesh, &vf).unwrap();
        assert_gradients_eq(grad.internal_values(), &b, 1e-8)?;
        // Boundary values carry the exact normal gradient on orthogonal boundaries
        for patch in 0..fv_mesh.mesh().patches().len() {
            assert_gradients_eq(grad.boundary_values(patch), &b, 1e-8)?;
        }
    }

    #[test]
    fn cell_limited_gradient_is_bounded((mesh, values) in mesh_and_values(3)) {
        let fv_mesh = fv_mesh_with_grad_scheme(mesh, "cellLimited Gauss linear 1");
        let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
        let grad = fvc::grad(&fv_mesh, &vf).unwrap();

        let mesh = fv_mesh.mesh();
        for cell in 0..mesh.num_cells() {
            let neighbours = mesh.cell_cells(cell).iter().map(|&c| values[c]);
            let max = neighbours.clone().fold(values[cell], f64::max);
            let min = neighbours.fold(values[cell], f64::min);
            for &face in mesh.cell_faces(cell) {
                let d = mesh.face_centres()[face] - mesh.cell_centres()[cell];
                let extrapolated = values[cell] + d.dot(&grad.internal_values()[cell]);
                prop_assert!(extrapolated <= max + 1e-10 && extrapolated >= min - 1e-10,
                    "cell {} face {}: {} not in [{}, {}]", cell, face, extrapolated, min, max);
            }
        }
    }

    #[test]
    fn face_limited_gradient_is_bounded_by_face_neighbours((mesh, values) in mesh_and_values(3)) {
        let fv_mesh = fv_mesh_with_grad_scheme(mesh, "faceLimited Gauss linear 1");
        let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
        let grad = fvc::grad(&fv_mesh, &vf).unwrap();

        let mesh = fv_mesh.mesh();
        for (face, (&own, &nei)) in mesh.owner().iter().zip(mesh.neighbour()).enumerate() {
            let (min, max) = (values[own].min(values[nei]), values[own].max(values[nei]));
            for cell in [own, nei] {
                let d = mesh.face_centres()[face] - mesh.cell_centres()[cell];
                let extrapolated = values[cell] + d.dot(&grad.internal_values()[cell]);
                prop_assert!(extrapolated <= max + 1e-10 && extrapolated >= min - 1e-10,
                    "cell {} face {}: {} not in [{}, {}]", cell, face, extrapolated, min, max);
            }
        }
    }

    #[test]
    fn cell_md_limited_gradient_is_bounded((mesh, values) in mesh_and_values(3)) {
        let fv_mesh = fv_mesh_with_grad_scheme(mesh, "cellMDLimited Gauss linear 1");
        let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
        let grad = fvc::grad(&fv_mesh, &vf).unwrap();

        let mesh = fv_mesh.mesh();
        for cell in 0..mesh.num_cells() {
            let neighbours = mesh.cell_cells(cell).iter().map(|&c| values[c]);
            let max = neighbours.clone().fold(values[cell], f64::max);
            let min = neighbours.fold(values[cell], f64::min);
            for &face in mesh.cell_faces(cell) {
                let d = mesh.face_centres()[face] - mesh.cell_centres()[cell];
                let extrapolated = values[cell] + d.dot(&grad.internal_values()[cell]);
                prop_assert!(extrapolated <= max + 1e-10 && extrapolated >= min - 1e-10,
                    "cell {} face {}: {} not in [{}, {}]", cell, face, extrapolated, min, max);
            }
        }
    }

    #[test]
    fn limited_gradients_are_exact_for_linear_fields(spec in box_mesh_spec(4), (a, b) in linear_function()) {
        for scheme in ["faceLimited Gauss linear 1", "cellMDLimited Gauss linear 1"] {
            let fv_mesh = fv_mesh_with_grad_scheme(create_box_mesh(&spec).unwrap(), scheme);
            let vf = crate::sampled_field(&fv_mesh, "T", |p| a + b.dot(&p.coords));
            let grad = fvc::grad(&fv_mesh, &vf).unwrap();
            assert_gradients_eq(grad.internal_values(), &b, 1e-8)?;
        }
    }

    #[test]
    fn zero_limiter_coefficient_disables_limiting((mesh, values) in mesh_and_values(3)) {
        let limited = fv_mesh_with_grad_scheme(mesh.clone(), "cellLimited Gauss linear 0");
        let unlimited = fv_mesh_with_grad_scheme(mesh, "Gauss linear");
        let limited_vf = VolField::from_internal(&limited, "T", Dimensions::DIMLESS, values.clone());
        let unlimited_vf = VolField::from_internal(&unlimited, "T", Dimensions::DIMLESS, values);
        let limited_grad = fvc::grad(&limited, &limited_vf).unwrap();
        let unlimited_grad = fvc::grad(&unlimited, &unlimited_vf).unwrap();
        prop_assert_eq!(limited_grad.internal_values(), unlimited_grad.internal_values());
    }
}
