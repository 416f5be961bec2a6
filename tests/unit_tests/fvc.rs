use finvol::dimensions::Dimensions;
use finvol::field::{SurfaceField, VolField};
use finvol::fv_mesh::FvMesh;
use finvol::fvc;
use finvol::mesh::procedural::create_line_mesh;
use finvol::time::Time;
use matrixcompare::assert_scalar_eq;
use nalgebra::Vector3;

fn line_fv_mesh() -> FvMesh<f64> {
    FvMesh::new(create_line_mesh(4, 0.25))
        .with_time(Time::new(0.0, 0.1))
        .with_schemes(crate::default_schemes())
}

#[test]
fn surface_sum_ignores_empty_patches() {
    let fv_mesh = line_fv_mesh();
    let ones = SurfaceField::uniform(fv_mesh.mesh(), "one", Dimensions::DIMLESS, 1.0);
    let sum = fvc::surface_sum(&fv_mesh, &ones).unwrap();

    assert_eq!(sum.name(), "surfaceSum(one)");
    // Every cell of the line has two faces in the x direction
    assert_eq!(sum.internal_values(), &[2.0, 2.0, 2.0, 2.0]);
}

#[test]
fn courant_number_of_uniform_flow() {
    let fv_mesh = line_fv_mesh();
    let mesh = fv_mesh.mesh();
    // The transverse component only crosses the empty faces
    let velocity = Vector3::new(1.0, 1.0, 0.0);
    let phi = SurfaceField::from_face_fn(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, |face| {
        mesh.face_areas()[face].dot(&velocity)
    });

    // Co = 0.5 Δt (2 |U| A) / V = Δt |U| / Δx
    let courant = fvc::courant_number(&fv_mesh, &phi).unwrap();
    assert_scalar_eq!(courant.max, 0.4, comp = abs, tol = 1e-12);
    assert_scalar_eq!(courant.mean, 0.4, comp = abs, tol = 1e-12);
}

#[test]
fn collapsed_cells_keep_gradients_finite() {
    let mut mesh = create_line_mesh::<f64>(2, 1.0);
    let points = mesh
        .points()
        .iter()
        .map(|p| {
            let mut p = *p;
            if (p.x - 1.0).abs() < 1e-12 {
                p.x = 0.0;
            }
            p
        })
        .collect();
    mesh.move_points(points).unwrap();
    assert!(mesh.cell_volumes()[0].abs() < 1e-12);

    let fv_mesh = FvMesh::new(mesh).with_schemes(crate::default_schemes());
    let vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);
    let grad = fvc::grad(&fv_mesh, &vf).unwrap();
    assert!(grad.internal_values().iter().all(|g| g.iter().all(|c| c.is_finite())));

    let ones = SurfaceField::uniform(fv_mesh.mesh(), "one", Dimensions::DIMLESS, 1.0);
    let integrated = fvc::surface_integrate_values(&fv_mesh, &ones);
    assert!(integrated.iter().all(|v: &f64| v.is_finite()));
}
