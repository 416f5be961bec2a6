use finvol::dimensions::{Dimensioned, Dimensions};
use finvol::error::{ExchangeError, PatchError};
use finvol::field::VolField;
use finvol::fv_mesh::FvMesh;
use finvol::mesh::procedural::{create_box_mesh, create_line_mesh, BoxMeshSpec, BoxSide, SidePatch};
use finvol::mesh::Mesh;
use finvol::parallel::{ExchangePlan, MailboxTransport};
use finvol::{fvc, fvm};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use std::thread;

const CELLS_PER_RANK: usize = 4;

fn schemes() -> finvol::config::SchemesConfig {
    let mut schemes = crate::default_schemes();
    schemes.laplacian_schemes = crate::scheme_table(&[("default", "Gauss linear uncorrected")]);
    schemes
}

fn profile(p: &Point3<f64>) -> f64 {
    p.x * p.x - 3.0 * p.x
}

/// Sides of a line along x: the given ends, all other sides empty.
fn line_spec(origin: f64, num_cells: usize, x_min: SidePatch, x_max: SidePatch) -> BoxMeshSpec<f64> {
    BoxMeshSpec::new(
        Point3::new(origin, 0.0, 0.0),
        Vector3::new(num_cells as f64, 1.0, 1.0),
        [num_cells, 1, 1],
    )
    .with_side(BoxSide::XMin, x_min)
    .with_side(BoxSide::XMax, x_max)
    .with_side(BoxSide::YMin, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::YMax, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::ZMin, SidePatch::empty("frontAndBack"))
    .with_side(BoxSide::ZMax, SidePatch::empty("frontAndBack"))
}

/// The part of an 8-cell line owned by `rank` out of two ranks.
fn decomposed_line(rank: usize, shift: f64) -> Mesh<f64> {
    let origin = (rank * CELLS_PER_RANK) as f64 + shift;
    let spec = if rank == 0 {
        line_spec(
            origin,
            CELLS_PER_RANK,
            SidePatch::patch("left"),
            SidePatch::processor("procBoundary0to1", 1, 0),
        )
    } else {
        line_spec(
            origin,
            CELLS_PER_RANK,
            SidePatch::processor("procBoundary1to0", 0, 0),
            SidePatch::patch("right"),
        )
    };
    create_box_mesh(&spec).unwrap()
}

struct RankResults {
    laplacian: Vec<f64>,
    grad_x: Vec<f64>,
    residual: Vec<f64>,
    integral: f64,
}

fn evaluate(fv_mesh: &FvMesh<f64>, vf: &mut VolField<f64, f64>) -> RankResults {
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 0.5);
    vf.correct_boundary_conditions(fv_mesh).unwrap();
    let laplacian = fvc::laplacian_uniform(fv_mesh, &nu, vf).unwrap();
    let grad = fvc::grad(fv_mesh, vf).unwrap();
    let matrix = fvm::laplacian_uniform(fv_mesh, &nu, vf).unwrap();
    RankResults {
        laplacian: laplacian.internal_values().to_vec(),
        grad_x: grad.internal_values().iter().map(|g| g.x).collect(),
        residual: matrix.residual(fv_mesh, vf),
        integral: fvc::domain_integrate(fv_mesh, vf).unwrap(),
    }
}

/// Compares the decomposed line with the single domain, both transformed by `transform`.
fn assert_decomposed_matches_single_domain(transform: fn(Mesh<f64>) -> Mesh<f64>) {
    let serial = FvMesh::new(transform(create_line_mesh(2 * CELLS_PER_RANK, 1.0))).with_schemes(schemes());
    let mut serial_field = crate::fixed_value_field(&serial, "T", profile);
    let expected = evaluate(&serial, &mut serial_field);

    let handles: Vec<_> = MailboxTransport::<f64>::create_ranks(2)
        .into_iter()
        .enumerate()
        .map(|(rank, transport)| {
            thread::spawn(move || {
                let mut fv_mesh = FvMesh::new(transform(decomposed_line(rank, 0.0)))
                    .with_schemes(schemes())
                    .with_transport(Arc::new(transport));
                fv_mesh.exchange_processor_geometry().unwrap();
                let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
                evaluate(&fv_mesh, &mut vf)
            })
        })
        .collect();

    for (rank, handle) in handles.into_iter().enumerate() {
        let results = handle.join().expect("Rank must not panic");
        let offset = rank * CELLS_PER_RANK;
        for i in 0..CELLS_PER_RANK {
            let cell = offset + i;
            assert_scalar_eq!(results.laplacian[i], expected.laplacian[cell], comp = abs, tol = 1e-10);
            assert_scalar_eq!(results.grad_x[i], expected.grad_x[cell], comp = abs, tol = 1e-10);
            assert_scalar_eq!(results.residual[i], expected.residual[cell], comp = abs, tol = 1e-10);
        }
        assert_scalar_eq!(results.integral, expected.integral, comp = abs, tol = 1e-10);
    }
}

#[test]
fn decomposed_line_matches_single_domain() {
    assert_decomposed_matches_single_domain(|mesh| mesh);
}

#[test]
fn decomposed_sheared_line_matches_single_domain() {
    // Processor faces are non-orthogonal and must use the same distance coefficients as
    // internal faces
    assert_decomposed_matches_single_domain(crate::sheared);
}

#[test]
fn mismatched_processor_faces_are_detected() {
    let handles: Vec<_> = MailboxTransport::<f64>::create_ranks(2)
        .into_iter()
        .enumerate()
        .map(|(rank, transport)| {
            thread::spawn(move || {
                let shift = if rank == 1 { 0.5 } else { 0.0 };
                let mut fv_mesh = FvMesh::new(decomposed_line(rank, shift)).with_transport(Arc::new(transport));
                fv_mesh.exchange_processor_geometry()
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().expect("Rank must not panic");
        assert!(matches!(result, Err(ExchangeError::GeometryMismatch { face: 0, .. })));
    }
}

#[test]
fn processor_patches_need_a_transport() {
    let mut fv_mesh = FvMesh::new(decomposed_line(0, 0.0));
    assert_eq!(
        fv_mesh.exchange_processor_geometry(),
        Err(ExchangeError::NoTransport {
            patch: "procBoundary0to1".to_string()
        })
    );

    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
    assert!(matches!(
        vf.correct_boundary_conditions(&fv_mesh),
        Err(PatchError::Exchange(ExchangeError::NoTransport { .. }))
    ));
}

#[test]
fn exchange_buffers_are_checked() {
    let mesh = decomposed_line(1, 0.0);
    let processor = mesh.find_patch("procBoundary1to0").unwrap();
    let plan = ExchangePlan::for_patch(&mesh, processor).unwrap();
    assert_eq!(plan.neighbour_rank(), 0);
    assert_eq!(plan.face_cells(), &[0]);
    assert!(ExchangePlan::for_patch(&mesh, mesh.find_patch("right").unwrap()).is_none());

    let packed = plan.pack::<f64, Vector3<f64>>(&[Vector3::new(1.0, 2.0, 3.0); CELLS_PER_RANK]);
    assert_eq!(packed, vec![1.0, 2.0, 3.0]);
    assert_eq!(
        plan.unpack::<f64, f64>(&[1.0, 2.0]),
        Err(ExchangeError::BufferSizeMismatch {
            patch: "procBoundary1to0".to_string(),
            expected: 1,
            actual: 2
        })
    );
}

#[test]
fn periodic_laplacian_wraps_around() {
    let values = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 6.0];
    let n = values.len();
    let mesh = create_box_mesh(&line_spec(
        0.0,
        n,
        SidePatch::cyclic("left", "right"),
        SidePatch::cyclic("right", "left"),
    ))
    .unwrap();
    let fv_mesh = FvMesh::new(mesh).with_schemes(schemes());

    // Face centres at the right end of the domain belong to the last cell
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| values[(p.x.floor() as usize).min(n - 1)]);
    vf.correct_boundary_conditions(&fv_mesh).unwrap();
    let left = fv_mesh.mesh().find_patch("left").unwrap();
    assert_eq!(vf.patch_field(left).type_name(), "cyclic");
    assert_scalar_eq!(vf.boundary_values(left)[0], 0.5 * (values[0] + values[n - 1]), comp = abs, tol = 1e-12);

    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 1.0);
    let laplacian = fvc::laplacian_uniform(&fv_mesh, &nu, &vf).unwrap();
    for cell in 0..n {
        let expected = values[(cell + 1) % n] - 2.0 * values[cell] + values[(cell + n - 1) % n];
        assert_scalar_eq!(laplacian.internal_values()[cell], expected, comp = abs, tol = 1e-12);
    }
    // Nothing leaves a periodic domain
    assert_scalar_eq!(fvc::domain_integrate(&fv_mesh, &laplacian).unwrap(), 0.0, comp = abs, tol = 1e-12);

    let matrix = fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap();
    for (r, &expected) in matrix.residual(&fv_mesh, &vf).iter().zip(laplacian.internal_values()) {
        assert_scalar_eq!(-r, expected, comp = abs, tol = 1e-12);
    }
}
