use finvol::dimensions::{Dimensioned, Dimensions};
use finvol::error::MatrixError;
use finvol::field::{SurfaceField, VolField};
use finvol::fv_mesh::FvMesh;
use finvol::matrix::FvMatrix;
use finvol::mesh::procedural::{create_box_mesh, BoxMeshSpec};
use finvol::time::Time;
use finvol::{fvc, fvm};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, Point3, Vector3};

fn box_fv_mesh() -> FvMesh<f64> {
    let spec = BoxMeshSpec::new(Point3::new(0.0, -1.0, 0.5), Vector3::new(2.0, 1.0, 1.5), [4, 3, 2]);
    FvMesh::new(create_box_mesh(&spec).unwrap())
        .with_time(Time::new(0.0, 0.1))
        .with_schemes(crate::default_schemes())
}

fn flux(fv_mesh: &FvMesh<f64>) -> SurfaceField<f64, f64> {
    let mesh = fv_mesh.mesh();
    let velocity = Vector3::new(1.0, -0.5, 0.25);
    SurfaceField::from_face_fn(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, |face| {
        mesh.face_areas()[face].dot(&velocity)
    })
}

fn profile(p: &Point3<f64>) -> f64 {
    1.0 + p.x * p.x - 2.0 * p.y * p.z
}

fn assert_matrices_eq(a: &FvMatrix<f64, f64>, b: &FvMatrix<f64, f64>) {
    let tol = 1e-12;
    assert_matrix_eq!(DVector::from_column_slice(a.diag()), DVector::from_column_slice(b.diag()), comp = abs, tol = tol);
    assert_matrix_eq!(DVector::from_column_slice(a.lower()), DVector::from_column_slice(b.lower()), comp = abs, tol = tol);
    assert_matrix_eq!(DVector::from_column_slice(a.upper()), DVector::from_column_slice(b.upper()), comp = abs, tol = tol);
    assert_matrix_eq!(DVector::from_column_slice(a.source()), DVector::from_column_slice(b.source()), comp = abs, tol = tol);
}

/// `-residual(ψ)`, i.e. `A ψ - b`, next to the volume integral of the explicit operator.
fn assert_consistent(fv_mesh: &FvMesh<f64>, matrix: &FvMatrix<f64, f64>, vf: &VolField<f64, f64>, explicit: &VolField<f64, f64>) {
    let implicit: Vec<_> = matrix.residual(fv_mesh, vf).iter().map(|r| -r).collect();
    let integrated: Vec<_> = explicit
        .internal_values()
        .iter()
        .zip(fv_mesh.mesh().cell_volumes())
        .map(|(value, volume)| value * volume)
        .collect();
    assert_matrix_eq!(DVector::from_vec(implicit), DVector::from_vec(integrated), comp = abs, tol = 1e-10);
}

#[test]
fn implicit_laplacian_matches_explicit_laplacian() {
    let fv_mesh = box_fv_mesh();
    let gamma = VolField::uniform(&fv_mesh, "gamma", Dimensions::DIFFUSIVITY, 2.0);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);

    let matrix = fvm::laplacian(&fv_mesh, &gamma, &mut vf).unwrap();
    let explicit = fvc::laplacian(&fv_mesh, &gamma, &vf).unwrap();
    assert_consistent(&fv_mesh, &matrix, &vf, &explicit);
    assert!(matrix.is_symmetric());
    assert_eq!(matrix.dimensions(), Dimensions::DIFFUSIVITY * Dimensions::LENGTH);
}

#[test]
fn implicit_uniform_laplacian_matches_explicit_laplacian() {
    let fv_mesh = box_fv_mesh();
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 0.01);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);

    let matrix = fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap();
    let explicit = fvc::laplacian_uniform(&fv_mesh, &nu, &vf).unwrap();
    assert_consistent(&fv_mesh, &matrix, &vf, &explicit);
}

#[test]
fn implicit_convection_matches_explicit_convection() {
    let fv_mesh = box_fv_mesh();
    let phi = flux(&fv_mesh);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);

    let matrix = fvm::div(&fv_mesh, &phi, &mut vf).unwrap();
    let explicit = fvc::div_flux(&fv_mesh, &phi, &vf).unwrap();
    assert_consistent(&fv_mesh, &matrix, &vf, &explicit);
}

#[test]
fn matrix_addition_is_commutative() {
    let fv_mesh = box_fv_mesh();
    let phi = flux(&fv_mesh);
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 0.1);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);

    let ddt = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    let div = fvm::div(&fv_mesh, &phi, &mut vf).unwrap();
    let laplacian = fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap();

    let forward = ddt.clone() + div.clone() - laplacian.clone();
    let backward = -laplacian + div + ddt;
    assert_matrices_eq(&forward, &backward);
}

#[test]
fn matrices_of_different_fields_cannot_be_combined() {
    let fv_mesh = box_fv_mesh();
    let mut t = crate::fixed_value_field(&fv_mesh, "T", profile);
    let mut s = crate::fixed_value_field(&fv_mesh, "S", profile);

    let mut matrix = fvm::ddt(&fv_mesh, &mut t).unwrap();
    let other = fvm::ddt(&fv_mesh, &mut s).unwrap();
    assert!(matches!(matrix.checked_add(&other), Err(MatrixError::FieldMismatch { .. })));
    assert!(matches!(matrix.checked_sub(&other), Err(MatrixError::FieldMismatch { .. })));
}

#[test]
fn explicit_sources_need_matching_dimensions() {
    let fv_mesh = box_fv_mesh();
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
    let mut matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();

    let wrong = VolField::uniform(&fv_mesh, "S", Dimensions::DIMLESS, 1.0);
    assert!(matches!(matrix.add_field(&fv_mesh, &wrong), Err(MatrixError::DimensionMismatch { .. })));

    let source = VolField::uniform(&fv_mesh, "S", Dimensions::TIME.recip(), 3.0);
    let before = matrix.source().to_vec();
    matrix.add_field(&fv_mesh, &source).unwrap();
    for ((&after, &before), &volume) in matrix.source().iter().zip(&before).zip(fv_mesh.mesh().cell_volumes()) {
        assert!((after - (before - 3.0 * volume)).abs() < 1e-12);
    }
}

#[test]
fn relaxation_preserves_the_residual_of_the_current_values() {
    let fv_mesh = box_fv_mesh();
    let phi = flux(&fv_mesh);
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 0.1);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
    let matrix = fvm::div(&fv_mesh, &phi, &mut vf).unwrap() - fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap();

    let mut relaxed = matrix.clone();
    relaxed.relax(&fv_mesh, &vf, 0.7).unwrap();
    assert_ne!(relaxed.diag(), matrix.diag());
    assert_matrix_eq!(
        DVector::from_vec(relaxed.residual(&fv_mesh, &vf)),
        DVector::from_vec(matrix.residual(&fv_mesh, &vf)),
        comp = abs,
        tol = 1e-10
    );
}

#[test]
fn relaxation_factor_must_be_in_unit_interval() {
    let fv_mesh = box_fv_mesh();
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
    let mut matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    for alpha in [0.0, -0.5, 1.5, f64::NAN] {
        assert!(matches!(
            matrix.relax(&fv_mesh, &vf, alpha),
            Err(MatrixError::InvalidRelaxationFactor { .. })
        ));
    }
    let unchanged = matrix.clone();
    matrix.relax(&fv_mesh, &vf, 1.0).unwrap();
    // A diagonal matrix is already dominant
    assert_matrices_eq(&matrix, &unchanged);
}

#[test]
fn face_fluxes_of_laplacian_integrate_to_the_residual() {
    let fv_mesh = box_fv_mesh();
    let gamma = VolField::uniform(&fv_mesh, "gamma", Dimensions::DIFFUSIVITY, 1.5);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", profile);
    let matrix = fvm::laplacian(&fv_mesh, &gamma, &mut vf).unwrap();

    // Without a source the face fluxes integrate to A ψ - b
    let face_flux = matrix.flux(&fv_mesh, &vf);
    let integrated = fvc::surface_integrate_values(&fv_mesh, &face_flux);
    let volumes = fv_mesh.mesh().cell_volumes();
    let from_flux: Vec<_> = integrated.iter().zip(volumes).map(|(i, v)| i * v).collect();
    let negated_residual: Vec<_> = matrix.residual(&fv_mesh, &vf).iter().map(|r| -r).collect();
    assert_matrix_eq!(DVector::from_vec(from_flux), DVector::from_vec(negated_residual), comp = abs, tol = 1e-10);
}
