use finvol::boundary::PatchField;
use finvol::dimensions::Dimensions;
use finvol::error::SchemeError;
use finvol::field::VolField;
use finvol::fv_mesh::FvMesh;
use finvol::mesh::procedural::create_line_mesh;
use finvol::time::Time;
use finvol::{fvc, fvm};
use matrixcompare::assert_scalar_eq;

fn fv_mesh_with_ddt_scheme(scheme: &str, delta_t: f64) -> FvMesh<f64> {
    let mut schemes = crate::default_schemes();
    schemes.ddt_schemes = crate::scheme_table(&[("default", scheme)]);
    FvMesh::new(create_line_mesh(4, 0.5))
        .with_time(Time::new(0.0, delta_t))
        .with_schemes(schemes)
}

/// Sets `vf` to `value(t)` at the start of every time step given by `steps`.
fn march(fv_mesh: &mut FvMesh<f64>, vf: &mut VolField<f64, f64>, steps: &[f64], value: impl Fn(f64) -> f64) {
    vf.internal_values_mut().fill(value(fv_mesh.time().value()));
    for &delta_t in steps {
        fv_mesh.time_mut().set_delta_t(delta_t);
        fv_mesh.time_mut().advance();
        vf.store_old_time(fv_mesh.time().time_index());
        vf.internal_values_mut().fill(value(fv_mesh.time().value()));
    }
}

/// A field with uniform cell and face values at three consecutive time levels.
fn field_with_history(fv_mesh: &mut FvMesh<f64>, levels: [f64; 3]) -> VolField<f64, f64> {
    let mut vf = VolField::uniform(fv_mesh, "T", Dimensions::DIMLESS, levels[0]);
    for &value in &levels[1..] {
        fv_mesh.time_mut().advance();
        vf.store_old_time(fv_mesh.time().time_index());
        vf.internal_values_mut().fill(value);
        for patch in [LEFT, RIGHT] {
            vf.patch_field_mut(patch).assign(&[value]);
        }
    }
    vf
}

const LEFT: usize = 0;
const RIGHT: usize = 1;

#[test]
fn euler_matrix_coefficients() {
    let fv_mesh = fv_mesh_with_ddt_scheme("Euler", 0.1);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);
    vf.store_old_time(1);
    vf.internal_values_mut().iter_mut().for_each(|v| *v += 1.0);

    let matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    let mesh = fv_mesh.mesh();
    assert_eq!(matrix.dimensions(), Dimensions::VOLUME / Dimensions::TIME);
    assert!(matrix.lower().iter().all(|&l| l == 0.0));
    for cell in 0..mesh.num_cells() {
        let volume = mesh.cell_volumes()[cell];
        assert_scalar_eq!(matrix.diag()[cell], volume / 0.1, comp = abs, tol = 1e-12);
        let old = mesh.cell_centres()[cell].x;
        assert_scalar_eq!(matrix.source()[cell], volume * old / 0.1, comp = abs, tol = 1e-12);
    }
}

#[test]
fn euler_explicit_derivative() {
    let fv_mesh = fv_mesh_with_ddt_scheme("Euler", 0.25);
    let mut vf = VolField::from_internal(&fv_mesh, "T", Dimensions::TEMPERATURE, vec![1.0, 2.0, 3.0, 4.0]);
    vf.store_old_time(1);
    vf.internal_values_mut().copy_from_slice(&[2.0, 2.0, 2.0, 5.0]);

    let ddt = fvc::ddt(&fv_mesh, &vf).unwrap();
    assert_eq!(ddt.name(), "ddt(T)");
    assert_eq!(ddt.dimensions(), Dimensions::TEMPERATURE / Dimensions::TIME);
    assert_eq!(ddt.internal_values(), &[4.0, 0.0, -4.0, 4.0]);
}

#[test]
fn fields_without_old_time_have_no_derivative() {
    let fv_mesh = fv_mesh_with_ddt_scheme("Euler", 0.1);
    let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, vec![1.0, 2.0, 3.0, 4.0]);
    let ddt = fvc::ddt(&fv_mesh, &vf).unwrap();
    assert!(ddt.internal_values().iter().all(|&v| v == 0.0));
}

#[test]
fn old_time_is_stored_once_per_time_index() {
    let fv_mesh = fv_mesh_with_ddt_scheme("Euler", 0.1);
    let mut vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);
    assert_eq!(vf.num_old_times(), 0);

    vf.store_old_time(1);
    vf.internal_values_mut().fill(2.0);
    vf.store_old_time(1);
    assert_eq!(vf.num_old_times(), 1);
    assert_eq!(vf.old_internal_values(), &[1.0; 4]);

    vf.store_old_time(2);
    assert_eq!(vf.num_old_times(), 2);
    assert_eq!(vf.old_internal_values(), &[2.0; 4]);
    assert_eq!(vf.old_old_internal_values(), Some(&[1.0; 4][..]));
}

#[test]
fn backward_is_exact_for_quadratics_in_time() {
    let quadratic = |t: f64| t * t;

    let mut fv_mesh = fv_mesh_with_ddt_scheme("backward", 0.1);
    let mut vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 0.0);
    march(&mut fv_mesh, &mut vf, &[0.1, 0.1], quadratic);
    let ddt = fvc::ddt(&fv_mesh, &vf).unwrap();
    for &value in ddt.internal_values() {
        assert_scalar_eq!(value, 0.4, comp = abs, tol = 1e-12);
    }

    // Variable time steps, t = 0, 0.1, 0.3
    let mut fv_mesh = fv_mesh_with_ddt_scheme("backward", 0.1);
    let mut vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 0.0);
    march(&mut fv_mesh, &mut vf, &[0.1, 0.2], quadratic);
    let ddt = fvc::ddt(&fv_mesh, &vf).unwrap();
    for &value in ddt.internal_values() {
        assert_scalar_eq!(value, 0.6, comp = abs, tol = 1e-12);
    }
}

#[test]
fn backward_matrix_reproduces_explicit_derivative() {
    let mut fv_mesh = fv_mesh_with_ddt_scheme("backward", 0.1);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);
    march(&mut fv_mesh, &mut vf, &[0.1, 0.05], |t| 1.0 + t * t * t);

    let matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    let explicit = fvc::ddt(&fv_mesh, &vf).unwrap();
    let residual = matrix.residual(&fv_mesh, &vf);
    for ((r, e), volume) in residual
        .iter()
        .zip(explicit.internal_values())
        .zip(fv_mesh.mesh().cell_volumes())
    {
        assert_scalar_eq!(-r, e * volume, comp = abs, tol = 1e-12);
    }
}

#[test]
fn backward_starts_as_euler() {
    let mut euler_mesh = fv_mesh_with_ddt_scheme("Euler", 0.1);
    let mut backward_mesh = fv_mesh_with_ddt_scheme("backward", 0.1);
    let mut euler = VolField::uniform(&euler_mesh, "T", Dimensions::DIMLESS, 0.0);
    let mut backward = VolField::uniform(&backward_mesh, "T", Dimensions::DIMLESS, 0.0);
    march(&mut euler_mesh, &mut euler, &[0.1], |t| t * t);
    march(&mut backward_mesh, &mut backward, &[0.1], |t| t * t);

    let euler = fvc::ddt(&euler_mesh, &euler).unwrap();
    let backward = fvc::ddt(&backward_mesh, &backward).unwrap();
    assert_eq!(euler.internal_values(), backward.internal_values());
}

#[test]
fn local_euler_needs_local_time_steps() {
    let mut fv_mesh = fv_mesh_with_ddt_scheme("localEuler", 1.0);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);

    let err = fvm::ddt(&fv_mesh, &mut vf).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(
        scheme_error.root_cause(),
        SchemeError::MissingLocalTimeStep { num_cells: 4, available: None }
    ));

    fv_mesh.time_mut().set_local_rdelta_t(vec![1.0, 2.0]);
    let err = fvm::ddt(&fv_mesh, &mut vf).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(
        scheme_error.root_cause(),
        SchemeError::MissingLocalTimeStep { num_cells: 4, available: Some(2) }
    ));

    let rdelta_t = vec![1.0, 2.0, 4.0, 8.0];
    fv_mesh.time_mut().set_local_rdelta_t(rdelta_t.clone());
    let matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    for (cell, &rdt) in rdelta_t.iter().enumerate() {
        let volume = fv_mesh.mesh().cell_volumes()[cell];
        assert_scalar_eq!(matrix.diag()[cell], rdt * volume, comp = abs, tol = 1e-12);
    }
}

#[test]
fn steady_state_has_no_time_derivative() {
    let fv_mesh = fv_mesh_with_ddt_scheme("steadyState", 0.1);
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);
    vf.store_old_time(1);
    vf.internal_values_mut().fill(3.0);

    let matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    assert!(matrix.diag().iter().all(|&d| d == 0.0));
    assert!(matrix.source().iter().all(|&s| s == 0.0));
    let ddt = fvc::ddt(&fv_mesh, &vf).unwrap();
    assert!(ddt.internal_values().iter().all(|&v| v == 0.0));
}

#[test]
fn bounded_backward_limits_the_extrapolated_old_value() {
    // c = 1.5 and c00/c = 1/3, so the extrapolated old value 1 + (1 - 0)/3 lies above
    // every old value
    let mut fv_mesh = fv_mesh_with_ddt_scheme("backward", 0.1);
    let vf = field_with_history(&mut fv_mesh, [0.0, 1.0, 2.0]);
    let unbounded = fvc::ddt(&fv_mesh, &vf).unwrap();

    let mut fv_mesh = fv_mesh_with_ddt_scheme("bounded backward", 0.1);
    let vf = field_with_history(&mut fv_mesh, [0.0, 1.0, 2.0]);
    let bounded = fvc::ddt(&fv_mesh, &vf).unwrap();

    for (&u, &b) in unbounded.internal_values().iter().zip(bounded.internal_values()) {
        assert_scalar_eq!(u, 10.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(b, 15.0, comp = abs, tol = 1e-12);
    }
    for patch in [LEFT, RIGHT] {
        assert_scalar_eq!(unbounded.boundary_values(patch)[0], 10.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(bounded.boundary_values(patch)[0], 15.0, comp = abs, tol = 1e-12);
    }

    // The implicit form uses the same limited value
    let mut vf = vf;
    let matrix = fvm::ddt(&fv_mesh, &mut vf).unwrap();
    for (cell, &volume) in fv_mesh.mesh().cell_volumes().iter().enumerate() {
        assert_scalar_eq!(matrix.source()[cell], 15.0 * volume, comp = abs, tol = 1e-12);
    }
}

#[test]
fn bounded_ddt_removes_the_density_change() {
    let mut fv_mesh = fv_mesh_with_ddt_scheme("bounded Euler", 0.1);
    let mut rho = VolField::uniform(&fv_mesh, "rho", Dimensions::DIMLESS, 1.0);
    let mut vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 3.0);
    fv_mesh.time_mut().advance();
    rho.store_old_time(fv_mesh.time().time_index());
    vf.store_old_time(fv_mesh.time().time_index());
    rho.internal_values_mut().fill(2.0);

    // ddt(rho, T) = 30 comes entirely from the density change
    let ddt = fvc::ddt_rho(&fv_mesh, &rho, &vf).unwrap();
    for &value in ddt.internal_values() {
        assert_scalar_eq!(value, 0.0, comp = abs, tol = 1e-10);
    }
    let matrix = fvm::ddt_rho(&fv_mesh, &rho, &mut vf).unwrap();
    for &r in &matrix.residual(&fv_mesh, &vf) {
        assert_scalar_eq!(r, 0.0, comp = abs, tol = 1e-10);
    }

    let mut unbounded_mesh = fv_mesh_with_ddt_scheme("Euler", 0.1);
    unbounded_mesh.time_mut().advance();
    let ddt = fvc::ddt_rho(&unbounded_mesh, &rho, &vf).unwrap();
    for &value in ddt.internal_values() {
        assert_scalar_eq!(value, 30.0, comp = abs, tol = 1e-10);
    }
}
