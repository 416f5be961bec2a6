use finvol::convection::MultivariateScheme;
use finvol::dimensions::Dimensions;
use finvol::error::SchemeError;
use finvol::field::{SurfaceField, VolField};
use finvol::fv_mesh::FvMesh;
use finvol::mesh::procedural::{create_line_mesh, create_unit_cube_mesh};
use finvol::mesh::Mesh;
use finvol::{fvc, fvm};
use matrixcompare::assert_scalar_eq;
use proptest::collection::vec;
use proptest::prelude::*;

fn fv_mesh_with_interpolation(mesh: Mesh<f64>, scheme: &str) -> FvMesh<f64> {
    let mut schemes = crate::default_schemes();
    schemes
        .interpolation_schemes
        .insert("interpolate(T)".to_string(), scheme.to_string());
    schemes
        .div_schemes
        .insert("div(phi,T)".to_string(), format!("Gauss {}", scheme));
    FvMesh::new(mesh).with_schemes(schemes)
}

/// A flux whose sign alternates between neighbouring faces.
fn alternating_flux(mesh: &Mesh<f64>) -> SurfaceField<f64, f64> {
    SurfaceField::from_face_fn(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, |face| {
        if face % 2 == 0 {
            1.0 + face as f64
        } else {
            -2.0
        }
    })
}

#[test]
fn upwind_without_flux_is_rejected() {
    let fv_mesh = fv_mesh_with_interpolation(create_line_mesh(4, 1.0), "upwind");
    let vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);
    let err = fvc::interpolate(&fv_mesh, &vf).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(scheme_error.root_cause(), SchemeError::FluxRequired { scheme: "upwind" }));
}

#[test]
fn limited_schemes_without_flux_are_rejected() {
    let fv_mesh = fv_mesh_with_interpolation(create_line_mesh(4, 1.0), "vanLeer");
    let vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);
    let err = fvc::interpolate(&fv_mesh, &vf).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(scheme_error.root_cause(), SchemeError::FluxRequired { .. }));
}

#[test]
fn van_leer_is_linear_for_linear_profiles() {
    let linear = fv_mesh_with_interpolation(create_line_mesh(10, 0.1), "linear");
    let van_leer = fv_mesh_with_interpolation(create_line_mesh(10, 0.1), "vanLeer");
    let phi = SurfaceField::uniform(linear.mesh(), "phi", Dimensions::VOLUMETRIC_FLUX, 0.5);

    let f = |p: &nalgebra::Point3<f64>| 3.0 * p.x - 1.0;
    let linear_values = fvc::interpolate_with_flux(&linear, &crate::sampled_field(&linear, "T", f), &phi).unwrap();
    let limited_values =
        fvc::interpolate_with_flux(&van_leer, &crate::sampled_field(&van_leer, "T", f), &phi).unwrap();

    for (&limited, &expected) in limited_values
        .internal_values()
        .iter()
        .zip(linear_values.internal_values())
    {
        assert_scalar_eq!(limited, expected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn limited_linear_is_linear_for_linear_profiles() {
    let linear = fv_mesh_with_interpolation(create_line_mesh(10, 0.1), "linear");
    let limited = fv_mesh_with_interpolation(create_line_mesh(10, 0.1), "limitedLinear 1");
    let phi = SurfaceField::uniform(linear.mesh(), "phi", Dimensions::VOLUMETRIC_FLUX, -0.5);

    let f = |p: &nalgebra::Point3<f64>| 1.0 - 2.0 * p.x;
    let linear_values = fvc::interpolate_with_flux(&linear, &crate::sampled_field(&linear, "T", f), &phi).unwrap();
    let limited_values = fvc::interpolate_with_flux(&limited, &crate::sampled_field(&limited, "T", f), &phi).unwrap();

    for (&limited, &expected) in limited_values
        .internal_values()
        .iter()
        .zip(linear_values.internal_values())
    {
        assert_scalar_eq!(limited, expected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn limited_linear_falls_back_to_upwind_at_a_step() {
    let fv_mesh = fv_mesh_with_interpolation(create_line_mesh(10, 0.1), "limitedLinear 1");
    let mesh = fv_mesh.mesh();
    let phi = SurfaceField::uniform(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, 0.5);
    let vf = crate::sampled_field(&fv_mesh, "T", |p| if p.x > 0.5 { 1.0 } else { 0.0 });
    let faces = fvc::interpolate_with_flux(&fv_mesh, &vf, &phi).unwrap();

    let values = vf.internal_values();
    for (face, (&own, &nei)) in mesh.owner().iter().zip(mesh.neighbour()).enumerate() {
        if values[own] != values[nei] {
            assert_eq!(faces.internal_values()[face], values[own]);
        }
    }
}

#[test]
fn linear_upwind_is_exact_for_linear_profiles() {
    let fv_mesh = fv_mesh_with_interpolation(create_unit_cube_mesh(3), "linearUpwind grad(T)");
    let mesh = fv_mesh.mesh();
    let phi = alternating_flux(mesh);
    let f = |p: &nalgebra::Point3<f64>| 2.0 * p.x - p.y + 0.5 * p.z + 1.0;
    let vf = crate::sampled_field(&fv_mesh, "T", f);
    let faces = fvc::interpolate_with_flux(&fv_mesh, &vf, &phi).unwrap();

    for (face, &value) in faces.internal_values().iter().enumerate() {
        assert_scalar_eq!(value, f(&mesh.face_centres()[face]), comp = abs, tol = 1e-10);
    }
}

#[test]
fn linear_upwind_needs_a_known_gradient_scheme() {
    let mut schemes = crate::default_schemes();
    schemes.grad_schemes = crate::scheme_table(&[("grad(U)", "Gauss linear")]);
    schemes
        .interpolation_schemes
        .insert("interpolate(T)".to_string(), "linearUpwind grad(T)".to_string());
    let fv_mesh = FvMesh::new(create_line_mesh(4, 1.0)).with_schemes(schemes);
    let phi = SurfaceField::uniform(fv_mesh.mesh(), "phi", Dimensions::VOLUMETRIC_FLUX, 1.0);
    let vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);

    let err = fvc::interpolate_with_flux(&fv_mesh, &vf, &phi).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(
        scheme_error.root_cause(),
        SchemeError::MissingEntry { table: "gradSchemes", .. }
    ));
}

#[test]
fn multivariate_selection_shares_the_most_limiting_weights() {
    let fv_mesh = FvMesh::new(create_line_mesh(10, 0.1)).with_schemes(crate::default_schemes());
    let mesh = fv_mesh.mesh();
    let phi = SurfaceField::uniform(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, 0.5);
    let smooth = crate::sampled_field(&fv_mesh, "T", |p| 3.0 * p.x - 1.0);
    let step = crate::sampled_field(&fv_mesh, "S", |p| if p.x > 0.5 { 1.0 } else { 0.0 });

    // On its own the smooth field is interpolated linearly
    let alone = MultivariateScheme::new(&fv_mesh, "limitedLinear 1", &[&smooth], &phi).unwrap();
    let linear = fvc::interpolate(&fv_mesh, &smooth).unwrap();
    for (&value, &expected) in alone
        .interpolate(&fv_mesh, &smooth)
        .internal_values()
        .iter()
        .zip(linear.internal_values())
    {
        assert_scalar_eq!(value, expected, comp = abs, tol = 1e-10);
    }

    // Together with the step, the smooth field is upwinded where the step is
    let shared = MultivariateScheme::new(&fv_mesh, "limitedLinear 1", &[&smooth, &step], &phi).unwrap();
    assert_eq!(shared.selection(), "limitedLinear 1");
    let faces = shared.interpolate(&fv_mesh, &smooth);
    let (values, step_values) = (smooth.internal_values(), step.internal_values());
    let mut num_step_faces = 0;
    for (face, (&own, &nei)) in mesh.owner().iter().zip(mesh.neighbour()).enumerate() {
        let expected = if step_values[own] != step_values[nei] {
            num_step_faces += 1;
            values[own]
        } else {
            linear.internal_values()[face]
        };
        assert_scalar_eq!(faces.internal_values()[face], expected, comp = abs, tol = 1e-10);
    }
    assert_eq!(num_step_faces, 1);
}

#[test]
fn multivariate_selection_from_div_schemes() {
    let mut schemes = crate::default_schemes();
    schemes.div_schemes.insert(
        "div(phi,Yi)".to_string(),
        "Gauss multivariateSelection upwind".to_string(),
    );
    schemes
        .div_schemes
        .insert("div(phi,bad)".to_string(), "Gauss multivariateSelection QUICK".to_string());
    let fv_mesh = FvMesh::new(create_line_mesh(4, 0.25)).with_schemes(schemes);
    let phi = SurfaceField::uniform(fv_mesh.mesh(), "phi", Dimensions::VOLUMETRIC_FLUX, 1.0);
    let y = VolField::from_internal(&fv_mesh, "Yi", Dimensions::DIMLESS, vec![0.1, 0.2, 0.3, 0.4]);

    let scheme = MultivariateScheme::from_config(&fv_mesh, "div(phi,Yi)", &[&y], &phi).unwrap();
    assert_eq!(scheme.selection(), "upwind");
    assert!(scheme.weights().internal_values().iter().all(|&w| w == 1.0));

    let err = MultivariateScheme::from_config(&fv_mesh, "div(phi,bad)", &[&y], &phi).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(
        scheme_error.root_cause(),
        SchemeError::UnknownScheme { family: "multivariateSelection", .. }
    ));
}

#[test]
fn upwind_matrix_has_non_positive_off_diagonal() {
    let fv_mesh = fv_mesh_with_interpolation(create_unit_cube_mesh(3), "upwind");
    let phi = alternating_flux(fv_mesh.mesh());
    let mut vf = crate::fixed_value_field(&fv_mesh, "T", |p| p.x);
    let matrix = fvm::div(&fv_mesh, &phi, &mut vf).unwrap();

    assert!(matrix.lower().iter().all(|&l| l <= 0.0));
    assert!(matrix.upper().iter().all(|&u| u <= 0.0));
    assert_eq!(matrix.dimensions(), Dimensions::VOLUMETRIC_FLUX);
}

proptest! {
    #[test]
    fn upwind_takes_the_upstream_value(values in vec(-5.0..5.0, 27)) {
        let fv_mesh = fv_mesh_with_interpolation(create_unit_cube_mesh(3), "upwind");
        let mesh = fv_mesh.mesh();
        let phi = alternating_flux(mesh);
        let vf = VolField::from_internal(&fv_mesh, "T", Dimensions::DIMLESS, values.clone());
        let faces = fvc::interpolate_with_flux(&fv_mesh, &vf, &phi).unwrap();

        for (face, &value) in faces.internal_values().iter().enumerate() {
            let upstream = if phi.internal_values()[face] >= 0.0 {
                mesh.owner()[face]
            } else {
                mesh.neighbour()[face]
            };
            prop_assert_eq!(value, values[upstream]);
        }
    }
}
