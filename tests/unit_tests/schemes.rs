use finvol::dimensions::Dimensions;
use finvol::error::SchemeError;
use finvol::field::VolField;
use finvol::fv_mesh::FvMesh;
use finvol::fvc;
use finvol::grad::{gradient_field, GradScheme};
use finvol::mesh::procedural::create_line_mesh;
use nalgebra::Vector3;

fn fv_mesh_with_grad_schemes(entries: &[(&str, &str)]) -> FvMesh<f64> {
    let mut schemes = crate::default_schemes();
    schemes.grad_schemes = crate::scheme_table(entries);
    FvMesh::new(create_line_mesh(4, 0.25)).with_schemes(schemes)
}

/// The root cause of selecting the gradient scheme for `grad(T)`.
fn grad_selection_error(entries: &[(&str, &str)]) -> SchemeError {
    let fv_mesh = fv_mesh_with_grad_schemes(entries);
    fv_mesh
        .schemes()
        .grad_scheme::<f64>("grad(T)")
        .unwrap_err()
        .root_cause()
        .clone()
}

/// A gradient scheme that ignores the field.
#[derive(Debug)]
struct ZeroGrad;

impl GradScheme<f64, f64> for ZeroGrad {
    fn name(&self) -> &'static str {
        "zero"
    }

    fn calc_grad(&self, fv_mesh: &FvMesh<f64>, vf: &VolField<f64, f64>) -> eyre::Result<VolField<f64, Vector3<f64>>> {
        gradient_field(fv_mesh, vf, vec![Vector3::zeros(); fv_mesh.mesh().num_cells()])
    }
}

#[test]
fn specific_entries_take_precedence_over_default() {
    let fv_mesh = fv_mesh_with_grad_schemes(&[("default", "Gauss linear"), ("grad(p)", "leastSquares")]);
    assert_eq!(fv_mesh.schemes().grad_scheme::<f64>("grad(p)").unwrap().name(), "leastSquares");
    assert_eq!(fv_mesh.schemes().grad_scheme::<f64>("grad(T)").unwrap().name(), "Gauss");
}

#[test]
fn missing_entries_are_reported() {
    assert_eq!(
        grad_selection_error(&[("grad(p)", "Gauss linear")]),
        SchemeError::MissingEntry {
            table: "gradSchemes",
            key: "grad(T)".to_string()
        }
    );
    // A `none` default only allows the explicitly listed entries
    assert!(matches!(
        grad_selection_error(&[("default", "none")]),
        SchemeError::MissingEntry { table: "gradSchemes", .. }
    ));
}

#[test]
fn unknown_schemes_list_the_available_ones() {
    match grad_selection_error(&[("default", "Gauss lineer")]) {
        SchemeError::UnknownScheme { family, name, available } => {
            assert_eq!(family, "interpolation");
            assert_eq!(name, "lineer");
            assert!(available.iter().any(|scheme| scheme == "linear"));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn malformed_scheme_strings_are_rejected() {
    assert_eq!(
        grad_selection_error(&[("default", "Gauss linear extra")]),
        SchemeError::TrailingTokens {
            tokens: "extra".to_string()
        }
    );
    assert_eq!(
        grad_selection_error(&[("default", "cellLimited Gauss linear")]),
        SchemeError::UnexpectedEnd { expected: "k" }
    );
    assert!(matches!(
        grad_selection_error(&[("default", "cellLimited Gauss linear 1.5")]),
        SchemeError::CoefficientOutOfRange { coefficient: "k", .. }
    ));
    assert!(matches!(
        grad_selection_error(&[("default", "")]),
        SchemeError::UnexpectedEnd { .. }
    ));
}

#[test]
fn errors_name_the_failing_entry() {
    let fv_mesh = fv_mesh_with_grad_schemes(&[("default", "cellLimited Gauss linear 2")]);
    let vf = VolField::uniform(&fv_mesh, "T", Dimensions::DIMLESS, 1.0);
    let err = fvc::grad(&fv_mesh, &vf).unwrap_err();
    let scheme_error = crate::find_error::<SchemeError>(&err).expect("Must fail with a scheme error");
    assert!(matches!(scheme_error, SchemeError::InEntry { key, .. } if key == "grad(T)"));
    assert!(scheme_error.to_string().contains("cellLimited Gauss linear 2"));
}

#[test]
fn registered_schemes_are_local_to_a_mesh() {
    let mut custom = fv_mesh_with_grad_schemes(&[("default", "zero")]);
    custom
        .schemes_mut()
        .registry_mut::<f64>()
        .grad
        .register("zero", |_, _| Ok(Box::new(ZeroGrad)));

    let vf = crate::sampled_field(&custom, "T", |p| 4.0 * p.x);
    let grad = fvc::grad(&custom, &vf).unwrap();
    assert!(grad.internal_values().iter().all(|g| g == &Vector3::zeros()));

    // The default registry of another mesh is unaffected
    let other = fv_mesh_with_grad_schemes(&[("default", "zero")]);
    assert!(matches!(
        other.schemes().grad_scheme::<f64>("grad(T)").unwrap_err().root_cause(),
        SchemeError::UnknownScheme { family: "grad", .. }
    ));
    assert!(!other.schemes().registry::<f64>().grad.contains("zero"));
}
