use finvol::boundary::{
    CyclicPatchField, FixedFluxPressurePatchField, FixedGradientPatchField, FixedValuePatchField, InletOutletPatchField,
    MixedPatchField, PatchFieldRegistry, ProcessorPatchField,
};
use finvol::config::{FieldConfig, PatchFieldConfig};
use finvol::dimensions::{Dimensioned, Dimensions};
use finvol::error::{ExchangeError, FieldError, PatchError};
use finvol::field::{SurfaceField, VolField};
use finvol::fv_mesh::FvMesh;
use finvol::fvm;
use finvol::mesh::procedural::{create_box_mesh, create_line_mesh, BoxMeshSpec, BoxSide, SidePatch};
use finvol::time::Time;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use serde_json::json;

const LEFT: usize = 0;
const RIGHT: usize = 1;

fn line_fv_mesh() -> FvMesh<f64> {
    let fv_mesh = FvMesh::new(create_line_mesh(4, 0.25))
        .with_time(Time::new(0.0, 0.1))
        .with_schemes(crate::default_schemes());
    assert_eq!(fv_mesh.mesh().patch(LEFT).name(), "left");
    assert_eq!(fv_mesh.mesh().patch(RIGHT).name(), "right");
    fv_mesh
}

fn field_config(entries: &[(&str, PatchFieldConfig)]) -> FieldConfig {
    FieldConfig {
        dimensions: Dimensions::TEMPERATURE,
        internal_field: json!(0.5),
        boundary_field: entries
            .iter()
            .map(|(patch, config)| (patch.to_string(), config.clone()))
            .collect(),
    }
}

fn read_field(fv_mesh: &FvMesh<f64>, entries: &[(&str, PatchFieldConfig)]) -> Result<VolField<f64, f64>, FieldError> {
    VolField::from_config(
        fv_mesh,
        "T",
        &field_config(entries),
        &PatchFieldRegistry::with_scalar_defaults(),
    )
}

fn patch_error(result: Result<VolField<f64, f64>, FieldError>) -> PatchError {
    match result {
        Err(FieldError::Patch(err)) => err,
        Err(other) => panic!("Expected a patch error, got {}", other),
        Ok(_) => panic!("Expected a patch error"),
    }
}

#[test]
fn basic_conditions_are_evaluated() {
    let fv_mesh = line_fv_mesh();
    let mut vf = read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedValue").with_entry("value", json!(1.0))),
            ("right", PatchFieldConfig::new("zeroGradient")),
        ],
    )
    .unwrap();
    assert_eq!(vf.dimensions(), Dimensions::TEMPERATURE);
    assert_eq!(vf.patch_field(2).type_name(), "empty");

    vf.internal_values_mut()[3] = 2.0;
    vf.correct_boundary_conditions(&fv_mesh).unwrap();
    assert_eq!(vf.boundary_values(LEFT), &[1.0]);
    assert_eq!(vf.boundary_values(RIGHT), &[2.0]);
    assert!(vf.patch_field(LEFT).fixes_value());
    assert!(!vf.patch_field(RIGHT).fixes_value());
}

#[test]
fn fixed_gradient_extrapolates_from_the_cell() {
    let fv_mesh = line_fv_mesh();
    let mut vf = read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedValue").with_entry("value", json!(0.0))),
            ("right", PatchFieldConfig::new("fixedGradient").with_entry("gradient", json!(2.0))),
        ],
    )
    .unwrap();
    vf.correct_boundary_conditions(&fv_mesh).unwrap();
    // The boundary face is an eighth from the last cell centre
    assert_scalar_eq!(vf.boundary_values(RIGHT)[0], 0.75, comp = abs, tol = 1e-12);
    assert_eq!(vf.patch_field(RIGHT).sn_grad(&fv_mesh, vf.internal_values()), vec![2.0]);
}

#[test]
fn non_constraint_patches_need_an_entry() {
    let fv_mesh = line_fv_mesh();
    let err = patch_error(read_field(&fv_mesh, &[("left", PatchFieldConfig::new("zeroGradient"))]));
    assert_eq!(
        err,
        PatchError::MissingEntry {
            patch: "right".to_string(),
            entry: "type"
        }
    );

    let err = patch_error(read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedValue")),
            ("right", PatchFieldConfig::new("zeroGradient")),
        ],
    ));
    assert_eq!(
        err,
        PatchError::MissingEntry {
            patch: "left".to_string(),
            entry: "value"
        }
    );
}

#[test]
fn unknown_types_are_rejected() {
    let fv_mesh = line_fv_mesh();
    let err = patch_error(read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedValu").with_entry("value", json!(1.0))),
            ("right", PatchFieldConfig::new("zeroGradient")),
        ],
    ));
    assert_eq!(
        err,
        PatchError::UnknownType {
            patch: "left".to_string(),
            type_name: "fixedValu".to_string()
        }
    );
}

#[test]
fn constraint_types_must_match_the_patch() {
    let fv_mesh = line_fv_mesh();
    let err = patch_error(read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("zeroGradient")),
            ("right", PatchFieldConfig::new("zeroGradient")),
            ("frontAndBack", PatchFieldConfig::new("fixedValue").with_entry("value", json!(1.0))),
        ],
    ));
    assert!(matches!(err, PatchError::ConstraintMismatch { patch_kind: "empty", .. }));

    let err = patch_error(read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("zeroGradient")),
            ("right", PatchFieldConfig::new("symmetryPlane")),
        ],
    ));
    assert_eq!(
        err,
        PatchError::ConstraintMismatch {
            patch: "right".to_string(),
            patch_kind: "patch",
            type_name: "symmetryPlane".to_string()
        }
    );
}

#[test]
fn invalid_entries_are_rejected() {
    let fv_mesh = line_fv_mesh();
    let err = patch_error(read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedValue").with_entry("value", json!({ "nonuniform": [1.0, 2.0] }))),
            ("right", PatchFieldConfig::new("zeroGradient")),
        ],
    ));
    assert!(matches!(err, PatchError::InvalidEntry { entry, .. } if entry == "value"));

    let mixed = PatchFieldConfig::new("mixed")
        .with_entry("refValue", json!(1.0))
        .with_entry("refGradient", json!(0.0))
        .with_entry("valueFraction", json!(1.5));
    let err = patch_error(read_field(
        &fv_mesh,
        &[("left", mixed), ("right", PatchFieldConfig::new("zeroGradient"))],
    ));
    assert!(matches!(err, PatchError::InvalidEntry { entry, .. } if entry == "valueFraction"));
}

#[test]
fn vector_values_are_read_from_arrays() {
    let fv_mesh = line_fv_mesh();
    let config = FieldConfig {
        dimensions: Dimensions::VELOCITY,
        internal_field: json!([1.0, 0.0, 0.0]),
        boundary_field: [
            (
                "left".to_string(),
                PatchFieldConfig::new("fixedValue").with_entry("value", json!({ "nonuniform": [[2.0, 1.0, 0.0]] })),
            ),
            ("right".to_string(), PatchFieldConfig::new("zeroGradient")),
        ]
        .into_iter()
        .collect(),
    };
    let vf: VolField<f64, Vector3<f64>> =
        VolField::from_config(&fv_mesh, "U", &config, &PatchFieldRegistry::with_defaults()).unwrap();
    assert_eq!(vf.internal_values(), &[Vector3::new(1.0, 0.0, 0.0); 4]);
    assert_eq!(vf.boundary_values(LEFT), &[Vector3::new(2.0, 1.0, 0.0)]);
}

#[test]
fn calculated_patches_have_no_matrix_coefficients() {
    let fv_mesh = line_fv_mesh();
    let mut vf = VolField::uniform(&fv_mesh, "T", Dimensions::TEMPERATURE, 1.0);
    let nu = Dimensioned::new("nu", Dimensions::DIFFUSIVITY, 1.0);
    let err = fvm::laplacian_uniform(&fv_mesh, &nu, &mut vf).unwrap_err();
    let patch_error = crate::find_error::<PatchError>(&err).expect("Must fail with a patch error");
    assert!(matches!(patch_error, PatchError::NotImplicit { type_name: "calculated", .. }));
}

#[test]
fn fixed_flux_pressure_needs_gradient_in_every_time_step() {
    let mut fv_mesh = line_fv_mesh();
    let mut p = read_field(
        &fv_mesh,
        &[
            ("left", PatchFieldConfig::new("fixedFluxPressure")),
            ("right", PatchFieldConfig::new("fixedValue").with_entry("value", json!(0.0))),
        ],
    )
    .unwrap();
    let rau = Dimensioned::new("rAU", Dimensions::TIME, 1.0);

    let err = fvm::laplacian_uniform(&fv_mesh, &rau, &mut p).unwrap_err();
    let patch_error = crate::find_error::<PatchError>(&err).expect("Must fail with a patch error");
    assert_eq!(
        patch_error,
        &PatchError::SequencingViolation {
            patch: "left".to_string(),
            type_name: "fixedFluxPressure",
            updated_time_index: None,
            time_index: 0
        }
    );

    p.patch_field_as_mut::<FixedFluxPressurePatchField<f64>>(LEFT)
        .expect("Left patch must be fixedFluxPressure")
        .update_sn_grad(&fv_mesh, vec![3.0])
        .unwrap();
    fvm::laplacian_uniform(&fv_mesh, &rau, &mut p).unwrap();
    p.correct_boundary_conditions(&fv_mesh).unwrap();
    assert_eq!(p.patch_field(LEFT).sn_grad(&fv_mesh, p.internal_values()), vec![3.0]);

    fv_mesh.time_mut().advance();
    let err = fvm::laplacian_uniform(&fv_mesh, &rau, &mut p).unwrap_err();
    let patch_error = crate::find_error::<PatchError>(&err).expect("Must fail with a patch error");
    assert!(matches!(
        patch_error,
        PatchError::SequencingViolation {
            updated_time_index: Some(0),
            time_index: 1,
            ..
        }
    ));
}

#[test]
fn inlet_outlet_follows_the_flux_direction() {
    let fv_mesh = line_fv_mesh();
    let inlet_outlet = |value: f64| PatchFieldConfig::new("inletOutlet").with_entry("inletValue", json!(value));
    let mut vf = read_field(&fv_mesh, &[("left", inlet_outlet(1.0)), ("right", inlet_outlet(5.0))]).unwrap();

    // Without a flux the condition cannot decide between inflow and outflow
    let err = vf.correct_boundary_conditions(&fv_mesh).unwrap_err();
    assert!(matches!(err, PatchError::MissingEntry { entry: "phi", .. }));

    let mesh = fv_mesh.mesh();
    let velocity = Vector3::new(1.0, 0.0, 0.0);
    let phi = SurfaceField::from_face_fn(mesh, "phi", Dimensions::VOLUMETRIC_FLUX, |face| {
        mesh.face_areas()[face].dot(&velocity)
    });
    vf.internal_values_mut().copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
    fvm::div(&fv_mesh, &phi, &mut vf).unwrap();
    vf.correct_boundary_conditions(&fv_mesh).unwrap();

    let left = vf
        .patch_field_as_mut::<InletOutletPatchField<f64, f64>>(LEFT)
        .expect("Left patch must be inletOutlet");
    assert_eq!(left.value_fraction(), &[1.0]);
    assert_eq!(vf.boundary_values(LEFT), &[1.0]);
    assert_eq!(vf.boundary_values(RIGHT), &[0.4]);
}

#[test]
fn patch_field_constructors_reject_mismatched_input() {
    let fv_mesh = line_fv_mesh();
    let mesh = fv_mesh.mesh();
    let internal = [0.1, 0.2, 0.3, 0.4];
    let front_and_back = mesh.find_patch("frontAndBack").unwrap();

    assert_eq!(
        FixedValuePatchField::<f64, f64>::new(mesh, LEFT, vec![1.0, 2.0]).unwrap_err(),
        PatchError::InvalidEntry {
            patch: "left".to_string(),
            entry: "value".to_string(),
            message: "expected 1 values, got 2".to_string(),
        }
    );
    assert!(matches!(
        FixedGradientPatchField::new(&fv_mesh, RIGHT, vec![], &internal).unwrap_err(),
        PatchError::InvalidEntry { entry, .. } if entry == "gradient"
    ));
    assert!(matches!(
        MixedPatchField::new(&fv_mesh, LEFT, vec![1.0], vec![0.0], vec![1.0, 1.0], &internal).unwrap_err(),
        PatchError::InvalidEntry { entry, .. } if entry == "valueFraction"
    ));
    assert!(matches!(
        InletOutletPatchField::new(&fv_mesh, LEFT, vec![1.0, 1.0], &internal).unwrap_err(),
        PatchError::InvalidEntry { entry, .. } if entry == "inletValue"
    ));

    assert_eq!(
        CyclicPatchField::<f64, f64>::new(mesh, LEFT, &internal).unwrap_err(),
        PatchError::ConstraintMismatch {
            patch: "left".to_string(),
            patch_kind: "patch",
            type_name: "cyclic".to_string(),
        }
    );
    assert_eq!(
        ProcessorPatchField::<f64, f64>::new(mesh, front_and_back, &internal).unwrap_err(),
        PatchError::ConstraintMismatch {
            patch: "frontAndBack".to_string(),
            patch_kind: "empty",
            type_name: "processor".to_string(),
        }
    );

    let mut pressure = FixedFluxPressurePatchField::new(&fv_mesh, LEFT, vec![0.0], &internal).unwrap();
    assert!(matches!(
        pressure.update_sn_grad(&fv_mesh, vec![1.0, 2.0]).unwrap_err(),
        PatchError::InvalidEntry { entry, .. } if entry == "gradient"
    ));
    // A rejected gradient does not count as an update
    assert_eq!(pressure.sn_grad_time_index(), None);
    assert_eq!(pressure.gradient(), &[0.0]);

    let boundary = (0..mesh.patches().len())
        .map(|patch| if patch == LEFT { vec![1.0, 2.0] } else { vec![0.0; mesh.patch(patch).size()] })
        .collect();
    let err = VolField::calculated(&fv_mesh, "T", Dimensions::DIMLESS, internal.to_vec(), boundary).unwrap_err();
    assert!(matches!(err, FieldError::Patch(PatchError::InvalidEntry { ref patch, .. }) if patch == "left"));
}

#[test]
fn processor_neighbour_values_must_match_the_patch() {
    let spec = BoxMeshSpec::new(Point3::origin(), Vector3::new(2.0, 1.0, 1.0), [2, 1, 1])
        .with_side(BoxSide::XMax, SidePatch::processor("procBoundary0to1", 1, 0));
    let mesh = create_box_mesh(&spec).unwrap();
    let patch = mesh.find_patch("procBoundary0to1").unwrap();

    let mut field = ProcessorPatchField::<f64, f64>::new(&mesh, patch, &[1.0, 2.0]).unwrap();
    assert_eq!(field.neighbour_values(), &[2.0]);
    assert_eq!(
        field.set_neighbour_values(vec![3.0, 4.0]).unwrap_err(),
        PatchError::Exchange(ExchangeError::BufferSizeMismatch {
            patch: "procBoundary0to1".to_string(),
            expected: 1,
            actual: 2,
        })
    );
    field.set_neighbour_values(vec![3.0]).unwrap();
    assert_eq!(field.neighbour_values(), &[3.0]);
}
