//! Finite volume matrices.
//!
//! An [`FvMatrix`] represents the linear system `A ψ = b` of one field `ψ`, assembled by the
//! implicit operators in [`fvm`](crate::fvm). The matrix is stored in face-addressed form:
//!
//! - `diag[c]`: the diagonal coefficient of cell `c`,
//! - `upper[f]`: the coefficient of the neighbour of internal face `f` in the row of its owner,
//! - `lower[f]`: the coefficient of the owner in the row of the neighbour,
//! - `source[c]`: the right-hand side,
//!
//! plus, for every patch, the *internal coefficients* (added to the diagonal of the face
//! cells, per component) and *boundary coefficients* (added to the source of non-coupled
//! patches, or multiplying the values across coupled patches). Matrices of the same field
//! are combined with `+` and `-`; explicit contributions are added with
//! [`add_explicit`](FvMatrix::add_explicit) and [`equate`](FvMatrix::equate).
use crate::dimensions::Dimensions;
use crate::error::MatrixError;
use crate::field::{FieldValue, SurfaceField, VolField};
use crate::fv_mesh::FvMesh;
use crate::mesh::Mesh;
use crate::Real;
use itertools::izip;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

mod relax;
mod residual;
mod solve;

pub use solve::{component_name, SolverPerformance};

#[derive(Debug, Clone, PartialEq)]
pub struct FvMatrix<T: Real, V: FieldValue<T>> {
    field_name: String,
    dimensions: Dimensions,
    diag: Vec<T>,
    lower: Vec<T>,
    upper: Vec<T>,
    source: Vec<V>,
    internal_coeffs: Vec<Vec<V>>,
    boundary_coeffs: Vec<Vec<V>>,
    face_flux_correction: Option<SurfaceField<T, V>>,
}

impl<T: Real, V: FieldValue<T>> FvMatrix<T, V> {
    /// An empty matrix for the named field. `dimensions` are those of the integrated
    /// equation, e.g. `[vf] m^3/s` for a transport equation.
    pub fn new(mesh: &Mesh<T>, field_name: impl Into<String>, dimensions: Dimensions) -> Self {
        let patch_zeros = || {
            mesh.patches()
                .iter()
                .map(|patch| vec![V::zero(); patch.size()])
                .collect()
        };
        Self {
            field_name: field_name.into(),
            dimensions,
            diag: vec![T::zero(); mesh.num_cells()],
            lower: vec![T::zero(); mesh.num_internal_faces()],
            upper: vec![T::zero(); mesh.num_internal_faces()],
            source: vec![V::zero(); mesh.num_cells()],
            internal_coeffs: patch_zeros(),
            boundary_coeffs: patch_zeros(),
            face_flux_correction: None,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn num_cells(&self) -> usize {
        self.diag.len()
    }

    pub fn diag(&self) -> &[T] {
        &self.diag
    }

    pub fn diag_mut(&mut self) -> &mut [T] {
        &mut self.diag
    }

    pub fn lower(&self) -> &[T] {
        &self.lower
    }

    pub fn lower_mut(&mut self) -> &mut [T] {
        &mut self.lower
    }

    pub fn upper(&self) -> &[T] {
        &self.upper
    }

    pub fn upper_mut(&mut self) -> &mut [T] {
        &mut self.upper
    }

    pub fn source(&self) -> &[V] {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut [V] {
        &mut self.source
    }

    pub fn internal_coeffs(&self, patch: usize) -> &[V] {
        &self.internal_coeffs[patch]
    }

    pub fn internal_coeffs_mut(&mut self, patch: usize) -> &mut [V] {
        &mut self.internal_coeffs[patch]
    }

    pub fn boundary_coeffs(&self, patch: usize) -> &[V] {
        &self.boundary_coeffs[patch]
    }

    pub fn boundary_coeffs_mut(&mut self, patch: usize) -> &mut [V] {
        &mut self.boundary_coeffs[patch]
    }

    /// Explicit face fluxes (e.g. a non-orthogonal correction) that are part of the
    /// discretisation but not of the coefficients.
    pub fn face_flux_correction(&self) -> Option<&SurfaceField<T, V>> {
        self.face_flux_correction.as_ref()
    }

    pub fn set_face_flux_correction(&mut self, correction: SurfaceField<T, V>) {
        self.face_flux_correction = Some(correction);
    }

    pub fn is_symmetric(&self) -> bool {
        self.lower == self.upper
    }

    /// Sets the diagonal to minus the sum of the off-diagonal coefficients of each column.
    pub fn neg_sum_diag(&mut self, mesh: &Mesh<T>) {
        for (&own, &nei, &lower, &upper) in izip!(mesh.owner(), mesh.neighbour(), &self.lower, &self.upper) {
            self.diag[own] -= lower;
            self.diag[nei] -= upper;
        }
    }

    /// Sum of the magnitudes of the off-diagonal coefficients of each row.
    pub fn sum_mag_off_diag(&self, mesh: &Mesh<T>) -> Vec<T> {
        let mut sum = vec![T::zero(); self.diag.len()];
        for (&own, &nei, &lower, &upper) in izip!(mesh.owner(), mesh.neighbour(), &self.lower, &self.upper) {
            sum[own] += upper.abs();
            sum[nei] += lower.abs();
        }
        sum
    }

    /// Adds an explicit source term to the equation, `A + su`.
    ///
    /// `su` holds values per unit volume.
    pub fn add_explicit(&mut self, fv_mesh: &FvMesh<T>, su: &[V]) {
        assert_eq!(su.len(), self.source.len(), "Explicit source must have one value per cell");
        for (source, &su, &volume) in izip!(&mut self.source, su, fv_mesh.mesh().cell_volumes()) {
            *source -= su * volume;
        }
    }

    /// Sets the equation equal to an explicit field, `A == su`.
    pub fn equate(&mut self, fv_mesh: &FvMesh<T>, su: &[V]) {
        assert_eq!(su.len(), self.source.len(), "Explicit source must have one value per cell");
        for (source, &su, &volume) in izip!(&mut self.source, su, fv_mesh.mesh().cell_volumes()) {
            *source += su * volume;
        }
    }

    fn check_source_dimensions(&self, operation: &'static str, su: &VolField<T, V>) -> Result<(), MatrixError> {
        let integrated = su.dimensions() * Dimensions::VOLUME;
        if integrated != self.dimensions {
            return Err(MatrixError::DimensionMismatch {
                operation,
                left: self.dimensions,
                right: integrated,
            });
        }
        Ok(())
    }

    /// [`add_explicit`](Self::add_explicit) with a field whose dimensions are checked.
    pub fn add_field(&mut self, fv_mesh: &FvMesh<T>, su: &VolField<T, V>) -> Result<(), MatrixError> {
        self.check_source_dimensions("+", su)?;
        self.add_explicit(fv_mesh, su.internal_values());
        Ok(())
    }

    /// [`equate`](Self::equate) with a field whose dimensions are checked.
    pub fn equate_field(&mut self, fv_mesh: &FvMesh<T>, su: &VolField<T, V>) -> Result<(), MatrixError> {
        self.check_source_dimensions("==", su)?;
        self.equate(fv_mesh, su.internal_values());
        Ok(())
    }

    fn check_compatible(&self, operation: &'static str, other: &Self) -> Result<(), MatrixError> {
        if self.field_name != other.field_name {
            return Err(MatrixError::FieldMismatch {
                operation,
                left: self.field_name.clone(),
                right: other.field_name.clone(),
            });
        }
        if self.dimensions != other.dimensions {
            return Err(MatrixError::DimensionMismatch {
                operation,
                left: self.dimensions,
                right: other.dimensions,
            });
        }
        let sizes = [
            ("cells", self.diag.len(), other.diag.len()),
            ("internal faces", self.lower.len(), other.lower.len()),
            ("patches", self.internal_coeffs.len(), other.internal_coeffs.len()),
        ];
        for (what, expected, actual) in sizes {
            if expected != actual {
                return Err(MatrixError::SizeMismatch { what, expected, actual });
            }
        }
        Ok(())
    }

    /// Adds the coefficients of another matrix of the same field.
    pub fn checked_add(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.check_compatible("+", other)?;
        add_slices(&mut self.diag, &other.diag);
        add_slices(&mut self.lower, &other.lower);
        add_slices(&mut self.upper, &other.upper);
        add_slices(&mut self.source, &other.source);
        for (mine, theirs) in self.internal_coeffs.iter_mut().zip(&other.internal_coeffs) {
            add_slices(mine, theirs);
        }
        for (mine, theirs) in self.boundary_coeffs.iter_mut().zip(&other.boundary_coeffs) {
            add_slices(mine, theirs);
        }
        match (&mut self.face_flux_correction, &other.face_flux_correction) {
            (Some(mine), Some(theirs)) => mine.add_field(theirs),
            (None, Some(theirs)) => self.face_flux_correction = Some(theirs.clone()),
            _ => {}
        }
        Ok(())
    }

    pub fn checked_sub(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.check_compatible("-", other)?;
        let mut negated = other.clone();
        negated.negate();
        self.checked_add(&negated)
    }

    pub fn negate(&mut self) {
        self.scale(-T::one());
    }

    /// Multiplies every coefficient and the source by `factor`.
    pub fn scale(&mut self, factor: T) {
        for value in self.diag.iter_mut().chain(&mut self.lower).chain(&mut self.upper) {
            *value *= factor;
        }
        let vector_coeffs = self
            .source
            .iter_mut()
            .chain(self.internal_coeffs.iter_mut().flatten())
            .chain(self.boundary_coeffs.iter_mut().flatten());
        for value in vector_coeffs {
            *value *= factor;
        }
        if let Some(correction) = &mut self.face_flux_correction {
            correction.scale(factor);
        }
    }
}

fn add_slices<U: Copy + AddAssign>(target: &mut [U], other: &[U]) {
    for (t, &o) in target.iter_mut().zip(other) {
        *t += o;
    }
}

impl<T: Real, V: FieldValue<T>> AddAssign<&FvMatrix<T, V>> for FvMatrix<T, V> {
    fn add_assign(&mut self, rhs: &FvMatrix<T, V>) {
        if let Err(err) = self.checked_add(rhs) {
            panic!("{}", err);
        }
    }
}

impl<T: Real, V: FieldValue<T>> AddAssign for FvMatrix<T, V> {
    fn add_assign(&mut self, rhs: FvMatrix<T, V>) {
        *self += &rhs;
    }
}

impl<T: Real, V: FieldValue<T>> SubAssign<&FvMatrix<T, V>> for FvMatrix<T, V> {
    fn sub_assign(&mut self, rhs: &FvMatrix<T, V>) {
        if let Err(err) = self.checked_sub(rhs) {
            panic!("{}", err);
        }
    }
}

impl<T: Real, V: FieldValue<T>> SubAssign for FvMatrix<T, V> {
    fn sub_assign(&mut self, rhs: FvMatrix<T, V>) {
        *self -= &rhs;
    }
}

impl<T: Real, V: FieldValue<T>> Add for FvMatrix<T, V> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

impl<T: Real, V: FieldValue<T>> Sub for FvMatrix<T, V> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= &rhs;
        self
    }
}

impl<T: Real, V: FieldValue<T>> Neg for FvMatrix<T, V> {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.negate();
        self
    }
}

impl<T: Real, V: FieldValue<T>> Mul<T> for FvMatrix<T, V> {
    type Output = Self;

    fn mul(mut self, rhs: T) -> Self {
        self.scale(rhs);
        self
    }
}
