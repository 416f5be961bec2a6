//! Serializable configuration: scheme selection, solver settings and boundary conditions.
//!
//! The structures mirror the `fvSchemes`, `fvSolution` and field dictionaries of a case,
//! and are typically loaded from JSON with [`from_json_str`] or [`from_json_file`].
use crate::dimensions::Dimensions;
use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Scheme strings keyed by term, e.g. `"grad(T)" -> "Gauss linear"`.
///
/// The key `default` is used for terms without their own entry. A `default` of `"none"`
/// is treated as absent.
pub type SchemeTable = BTreeMap<String, String>;

pub(crate) fn lookup_scheme<'a>(table: &'a SchemeTable, key: &str) -> Option<&'a str> {
    table
        .get(key)
        .or_else(|| table.get("default"))
        .map(String::as_str)
        .filter(|scheme| *scheme != "none")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemesConfig {
    pub ddt_schemes: SchemeTable,
    pub grad_schemes: SchemeTable,
    pub div_schemes: SchemeTable,
    pub laplacian_schemes: SchemeTable,
    pub interpolation_schemes: SchemeTable,
    pub sn_grad_schemes: SchemeTable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Preconditioned conjugate gradient, symmetric matrices only.
    PCG,
    /// Preconditioned stabilized bi-conjugate gradient.
    PBiCGStab,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionerKind {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "diagonal")]
    Diagonal,
}

impl Default for PreconditionerKind {
    fn default() -> Self {
        Self::Diagonal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfig {
    pub solver: SolverKind,
    #[serde(default)]
    pub preconditioner: PreconditionerKind,
    /// Absolute tolerance on the normalised residual.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Tolerance relative to the initial residual. Zero disables the relative criterion.
    #[serde(default)]
    pub rel_tol: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_iter() -> usize {
    1000
}

impl SolverConfig {
    pub fn new(solver: SolverKind, tolerance: f64, rel_tol: f64) -> Self {
        Self {
            solver,
            preconditioner: PreconditionerKind::Diagonal,
            tolerance,
            rel_tol,
            max_iter: default_max_iter(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationFactors {
    /// Explicit under-relaxation of field values.
    pub fields: BTreeMap<String, f64>,
    /// Implicit under-relaxation of matrices, keyed by the name of the solved field.
    pub equations: BTreeMap<String, f64>,
}

/// Solution controls (the `fvSolution` dictionary).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolutionConfig {
    pub solvers: BTreeMap<String, SolverConfig>,
    pub relaxation_factors: RelaxationFactors,
}

impl SolutionConfig {
    /// Solver settings for the named field, falling back to the `default` entry.
    pub fn solver(&self, field: &str) -> Option<&SolverConfig> {
        self.solvers.get(field).or_else(|| self.solvers.get("default"))
    }

    pub fn field_relaxation_factor(&self, field: &str) -> Option<f64> {
        let factors = &self.relaxation_factors.fields;
        factors.get(field).or_else(|| factors.get("default")).copied()
    }

    pub fn equation_relaxation_factor(&self, field: &str) -> Option<f64> {
        let factors = &self.relaxation_factors.equations;
        factors.get(field).or_else(|| factors.get("default")).copied()
    }
}

/// Boundary condition of one patch: a type name plus type-specific entries.
///
/// Values are given either uniformly, as a number (scalars) or an array of components,
/// or per face as `{"nonuniform": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchFieldConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub entries: BTreeMap<String, Value>,
}

impl PatchFieldConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    pub fn entry(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }
}

/// Initial and boundary conditions of a volume field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub dimensions: Dimensions,
    pub internal_field: Value,
    pub boundary_field: BTreeMap<String, PatchFieldConfig>,
}

pub fn from_json_str<C: DeserializeOwned>(json: &str) -> eyre::Result<C> {
    serde_json::from_str(json).wrap_err("Failed to parse configuration")
}

pub fn from_json_file<C: DeserializeOwned>(path: impl AsRef<Path>) -> eyre::Result<C> {
    let path = path.as_ref();
    let contents =
        std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read configuration file {}", path.display()))?;
    from_json_str(&contents).wrap_err_with(|| format!("Invalid configuration in {}", path.display()))
}
