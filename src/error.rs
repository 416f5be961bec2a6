//! Error types.
//!
//! Each layer has its own error enum. Operators that combine several layers (`fvm`, `fvc`,
//! [`FvMatrix::solve`](crate::matrix::FvMatrix::solve)) return [`eyre::Result`] and attach
//! context naming the field and scheme key.
use crate::dimensions::Dimensions;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Violations of the mesh invariants detected when a mesh is constructed or modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    DegenerateFace {
        face: usize,
        num_vertices: usize,
    },
    VertexIndexOutOfBounds {
        face: usize,
        vertex: usize,
        num_points: usize,
    },
    /// Internal faces must be owned by the cell with the lower index.
    OwnerNotLowerThanNeighbour {
        face: usize,
        owner: usize,
        neighbour: usize,
    },
    CellWithoutFaces {
        cell: usize,
    },
    InvalidPatchLayout {
        patch: String,
        message: String,
    },
    InvalidCyclicPairing {
        patch: String,
        message: String,
    },
    DuplicatePatchName {
        name: String,
    },
}

impl Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { what, expected, actual } => {
                write!(f, "Size mismatch for {}: expected {}, got {}.", what, expected, actual)
            }
            Self::DegenerateFace { face, num_vertices } => {
                write!(f, "Face {} has {} vertices (at least 3 required).", face, num_vertices)
            }
            Self::VertexIndexOutOfBounds {
                face,
                vertex,
                num_points,
            } => write!(
                f,
                "Face {} references vertex {}, but the mesh only has {} points.",
                face, vertex, num_points
            ),
            Self::OwnerNotLowerThanNeighbour { face, owner, neighbour } => write!(
                f,
                "Internal face {} has owner {} and neighbour {} (owner must be lower).",
                face, owner, neighbour
            ),
            Self::CellWithoutFaces { cell } => write!(f, "Cell {} is not referenced by any face.", cell),
            Self::InvalidPatchLayout { patch, message } => {
                write!(f, "Invalid layout of patch `{}`: {}", patch, message)
            }
            Self::InvalidCyclicPairing { patch, message } => {
                write!(f, "Invalid cyclic pairing for patch `{}`: {}", patch, message)
            }
            Self::DuplicatePatchName { name } => write!(f, "Patch name `{}` is used more than once.", name),
        }
    }
}

impl Error for MeshError {}

/// Configuration errors raised while selecting or constructing schemes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemeError {
    /// No entry (and no `default`) for the requested key.
    MissingEntry { table: &'static str, key: String },
    UnknownScheme {
        family: &'static str,
        name: String,
        available: Vec<String>,
    },
    UnexpectedEnd { expected: &'static str },
    TrailingTokens { tokens: String },
    InvalidNumber { token: String },
    CoefficientOutOfRange {
        coefficient: &'static str,
        value: String,
        range: &'static str,
    },
    /// Convection schemes that depend on the flux direction were used without a flux.
    FluxRequired { scheme: &'static str },
    MissingLocalTimeStep { num_cells: usize, available: Option<usize> },
    /// Context added when a scheme entry fails to parse or evaluate.
    InEntry {
        key: String,
        scheme: String,
        source: Box<SchemeError>,
    },
}

impl SchemeError {
    pub(crate) fn in_entry(self, key: &str, scheme: &str) -> Self {
        Self::InEntry {
            key: key.to_string(),
            scheme: scheme.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with entry context removed.
    pub fn root_cause(&self) -> &SchemeError {
        match self {
            Self::InEntry { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl Display for SchemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntry { table, key } => {
                write!(f, "No entry for `{}` (and no default) in {}.", key, table)
            }
            Self::UnknownScheme {
                family,
                name,
                available,
            } => write!(
                f,
                "Unknown {} scheme `{}`. Valid schemes are: {}.",
                family,
                name,
                available.join(", ")
            ),
            Self::UnexpectedEnd { expected } => write!(f, "Unexpected end of scheme, expected {}.", expected),
            Self::TrailingTokens { tokens } => write!(f, "Unexpected trailing tokens `{}`.", tokens),
            Self::InvalidNumber { token } => write!(f, "Expected a number, found `{}`.", token),
            Self::CoefficientOutOfRange {
                coefficient,
                value,
                range,
            } => write!(f, "Coefficient {} = {} is outside of {}.", coefficient, value, range),
            Self::FluxRequired { scheme } => write!(f, "Scheme `{}` requires a face flux.", scheme),
            Self::MissingLocalTimeStep { num_cells, available } => match available {
                None => write!(f, "Local time stepping requested, but no reciprocal time step field is set."),
                Some(n) => write!(
                    f,
                    "Reciprocal local time step has {} entries, but the mesh has {} cells.",
                    n, num_cells
                ),
            },
            Self::InEntry { key, scheme, source } => {
                write!(f, "In entry `{}` (`{}`): {}", key, scheme, source)
            }
        }
    }
}

impl Error for SchemeError {}

/// Errors raised by exchanges between coupled domains.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeError {
    RankOutOfRange {
        rank: usize,
        num_ranks: usize,
    },
    /// No message arrived before the transport's timeout expired.
    Timeout {
        from: usize,
        to: usize,
        tag: usize,
    },
    BufferSizeMismatch {
        patch: String,
        expected: usize,
        actual: usize,
    },
    /// Paired processor faces do not coincide.
    GeometryMismatch {
        patch: String,
        face: usize,
        distance: String,
    },
    NoTransport {
        patch: String,
    },
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RankOutOfRange { rank, num_ranks } => {
                write!(f, "Rank {} is out of range (number of ranks: {}).", rank, num_ranks)
            }
            Self::Timeout { from, to, tag } => write!(
                f,
                "Timed out waiting for message from rank {} to rank {} (tag {}).",
                from, to, tag
            ),
            Self::BufferSizeMismatch {
                patch,
                expected,
                actual,
            } => write!(
                f,
                "Received buffer of length {} on patch `{}`, expected {}.",
                actual, patch, expected
            ),
            Self::GeometryMismatch { patch, face, distance } => write!(
                f,
                "Face {} of processor patch `{}` does not match its neighbour (distance {}).",
                face, patch, distance
            ),
            Self::NoTransport { patch } => {
                write!(f, "Processor patch `{}` requires a transport, but none is attached.", patch)
            }
        }
    }
}

impl Error for ExchangeError {}

/// Errors raised by boundary patch fields.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchError {
    UnknownType {
        patch: String,
        type_name: String,
    },
    MissingEntry {
        patch: String,
        entry: &'static str,
    },
    InvalidEntry {
        patch: String,
        entry: String,
        message: String,
    },
    /// Constraint patches (empty, symmetryPlane, cyclic, processor) require the matching field type.
    ConstraintMismatch {
        patch: String,
        patch_kind: &'static str,
        type_name: String,
    },
    /// The patch field does not provide implicit coefficients (e.g. `calculated`).
    NotImplicit {
        patch: String,
        type_name: &'static str,
    },
    /// A specialised update step was not performed for the current time index.
    SequencingViolation {
        patch: String,
        type_name: &'static str,
        updated_time_index: Option<usize>,
        time_index: usize,
    },
    Exchange(ExchangeError),
}

impl From<ExchangeError> for PatchError {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}

impl Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { patch, type_name } => {
                write!(f, "Unknown patch field type `{}` for patch `{}`.", type_name, patch)
            }
            Self::MissingEntry { patch, entry } => {
                write!(f, "Missing entry `{}` for patch `{}`.", entry, patch)
            }
            Self::InvalidEntry { patch, entry, message } => {
                write!(f, "Invalid entry `{}` for patch `{}`: {}", entry, patch, message)
            }
            Self::ConstraintMismatch {
                patch,
                patch_kind,
                type_name,
            } => write!(
                f,
                "Patch `{}` of kind `{}` cannot carry a patch field of type `{}`.",
                patch, patch_kind, type_name
            ),
            Self::NotImplicit { patch, type_name } => write!(
                f,
                "Patch field `{}` on patch `{}` does not provide matrix coefficients.",
                type_name, patch
            ),
            Self::SequencingViolation {
                patch,
                type_name,
                updated_time_index,
                time_index,
            } => match updated_time_index {
                Some(updated) => write!(
                    f,
                    "{} on patch `{}`: gradient was last set at time index {}, but the current time index is {}.",
                    type_name, patch, updated, time_index
                ),
                None => write!(
                    f,
                    "{} on patch `{}`: coefficients updated at time index {} before the gradient was set.",
                    type_name, patch, time_index
                ),
            },
            Self::Exchange(err) => write!(f, "Exchange failed: {}", err),
        }
    }
}

impl Error for PatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Exchange(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised when constructing fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    SizeMismatch {
        field: String,
        what: String,
        expected: usize,
        actual: usize,
    },
    InvalidValue {
        field: String,
        message: String,
    },
    Patch(PatchError),
}

impl From<PatchError> for FieldError {
    fn from(err: PatchError) -> Self {
        Self::Patch(err)
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch {
                field,
                what,
                expected,
                actual,
            } => write!(
                f,
                "Field `{}`: {} has size {}, expected {}.",
                field, what, actual, expected
            ),
            Self::InvalidValue { field, message } => write!(f, "Field `{}`: {}", field, message),
            Self::Patch(err) => write!(f, "{}", err),
        }
    }
}

impl Error for FieldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Patch(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised when combining or manipulating matrices.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixError {
    FieldMismatch {
        operation: &'static str,
        left: String,
        right: String,
    },
    DimensionMismatch {
        operation: &'static str,
        left: Dimensions,
        right: Dimensions,
    },
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidRelaxationFactor {
        alpha: String,
    },
}

impl Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldMismatch { operation, left, right } => write!(
                f,
                "Incompatible fields for operation {}: `{}` and `{}`.",
                operation, left, right
            ),
            Self::DimensionMismatch { operation, left, right } => write!(
                f,
                "Incompatible dimensions for operation {}: {} and {}.",
                operation, left, right
            ),
            Self::SizeMismatch { what, expected, actual } => {
                write!(f, "Size mismatch for {}: expected {}, got {}.", what, expected, actual)
            }
            Self::InvalidRelaxationFactor { alpha } => {
                write!(f, "Relaxation factor {} is not in (0, 1].", alpha)
            }
        }
    }
}

impl Error for MatrixError {}
