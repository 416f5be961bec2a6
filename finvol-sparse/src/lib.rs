//! Iterative solvers for the sparse systems produced by finite volume assembly.
//!
//! Symmetric systems (pure diffusion, time derivatives) are solved with preconditioned
//! Conjugate Gradient, asymmetric systems (anything containing convection) with BiCGStab.

pub mod bicgstab;
pub mod cg;
pub mod operator;

pub use bicgstab::BiCgStab;
pub use cg::ConjugateGradient;
pub use nalgebra_sparse::CsrMatrix;
pub use operator::{DiagonalPreconditioner, IdentityOperator, LinearOperator};

use std::error::Error;
use std::fmt;

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    /// BiCGStab breakdown: an inner product vanished.
    Breakdown,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite."),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner."),
            Self::Breakdown => write!(f, "Solver breakdown (vanishing inner product)."),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

/// Iteration counts and residual norms of a (possibly failed) solve.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutput<T> {
    /// Number of updates made to the solution vector.
    pub num_iterations: usize,
    /// Norm of the residual of the initial guess, `|b - A x0|`.
    pub initial_residual_norm: T,
    /// Norm of the (recursively updated) residual at exit.
    pub final_residual_norm: T,
}

impl<T> SolveOutput<T> {
    pub(crate) fn new(initial_residual_norm: T, final_residual_norm: T) -> Self {
        Self {
            num_iterations: 0,
            initial_residual_norm,
            final_residual_norm,
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError<T> {
    pub output: SolveOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> SolveError<T> {
    pub(crate) fn new(output: SolveOutput<T>, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl<T> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solve failed after {} iterations. Error: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl<T: fmt::Debug> Error for SolveError<T> {}

/// Convergence test shared by the solvers.
///
/// Converged when `|r| <= max(absolute, relative * |r0|)`. With `relative = 0` this is a
/// plain absolute tolerance, which is what outer loops usually want for consistency across
/// iterations.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResidualTolerance<T> {
    pub absolute: T,
    pub relative: T,
}

impl<T: finvol_traits::Real> ResidualTolerance<T> {
    pub fn new(absolute: T, relative: T) -> Self {
        Self { absolute, relative }
    }

    pub fn is_satisfied(&self, residual_norm: T, initial_residual_norm: T) -> bool {
        residual_norm <= self.absolute.max(self.relative * initial_residual_norm)
    }
}

impl Default for ResidualTolerance<f64> {
    fn default() -> Self {
        Self::new(1e-10, 0.0)
    }
}

impl Default for ResidualTolerance<f32> {
    fn default() -> Self {
        Self::new(1e-5, 0.0)
    }
}
