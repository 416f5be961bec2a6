use crate::operator::{apply_operator, IdentityOperator, LinearOperator};
use crate::{ResidualTolerance, SolveError, SolveErrorKind, SolveOutput};
use finvol_traits::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Scalar};
use num::Zero;

#[derive(Debug, Clone)]
struct BiCgStabWorkspace<T: Scalar> {
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    p_hat: DVector<T>,
    v: DVector<T>,
    s: DVector<T>,
    s_hat: DVector<T>,
    t: DVector<T>,
}

impl<T: Scalar + Zero> BiCgStabWorkspace<T> {
    fn new(dim: usize) -> Self {
        Self {
            r: DVector::zeros(dim),
            r_hat: DVector::zeros(dim),
            p: DVector::zeros(dim),
            p_hat: DVector::zeros(dim),
            v: DVector::zeros(dim),
            s: DVector::zeros(dim),
            s_hat: DVector::zeros(dim),
            t: DVector::zeros(dim),
        }
    }
}

/// Right-preconditioned stabilized bi-conjugate gradient method for general square operators.
#[derive(Debug)]
pub struct BiCgStab<T, A, P>
where
    T: Scalar,
{
    operator: A,
    preconditioner: P,
    tolerance: Option<ResidualTolerance<T>>,
    max_iter: Option<usize>,
}

impl<T: Scalar> BiCgStab<T, (), IdentityOperator> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            tolerance: None,
            max_iter: None,
        }
    }
}

impl<T: Scalar, P> BiCgStab<T, (), P> {
    pub fn with_operator<A>(self, operator: A) -> BiCgStab<T, A, P> {
        BiCgStab {
            operator,
            preconditioner: self.preconditioner,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }
}

impl<T: Scalar, A, P> BiCgStab<T, A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiCgStab<T, A, P2> {
        BiCgStab {
            operator: self.operator,
            preconditioner,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }

    pub fn with_tolerance(self, tolerance: ResidualTolerance<T>) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<T, A, P> BiCgStab<T, A, P>
where
    T: Real,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    pub fn solve_with_guess<'b>(
        &self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<SolveOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<SolveOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let tolerance = self
            .tolerance
            .unwrap_or_else(|| ResidualTolerance::new(T::default_epsilon(), T::zero()));
        let BiCgStabWorkspace {
            mut r,
            mut r_hat,
            mut p,
            mut p_hat,
            mut v,
            mut s,
            mut s_hat,
            mut t,
        } = BiCgStabWorkspace::new(x.len());
        let mut output = SolveOutput::new(T::zero(), T::zero());

        // r = b - Ax
        if let Err(err) = apply_operator(&mut r, &self.operator, &x) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);

        let r0_norm = r.norm();
        output.initial_residual_norm = r0_norm;
        output.final_residual_norm = r0_norm;
        if tolerance.is_satisfied(r0_norm, r0_norm) {
            return Ok(output);
        }

        r_hat.copy_from(&r);
        let mut rho = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();

        loop {
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            let rho_next = r_hat.dot(&r);
            if rho_next == T::zero() || omega == T::zero() {
                return Err(SolveError::new(output, Breakdown));
            }
            let beta = (rho_next / rho) * (alpha / omega);

            // p <- r + beta * (p - omega * v)
            p.zip_zip_apply(&r, &v, |p_i, r_i, v_i| *p_i = r_i + beta * (*p_i - omega * v_i));

            if let Err(err) = apply_operator(&mut p_hat, &self.preconditioner, &p) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut v, &self.operator, &p_hat) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let r_hat_v = r_hat.dot(&v);
            if r_hat_v == T::zero() {
                return Err(SolveError::new(output, Breakdown));
            }
            alpha = rho_next / r_hat_v;

            // s <- r - alpha * v
            s.copy_from(&r);
            s.axpy(-alpha, &v, T::one());

            let s_norm = s.norm();
            if tolerance.is_satisfied(s_norm, r0_norm) {
                x.axpy(alpha, &p_hat, T::one());
                output.num_iterations += 1;
                output.final_residual_norm = s_norm;
                break;
            }

            if let Err(err) = apply_operator(&mut s_hat, &self.preconditioner, &s) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut t, &self.operator, &s_hat) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let t_t = t.dot(&t);
            omega = if t_t > T::zero() { t.dot(&s) / t_t } else { T::zero() };

            // x <- x + alpha * p_hat + omega * s_hat
            x.axpy(alpha, &p_hat, T::one());
            x.axpy(omega, &s_hat, T::one());

            // r <- s - omega * t
            r.copy_from(&s);
            r.axpy(-omega, &t, T::one());

            output.num_iterations += 1;
            output.final_residual_norm = r.norm();
            if tolerance.is_satisfied(output.final_residual_norm, r0_norm) {
                break;
            }

            rho = rho_next;
        }

        Ok(output)
    }
}
