use crate::config::{PreconditionerKind, SolverConfig, SolverKind};
use crate::error::MatrixError;
use crate::field::{FieldValue, VolField};
use crate::fv_mesh::FvMesh;
use crate::matrix::FvMatrix;
use crate::mesh::PatchKind;
use crate::parallel::all_reduce_sum;
use crate::Real;
use eyre::{eyre, WrapErr};
use finvol_sparse::{
    BiCgStab, ConjugateGradient, DiagonalPreconditioner, IdentityOperator, LinearOperator, ResidualTolerance,
    SolveError, SolveErrorKind, SolveOutput,
};
use itertools::izip;
use log::{info, warn};
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use numeric_literals::replace_float_literals;

/// Convergence record of the solution of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverPerformance<T> {
    pub solver_name: &'static str,
    /// Name of the solved component, e.g. `Ux`.
    pub field_name: String,
    /// Normalised residual before the solve.
    pub initial_residual: T,
    /// Normalised residual after the solve.
    pub final_residual: T,
    pub num_iterations: usize,
    pub converged: bool,
}

/// Name of a component of a field: the field name for scalars, with the suffixes
/// `x, y, z` for vectors and `xx, xy, ..., zz` for tensors.
pub fn component_name(field_name: &str, component: usize, num_components: usize) -> String {
    const AXES: [char; 3] = ['x', 'y', 'z'];
    match num_components {
        1 => field_name.to_string(),
        3 => format!("{}{}", field_name, AXES[component]),
        9 => format!("{}{}{}", field_name, AXES[component / 3], AXES[component % 3]),
        _ => format!("{}{}", field_name, component),
    }
}

fn solver_name(config: &SolverConfig) -> &'static str {
    match config.solver {
        SolverKind::PCG => "PCG",
        SolverKind::PBiCGStab => "PBiCGStab",
    }
}

/// The scalar system of one component, with the patch contributions folded in.
struct ComponentSystem<T: Real> {
    matrix: CsrMatrix<T>,
    rhs: DVector<T>,
}

impl<T: Real, V: FieldValue<T>> FvMatrix<T, V> {
    /// Solves the matrix for `psi` with the solver configured for the field, then corrects
    /// the boundary conditions of `psi`.
    pub fn solve(&self, fv_mesh: &FvMesh<T>, psi: &mut VolField<T, V>) -> eyre::Result<Vec<SolverPerformance<T>>> {
        let config = fv_mesh
            .solution()
            .solver(psi.name())
            .ok_or_else(|| eyre!("No solver settings for field `{}` (and no default)", psi.name()))?
            .clone();
        self.solve_with(fv_mesh, psi, &config)
    }

    /// Solves every component of the field separately with the given solver settings.
    ///
    /// Coefficients across cyclic patches are part of the solved system. Contributions
    /// across processor patches use the neighbour values received before the solve.
    pub fn solve_with(
        &self,
        fv_mesh: &FvMesh<T>,
        psi: &mut VolField<T, V>,
        config: &SolverConfig,
    ) -> eyre::Result<Vec<SolverPerformance<T>>> {
        if psi.name() != self.field_name {
            return Err(MatrixError::FieldMismatch {
                operation: "solve",
                left: self.field_name.clone(),
                right: psi.name().to_string(),
            }
            .into());
        }
        if psi.internal_values().len() != self.diag.len() {
            return Err(MatrixError::SizeMismatch {
                what: "solved field",
                expected: self.diag.len(),
                actual: psi.internal_values().len(),
            }
            .into());
        }

        let neighbour_values = self.coupled_neighbour_values(fv_mesh, psi);
        let mut performances = Vec::with_capacity(V::NUM_COMPONENTS);
        for component in 0..V::NUM_COMPONENTS {
            let name = component_name(psi.name(), component, V::NUM_COMPONENTS);
            let system = self.component_system(fv_mesh, &neighbour_values, component);
            let mut x = DVector::from_iterator(
                psi.internal_values().len(),
                psi.internal_values().iter().map(|v| v.component(component)),
            );
            let performance = solve_component(fv_mesh, system, &mut x, config, name)?;
            for (value, &x) in psi.internal_values_mut().iter_mut().zip(x.iter()) {
                value.set_component(component, x);
            }
            performances.push(performance);
        }
        psi.correct_boundary_conditions(fv_mesh)
            .wrap_err_with(|| format!("Failed to correct boundary conditions of `{}` after solve", psi.name()))?;
        Ok(performances)
    }

    /// Values across processor patches, `None` for all other patches.
    fn coupled_neighbour_values(&self, fv_mesh: &FvMesh<T>, psi: &VolField<T, V>) -> Vec<Option<Vec<V>>> {
        let mesh = fv_mesh.mesh();
        (0..mesh.patches().len())
            .map(|patch| match mesh.patch(patch).kind() {
                PatchKind::Processor { .. } => psi.patch_neighbour_values(fv_mesh, patch),
                _ => None,
            })
            .collect()
    }

    fn component_system(
        &self,
        fv_mesh: &FvMesh<T>,
        neighbour_values: &[Option<Vec<V>>],
        component: usize,
    ) -> ComponentSystem<T> {
        let mesh = fv_mesh.mesh();
        let n = self.diag.len();
        let mut coo = CooMatrix::new(n, n);
        let mut rhs = DVector::from_iterator(n, self.source.iter().map(|s| s.component(component)));

        for (cell, d) in self.diag_with_boundary(mesh, component).into_iter().enumerate() {
            coo.push(cell, cell, d);
        }
        for (&own, &nei, &lower, &upper) in izip!(mesh.owner(), mesh.neighbour(), &self.lower, &self.upper) {
            coo.push(own, nei, upper);
            coo.push(nei, own, lower);
        }

        for (patch, boundary_coeffs) in self.boundary_coeffs.iter().enumerate() {
            let cells = mesh.patch_face_cells(patch);
            match mesh.patch(patch).kind() {
                PatchKind::Cyclic { neighbour_patch, .. } => {
                    let neighbour_cells = mesh.patch_face_cells(*neighbour_patch);
                    for (&cell, &neighbour_cell, bc) in izip!(cells, neighbour_cells, boundary_coeffs) {
                        coo.push(cell, neighbour_cell, -bc.component(component));
                    }
                }
                PatchKind::Processor { .. } => {
                    if let Some(values) = &neighbour_values[patch] {
                        for (&cell, bc, value) in izip!(cells, boundary_coeffs, values) {
                            rhs[cell] += bc.component(component) * value.component(component);
                        }
                    }
                }
                _ => {
                    for (&cell, bc) in cells.iter().zip(boundary_coeffs) {
                        rhs[cell] += bc.component(component);
                    }
                }
            }
        }

        ComponentSystem {
            matrix: CsrMatrix::from(&coo),
            rhs,
        }
    }
}

fn apply<T: Real>(matrix: &CsrMatrix<T>, x: &DVector<T>) -> DVector<T> {
    let mut y = DVector::zeros(x.len());
    matrix
        .apply((&mut y).into(), x.into())
        .expect("Internal error: CSR multiplication does not fail");
    y
}

/// Sum of the magnitudes of the entries of `values`.
fn sum_mag<T: Real>(values: &DVector<T>) -> T {
    values.iter().fold(T::zero(), |sum, v| sum + v.abs())
}

/// The normalisation factor of the residual,
/// `Σ |A x - A x̄| + |b - A x̄|` with `x̄` the global average of `x`.
///
/// The residual normalised by this factor is independent of the scale of the solution.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn norm_factor<T: Real>(fv_mesh: &FvMesh<T>, system: &ComponentSystem<T>, x: &DVector<T>, ax: &DVector<T>) -> eyre::Result<T> {
    let mut sums = [x.sum(), T::from_usize(x.len()).unwrap_or_else(T::zero)];
    all_reduce_sum(fv_mesh.transport(), &mut sums)?;
    let average = if sums[1] > 0.0 { sums[0] / sums[1] } else { 0.0 };
    let a_average = apply(&system.matrix, &DVector::repeat(x.len(), average));
    let mut factor = [izip!(ax.iter(), system.rhs.iter(), a_average.iter())
        .fold(T::zero(), |sum, (&ax, &b, &axr)| sum + (ax - axr).abs() + (b - axr).abs())];
    all_reduce_sum(fv_mesh.transport(), &mut factor)?;
    Ok(factor[0] + 1e-20)
}

fn normalised_residual<T: Real>(fv_mesh: &FvMesh<T>, system: &ComponentSystem<T>, x: &DVector<T>, factor: T) -> eyre::Result<T> {
    let residual = &system.rhs - apply(&system.matrix, x);
    let mut sum = [sum_mag(&residual)];
    all_reduce_sum(fv_mesh.transport(), &mut sum)?;
    Ok(sum[0] / factor)
}

fn run_solver<T: Real, P: LinearOperator<T>>(
    config: &SolverConfig,
    matrix: &CsrMatrix<T>,
    preconditioner: P,
    rhs: &DVector<T>,
    x: &mut DVector<T>,
    tolerance: ResidualTolerance<T>,
) -> Result<SolveOutput<T>, SolveError<T>> {
    match config.solver {
        SolverKind::PCG => ConjugateGradient::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_tolerance(tolerance)
            .with_max_iter(config.max_iter)
            .solve_with_guess(rhs, x),
        SolverKind::PBiCGStab => BiCgStab::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_tolerance(tolerance)
            .with_max_iter(config.max_iter)
            .solve_with_guess(rhs, x),
    }
}

fn solve_component<T: Real>(
    fv_mesh: &FvMesh<T>,
    mut system: ComponentSystem<T>,
    x: &mut DVector<T>,
    config: &SolverConfig,
    name: String,
) -> eyre::Result<SolverPerformance<T>> {
    let solver_name = solver_name(config);
    let n = x.len();

    // The Krylov solvers expect a positive diagonal (e.g. a bare Laplacian is negative definite)
    let diag_sum = system.matrix.diagonal_as_csr().values().iter().fold(T::zero(), |s, &d| s + d);
    if diag_sum < T::zero() {
        system.matrix.values_mut().iter_mut().for_each(|v| *v = -*v);
        system.rhs.neg_mut();
    }

    let tolerance = T::from_f64(config.tolerance).ok_or_else(|| eyre!("Invalid tolerance {}", config.tolerance))?;
    let rel_tol = T::from_f64(config.rel_tol).ok_or_else(|| eyre!("Invalid relative tolerance {}", config.rel_tol))?;

    let ax = apply(&system.matrix, x);
    let factor = norm_factor(fv_mesh, &system, x, &ax)?;
    let initial_residual = normalised_residual(fv_mesh, &system, x, factor)?;

    let mut performance = SolverPerformance {
        solver_name,
        field_name: name,
        initial_residual,
        final_residual: initial_residual,
        num_iterations: 0,
        converged: true,
    };

    if n > 0 && initial_residual > tolerance {
        // L2 norm bound equivalent to the normalised L1 tolerance for a uniform residual
        let sqrt_n = T::from_usize(n).unwrap_or_else(T::one).sqrt();
        let residual_tolerance = ResidualTolerance::new(tolerance * factor / sqrt_n, rel_tol);
        let result = match config.preconditioner {
            PreconditionerKind::Diagonal => {
                let preconditioner = DiagonalPreconditioner::from_csr(&system.matrix);
                run_solver(config, &system.matrix, preconditioner, &system.rhs, x, residual_tolerance)
            }
            PreconditionerKind::None => run_solver(
                config,
                &system.matrix,
                IdentityOperator,
                &system.rhs,
                x,
                residual_tolerance,
            ),
        };
        match result {
            Ok(output) => performance.num_iterations = output.num_iterations,
            Err(err) if matches!(err.kind, SolveErrorKind::MaxIterationsReached { .. }) => {
                warn!(
                    "{}: {} did not converge in {} iterations",
                    solver_name, performance.field_name, config.max_iter
                );
                performance.num_iterations = err.output.num_iterations;
                performance.converged = false;
            }
            Err(err) => {
                return Err(eyre!("{} failed for {}: {}", solver_name, performance.field_name, err));
            }
        }
        performance.final_residual = normalised_residual(fv_mesh, &system, x, factor)?;
    }

    info!(
        "{}:  Solving for {}, Initial residual = {}, Final residual = {}, No Iterations {}",
        solver_name, performance.field_name, performance.initial_residual, performance.final_residual, performance.num_iterations
    );
    Ok(performance)
}
