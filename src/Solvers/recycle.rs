//! Fixed-point solver for flowsheets with recycle loops.
//!
//! The flowsheet is solved sequential-modularly: a [`RecycleLoop`] takes the values of its tear
//! streams, runs every unit once in order and returns the recomputed tear streams. The solver
//! repeats this until the tear streams stop changing or the iteration budget runs out.
//!
//! Convergence follows the usual molar tolerances of process simulators: the loop is converged
//! when the largest absolute change over all tear flows is below `mol` **or** the largest
//! relative change over all tear flows is below `rmol`. Both maxima are taken over the whole
//! tear vector, not element by element.
//!
//! Three update rules are available:
//! - **FixedPoint**: direct substitution, x_next = g(x)
//! - **Wegstein**: bounded acceleration of the direct substitution, see [`WegsteinAccelerator`]
//! - **Aitken**: delta-squared extrapolation every second step, see [`AitkenAccelerator`]
//!
//! A loop whose tear flows overflow is treated as diverged and reported as a convergence
//! failure, like any other loop that runs out of iterations.
use crate::errors::{FlowsheetError, FlowsheetResult};
use log::{debug, info, warn};
use nalgebra::DVector;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

/// A flowsheet section closed by one or more tear streams.
pub trait RecycleLoop {
    /// Initial values of the tear variables.
    fn tear_guess(&self) -> DVector<f64>;
    /// Runs the units of the loop once for the given tear values and returns the recomputed
    /// tear values.
    fn evaluate(&mut self, tear: &DVector<f64>) -> FlowsheetResult<DVector<f64>>;
    /// Empties the recycles and forgets state remembered by the units, so that the next solve
    /// starts from scratch.
    fn restart(&mut self) -> FlowsheetResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverMethod {
    #[default]
    FixedPoint,
    Wegstein,
    Aitken,
}

/// Wegstein acceleration of fixed-point iterations.
///
/// For each tear variable the slope s = (g(x_k) - g(x_{k-1})) / (x_k - x_{k-1}) gives
/// q = s / (s - 1), bounded to [q_min, q_max], and x_next = q * x_k + (1 - q) * g(x_k).
/// The first step is direct substitution.
#[derive(Debug, Clone)]
pub struct WegsteinAccelerator {
    previous: Option<(DVector<f64>, DVector<f64>)>,
    q_min: f64,
    q_max: f64,
}

impl WegsteinAccelerator {
    pub fn new(q_min: f64, q_max: f64) -> Self {
        WegsteinAccelerator {
            previous: None,
            q_min,
            q_max,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(-5.0, 0.0)
    }

    pub fn accelerate(&mut self, x: &DVector<f64>, gx: &DVector<f64>) -> DVector<f64> {
        let next = match &self.previous {
            None => gx.clone(),
            Some((x_prev, gx_prev)) => DVector::from_fn(x.len(), |i, _| {
                let dx = x[i] - x_prev[i];
                let slope = if dx.abs() > 1e-14 {
                    (gx[i] - gx_prev[i]) / dx
                } else {
                    0.0
                };
                let q = if (slope - 1.0).abs() > 1e-14 {
                    slope / (slope - 1.0)
                } else {
                    0.0
                };
                let q = q.clamp(self.q_min, self.q_max);
                q * x[i] + (1.0 - q) * gx[i]
            }),
        };
        self.previous = Some((x.clone(), gx.clone()));
        next
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Aitken delta-squared acceleration (Steffensen's scheme with one evaluation per step).
///
/// Steps alternate: a direct substitution x1 = g(x0), then, with x2 = g(x1),
/// x_next = x2 - (x2 - x1)^2 / (x2 - 2 x1 + x0) per tear variable. A vanishing denominator
/// falls back to x2.
#[derive(Debug, Clone, Default)]
pub struct AitkenAccelerator {
    start: Option<DVector<f64>>,
}

impl AitkenAccelerator {
    pub fn accelerate(&mut self, x: &DVector<f64>, gx: &DVector<f64>) -> DVector<f64> {
        match self.start.take() {
            None => {
                self.start = Some(x.clone());
                gx.clone()
            }
            Some(x0) => DVector::from_fn(x.len(), |i, _| {
                let (x1, x2) = (x[i], gx[i]);
                let denominator = x2 - 2.0 * x1 + x0[i];
                if denominator.abs() > 1e-14 {
                    x2 - (x2 - x1).powi(2) / denominator
                } else {
                    x2
                }
            }),
        }
    }

    pub fn reset(&mut self) {
        self.start = None;
    }
}

/// Errors of one iteration.
#[derive(Debug, Clone)]
pub struct IterationInfo {
    pub iteration: usize,
    /// largest absolute change of a tear flow
    pub mol_error: f64,
    /// largest relative change of a tear flow
    pub rmol_error: f64,
}

#[derive(Debug, Clone)]
pub struct RecycleSolution {
    pub iterations: usize,
    /// converged tear values
    pub tear: DVector<f64>,
    pub history: Vec<IterationInfo>,
}

impl RecycleSolution {
    pub fn pretty_print_history(&self) {
        let mut table = Table::new();
        table.add_row(row!["iteration", "mol error", "rmol error"]);
        for info in &self.history {
            table.add_row(row![
                info.iteration,
                format!("{:.4e}", info.mol_error),
                format!("{:.4e}", info.rmol_error)
            ]);
        }
        table.printstd();
    }
}

#[derive(Debug, Clone)]
pub struct RecycleSolver {
    pub method: SolverMethod,
    pub maxiter: usize,
    /// absolute molar tolerance, kmol/hr
    pub mol: f64,
    /// relative molar tolerance
    pub rmol: f64,
    wegstein: WegsteinAccelerator,
    aitken: AitkenAccelerator,
}

impl Default for RecycleSolver {
    fn default() -> Self {
        RecycleSolver::new(SolverMethod::FixedPoint, 200, 1e-3, 1e-3)
    }
}

impl RecycleSolver {
    pub fn new(method: SolverMethod, maxiter: usize, mol: f64, rmol: f64) -> Self {
        RecycleSolver {
            method,
            maxiter,
            mol,
            rmol,
            wegstein: WegsteinAccelerator::with_defaults(),
            aitken: AitkenAccelerator::default(),
        }
    }

    /// Updates the tolerances; `None` keeps the current value.
    pub fn set_tolerance(
        &mut self,
        mol: Option<f64>,
        rmol: Option<f64>,
        maxiter: Option<usize>,
    ) -> FlowsheetResult<()> {
        for (name, value) in [("mol", mol), ("rmol", rmol)] {
            if let Some(v) = value {
                if !(v > 0.0) {
                    return Err(FlowsheetError::invalid(
                        name,
                        format!("tolerance must be positive, got {}", v),
                    ));
                }
            }
        }
        if maxiter == Some(0) {
            return Err(FlowsheetError::invalid("maxiter", "must be at least 1"));
        }
        self.mol = mol.unwrap_or(self.mol);
        self.rmol = rmol.unwrap_or(self.rmol);
        self.maxiter = maxiter.unwrap_or(self.maxiter);
        Ok(())
    }

    /// Iterates the loop until its tear streams converge.
    ///
    /// Returns [`FlowsheetError::ConvergenceFailure`] once `maxiter` evaluations were spent
    /// without meeting the tolerances, or as soon as a tear flow overflows (infinite residual).
    /// The loop keeps the state of its last evaluation.
    pub fn solve<L: RecycleLoop + ?Sized>(
        &mut self,
        recycle_loop: &mut L,
    ) -> FlowsheetResult<RecycleSolution> {
        self.wegstein.reset();
        self.aitken.reset();
        let mut x = recycle_loop.tear_guess();
        let mut history = Vec::new();

        for iteration in 1..=self.maxiter {
            let gx = match recycle_loop.evaluate(&x) {
                Ok(gx) if gx.iter().all(|v| v.is_finite()) => gx,
                Ok(_) | Err(FlowsheetError::NonFiniteFlow { .. }) => {
                    warn!(
                        "recycle loop diverged at iteration {}: tear flows overflowed",
                        iteration
                    );
                    return Err(FlowsheetError::ConvergenceFailure {
                        iterations: iteration,
                        residual: f64::INFINITY,
                    });
                }
                Err(e) => return Err(e),
            };
            let (mol_error, rmol_error) = tear_errors(&x, &gx);
            debug!(
                "recycle iteration {}: mol error {:.4e}, rmol error {:.4e}",
                iteration, mol_error, rmol_error
            );
            history.push(IterationInfo {
                iteration,
                mol_error,
                rmol_error,
            });

            if mol_error < self.mol || rmol_error < self.rmol {
                info!(
                    "recycle loop converged in {} iterations ({:?})",
                    iteration, self.method
                );
                return Ok(RecycleSolution {
                    iterations: iteration,
                    tear: gx,
                    history,
                });
            }

            x = match self.method {
                SolverMethod::FixedPoint => gx,
                SolverMethod::Wegstein => self.wegstein.accelerate(&x, &gx),
                SolverMethod::Aitken => self.aitken.accelerate(&x, &gx),
            };
            // tear variables are flows
            x.apply(|v| *v = v.max(0.0));
        }

        let residual = history.last().map(|h| h.mol_error).unwrap_or(f64::INFINITY);
        warn!(
            "recycle loop did not converge after {} iterations, mol error {:.4e}",
            self.maxiter, residual
        );
        Err(FlowsheetError::ConvergenceFailure {
            iterations: self.maxiter,
            residual,
        })
    }

    /// Solves with this solver's method and, while that fails, retries with each of `fallbacks`
    /// in order. The loop is restarted before every attempt. Returns the first solution, or the
    /// error of the last attempt.
    pub fn solve_with_fallback<L: RecycleLoop + ?Sized>(
        &self,
        recycle_loop: &mut L,
        fallbacks: &[SolverMethod],
    ) -> FlowsheetResult<RecycleSolution> {
        let mut result = self.attempt(recycle_loop, self.method);
        for &method in fallbacks {
            match &result {
                Ok(_) => break,
                Err(e) => warn!("{}; restarting the recycle loop with {:?}", e, method),
            }
            result = self.attempt(recycle_loop, method);
        }
        if let Err(e) = &result {
            warn!("every solver method failed, last error: {}", e);
        }
        result
    }

    fn attempt<L: RecycleLoop + ?Sized>(
        &self,
        recycle_loop: &mut L,
        method: SolverMethod,
    ) -> FlowsheetResult<RecycleSolution> {
        recycle_loop.restart()?;
        let mut solver = self.clone();
        solver.method = method;
        solver.solve(recycle_loop)
    }
}

fn tear_errors(x: &DVector<f64>, gx: &DVector<f64>) -> (f64, f64) {
    x.iter().zip(gx.iter()).fold((0.0_f64, 0.0_f64), |(mol, rmol), (a, b)| {
        let diff = (b - a).abs();
        let scale = b.abs().max(a.abs());
        let rel = if scale > 0.0 { diff / scale } else { 0.0 };
        (mol.max(diff), rmol.max(rel))
    })
}
