use RustedSciThe::numerical::ODE_api2::{SolverParam, SolverType, UniversalODESolver};
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Terminal outcome kinds of one integration attempt. Recorded on the owning
/// reactor model; recoverable only by reset() with adjusted configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverFailure {
    #[error("integration did not converge: {0}")]
    NonConvergence(String),
    #[error("integration stalled at t = {reached} before reaching t = {target} (excessive step reduction)")]
    ExcessiveStepReduction { reached: f64, target: f64 },
    #[error("wall-clock budget exceeded: {elapsed_secs:.3} s spent, {budget_secs:.3} s allowed")]
    Timeout { elapsed_secs: f64, budget_secs: f64 },
}

/// A failed integration attempt: the failure kind plus whatever prefix of the
/// trajectory the integrator did accept before giving up
#[derive(Debug, Clone)]
pub struct IntegrationFailure {
    pub kind: SolverFailure,
    pub partial: Option<Trajectory>,
}

/// Accepted steps of one integration: rows = steps, columns = packed unknowns
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub t: DVector<f64>,
    pub y: DMatrix<f64>,
}

impl Trajectory {
    pub fn n_steps(&self) -> usize {
        self.t.len()
    }
}

/// Numerical settings forwarded to the external integrator
#[derive(Clone)]
pub struct SolverSettings {
    pub solver: SolverType,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_step: f64,
    pub step_size: f64,
    pub max_iterations: usize,
    pub first_step: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            solver: SolverType::BDF,
            rel_tol: 1e-6,
            abs_tol: 1e-8,
            max_step: 0.1,
            step_size: 1e-3,
            max_iterations: 100000,
            first_step: None,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.rel_tol <= 0.0 || !self.rel_tol.is_finite() {
            return Err(format!("rel_tol must be positive, got {}", self.rel_tol));
        }
        if self.abs_tol <= 0.0 || !self.abs_tol.is_finite() {
            return Err(format!("abs_tol must be positive, got {}", self.abs_tol));
        }
        if self.max_step <= 0.0 {
            return Err(format!("max_step must be positive, got {}", self.max_step));
        }
        if self.step_size <= 0.0 {
            return Err(format!("step_size must be positive, got {}", self.step_size));
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be positive".to_string());
        }
        Ok(())
    }

    /// Full parameter map in the form the external integrator expects
    fn to_param_map(&self) -> HashMap<String, SolverParam> {
        HashMap::from([
            ("step_size".to_owned(), SolverParam::Float(self.step_size)),
            ("tolerance".to_owned(), SolverParam::Float(self.rel_tol)),
            (
                "max_iterations".to_owned(),
                SolverParam::Int(self.max_iterations as _),
            ),
            ("rtol".to_owned(), SolverParam::Float(self.rel_tol)),
            ("atol".to_owned(), SolverParam::Float(self.abs_tol)),
            ("max_step".to_owned(), SolverParam::Float(self.max_step)),
            (
                "first_step".to_owned(),
                SolverParam::OptionalFloat(self.first_step),
            ),
            ("vectorized".to_owned(), SolverParam::Bool(false)),
            ("jac_sparsity".to_owned(), SolverParam::OptionalMatrix(None)),
            ("parallel".to_owned(), SolverParam::Bool(false)),
        ])
    }
}

/// Symbolic balance system in the external integrator's vocabulary: equation
/// expressions, unknown names matching the state packing, initial state
#[derive(Clone)]
pub struct AssembledSystem {
    pub eq_system: Vec<Expr>,
    pub unknowns: Vec<String>,
    pub y0: DVector<f64>,
}

/// Thin translation layer between the balance callables and the external
/// integrator's invocation contract. No numerical method lives here: the
/// adapter builds the solver, forwards settings, runs the blocking solve and
/// translates the outcome into a trajectory or a typed failure.
pub struct SolverAdapter {
    pub settings: SolverSettings,
}

impl SolverAdapter {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Integrate the assembled system over `span`. Blocking; an optional
    /// wall-clock budget is checked around the call (the integrator itself
    /// exposes no cancellation primitive).
    pub fn integrate(
        &self,
        system: &AssembledSystem,
        span: (f64, f64),
        wall_clock_budget: Option<Duration>,
    ) -> Result<Trajectory, IntegrationFailure> {
        let (t0, t_end) = span;
        info!(
            "integrating {} equations over t = [{}, {}]",
            system.eq_system.len(),
            t0,
            t_end
        );
        let mut ode = UniversalODESolver::new(
            system.eq_system.clone(),
            system.unknowns.clone(),
            "t".to_owned(),
            self.settings.solver.clone(),
            t0,
            system.y0.clone(),
            t_end,
        );
        ode.set_parameters(self.settings.to_param_map());
        ode.initialize();
        let started = Instant::now();
        ode.solve();
        let elapsed = started.elapsed();

        let (t_mesh, solution) = ode.get_result();
        let trajectory = match (t_mesh, solution) {
            (Some(t), Some(y)) if t.len() > 0 => Some(Trajectory { t, y }),
            _ => None,
        };

        if let Some(budget) = wall_clock_budget {
            if elapsed > budget {
                warn!(
                    "integration exceeded its wall-clock budget ({:?} > {:?})",
                    elapsed, budget
                );
                return Err(IntegrationFailure {
                    kind: SolverFailure::Timeout {
                        elapsed_secs: elapsed.as_secs_f64(),
                        budget_secs: budget.as_secs_f64(),
                    },
                    partial: trajectory,
                });
            }
        }

        let trajectory = match trajectory {
            Some(tr) => tr,
            None => {
                return Err(IntegrationFailure {
                    kind: SolverFailure::NonConvergence(
                        "integrator returned no accepted steps".to_string(),
                    ),
                    partial: None,
                });
            }
        };

        if trajectory.y.iter().any(|v| !v.is_finite()) {
            return Err(IntegrationFailure {
                kind: SolverFailure::NonConvergence(
                    "integrator produced non-finite state values".to_string(),
                ),
                partial: None,
            });
        }

        let reached = trajectory.t[trajectory.t.len() - 1];
        let span_len = (t_end - t0).abs().max(f64::MIN_POSITIVE);
        if (t_end - reached).abs() > 1e-6 * span_len + 1e-12 {
            warn!(
                "integration stopped at t = {} before the end of the span t = {}",
                reached, t_end
            );
            return Err(IntegrationFailure {
                kind: SolverFailure::ExcessiveStepReduction {
                    reached,
                    target: t_end,
                },
                partial: Some(trajectory),
            });
        }

        info!(
            "integration finished: {} accepted steps in {:?}",
            trajectory.n_steps(),
            elapsed
        );
        Ok(trajectory)
    }
}
