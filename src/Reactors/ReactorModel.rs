use crate::Kinetics::KineticsEngine::{KineticsEngine, KineticsError};
use crate::Phases::PhaseState::{PhaseError, PhaseState};
use crate::Phases::StreamState::StreamState;
use crate::Reactors::BalanceAssembler::{BalanceAssembler, BalanceError};
use crate::Reactors::SolverAdapter::{SolverAdapter, SolverFailure, SolverSettings, Trajectory};
use crate::Reactors::Utilities::HeatExchangeConfig;
use log::{error, info, warn};
use nalgebra::DVector;
use prettytable::{Table, row};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("cannot {action} while reactor is {from}")]
    InvalidStateTransition {
        from: ReactorStatus,
        action: String,
    },
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Kinetics(#[from] KineticsError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error("solver failure: {0}")]
    Solver(#[from] SolverFailure),
}

/// Reactor type: ideal batch, continuous stirred tank, or a plug-flow unit
/// discretized into a cascade of equal-volume segments with no back-mixing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorKind {
    Batch,
    Cstr,
    PlugFlow,
}

/// Lifecycle of a reactor model. `Solved` and `Failed` are terminal until
/// `reset()` returns the model to `Configured`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorStatus {
    Unconfigured,
    Configured,
    Solving,
    Solved,
    Failed,
}

impl fmt::Display for ReactorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorStatus::Unconfigured => write!(f, "unconfigured"),
            ReactorStatus::Configured => write!(f, "configured"),
            ReactorStatus::Solving => write!(f, "solving"),
            ReactorStatus::Solved => write!(f, "solved"),
            ReactorStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Material fed to the reactor: a batch takes an initial holdup phase, flow
/// reactors take an inlet stream
#[derive(Debug, Clone)]
pub enum ReactorFeed {
    InitialPhase(PhaseState),
    InletStream(StreamState),
}

/// Complete reactor configuration. Built with `new` plus the `with_*` setters;
/// validated as a whole by `ReactorModel::configure`.
#[derive(Clone)]
pub struct ReactorConfig {
    pub kind: ReactorKind,
    /// Reaction volume (m3). Ignored for batch, which takes the feed phase volume
    pub volume: f64,
    /// Plug-flow spatial discretization; irrelevant for batch/CSTR
    pub n_segments: usize,
    /// Integration span of the independent variable (s)
    pub t_span: (f64, f64),
    /// Heat release per unit extent of each reaction (J/mol, positive = exothermic)
    pub thermal_effects: Vec<f64>,
    pub energy_balance: bool,
    pub heat_exchange: Option<HeatExchangeConfig>,
    /// Accept a negative (reversed) inlet flow rate
    pub allow_reverse_flow: bool,
    /// Gate for non-fatal configure-time diagnostics
    pub check_input: bool,
    pub settings: SolverSettings,
    /// Wall-clock budget for one solve() call
    pub timeout: Option<Duration>,
    /// Replace one species equation per segment by the algebraic total-mass
    /// closure in the residual form
    pub algebraic_mass_closure: bool,
}

impl ReactorConfig {
    pub fn new(kind: ReactorKind, t_span: (f64, f64)) -> Self {
        Self {
            kind,
            volume: 0.0,
            n_segments: 1,
            t_span,
            thermal_effects: Vec::new(),
            energy_balance: false,
            heat_exchange: None,
            allow_reverse_flow: false,
            check_input: true,
            settings: SolverSettings::default(),
            timeout: None,
            algebraic_mass_closure: false,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_segments(mut self, n_segments: usize) -> Self {
        self.n_segments = n_segments;
        self
    }

    /// Turn the energy balance on with the given per-reaction thermal effects
    pub fn with_thermal_effects(mut self, thermal_effects: Vec<f64>) -> Self {
        self.thermal_effects = thermal_effects;
        self.energy_balance = true;
        self
    }

    pub fn with_heat_exchange(mut self, heat_exchange: HeatExchangeConfig) -> Self {
        self.heat_exchange = Some(heat_exchange);
        self
    }

    pub fn with_allow_reverse_flow(mut self, allow: bool) -> Self {
        self.allow_reverse_flow = allow;
        self
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_mass_closure(mut self, enabled: bool) -> Self {
        self.algebraic_mass_closure = enabled;
        self
    }
}

/// Balance-error audit of a finished solve, filled from the stored trajectory
/// and the numeric balance form
#[derive(Debug, Clone, Default)]
pub struct SolutionQuality {
    /// |m(t_end) - m(t_0)| of the total holdup (kg); conservation check for batch
    pub mass_drift_abs: f64,
    pub mass_drift_rel: f64,
    /// Steps where some species moles undershoot below -1e-9, with the worst value
    pub negative_moles_points: Vec<(usize, f64)>,
    /// Norm of the right-hand side at the final state; near zero once a flow
    /// reactor has reached steady state
    pub final_rhs_norm: f64,
}

/// THE STRUCT ReactorModel ORCHESTRATES ONE UNIT OPERATION THROUGH ITS LIFECYCLE:
/// unconfigured -> configured -> solving -> solved | failed.
///
/// `configure()` validates every referenced object against the kinetics'
/// component table, `solve()` builds the balance assembler, probes the numeric
/// right-hand side, hands the symbolic system to the solver adapter and
/// materializes the accepted steps as (time, PhaseState) pairs. Integration
/// failures do not unwind: they are recorded on the model together with the
/// last reached point, so a flowsheet driving many units can inspect and
/// report per-unit failures. `reset()` discards the trajectory and returns to
/// `Configured`, preserving the configuration; retrying with relaxed
/// tolerances is a caller decision, never automatic.
pub struct ReactorModel {
    status: ReactorStatus,
    config: Option<ReactorConfig>,
    feed: Option<ReactorFeed>,
    kinetics: Option<KineticsEngine>,
    assembler: Option<BalanceAssembler>,
    raw_trajectory: Option<Trajectory>,
    trajectory: Vec<(f64, PhaseState)>,
    axial_profile: Vec<(f64, PhaseState)>,
    last_point: Option<(f64, PhaseState)>,
    last_failure: Option<ReactorError>,
}

impl ReactorModel {
    pub fn new() -> Self {
        Self {
            status: ReactorStatus::Unconfigured,
            config: None,
            feed: None,
            kinetics: None,
            assembler: None,
            raw_trajectory: None,
            trajectory: Vec::new(),
            axial_profile: Vec::new(),
            last_point: None,
            last_failure: None,
        }
    }

    pub fn status(&self) -> ReactorStatus {
        self.status
    }

    ///////////////////////////////CONFIGURATION//////////////////////////////////////

    /// Validate and store the configuration, feed and kinetics.
    /// Allowed from `Unconfigured` and `Configured` (reconfiguration); a
    /// solved/failed model must be `reset()` first.
    pub fn configure(
        &mut self,
        config: ReactorConfig,
        feed: ReactorFeed,
        kinetics: KineticsEngine,
    ) -> Result<(), ReactorError> {
        match self.status {
            ReactorStatus::Unconfigured | ReactorStatus::Configured => {}
            from => {
                return Err(ReactorError::InvalidStateTransition {
                    from,
                    action: "configure".to_string(),
                });
            }
        }

        config
            .settings
            .validate()
            .map_err(ReactorError::InvalidConfiguration)?;
        let (t0, t_end) = config.t_span;
        if !t0.is_finite() || !t_end.is_finite() || t_end <= t0 {
            return Err(ReactorError::InvalidConfiguration(format!(
                "integration span ({}, {}) must be finite and increasing",
                t0, t_end
            )));
        }
        match config.kind {
            ReactorKind::PlugFlow => {
                if config.n_segments == 0 {
                    return Err(ReactorError::InvalidConfiguration(
                        "plug-flow discretization must be a positive number of segments"
                            .to_string(),
                    ));
                }
                if config.volume <= 0.0 {
                    return Err(ReactorError::InvalidConfiguration(
                        "plug-flow reactor volume must be positive".to_string(),
                    ));
                }
            }
            ReactorKind::Cstr => {
                if config.volume <= 0.0 {
                    return Err(ReactorError::InvalidConfiguration(
                        "CSTR volume must be positive".to_string(),
                    ));
                }
            }
            ReactorKind::Batch => {}
        }

        // the feed must speak the same species vocabulary as the kinetics
        let feed_phase = match (&config.kind, &feed) {
            (ReactorKind::Batch, ReactorFeed::InitialPhase(phase)) => phase,
            (ReactorKind::Cstr | ReactorKind::PlugFlow, ReactorFeed::InletStream(stream)) => {
                &stream.phase
            }
            (ReactorKind::Batch, ReactorFeed::InletStream(_)) => {
                return Err(ReactorError::InvalidConfiguration(
                    "batch reactor takes an initial phase, not an inlet stream".to_string(),
                ));
            }
            (_, ReactorFeed::InitialPhase(_)) => {
                return Err(ReactorError::InvalidConfiguration(
                    "flow reactor takes an inlet stream, not an initial phase".to_string(),
                ));
            }
        };
        if feed_phase.component_table().names() != kinetics.component_table().names() {
            return Err(ReactorError::InvalidConfiguration(
                "component tables of the feed and the kinetics engine disagree".to_string(),
            ));
        }

        if matches!(config.kind, ReactorKind::Batch) && feed_phase.zero_holdup {
            return Err(ReactorError::MissingData(
                "batch feed phase has zero holdup: charge mass, moles or volume before solving"
                    .to_string(),
            ));
        }

        if let ReactorFeed::InletStream(stream) = &feed {
            if stream.total_molar_flow() < 0.0 && !config.allow_reverse_flow {
                return Err(ReactorError::InvalidConfiguration(
                    "inlet flow is reversed and allow_reverse_flow is off".to_string(),
                ));
            }
        }

        if config.energy_balance
            && config.thermal_effects.len() != kinetics.n_reactions()
        {
            return Err(ReactorError::InvalidConfiguration(format!(
                "thermal effects length {} must match the number of reactions {}",
                config.thermal_effects.len(),
                kinetics.n_reactions()
            )));
        }

        if config.check_input {
            if let Some(hx) = &config.heat_exchange {
                let duty = hx.duty(feed_phase.temp);
                let max_duty = hx.cooling.max_duty(feed_phase.temp);
                if duty > max_duty {
                    warn!(
                        "configured UA duty {:.1} W at the feed temperature exceeds the achievable cooling duty {:.1} W",
                        duty, max_duty
                    );
                }
            }
        }

        self.config = Some(config);
        self.feed = Some(feed);
        self.kinetics = Some(kinetics);
        self.status = ReactorStatus::Configured;
        info!("reactor configured");
        Ok(())
    }

    ///////////////////////////////SOLVING//////////////////////////////////////

    /// Run one synchronous solve over the configured span.
    ///
    /// Returns `Err` only when called in the wrong state. Integration-time
    /// failures (non-convergence, step starvation, timeout, rate-law domain
    /// errors) leave the model in `Failed` with the failure and the last
    /// reached point recorded; inspect `status()` and `last_failure()`.
    pub fn solve(&mut self) -> Result<(), ReactorError> {
        match self.status {
            ReactorStatus::Configured => {}
            from => {
                return Err(ReactorError::InvalidStateTransition {
                    from,
                    action: "solve".to_string(),
                });
            }
        }
        self.status = ReactorStatus::Solving;
        info!("reactor solve started");

        match self.run_integration() {
            Ok((assembler, raw)) => match self.materialize_trajectory(&assembler, &raw) {
                Ok(()) => {
                    self.assembler = Some(assembler);
                    self.raw_trajectory = Some(raw);
                    self.status = ReactorStatus::Solved;
                    info!(
                        "reactor solved: {} trajectory points",
                        self.trajectory.len()
                    );
                }
                Err(e) => self.record_failure(e),
            },
            Err((e, last_point)) => {
                self.last_point = last_point;
                self.record_failure(e);
            }
        }
        Ok(())
    }

    fn record_failure(&mut self, e: ReactorError) {
        error!("reactor solve failed: {}", e);
        self.last_failure = Some(e);
        self.status = ReactorStatus::Failed;
    }

    #[allow(clippy::type_complexity)]
    fn run_integration(
        &self,
    ) -> Result<(BalanceAssembler, Trajectory), (ReactorError, Option<(f64, PhaseState)>)> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| (ReactorError::MissingData("no configuration".to_string()), None))?;
        let feed = self
            .feed
            .as_ref()
            .ok_or_else(|| (ReactorError::MissingData("no feed".to_string()), None))?;
        let kinetics = self
            .kinetics
            .as_ref()
            .ok_or_else(|| (ReactorError::MissingData("no kinetics engine".to_string()), None))?;

        let assembler = BalanceAssembler::new(
            config.kind,
            config.volume,
            config.n_segments,
            feed,
            kinetics.clone(),
            config.energy_balance,
            config.thermal_effects.clone(),
            config.heat_exchange,
            config.algebraic_mass_closure,
        )
        .map_err(|e| (ReactorError::from(e), None))?;

        // probe the numeric form at the initial state: assembly bugs and
        // rate-law domain errors surface here, before the integrator runs
        let y0 = assembler.initial_state();
        let dy0 = assembler
            .rhs(config.t_span.0, &y0)
            .map_err(|e| (ReactorError::from(e), None))?;
        if config.algebraic_mass_closure {
            let residual = assembler
                .residual(config.t_span.0, &y0, &dy0)
                .map_err(|e| (ReactorError::from(e), None))?;
            if residual.norm() > 1e-6 {
                warn!(
                    "algebraic closure residual at the initial state is {:.3e}",
                    residual.norm()
                );
            }
        }

        let system = assembler
            .assemble_symbolic()
            .map_err(|e| (ReactorError::from(e), None))?;
        let adapter = SolverAdapter::new(config.settings.clone());
        match adapter.integrate(&system, config.t_span, config.timeout) {
            Ok(trajectory) => Ok((assembler, trajectory)),
            Err(failure) => {
                let last_point = failure
                    .partial
                    .as_ref()
                    .and_then(|partial| self.materialize_point(&assembler, partial).ok());
                Err((ReactorError::Solver(failure.kind), last_point))
            }
        }
    }

    /// Rebuild (t, PhaseState) pairs from the raw packed trajectory: the
    /// outlet segment over time, plus the final axial profile for plug-flow
    fn materialize_trajectory(
        &mut self,
        assembler: &BalanceAssembler,
        raw: &Trajectory,
    ) -> Result<(), ReactorError> {
        let components = assembler.component_table();
        let n_segments = assembler.packing.n_segments;
        let mut trajectory = Vec::with_capacity(raw.n_steps());
        for r in 0..raw.n_steps() {
            let y_r: DVector<f64> = raw.y.row(r).transpose();
            assembler.packing.check_len(y_r.len()).map_err(ReactorError::from)?;
            let (moles, temp) = assembler.packing.unpack_segment(&y_r, n_segments - 1);
            let phase = PhaseState::from_moles_and_temp(
                components,
                assembler.phase_kind,
                &moles,
                temp,
                assembler.pres,
            )?;
            trajectory.push((raw.t[r], phase));
        }
        self.trajectory = trajectory;

        self.axial_profile.clear();
        if n_segments > 1 {
            let y_end: DVector<f64> = raw.y.row(raw.n_steps() - 1).transpose();
            for k in 0..n_segments {
                let (moles, temp) = assembler.packing.unpack_segment(&y_end, k);
                let phase = PhaseState::from_moles_and_temp(
                    components,
                    assembler.phase_kind,
                    &moles,
                    temp,
                    assembler.pres,
                )?;
                // outlet position of segment k as a fraction of the cascade
                let z = (k + 1) as f64 / n_segments as f64;
                self.axial_profile.push((z, phase));
            }
        }
        Ok(())
    }

    fn materialize_point(
        &self,
        assembler: &BalanceAssembler,
        partial: &Trajectory,
    ) -> Result<(f64, PhaseState), ReactorError> {
        let r = partial.n_steps() - 1;
        let y_r: DVector<f64> = partial.y.row(r).transpose();
        assembler.packing.check_len(y_r.len())?;
        let (moles, temp) = assembler
            .packing
            .unpack_segment(&y_r, assembler.packing.n_segments - 1);
        let phase = PhaseState::from_moles_and_temp(
            assembler.component_table(),
            assembler.phase_kind,
            &moles,
            temp,
            assembler.pres,
        )?;
        Ok((partial.t[r], phase))
    }

    /// Discard the trajectory and any recorded failure, return to `Configured`
    /// preserving the configuration
    pub fn reset(&mut self) -> Result<(), ReactorError> {
        match self.status {
            ReactorStatus::Configured | ReactorStatus::Solved | ReactorStatus::Failed => {}
            from => {
                return Err(ReactorError::InvalidStateTransition {
                    from,
                    action: "reset".to_string(),
                });
            }
        }
        self.trajectory.clear();
        self.axial_profile.clear();
        self.assembler = None;
        self.raw_trajectory = None;
        self.last_point = None;
        self.last_failure = None;
        self.status = ReactorStatus::Configured;
        info!("reactor reset to configured");
        Ok(())
    }

    ///////////////////////////////RESULTS//////////////////////////////////////

    /// Time series of the (outlet-segment) phase over the accepted steps
    pub fn trajectory(&self) -> &[(f64, PhaseState)] {
        &self.trajectory
    }

    /// Final-time axial profile (outlet position fraction, phase) of a
    /// plug-flow cascade; empty for batch/CSTR
    pub fn axial_profile(&self) -> &[(f64, PhaseState)] {
        &self.axial_profile
    }

    pub fn final_phase(&self) -> Option<&PhaseState> {
        self.trajectory.last().map(|(_, phase)| phase)
    }

    /// Product stream of a flow reactor: the inlet flow tag over the final phase
    pub fn outlet_stream(&self) -> Option<StreamState> {
        let feed = self.feed.as_ref()?;
        let final_phase = self.final_phase()?;
        match feed {
            ReactorFeed::InletStream(stream) => Some(stream.with_phase(final_phase.clone())),
            ReactorFeed::InitialPhase(_) => None,
        }
    }

    pub fn last_failure(&self) -> Option<&ReactorError> {
        self.last_failure.as_ref()
    }

    /// Last point the integrator reached before a failure, when available
    pub fn last_point(&self) -> Option<&(f64, PhaseState)> {
        self.last_point.as_ref()
    }

    /// Post-solve balance audit over the stored trajectory
    pub fn solution_quality(&self) -> Result<SolutionQuality, ReactorError> {
        if self.status != ReactorStatus::Solved {
            return Err(ReactorError::InvalidStateTransition {
                from: self.status,
                action: "audit the solution".to_string(),
            });
        }
        let assembler = self
            .assembler
            .as_ref()
            .ok_or_else(|| ReactorError::MissingData("no stored assembler".to_string()))?;
        let raw = self
            .raw_trajectory
            .as_ref()
            .ok_or_else(|| ReactorError::MissingData("no stored trajectory".to_string()))?;

        let molar_masses_kg: Vec<f64> = assembler
            .component_table()
            .molar_masses()
            .iter()
            .map(|m| m / 1000.0)
            .collect();
        let n = assembler.packing.n_species;
        let total_mass = |y: &DVector<f64>| -> f64 {
            let mut mass = 0.0;
            for k in 0..assembler.packing.n_segments {
                let (moles, _) = assembler.packing.unpack_segment(y, k);
                mass += moles
                    .iter()
                    .zip(molar_masses_kg.iter())
                    .map(|(n_i, m_i)| n_i * m_i)
                    .sum::<f64>();
            }
            mass
        };

        let y_first: DVector<f64> = raw.y.row(0).transpose();
        let y_last: DVector<f64> = raw.y.row(raw.n_steps() - 1).transpose();
        let m0 = total_mass(&y_first);
        let m_end = total_mass(&y_last);
        let mass_drift_abs = (m_end - m0).abs();
        let mass_drift_rel = if m0 > 0.0 { mass_drift_abs / m0 } else { 0.0 };

        let mut negative_moles_points = Vec::new();
        for r in 0..raw.n_steps() {
            let y_r: DVector<f64> = raw.y.row(r).transpose();
            let mut worst = 0.0_f64;
            for k in 0..assembler.packing.n_segments {
                let (moles, _) = assembler.packing.unpack_segment(&y_r, k);
                for i in 0..n {
                    if moles[i] < worst {
                        worst = moles[i];
                    }
                }
            }
            if worst < -1e-9 {
                negative_moles_points.push((r, worst));
            }
        }

        let t_end = raw.t[raw.n_steps() - 1];
        let final_rhs_norm = assembler.rhs(t_end, &y_last)?.norm();

        Ok(SolutionQuality {
            mass_drift_abs,
            mass_drift_rel,
            negative_moles_points,
            final_rhs_norm,
        })
    }

    ////////////////////////PRETTY PRINTING/////////////////////////////

    pub fn pretty_print_task(&self) {
        println!("\n=== REACTOR TASK SUMMARY ===");
        println!("Status: {}", self.status);
        if let Some(config) = &self.config {
            let mut table = Table::new();
            table.add_row(row!["Parameter", "Value"]);
            table.add_row(row!["Kind", format!("{:?}", config.kind)]);
            table.add_row(row!["Volume (m3)", format!("{:.6}", config.volume)]);
            table.add_row(row!["Segments", config.n_segments]);
            table.add_row(row![
                "Span (s)",
                format!("{} - {}", config.t_span.0, config.t_span.1)
            ]);
            table.add_row(row!["Energy balance", config.energy_balance]);
            table.add_row(row![
                "Mass closure",
                config.algebraic_mass_closure
            ]);
            table.printstd();
        }
        if let Some(kinetics) = &self.kinetics {
            println!("\nSpecies ({}):", kinetics.component_table().len());
            for (i, name) in kinetics.component_table().names().iter().enumerate() {
                println!("  {}: {}", i, name);
            }
            println!("\nReactions ({}):", kinetics.n_reactions());
            for (j, equation) in kinetics.vec_of_equations.iter().enumerate() {
                println!("  {}: {}", j + 1, equation);
            }
        }
        println!("=== END TASK SUMMARY ===\n");
    }
}

impl Default for ReactorModel {
    fn default() -> Self {
        Self::new()
    }
}
