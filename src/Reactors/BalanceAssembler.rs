use crate::Components::component_table::ComponentTable;
use crate::Kinetics::KineticsEngine::{KineticsEngine, KineticsError};
use crate::Phases::PhaseState::{PhaseError, PhaseKind};
use crate::Reactors::ReactorModel::{ReactorFeed, ReactorKind};
use crate::Reactors::SolverAdapter::AssembledSystem;
use crate::Reactors::Utilities::HeatExchangeConfig;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::info;
use nalgebra::DVector;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    /// Packing/configuration mismatch. A configuration bug: never retried
    #[error("balance assembly error: {0}")]
    BalanceAssemblyError(String),
    #[error(transparent)]
    Kinetics(#[from] KineticsError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Fixed layout of the packed state vector: species moles in canonical order
/// followed by temperature, repeated per spatial segment in increasing
/// position order. Batch and CSTR are a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePacking {
    pub n_species: usize,
    pub n_segments: usize,
}

impl StatePacking {
    pub fn state_len(&self) -> usize {
        (self.n_species + 1) * self.n_segments
    }

    pub fn check_len(&self, len: usize) -> Result<(), BalanceError> {
        if len != self.state_len() {
            return Err(BalanceError::BalanceAssemblyError(format!(
                "state vector length {} does not match packing {} species x {} segments = {}",
                len,
                self.n_species,
                self.n_segments,
                self.state_len()
            )));
        }
        Ok(())
    }

    fn segment_base(&self, segment: usize) -> usize {
        segment * (self.n_species + 1)
    }

    /// Split one segment out of a packed state vector: (species moles, temperature)
    pub fn unpack_segment(&self, y: &DVector<f64>, segment: usize) -> (DVector<f64>, f64) {
        let base = self.segment_base(segment);
        let moles = DVector::from_iterator(
            self.n_species,
            (0..self.n_species).map(|i| y[base + i]),
        );
        (moles, y[base + self.n_species])
    }

    /// Pack per-segment (moles, temperature) pairs into one state vector
    pub fn pack(&self, segments: &[(DVector<f64>, f64)]) -> Result<DVector<f64>, BalanceError> {
        if segments.len() != self.n_segments {
            return Err(BalanceError::BalanceAssemblyError(format!(
                "{} segments supplied to pack, packing expects {}",
                segments.len(),
                self.n_segments
            )));
        }
        let mut y = DVector::zeros(self.state_len());
        for (k, (moles, temp)) in segments.iter().enumerate() {
            if moles.len() != self.n_species {
                return Err(BalanceError::BalanceAssemblyError(format!(
                    "segment {} moles vector length {} != {} species",
                    k,
                    moles.len(),
                    self.n_species
                )));
            }
            let base = self.segment_base(k);
            for i in 0..self.n_species {
                y[base + i] = moles[i];
            }
            y[base + self.n_species] = *temp;
        }
        Ok(y)
    }

    /// Unknown names matching the packing order, for the symbolic system:
    /// "N0".."T" for a single segment, "N0z0".."Tz0","N0z1".. for a cascade
    pub fn var_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.state_len());
        for k in 0..self.n_segments {
            let suffix = if self.n_segments == 1 {
                String::new()
            } else {
                format!("z{}", k)
            };
            for i in 0..self.n_species {
                names.push(format!("N{}{}", i, suffix));
            }
            names.push(format!("T{}", suffix));
        }
        names
    }
}

/// Builds the mass/energy balance right-hand side of a reactor as a pure
/// function of the packed integrator state, in two interchangeable forms:
/// numeric (`rhs`, `residual`) and symbolic (`assemble_symbolic`, the form the
/// external integrator consumes).
///
/// Density, heat capacities and the mixture molar mass are evaluated once at
/// the characteristic (feed) temperature and held constant inside the solve;
/// the Arrhenius temperature dependence of the reaction rates stays exact.
/// Both forms share these frozen values, so the numeric probe, the residual
/// audit and the integrated system describe the same equations.
#[derive(Debug, Clone)]
pub struct BalanceAssembler {
    components: Arc<ComponentTable>,
    kinetics: KineticsEngine,
    pub kind: ReactorKind,
    pub packing: StatePacking,
    /// Total reaction volume (m3); batch takes it from the feed phase
    pub volume: f64,
    /// Characteristic temperature the properties are frozen at (K)
    pub t_char: f64,
    pub phase_kind: PhaseKind,
    pub pres: f64,
    pub energy_balance: bool,
    /// Heat release per unit extent of each reaction (J/mol, positive = exothermic)
    pub thermal_effects: Vec<f64>,
    pub heat_exchange: Option<HeatExchangeConfig>,
    /// Replace the last species equation of each segment by the algebraic
    /// total-mass closure in the residual form
    pub mass_closure: bool,
    /// Frozen molar heat capacities at t_char (J/mol/K); empty when the
    /// energy balance is off
    cp: Vec<f64>,
    /// kg/mol
    molar_masses_kg: Vec<f64>,
    /// Inlet molar flows (mol/s), zero vector for batch
    inlet_molar_flows: DVector<f64>,
    inlet_temp: f64,
    /// Volumetric throughput (m3/s), zero for batch
    vol_flow: f64,
    /// Reference total mass per segment (kg) for the algebraic closure
    mass_ref: Vec<f64>,
    initial_state: DVector<f64>,
}

impl BalanceAssembler {
    pub fn new(
        kind: ReactorKind,
        volume: f64,
        n_segments: usize,
        feed: &ReactorFeed,
        kinetics: KineticsEngine,
        energy_balance: bool,
        thermal_effects: Vec<f64>,
        heat_exchange: Option<HeatExchangeConfig>,
        mass_closure: bool,
    ) -> Result<Self, BalanceError> {
        let components = Arc::clone(kinetics.component_table());
        let n_species = components.len();
        let n_segments = match kind {
            ReactorKind::PlugFlow => n_segments,
            ReactorKind::Batch | ReactorKind::Cstr => 1,
        };
        if n_segments == 0 {
            return Err(BalanceError::BalanceAssemblyError(
                "plug-flow discretization requires at least one segment".to_string(),
            ));
        }
        if energy_balance && thermal_effects.len() != kinetics.n_reactions() {
            return Err(BalanceError::BalanceAssemblyError(format!(
                "thermal effects length {} does not match {} reactions",
                thermal_effects.len(),
                kinetics.n_reactions()
            )));
        }

        let (feed_phase, inlet_molar_flows, vol_flow) = match (kind, feed) {
            (ReactorKind::Batch, ReactorFeed::InitialPhase(phase)) => {
                (phase, DVector::zeros(n_species), 0.0)
            }
            (ReactorKind::Cstr | ReactorKind::PlugFlow, ReactorFeed::InletStream(stream)) => {
                (&stream.phase, stream.molar_flows(), stream.vol_flow())
            }
            _ => {
                return Err(BalanceError::BalanceAssemblyError(
                    "feed type does not match the reactor kind (batch takes a phase, flow reactors take a stream)"
                        .to_string(),
                ));
            }
        };
        if feed_phase.mole_frac.len() != n_species {
            return Err(BalanceError::BalanceAssemblyError(format!(
                "feed composition length {} does not match {} species of the kinetics table",
                feed_phase.mole_frac.len(),
                n_species
            )));
        }

        let volume = match kind {
            ReactorKind::Batch => feed_phase.vol,
            _ => volume,
        };
        if volume <= 0.0 || !volume.is_finite() {
            return Err(BalanceError::BalanceAssemblyError(format!(
                "reaction volume must be positive, got {}",
                volume
            )));
        }

        let t_char = feed_phase.temp;
        let cp = if energy_balance {
            let mut cp = Vec::with_capacity(n_species);
            for i in 0..n_species {
                cp.push(
                    components
                        .component_heat_capacity(i, t_char)
                        .map_err(PhaseError::from)?,
                );
            }
            cp
        } else {
            Vec::new()
        };
        let molar_masses_kg: Vec<f64> =
            components.molar_masses().iter().map(|m| m / 1000.0).collect();

        let packing = StatePacking {
            n_species,
            n_segments,
        };
        let v_seg = volume / n_segments as f64;

        // initial charge: batch keeps its holdup, flow reactors start filled
        // with inlet material
        let segment_init: (DVector<f64>, f64) = match kind {
            ReactorKind::Batch => (feed_phase.species_moles(), feed_phase.temp),
            ReactorKind::Cstr | ReactorKind::PlugFlow => {
                (feed_phase.concentrations() * v_seg, feed_phase.temp)
            }
        };
        let segments: Vec<(DVector<f64>, f64)> =
            (0..n_segments).map(|_| segment_init.clone()).collect();
        let initial_state = packing.pack(&segments)?;

        let mass_ref: Vec<f64> = (0..n_segments)
            .map(|k| {
                let (moles, _) = packing.unpack_segment(&initial_state, k);
                moles
                    .iter()
                    .zip(molar_masses_kg.iter())
                    .map(|(n, m)| n * m)
                    .sum()
            })
            .collect();

        info!(
            "balance assembler created: {:?}, {} species, {} segments, V = {} m3, T_char = {} K",
            kind, n_species, n_segments, volume, t_char
        );

        Ok(Self {
            components,
            kinetics,
            kind,
            packing,
            volume,
            t_char,
            phase_kind: feed_phase.kind,
            pres: feed_phase.pres,
            energy_balance,
            thermal_effects,
            heat_exchange,
            mass_closure,
            cp,
            molar_masses_kg,
            inlet_molar_flows,
            inlet_temp: feed_phase.temp,
            vol_flow,
            mass_ref,
            initial_state,
        })
    }

    pub fn component_table(&self) -> &Arc<ComponentTable> {
        &self.components
    }

    pub fn kinetics(&self) -> &KineticsEngine {
        &self.kinetics
    }

    pub fn segment_volume(&self) -> f64 {
        self.volume / self.packing.n_segments as f64
    }

    /// Packed initial state the integration starts from
    pub fn initial_state(&self) -> DVector<f64> {
        self.initial_state.clone()
    }

    fn has_flow(&self) -> bool {
        matches!(self.kind, ReactorKind::Cstr | ReactorKind::PlugFlow)
    }

    ///////////////////////////////NUMERIC FORM//////////////////////////////////////

    /// Explicit right-hand side dy/dt at the packed state.
    ///
    /// Per segment: dn_i/dt = g_i*V_seg + F_i,in - F_i,out and, with the
    /// energy balance on,
    /// dT/dt = (sum_j(q_j*r_j)*V_seg + E_in - E_out - Q_cool) / sum_i(n_i*Cp_i).
    /// Domain errors of the rate laws propagate out as shrink-the-step
    /// signals; length mismatches are assembly errors.
    pub fn rhs(&self, _t: f64, y: &DVector<f64>) -> Result<DVector<f64>, BalanceError> {
        self.packing.check_len(y.len())?;
        let n = self.packing.n_species;
        let v_seg = self.segment_volume();
        let q = self.vol_flow;
        let mut dy = DVector::zeros(y.len());

        for k in 0..self.packing.n_segments {
            let (moles, temp) = self.packing.unpack_segment(y, k);
            let conc = &moles / v_seg;
            let rates = self.kinetics.reaction_rates(&conc, temp)?;
            let generation = self.kinetics.generation_from_rates(&rates);

            let upstream = if self.has_flow() && k > 0 {
                Some(self.packing.unpack_segment(y, k - 1))
            } else {
                None
            };

            let base = k * (n + 1);
            for i in 0..n {
                let mut dn_i = generation[i] * v_seg;
                if self.has_flow() {
                    let inflow = match &upstream {
                        Some((up_moles, _)) => q * up_moles[i] / v_seg,
                        None => self.inlet_molar_flows[i],
                    };
                    dn_i += inflow - q * conc[i];
                }
                dy[base + i] = dn_i;
            }

            dy[base + n] = if self.energy_balance {
                let mut num = 0.0;
                for (j, q_j) in self.thermal_effects.iter().enumerate() {
                    num += q_j * rates[j] * v_seg;
                }
                if self.has_flow() {
                    match &upstream {
                        Some((up_moles, up_temp)) => {
                            for i in 0..n {
                                num += q * up_moles[i] / v_seg
                                    * self.cp[i]
                                    * (up_temp - self.t_char);
                            }
                        }
                        None => {
                            for i in 0..n {
                                num += self.inlet_molar_flows[i]
                                    * self.cp[i]
                                    * (self.inlet_temp - self.t_char);
                            }
                        }
                    }
                    for i in 0..n {
                        num -= q * conc[i] * self.cp[i] * (temp - self.t_char);
                    }
                }
                if let Some(hx) = &self.heat_exchange {
                    num -= hx.duty(temp) / self.packing.n_segments as f64;
                }
                let den: f64 = moles
                    .iter()
                    .zip(self.cp.iter())
                    .map(|(n_i, cp_i)| n_i * cp_i)
                    .sum();
                if den <= 0.0 {
                    return Err(BalanceError::BalanceAssemblyError(format!(
                        "total heat capacity of segment {} vanished (holdup lost)",
                        k
                    )));
                }
                num / den
            } else {
                0.0
            };
        }
        Ok(dy)
    }

    /// Implicit residual F(t, y, y') = y' - rhs(t, y) for the differential
    /// components. With the algebraic total-mass closure enabled the last
    /// species equation of each segment becomes sum_i(n_i*M_i) - m_ref = 0.
    pub fn residual(
        &self,
        t: f64,
        y: &DVector<f64>,
        ydot: &DVector<f64>,
    ) -> Result<DVector<f64>, BalanceError> {
        self.packing.check_len(ydot.len())?;
        let rhs = self.rhs(t, y)?;
        let mut residual = ydot - rhs;
        if self.mass_closure {
            let n = self.packing.n_species;
            for k in 0..self.packing.n_segments {
                let (moles, _) = self.packing.unpack_segment(y, k);
                let mass: f64 = moles
                    .iter()
                    .zip(self.molar_masses_kg.iter())
                    .map(|(n_i, m_i)| n_i * m_i)
                    .sum();
                residual[k * (n + 1) + n - 1] = mass - self.mass_ref[k];
            }
        }
        Ok(residual)
    }

    ///////////////////////////////SYMBOLIC FORM//////////////////////////////////////

    /// The same balances as a symbolic equation system in packing order, the
    /// form the external integrator consumes
    pub fn assemble_symbolic(&self) -> Result<AssembledSystem, BalanceError> {
        let n = self.packing.n_species;
        let names = self.packing.var_names();
        let v_seg = self.segment_volume();
        let q = self.vol_flow;
        let mut eq_system: Vec<Expr> = Vec::with_capacity(names.len());

        for k in 0..self.packing.n_segments {
            let base = k * (n + 1);
            let moles_vars: Vec<Expr> =
                (0..n).map(|i| Expr::Var(names[base + i].clone())).collect();
            let temp_var = Expr::Var(names[base + n].clone());
            let conc: Vec<Expr> = moles_vars
                .iter()
                .map(|n_var| n_var.clone() / Expr::Const(v_seg))
                .collect();
            let rate_exprs = self.kinetics.rate_exprs(&conc, &temp_var)?;

            let upstream: Option<(Vec<Expr>, Expr)> = if self.has_flow() && k > 0 {
                let up_base = (k - 1) * (n + 1);
                let up_conc = (0..n)
                    .map(|i| Expr::Var(names[up_base + i].clone()) / Expr::Const(v_seg))
                    .collect();
                Some((up_conc, Expr::Var(names[up_base + n].clone())))
            } else {
                None
            };

            for i in 0..n {
                let mut generation_i = Expr::Const(0.0);
                for (j, rate_expr) in rate_exprs.iter().enumerate() {
                    let nu = self.kinetics.stoich_matrix[j][i];
                    if nu == 0.0 {
                        continue;
                    }
                    generation_i = generation_i + Expr::Const(nu) * rate_expr.clone();
                }
                let mut rhs_i = generation_i * Expr::Const(v_seg);
                if self.has_flow() {
                    let inflow = match &upstream {
                        Some((up_conc, _)) => Expr::Const(q) * up_conc[i].clone(),
                        None => Expr::Const(self.inlet_molar_flows[i]),
                    };
                    rhs_i = rhs_i + inflow - Expr::Const(q) * conc[i].clone();
                }
                eq_system.push(rhs_i.simplify_());
            }

            let rhs_temp = if self.energy_balance {
                let mut num = Expr::Const(0.0);
                for (j, q_j) in self.thermal_effects.iter().enumerate() {
                    num = num + Expr::Const(q_j * v_seg) * rate_exprs[j].clone();
                }
                if self.has_flow() {
                    match &upstream {
                        Some((up_conc, up_temp)) => {
                            for i in 0..n {
                                num = num
                                    + Expr::Const(q * self.cp[i])
                                        * up_conc[i].clone()
                                        * (up_temp.clone() - Expr::Const(self.t_char));
                            }
                        }
                        None => {
                            let e_in: f64 = (0..n)
                                .map(|i| {
                                    self.inlet_molar_flows[i]
                                        * self.cp[i]
                                        * (self.inlet_temp - self.t_char)
                                })
                                .sum();
                            num = num + Expr::Const(e_in);
                        }
                    }
                    for i in 0..n {
                        num = num
                            - Expr::Const(q * self.cp[i])
                                * conc[i].clone()
                                * (temp_var.clone() - Expr::Const(self.t_char));
                    }
                }
                if let Some(hx) = &self.heat_exchange {
                    let ua_seg = hx.ua / self.packing.n_segments as f64;
                    num = num
                        - Expr::Const(ua_seg)
                            * (temp_var.clone() - Expr::Const(hx.cooling.temp_in));
                }
                let mut den = Expr::Const(0.0);
                for i in 0..n {
                    den = den + Expr::Const(self.cp[i]) * moles_vars[i].clone();
                }
                (num / den).simplify_()
            } else {
                Expr::Const(0.0)
            };
            eq_system.push(rhs_temp);
        }

        info!(
            "symbolic balance system assembled: {} equations, unknowns {:?}",
            eq_system.len(),
            names
        );
        Ok(AssembledSystem {
            eq_system,
            unknowns: names,
            y0: self.initial_state.clone(),
        })
    }
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_roundtrip() {
        let packing = StatePacking {
            n_species: 2,
            n_segments: 3,
        };
        assert_eq!(packing.state_len(), 9);
        let segments: Vec<(DVector<f64>, f64)> = (0..3)
            .map(|k| {
                (
                    DVector::from_vec(vec![k as f64, 10.0 + k as f64]),
                    300.0 + k as f64,
                )
            })
            .collect();
        let y = packing.pack(&segments).unwrap();
        for k in 0..3 {
            let (moles, temp) = packing.unpack_segment(&y, k);
            assert_eq!(moles, segments[k].0);
            assert_eq!(temp, segments[k].1);
        }
    }

    #[test]
    fn test_packing_length_mismatch() {
        let packing = StatePacking {
            n_species: 2,
            n_segments: 1,
        };
        assert!(matches!(
            packing.check_len(4),
            Err(BalanceError::BalanceAssemblyError(_))
        ));
        assert!(packing.check_len(3).is_ok());
    }

    #[test]
    fn test_var_names_single_and_cascade() {
        let single = StatePacking {
            n_species: 2,
            n_segments: 1,
        };
        assert_eq!(single.var_names(), vec!["N0", "N1", "T"]);
        let cascade = StatePacking {
            n_species: 1,
            n_segments: 2,
        };
        assert_eq!(cascade.var_names(), vec!["N0z0", "Tz0", "N0z1", "Tz1"]);
    }
}
