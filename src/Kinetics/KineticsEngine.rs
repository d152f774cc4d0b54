use crate::Components::component_table::{ComponentTable, R_G};
use crate::Kinetics::stoichiometry_analyzer::StoichAnalyzer;
use crate::Phases::PhaseState::PhaseState;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KineticsError {
    #[error("malformed reaction equation: {0}")]
    MalformedEquation(String),
    #[error("species '{species}' of reaction '{equation}' not found in the component table")]
    UnknownSpecies { species: String, equation: String },
    #[error("size mismatch: {0}")]
    SizeMismatch(String),
    #[error(
        "rate law of reaction '{equation}' requires raising negative concentration {concentration} of '{species}' to non-integer power {order}"
    )]
    NegativeConcentrationDomain {
        equation: String,
        species: String,
        concentration: f64,
        order: f64,
    },
}

/// Rate constant of one reaction: either a plain constant or the Arrhenius
/// form k(T) = A*T^n*exp(-E/(R*T)). Both a numeric and a symbolic rendering
/// are provided so the same parameters drive direct evaluation and the
/// equation system handed to the integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum RateConstant {
    Constant { k: f64 },
    Arrhenius { a: f64, n: f64, e: f64 },
}

impl RateConstant {
    pub fn value(&self, temperature: f64) -> f64 {
        match self {
            RateConstant::Constant { k } => *k,
            RateConstant::Arrhenius { a, n, e } => {
                a * temperature.powf(*n) * f64::exp(-e / (R_G * temperature))
            }
        }
    }

    pub fn expr(&self, temperature: Expr) -> Expr {
        match self {
            RateConstant::Constant { k } => Expr::Const(*k),
            RateConstant::Arrhenius { a, n, e } => {
                let a = Expr::Const(*a);
                let n = Expr::Const(*n);
                let e = Expr::Const(*e);
                let r = Expr::Const(R_G);
                let k0 = a * temperature.clone().pow(n);
                k0 * (-e / (r * temperature)).exp()
            }
        }
    }
}

/// THE STRUCT KineticsEngine MAPS A PHASE STATE TO PER-SPECIES GENERATION RATES.
///
/// It owns the ordered reaction list, the signed stoichiometry matrix and the
/// concentration powers of every rate law, all aligned to the canonical species
/// order of the associated component table. Constructed once per simulation
/// case and immutable afterwards: rate constants are parameters, not state, so
/// the engine can be shared read-only between concurrently solving reactors.
#[derive(Debug, Clone)]
pub struct KineticsEngine {
    components: Arc<ComponentTable>,
    /// Reaction equations in index order
    pub vec_of_equations: Vec<String>,
    /// reactions x species, signed (negative = consumed)
    pub stoich_matrix: Vec<Vec<f64>>,
    /// reactions x species concentration powers of the rate laws
    pub reagent_orders: Vec<Vec<f64>>,
    pub rate_constants: Vec<RateConstant>,
    /// Species with a nonzero coefficient in at least one reaction
    pub partic_species: Vec<String>,
}

impl KineticsEngine {
    /// Build the engine from reaction equations and rate constants. Every
    /// species referenced by an equation must exist in the component table.
    /// Concentration powers default to the reagent stoichiometric coefficients.
    pub fn from_equations(
        components: &Arc<ComponentTable>,
        reactions: Vec<(String, RateConstant)>,
    ) -> Result<Self, KineticsError> {
        if reactions.is_empty() {
            return Err(KineticsError::SizeMismatch(
                "at least one reaction is required".to_string(),
            ));
        }
        let mut analyzer = StoichAnalyzer::new();
        let mut vec_of_equations = Vec::with_capacity(reactions.len());
        let mut rate_constants = Vec::with_capacity(reactions.len());
        for (equation, rate_constant) in reactions {
            analyzer.add_equation(&equation)?;
            vec_of_equations.push(equation);
            rate_constants.push(rate_constant);
        }
        let species_order = components.names().to_vec();
        let stoich_matrix = analyzer.stoich_matrix(&species_order)?;
        let reagent_orders = analyzer.reagent_orders(&species_order)?;

        let partic_species: Vec<String> = species_order
            .iter()
            .enumerate()
            .filter(|(i, _)| stoich_matrix.iter().any(|row| row[*i] != 0.0))
            .map(|(_, name)| name.clone())
            .collect();

        // audit: a strongly mass-imbalanced equation is usually a typo
        let molar_masses: Vec<f64> = components.molar_masses().iter().cloned().collect();
        let imbalance = analyzer.mass_imbalance(&species_order, &molar_masses)?;
        for (j, di) in imbalance.iter().enumerate() {
            if di.abs() > 1e-6 {
                warn!(
                    "reaction '{}' is not mass-consistent: sum(nu_i*M_i) = {:.4} g/mol",
                    vec_of_equations[j], di
                );
            }
        }
        info!(
            "kinetics engine created: {} reactions over {} species ({} participating)",
            vec_of_equations.len(),
            species_order.len(),
            partic_species.len()
        );

        Ok(Self {
            components: Arc::clone(components),
            vec_of_equations,
            stoich_matrix,
            reagent_orders,
            rate_constants,
            partic_species,
        })
    }

    /// Override the concentration powers with empirical reaction orders
    /// (reactions x species, aligned to the component table)
    pub fn with_orders(mut self, orders: Vec<Vec<f64>>) -> Result<Self, KineticsError> {
        if orders.len() != self.vec_of_equations.len() {
            return Err(KineticsError::SizeMismatch(format!(
                "orders rows {} != number of reactions {}",
                orders.len(),
                self.vec_of_equations.len()
            )));
        }
        for row in &orders {
            if row.len() != self.components.len() {
                return Err(KineticsError::SizeMismatch(format!(
                    "orders row length {} != number of species {}",
                    row.len(),
                    self.components.len()
                )));
            }
        }
        self.reagent_orders = orders;
        Ok(self)
    }

    pub fn component_table(&self) -> &Arc<ComponentTable> {
        &self.components
    }

    pub fn n_reactions(&self) -> usize {
        self.vec_of_equations.len()
    }

    ///////////////////////////////NUMERIC EVALUATION//////////////////////////////////////

    /// Rate of every reaction (mol/(m3*s)) at the given concentrations (mol/m3)
    /// and temperature: r_j = k_j(T)*prod_i( c_i^order_ji ).
    ///
    /// A negative concentration under a non-integer power is a domain error
    /// surfaced to the caller as a shrink-the-step signal; integer powers of
    /// negative concentrations evaluate normally so transient undershoots do
    /// not kill a solve.
    pub fn reaction_rates(
        &self,
        concentrations: &DVector<f64>,
        temperature: f64,
    ) -> Result<DVector<f64>, KineticsError> {
        let n = self.components.len();
        if concentrations.len() != n {
            return Err(KineticsError::SizeMismatch(format!(
                "concentration vector length {} != number of species {}",
                concentrations.len(),
                n
            )));
        }
        let mut rates = DVector::zeros(self.n_reactions());
        for (j, rate_constant) in self.rate_constants.iter().enumerate() {
            let mut r_j = rate_constant.value(temperature);
            for i in 0..n {
                let order = self.reagent_orders[j][i];
                if order == 0.0 {
                    continue;
                }
                let c_i = concentrations[i];
                if c_i < 0.0 && order.fract() != 0.0 {
                    return Err(KineticsError::NegativeConcentrationDomain {
                        equation: self.vec_of_equations[j].clone(),
                        species: self.components.names()[i].clone(),
                        concentration: c_i,
                        order,
                    });
                }
                r_j *= c_i.powf(order);
            }
            rates[j] = r_j;
        }
        Ok(rates)
    }

    /// Net generation rate of every species (mol/(m3*s)) at the phase state:
    /// g = S^T*r. Contributions are summed in reaction-index order - the
    /// ordering has no effect beyond fixing the floating-point rounding.
    pub fn rates(&self, phase: &PhaseState) -> Result<DVector<f64>, KineticsError> {
        let concentrations = phase.concentrations();
        self.generation_from_concentrations(&concentrations, phase.temp)
    }

    /// Net generation from raw concentrations and temperature, the form the
    /// balance assembler calls inside the integration loop
    pub fn generation_from_concentrations(
        &self,
        concentrations: &DVector<f64>,
        temperature: f64,
    ) -> Result<DVector<f64>, KineticsError> {
        let rates = self.reaction_rates(concentrations, temperature)?;
        Ok(self.generation_from_rates(&rates))
    }

    /// Apply the transposed stoichiometry to an already evaluated rate vector
    pub fn generation_from_rates(&self, rates: &DVector<f64>) -> DVector<f64> {
        let n = self.components.len();
        let mut generation = DVector::zeros(n);
        for j in 0..self.n_reactions() {
            for i in 0..n {
                generation[i] += self.stoich_matrix[j][i] * rates[j];
            }
        }
        generation
    }

    ///////////////////////////////SYMBOLIC EVALUATION//////////////////////////////////////

    /// Symbolic rate expression of every reaction over the given concentration
    /// variables and temperature variable, mirroring `reaction_rates`
    pub fn rate_exprs(
        &self,
        conc_vars: &[Expr],
        temp_var: &Expr,
    ) -> Result<Vec<Expr>, KineticsError> {
        let n = self.components.len();
        if conc_vars.len() != n {
            return Err(KineticsError::SizeMismatch(format!(
                "concentration variable count {} != number of species {}",
                conc_vars.len(),
                n
            )));
        }
        let mut exprs = Vec::with_capacity(self.n_reactions());
        for (j, rate_constant) in self.rate_constants.iter().enumerate() {
            let mut rate_expr = rate_constant.expr(temp_var.clone());
            for i in 0..n {
                let order = self.reagent_orders[j][i];
                if order == 0.0 {
                    continue;
                }
                if order == 1.0 {
                    rate_expr = rate_expr * conc_vars[i].clone();
                } else {
                    rate_expr = rate_expr * conc_vars[i].clone().pow(Expr::Const(order));
                }
            }
            exprs.push(rate_expr.simplify_());
        }
        Ok(exprs)
    }

    /// Symbolic net generation of every species: g_i = sum_j( nu_ji*r_j ),
    /// summed in reaction-index order like the numeric path
    pub fn generation_exprs(
        &self,
        conc_vars: &[Expr],
        temp_var: &Expr,
    ) -> Result<Vec<Expr>, KineticsError> {
        let rate_exprs = self.rate_exprs(conc_vars, temp_var)?;
        let n = self.components.len();
        let mut generation = Vec::with_capacity(n);
        for i in 0..n {
            let mut g_i = Expr::Const(0.0);
            for (j, rate_expr) in rate_exprs.iter().enumerate() {
                let nu = self.stoich_matrix[j][i];
                if nu == 0.0 {
                    continue;
                }
                g_i = g_i + Expr::Const(nu) * rate_expr.clone();
            }
            generation.push(g_i.simplify_());
        }
        Ok(generation)
    }
}
