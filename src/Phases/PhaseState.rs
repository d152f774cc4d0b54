use crate::Components::component_table::ComponentTable;
use crate::Components::property_models::PropertyEvaluationError;
use log::warn;
use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Standard atmosphere in Pa
pub const P_ATM: f64 = 101325.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhaseError {
    #[error("invalid composition: {0}")]
    InvalidComposition(String),
    #[error("temperature must be positive on the absolute scale, got {0} K")]
    InvalidTemperature(f64),
    #[error("pressure must be positive, got {0} Pa")]
    InvalidPressure(f64),
    #[error("invalid holdup: {0}")]
    InvalidHoldup(String),
    #[error(transparent)]
    Property(#[from] PropertyEvaluationError),
}

/// Physical state tag of a material holdup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Liquid,
    Solid,
    Vapor,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Liquid => write!(f, "liquid"),
            PhaseKind::Solid => write!(f, "solid"),
            PhaseKind::Vapor => write!(f, "vapor"),
        }
    }
}

/// Composition input, converted to normalized mole fractions at construction.
/// Vectors are aligned to the canonical order of the component table.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionSpec {
    MoleFractions(Vec<f64>),
    /// mol/m3
    MoleConcentrations(Vec<f64>),
    MassFractions(Vec<f64>),
}

/// Exactly one holdup measure is given; the other two are derived through the
/// density/molar-mass closure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    /// kg
    Mass(f64),
    /// m3
    Volume(f64),
    /// mol
    Moles(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Mass,
    Volume,
    Moles,
}

/// Explicit construction options for a phase. Every recognized option is a
/// named field - no keyword guessing. `check_input` (default true) gates the
/// non-fatal diagnostics channel; fatal invariants are always enforced.
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    pub composition: CompositionSpec,
    /// K
    pub temp: f64,
    /// Pa
    pub pres: f64,
    pub size: SizeSpec,
    pub check_input: bool,
}

impl PhaseConfig {
    pub fn new(composition: CompositionSpec, temp: f64, size: SizeSpec) -> Self {
        Self {
            composition,
            temp,
            pres: P_ATM,
            size,
            check_input: true,
        }
    }

    pub fn with_pressure(mut self, pres: f64) -> Self {
        self.pres = pres;
        self
    }

    pub fn with_check_input(mut self, check_input: bool) -> Self {
        self.check_input = check_input;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    ZeroHoldup,
}

/// One non-fatal construction diagnostic. Collected on the phase object itself
/// so callers can inspect warnings instead of scraping a global warning stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionWarning {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Material holdup of one physical state at a point in the process:
/// normalized composition, temperature, pressure and the three holdup measures
/// (mass, volume, moles) kept mutually consistent through the density closure.
///
/// A phase is never mutated in place during a solve; the balance layer only
/// produces new instances. Explicit setters are for use between solves.
#[derive(Debug, Clone)]
pub struct PhaseState {
    components: Arc<ComponentTable>,
    pub kind: PhaseKind,
    /// Normalized mole fractions in canonical order
    pub mole_frac: DVector<f64>,
    /// K
    pub temp: f64,
    /// Pa
    pub pres: f64,
    /// kg
    pub mass: f64,
    /// m3
    pub vol: f64,
    /// mol
    pub moles: f64,
    /// Mixture mass density at the current temperature (kg/m3)
    pub mass_density: f64,
    /// Mean molar mass (g/mol)
    pub molar_mass: f64,
    /// Which holdup measure was given at construction
    pub primary_size: SizeKind,
    pub zero_holdup: bool,
    pub diagnostics: Vec<ConstructionWarning>,
}

impl PhaseState {
    /// Create a phase from an explicit configuration.
    ///
    /// Fatal at the object boundary: mismatched/negative/empty composition,
    /// non-positive temperature or pressure, negative holdup, property
    /// correlation undefined at the given temperature. A holdup of zero is NOT
    /// fatal: the phase is created flagged `zero_holdup` and (with
    /// `check_input`) carries exactly one diagnostic naming mass, moles and vol.
    pub fn create(
        components: &Arc<ComponentTable>,
        config: PhaseConfig,
        kind: PhaseKind,
    ) -> Result<PhaseState, PhaseError> {
        if config.temp <= 0.0 || !config.temp.is_finite() {
            return Err(PhaseError::InvalidTemperature(config.temp));
        }
        if config.pres <= 0.0 || !config.pres.is_finite() {
            return Err(PhaseError::InvalidPressure(config.pres));
        }
        let mole_frac = normalize_composition(components, &config.composition)?;

        let molar_mass = components.mixture_molar_mass(&mole_frac);
        let mass_density = phase_mass_density(components, kind, &mole_frac, config.temp, config.pres)?;

        let (size_value, primary_size) = match config.size {
            SizeSpec::Mass(m) => (m, SizeKind::Mass),
            SizeSpec::Volume(v) => (v, SizeKind::Volume),
            SizeSpec::Moles(n) => (n, SizeKind::Moles),
        };
        if size_value < 0.0 || !size_value.is_finite() {
            return Err(PhaseError::InvalidHoldup(format!(
                "holdup measure {:?} must be nonnegative and finite, got {}",
                primary_size, size_value
            )));
        }

        let mol_mass_kg = molar_mass / 1000.0;
        let (mass, vol, moles) = match config.size {
            SizeSpec::Mass(m) => (m, m / mass_density, m / mol_mass_kg),
            SizeSpec::Volume(v) => {
                let m = mass_density * v;
                (m, v, m / mol_mass_kg)
            }
            SizeSpec::Moles(n) => {
                let m = n * mol_mass_kg;
                (m, m / mass_density, n)
            }
        };

        let zero_holdup = size_value == 0.0;
        let mut diagnostics = Vec::new();
        if zero_holdup && config.check_input {
            let message =
                "mass, moles and vol of the phase are all zero: created with zero holdup"
                    .to_string();
            warn!("{}", message);
            diagnostics.push(ConstructionWarning {
                kind: DiagnosticKind::ZeroHoldup,
                message,
            });
        }

        Ok(PhaseState {
            components: Arc::clone(components),
            kind,
            mole_frac,
            temp: config.temp,
            pres: config.pres,
            mass,
            vol,
            moles,
            mass_density,
            molar_mass,
            primary_size,
            zero_holdup,
            diagnostics,
        })
    }

    /// Reconstruct a phase from a species-moles vector, as the reactor model
    /// does when materializing trajectory points. Small negative moles produced
    /// by the integrator are clamped to zero; a vanishing total reconstructs a
    /// flagged zero-holdup phase without emitting the construction diagnostic
    /// (it is a derived object, not user input).
    pub fn from_moles_and_temp(
        components: &Arc<ComponentTable>,
        kind: PhaseKind,
        species_moles: &DVector<f64>,
        temp: f64,
        pres: f64,
    ) -> Result<PhaseState, PhaseError> {
        if species_moles.len() != components.len() {
            return Err(PhaseError::InvalidComposition(format!(
                "moles vector length {} does not match component table length {}",
                species_moles.len(),
                components.len()
            )));
        }
        let clamped: DVector<f64> = species_moles.map(|n| if n > 0.0 { n } else { 0.0 });
        let total: f64 = clamped.sum();
        let composition = if total > 0.0 {
            CompositionSpec::MoleFractions((clamped / total).iter().cloned().collect())
        } else {
            // singular composition: fall back to uniform, holdup stays zero
            let s = components.len();
            CompositionSpec::MoleFractions(vec![1.0 / s as f64; s])
        };
        let config = PhaseConfig::new(composition, temp, SizeSpec::Moles(total))
            .with_pressure(pres)
            .with_check_input(false);
        PhaseState::create(components, config, kind)
    }

    pub fn component_table(&self) -> &Arc<ComponentTable> {
        &self.components
    }

    ///////////////////////////////DERIVED QUANTITIES//////////////////////////////////////

    /// Recompute one holdup measure from the primary one through the
    /// density/molar-mass closure at the current temperature
    pub fn derive(&self, size_kind: SizeKind) -> Result<f64, PhaseError> {
        let mass_density =
            phase_mass_density(&self.components, self.kind, &self.mole_frac, self.temp, self.pres)?;
        let mol_mass_kg = self.molar_mass / 1000.0;
        let mass = match self.primary_size {
            SizeKind::Mass => self.mass,
            SizeKind::Volume => mass_density * self.vol,
            SizeKind::Moles => self.moles * mol_mass_kg,
        };
        Ok(match size_kind {
            SizeKind::Mass => mass,
            SizeKind::Volume => mass / mass_density,
            SizeKind::Moles => mass / mol_mass_kg,
        })
    }

    /// New phase with all holdup measures multiplied by `factor`, composition
    /// and temperature unchanged
    pub fn scale(&self, factor: f64) -> PhaseState {
        let mut scaled = self.clone();
        scaled.mass *= factor;
        scaled.vol *= factor;
        scaled.moles *= factor;
        scaled.zero_holdup = scaled.moles == 0.0;
        scaled
    }

    /// Total molar density ct = ro/M (mol/m3). Intensive, valid for zero holdup
    pub fn total_molar_density(&self) -> f64 {
        self.mass_density / (self.molar_mass / 1000.0)
    }

    /// Per-species molar concentrations c_i = x_i*ct (mol/m3), canonical order
    pub fn concentrations(&self) -> DVector<f64> {
        &self.mole_frac * self.total_molar_density()
    }

    /// Per-species moles n_i = x_i*n (mol), canonical order
    pub fn species_moles(&self) -> DVector<f64> {
        &self.mole_frac * self.moles
    }

    /// Mixture molar enthalpy (J/mol) at the current temperature
    pub fn molar_enthalpy(&self) -> Result<f64, PhaseError> {
        Ok(self.components.mixture_enthalpy(&self.mole_frac, self.temp)?)
    }

    /// Mixture molar heat capacity (J/mol/K) at the current temperature
    pub fn molar_heat_capacity(&self) -> Result<f64, PhaseError> {
        Ok(self
            .components
            .mixture_molar_heat_capacity(&self.mole_frac, self.temp)?)
    }

    /////////////////////////////////SETTERS////////////////////////////////////////////////

    /// Set a new temperature between solves; density and volume are re-derived,
    /// mass and moles are conserved
    pub fn set_temperature(&mut self, temp: f64) -> Result<(), PhaseError> {
        if temp <= 0.0 || !temp.is_finite() {
            return Err(PhaseError::InvalidTemperature(temp));
        }
        let mass_density = phase_mass_density(&self.components, self.kind, &self.mole_frac, temp, self.pres)?;
        self.temp = temp;
        self.mass_density = mass_density;
        self.vol = self.mass / mass_density;
        Ok(())
    }

    /// Set a new composition between solves; mass is conserved, moles and
    /// volume are re-derived
    pub fn set_composition(&mut self, composition: CompositionSpec) -> Result<(), PhaseError> {
        let mole_frac = normalize_composition(&self.components, &composition)?;
        let molar_mass = self.components.mixture_molar_mass(&mole_frac);
        let mass_density = phase_mass_density(&self.components, self.kind, &mole_frac, self.temp, self.pres)?;
        self.mole_frac = mole_frac;
        self.molar_mass = molar_mass;
        self.mass_density = mass_density;
        self.moles = self.mass / (molar_mass / 1000.0);
        self.vol = self.mass / mass_density;
        Ok(())
    }
}

/// Validate a composition spec against the table and convert it to normalized
/// mole fractions. Negative entries, non-finite entries, length mismatch and
/// an all-zero vector are all fatal.
pub fn normalize_composition(
    components: &ComponentTable,
    composition: &CompositionSpec,
) -> Result<DVector<f64>, PhaseError> {
    let (raw, is_mass_based): (&Vec<f64>, bool) = match composition {
        CompositionSpec::MoleFractions(v) => (v, false),
        CompositionSpec::MoleConcentrations(v) => (v, false),
        CompositionSpec::MassFractions(v) => (v, true),
    };
    if raw.len() != components.len() {
        return Err(PhaseError::InvalidComposition(format!(
            "composition vector length {} does not match component table length {}",
            raw.len(),
            components.len()
        )));
    }
    for (i, value) in raw.iter().enumerate() {
        if *value < 0.0 || !value.is_finite() {
            return Err(PhaseError::InvalidComposition(format!(
                "composition entry for '{}' is {}, must be nonnegative and finite",
                components.names()[i],
                value
            )));
        }
    }
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(PhaseError::InvalidComposition(
            "composition vector sums to zero".to_string(),
        ));
    }
    if is_mass_based {
        // x_i = (w_i/M_i)/sum_j(w_j/M_j)
        let molar_masses = components.molar_masses();
        let mut mole_numbers: Vec<f64> = Vec::with_capacity(raw.len());
        for (i, w_i) in raw.iter().enumerate() {
            mole_numbers.push(w_i / molar_masses[i]);
        }
        let total_moles: f64 = mole_numbers.iter().sum();
        Ok(DVector::from_iterator(
            raw.len(),
            mole_numbers.iter().map(|n| n / total_moles),
        ))
    } else {
        // mole fractions and mole concentrations normalize the same way
        Ok(DVector::from_iterator(
            raw.len(),
            raw.iter().map(|v| v / total),
        ))
    }
}

fn phase_mass_density(
    components: &ComponentTable,
    kind: PhaseKind,
    mole_frac: &DVector<f64>,
    temp: f64,
    pres: f64,
) -> Result<f64, PhaseError> {
    match kind {
        PhaseKind::Liquid | PhaseKind::Solid => {
            Ok(components.mixture_mass_density(mole_frac, temp)?)
        }
        PhaseKind::Vapor => Ok(components.ideal_gas_density(mole_frac, temp, pres)),
    }
}
