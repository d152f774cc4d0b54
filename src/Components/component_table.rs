use crate::Components::property_models::{
    CorrelationModel, PropertyCorrelation, PropertyEvaluationError,
};
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Universal gas constant in J/(mol·K)
pub const R_G: f64 = 8.314;
/// Reference temperature for sensible enthalpy in K
pub const T_REF: f64 = 298.15;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComponentError {
    #[error("component '{0}' appears more than once in the species list")]
    DuplicateComponent(String),
    #[error("component table must contain at least one species")]
    NoComponents,
    #[error("component '{0}' not found in the table")]
    UnknownComponent(String),
    #[error("molar mass of component '{0}' must be positive, got {1}")]
    NonPositiveMolarMass(String, f64),
}

/// Data record of one chemical species: identity, molar mass and the property
/// correlations the balance layer needs (density, heat capacity, formation enthalpy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    /// Molar mass (g/mol)
    pub molar_mass: f64,
    /// Mass density correlation (kg/m3), used for liquid and solid phases
    pub density: CorrelationModel,
    /// Molar heat capacity correlation (J/mol/K)
    pub heat_capacity: CorrelationModel,
    /// Standard formation enthalpy (J/mol), zero if not provided
    #[serde(default)]
    pub formation_enthalpy: f64,
}

/// THE STRUCT ComponentTable IS THE REGISTRY OF CHEMICAL SPECIES FOR A SIMULATION CASE.
///
/// The insertion order of the species is the canonical index order: every
/// composition vector, generation vector and packed state vector elsewhere in
/// the crate is aligned against it. The order is fixed at construction and
/// never mutated afterwards, so the table can be shared read-only between
/// phases, kinetics and concurrently solving reactor models.
#[derive(Debug, Clone)]
pub struct ComponentTable {
    vec_of_components: Vec<String>,
    map_of_components: HashMap<String, ComponentRecord>,
}

impl ComponentTable {
    /// Build the table from records; insertion order of `records` becomes the
    /// canonical species order
    pub fn from_records(records: Vec<ComponentRecord>) -> Result<Self, ComponentError> {
        if records.is_empty() {
            return Err(ComponentError::NoComponents);
        }
        let mut vec_of_components = Vec::with_capacity(records.len());
        let mut map_of_components = HashMap::with_capacity(records.len());
        for record in records {
            if map_of_components.contains_key(&record.name) {
                return Err(ComponentError::DuplicateComponent(record.name));
            }
            if record.molar_mass <= 0.0 || !record.molar_mass.is_finite() {
                return Err(ComponentError::NonPositiveMolarMass(
                    record.name,
                    record.molar_mass,
                ));
            }
            vec_of_components.push(record.name.clone());
            map_of_components.insert(record.name.clone(), record);
        }
        info!(
            "component table created with {} species: {:?}",
            vec_of_components.len(),
            vec_of_components
        );
        Ok(Self {
            vec_of_components,
            map_of_components,
        })
    }

    pub fn len(&self) -> usize {
        self.vec_of_components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec_of_components.is_empty()
    }

    /// Species names in canonical index order
    pub fn names(&self) -> &[String] {
        &self.vec_of_components
    }

    pub fn index_of(&self, name: &str) -> Result<usize, ComponentError> {
        self.vec_of_components
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))
    }

    pub fn record(&self, name: &str) -> Result<&ComponentRecord, ComponentError> {
        self.map_of_components
            .get(name)
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))
    }

    fn record_by_index(&self, i: usize) -> &ComponentRecord {
        &self.map_of_components[&self.vec_of_components[i]]
    }

    /// Molar masses (g/mol) aligned to canonical order
    pub fn molar_masses(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.vec_of_components
                .iter()
                .map(|name| self.map_of_components[name].molar_mass),
        )
    }

    pub fn component_density(
        &self,
        i: usize,
        temperature: f64,
    ) -> Result<f64, PropertyEvaluationError> {
        self.record_by_index(i).density.evaluate("density", temperature)
    }

    pub fn component_heat_capacity(
        &self,
        i: usize,
        temperature: f64,
    ) -> Result<f64, PropertyEvaluationError> {
        self.record_by_index(i)
            .heat_capacity
            .evaluate("heat_capacity", temperature)
    }

    ///////////////////////////////MIXTURE CLOSURES//////////////////////////////////////

    /// Mean molar mass of a mixture (g/mol): M = sum_i( x_i*M_i )
    pub fn mixture_molar_mass(&self, mole_frac: &DVector<f64>) -> f64 {
        let mut mean_mass = 0.0;
        for (i, x_i) in mole_frac.iter().enumerate() {
            mean_mass += x_i * self.record_by_index(i).molar_mass;
        }
        mean_mass
    }

    /// Mass density of a liquid/solid mixture (kg/m3) by ideal volume additivity:
    /// 1/ro = sum_i( w_i/ro_i ) where w_i are mass fractions
    pub fn mixture_mass_density(
        &self,
        mole_frac: &DVector<f64>,
        temperature: f64,
    ) -> Result<f64, PropertyEvaluationError> {
        let mean_mass = self.mixture_molar_mass(mole_frac);
        let mut inv_density = 0.0;
        for (i, x_i) in mole_frac.iter().enumerate() {
            let record = self.record_by_index(i);
            let w_i = x_i * record.molar_mass / mean_mass;
            if w_i == 0.0 {
                continue;
            }
            let ro_i = record.density.evaluate("density", temperature)?;
            inv_density += w_i / ro_i;
        }
        Ok(1.0 / inv_density)
    }

    /// Ideal gas mass density (kg/m3): ro = P*M/(R*T), M in kg/mol
    pub fn ideal_gas_density(&self, mole_frac: &DVector<f64>, temperature: f64, pressure: f64) -> f64 {
        let mean_mass = self.mixture_molar_mass(mole_frac) / 1000.0;
        mean_mass * pressure / (R_G * temperature)
    }

    /// Molar heat capacity of a mixture (J/mol/K): Cp = sum_i( x_i*Cp_i(T) )
    pub fn mixture_molar_heat_capacity(
        &self,
        mole_frac: &DVector<f64>,
        temperature: f64,
    ) -> Result<f64, PropertyEvaluationError> {
        let mut cp = 0.0;
        for (i, x_i) in mole_frac.iter().enumerate() {
            if *x_i == 0.0 {
                continue;
            }
            cp += x_i
                * self
                    .record_by_index(i)
                    .heat_capacity
                    .evaluate("heat_capacity", temperature)?;
        }
        Ok(cp)
    }

    /// Molar enthalpy of a mixture (J/mol) relative to the elements at T_REF:
    /// h = sum_i( x_i*( dHf_i + Cp_i(T)*(T - T_REF) ) )
    pub fn mixture_enthalpy(
        &self,
        mole_frac: &DVector<f64>,
        temperature: f64,
    ) -> Result<f64, PropertyEvaluationError> {
        let mut h = 0.0;
        for (i, x_i) in mole_frac.iter().enumerate() {
            if *x_i == 0.0 {
                continue;
            }
            let record = self.record_by_index(i);
            let cp_i = record.heat_capacity.evaluate("heat_capacity", temperature)?;
            h += x_i * (record.formation_enthalpy + cp_i * (temperature - T_REF));
        }
        Ok(h)
    }
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Components::property_models::ConstantModel;
    use approx::assert_relative_eq;

    fn record(name: &str, molar_mass: f64, density: f64, cp: f64) -> ComponentRecord {
        ComponentRecord {
            name: name.to_string(),
            molar_mass,
            density: CorrelationModel::Constant(ConstantModel::new(density)),
            heat_capacity: CorrelationModel::Constant(ConstantModel::new(cp)),
            formation_enthalpy: 0.0,
        }
    }

    #[test]
    fn test_canonical_order_is_insertion_order() {
        let table = ComponentTable::from_records(vec![
            record("B", 40.0, 900.0, 100.0),
            record("A", 20.0, 800.0, 80.0),
        ])
        .unwrap();
        assert_eq!(table.names(), &["B".to_string(), "A".to_string()]);
        assert_eq!(table.index_of("A").unwrap(), 1);
        assert_eq!(table.molar_masses(), DVector::from_vec(vec![40.0, 20.0]));
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let result = ComponentTable::from_records(vec![
            record("A", 20.0, 800.0, 80.0),
            record("A", 30.0, 900.0, 90.0),
        ]);
        match result {
            Err(ComponentError::DuplicateComponent(name)) => assert_eq!(name, "A"),
            _ => panic!("Expected DuplicateComponent error"),
        }
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            ComponentTable::from_records(vec![]),
            Err(ComponentError::NoComponents)
        ));
    }

    #[test]
    fn test_mixture_molar_mass() {
        let table = ComponentTable::from_records(vec![
            record("A", 20.0, 800.0, 80.0),
            record("B", 40.0, 900.0, 100.0),
        ])
        .unwrap();
        let x = DVector::from_vec(vec![0.5, 0.5]);
        assert_relative_eq!(table.mixture_molar_mass(&x), 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mixture_mass_density_pure_component() {
        let table = ComponentTable::from_records(vec![
            record("A", 20.0, 800.0, 80.0),
            record("B", 40.0, 900.0, 100.0),
        ])
        .unwrap();
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let ro = table.mixture_mass_density(&x, 298.15).unwrap();
        assert_relative_eq!(ro, 800.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ideal_gas_density() {
        let table = ComponentTable::from_records(vec![record("N2", 28.0, 1.0, 29.1)]).unwrap();
        let x = DVector::from_vec(vec![1.0]);
        let ro = table.ideal_gas_density(&x, 298.15, 101325.0);
        // 0.028*101325/(8.314*298.15) = 1.145 kg/m3
        assert_relative_eq!(ro, 1.1448, epsilon = 1e-3);
    }

    #[test]
    fn test_mixture_enthalpy_sensible_part() {
        let table = ComponentTable::from_records(vec![record("A", 20.0, 800.0, 80.0)]).unwrap();
        let x = DVector::from_vec(vec![1.0]);
        let h = table.mixture_enthalpy(&x, T_REF + 10.0).unwrap();
        assert_relative_eq!(h, 800.0, epsilon = 1e-9);
    }
}
