use crate::Components::component_table::{ComponentError, ComponentRecord, ComponentTable};
use crate::Kinetics::KineticsEngine::RateConstant;
use log::info;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file '{0}' does not exist")]
    FileNotFound(String),
    #[error("failed to read file '{file}': {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },
    #[error("failed to parse input data file '{file}': {source}")]
    Json {
        file: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error("invalid defaults in input data file: {0}")]
    InvalidDefaults(String),
}

/// Optional case defaults carried by the input data file next to the species
/// records: a starting composition, temperature and pressure for phase and
/// stream construction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputDefaults {
    pub composition: Option<Vec<f64>>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
}

/// One reaction of the case: equation string, rate-law parameters and the
/// heat released per unit extent (J/mol, positive = exothermic)
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionInput {
    pub equation: String,
    pub rate: RateConstant,
    #[serde(default)]
    pub thermal_effect: f64,
}

#[derive(Debug, Deserialize)]
struct InputRecord {
    components: Vec<ComponentRecord>,
    #[serde(default)]
    reactions: Vec<ReactionInput>,
    #[serde(default)]
    default_composition: Option<Vec<f64>>,
    #[serde(default)]
    default_temperature: Option<f64>,
    #[serde(default)]
    default_pressure: Option<f64>,
}

/// Loader of the JSON input data record: species list with molar masses and
/// property-correlation parameters, plus optional case defaults. The file is
/// read-only; nothing in the crate ever writes it back.
pub struct LoadData {
    pub file_name: String,
}

impl LoadData {
    pub fn new(file_name: String) -> Self {
        LoadData { file_name }
    }

    pub fn load_component_table(&self) -> Result<(ComponentTable, InputDefaults), LoadError> {
        load_component_table(&self.file_name)
    }

    /// The reaction set of the case (empty if the file carries none)
    pub fn load_reactions(&self) -> Result<Vec<ReactionInput>, LoadError> {
        Ok(read_record(&self.file_name)?.reactions)
    }
}

fn read_record(file_name: &str) -> Result<InputRecord, LoadError> {
    let path = Path::new(file_name);
    if !path.exists() {
        return Err(LoadError::FileNotFound(file_name.to_string()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        file: file_name.to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Json {
        file: file_name.to_string(),
        source,
    })
}

/// Read the input data file and build the component table and case defaults
pub fn load_component_table(
    file_name: &str,
) -> Result<(ComponentTable, InputDefaults), LoadError> {
    let record = read_record(file_name)?;

    let n_components = record.components.len();
    let table = ComponentTable::from_records(record.components)?;

    if let Some(composition) = &record.default_composition {
        if composition.len() != n_components {
            return Err(LoadError::InvalidDefaults(format!(
                "default composition length {} does not match {} components",
                composition.len(),
                n_components
            )));
        }
    }
    if let Some(temperature) = record.default_temperature {
        if temperature <= 0.0 {
            return Err(LoadError::InvalidDefaults(format!(
                "default temperature {} must be positive",
                temperature
            )));
        }
    }

    info!(
        "input data file '{}' loaded: {} components",
        file_name,
        table.len()
    );
    Ok((
        table,
        InputDefaults {
            composition: record.default_composition,
            temperature: record.default_temperature,
            pressure: record.default_pressure,
        },
    ))
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_INPUT: &str = r#"{
        "components": [
            {"name": "A", "molar_mass": 92.14,
             "density": {"model": "constant", "value": 867.0},
             "heat_capacity": {"model": "constant", "value": 157.0}},
            {"name": "B", "molar_mass": 46.07,
             "density": {"model": "polynomial", "coeffs": [1000.0, -0.6], "temp_range": [250.0, 350.0]},
             "heat_capacity": {"model": "constant", "value": 112.0},
             "formation_enthalpy": -2500.0}
        ],
        "reactions": [
            {"equation": "A=>B",
             "rate": {"form": "arrhenius", "a": 1e6, "n": 0.0, "e": 40000.0},
             "thermal_effect": 52000.0}
        ],
        "default_composition": [1.0, 0.0],
        "default_temperature": 298.15,
        "default_pressure": 101325.0
    }"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_input_file() {
        let file = write_temp(VALID_INPUT);
        let (table, defaults) =
            load_component_table(file.path().to_str().unwrap()).unwrap();
        assert_eq!(table.names(), &["A".to_string(), "B".to_string()]);
        assert_eq!(defaults.composition, Some(vec![1.0, 0.0]));
        assert_eq!(defaults.temperature, Some(298.15));
        assert_eq!(defaults.pressure, Some(101325.0));
        // the polynomial correlation came through with its validity range
        assert!(table.component_density(1, 300.0).is_ok());
        assert!(table.component_density(1, 400.0).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_component_table("no_such_file.json"),
            Err(LoadError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let file = write_temp("{ not json");
        assert!(matches!(
            load_component_table(file.path().to_str().unwrap()),
            Err(LoadError::Json { .. })
        ));
    }

    #[test]
    fn test_empty_component_list_rejected() {
        let file = write_temp(r#"{"components": []}"#);
        assert!(matches!(
            load_component_table(file.path().to_str().unwrap()),
            Err(LoadError::Component(ComponentError::NoComponents))
        ));
    }

    #[test]
    fn test_default_composition_length_mismatch() {
        let file = write_temp(
            r#"{
            "components": [
                {"name": "A", "molar_mass": 92.14,
                 "density": {"model": "constant", "value": 867.0},
                 "heat_capacity": {"model": "constant", "value": 157.0}}
            ],
            "default_composition": [0.5, 0.5]
        }"#,
        );
        assert!(matches!(
            load_component_table(file.path().to_str().unwrap()),
            Err(LoadError::InvalidDefaults(_))
        ));
    }

    #[test]
    fn test_loaddata_struct_api() {
        let file = write_temp(VALID_INPUT);
        let loader = LoadData::new(file.path().to_str().unwrap().to_string());
        let (table, _) = loader.load_component_table().unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_load_reaction_set() {
        let file = write_temp(VALID_INPUT);
        let loader = LoadData::new(file.path().to_str().unwrap().to_string());
        let reactions = loader.load_reactions().unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].equation, "A=>B");
        assert_eq!(reactions[0].thermal_effect, 52000.0);
        match &reactions[0].rate {
            RateConstant::Arrhenius { a, n, e } => {
                assert_eq!(*a, 1e6);
                assert_eq!(*n, 0.0);
                assert_eq!(*e, 40000.0);
            }
            other => panic!("Expected Arrhenius rate constant, got {:?}", other),
        }
    }

    #[test]
    fn test_reactions_default_to_empty() {
        let file = write_temp(
            r#"{
            "components": [
                {"name": "A", "molar_mass": 92.14,
                 "density": {"model": "constant", "value": 867.0},
                 "heat_capacity": {"model": "constant", "value": 157.0}}
            ]
        }"#,
        );
        let loader = LoadData::new(file.path().to_str().unwrap().to_string());
        assert!(loader.load_reactions().unwrap().is_empty());
    }
}
