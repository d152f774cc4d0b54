//! # Components Module
//!
//! Registry of chemical species and their physical-property correlations.
//! This is the leaf dependency of the whole crate: phases, streams, kinetics
//! and reactors all index their composition vectors against the canonical
//! species order fixed here at construction time.
//!
//! ## Main Structures
//!
//! - **`ComponentTable`**: ordered, immutable species registry with mixture
//!   closures (mean molar mass, mass density, heat capacity, enthalpy)
//! - **`ComponentRecord`**: one species - name, molar mass, property correlations
//! - **`CorrelationModel`**: property correlation models (constant, polynomial)
//!   behind a common trait, with validity-range checking
//!
//! Property correlations are consumed as pure functions of state; evaluating a
//! fitted correlation outside its validity range is a `PropertyEvaluationError`,
//! never a silent extrapolation.

pub mod component_table;
pub mod property_models;
