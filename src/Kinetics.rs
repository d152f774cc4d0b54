//! # Kinetics Module
//!
//! Reaction-network description and evaluation: parse chemical equations,
//! build the stoichiometric data structures and map a phase state to
//! per-species generation rates.
//!
//! ## Main Structures
//!
//! - **`StoichAnalyzer`**: parses reaction equations ("A + 2*B => 3*C") and
//!   produces the signed stoichiometry matrix and the matrix of concentration
//!   powers of the kinetic function. As a rule the concentration powers
//!   coincide with the reagent stoichiometric coefficients; for empirical
//!   reactions they may differ and can be overridden on the engine.
//! - **`KineticsEngine`**: ordered reactions + stoichiometry + rate laws,
//!   aligned to the canonical species order of a `ComponentTable`; evaluates
//!   r_j = k_j(T)*prod( c_i^order ) and the net generation g = S^T*r both
//!   numerically and symbolically. Immutable after construction.
//! - **`RateConstant`**: constant or Arrhenius k(T) = A*T^n*exp(-E/(R*T)),
//!   with matching numeric and symbolic forms.

#[allow(non_snake_case)]
pub mod KineticsEngine;
pub mod stoichiometry_analyzer;
