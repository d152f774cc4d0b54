//! # Phases Module
//!
//! Material holdup and material flow for one physical state (liquid, solid,
//! vapor) at a point in the process.
//!
//! ## Main Structures
//!
//! - **`PhaseState`**: mutable material holdup - normalized composition,
//!   temperature, pressure and the three holdup measures (mass, volume, moles)
//!   kept consistent through the density/molar-mass closure
//! - **`StreamState`**: a `PhaseState` plus a signed volumetric or molar flow
//!   rate, representing material crossing a boundary per unit time
//! - **`PhaseConfig`**: explicit construction options
//!   {composition, temp, pres, size, check_input}
//!
//! ## Degenerate inputs
//!
//! A phase whose mass, volume and moles are all zero is a valid object: it is
//! flagged `zero_holdup` and carries a structured construction diagnostic
//! instead of failing, so a flowsheet can be assembled before material is
//! charged. Zero and negative stream flows are representable and never raise
//! at construction.

#[allow(non_snake_case)]
pub mod PhaseState;
#[allow(non_snake_case)]
pub mod StreamState;
