//! # Reactors Module
//!
//! Unit-operation integration: assemble the mass/energy balances of a reactor
//! into the form an external ODE/DAE integrator consumes, and drive the solve
//! through an explicit lifecycle state machine.
//!
//! ## Main Structures
//!
//! - **`BalanceAssembler`**: packs [species moles.., temperature] per spatial
//!   segment, builds the balance right-hand side as a pure function of the
//!   packed state - numerically (`rhs`/`residual`) and symbolically (the
//!   equation system handed to the integrator)
//! - **`ReactorModel`**: state machine
//!   unconfigured -> configured -> solving -> solved | failed, with validated
//!   configuration, trajectory materialization as (t, PhaseState) pairs and a
//!   post-solve balance audit
//! - **`SolverAdapter`**: thin translation to the external integrator
//!   (settings map, invocation, typed failure classification); no numerical
//!   method is implemented in this crate
//! - **`Utilities`**: cooling-water duty collaborator consumed by the energy
//!   balance as a pure function of temperature
//!
//! ## Model Assumptions
//!
//! Density, heat capacities and the mixture molar mass are constants evaluated
//! at the characteristic (feed) temperature; reaction rates keep their full
//! Arrhenius temperature dependence. Plug-flow units are a cascade of
//! equal-volume ideally mixed segments with no back-mixing (method of lines).

#[allow(non_snake_case)]
pub mod BalanceAssembler;
#[allow(non_snake_case)]
pub mod ReactorModel;
#[allow(non_snake_case)]
pub mod SolverAdapter;
#[allow(non_snake_case)]
pub mod Utilities;
mod reactor_tests;
