use crate::Phases::PhaseState::{PhaseError, PhaseState};
use log::debug;
use nalgebra::DVector;

/// Signed flow rate of a stream. Positive = into the downstream unit,
/// negative = reversed direction, zero = idle stream. All three are valid
/// at construction; rejecting reversed flow is a reactor-configuration
/// decision, not a stream invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowRate {
    /// m3/s
    Volumetric(f64),
    /// mol/s
    Molar(f64),
}

/// A flow-rate-tagged transient view of a phase: material crossing a boundary
/// per unit time. Streams connect unit operations or represent feeds and
/// products; once passed into a running integration step they are not mutated,
/// a new stream is produced per evaluation via [`StreamState::with_phase`].
#[derive(Debug, Clone)]
pub struct StreamState {
    pub phase: PhaseState,
    pub flow: FlowRate,
}

impl StreamState {
    pub fn create(phase: PhaseState, flow: FlowRate) -> StreamState {
        let signed = match flow {
            FlowRate::Volumetric(q) => q,
            FlowRate::Molar(n) => n,
        };
        if signed < 0.0 {
            debug!("stream created with reversed flow direction ({:?})", flow);
        }
        StreamState { phase, flow }
    }

    /// Total molar flow (mol/s), sign-consistent with the flow direction
    pub fn total_molar_flow(&self) -> f64 {
        match self.flow {
            FlowRate::Volumetric(q) => q * self.phase.total_molar_density(),
            FlowRate::Molar(n) => n,
        }
    }

    /// Per-species molar flows (mol/s) in canonical order: the primary quantity
    /// the balance assembler consumes. Sums to `flow x total molar density`
    /// for volumetric flow
    pub fn molar_flows(&self) -> DVector<f64> {
        &self.phase.mole_frac * self.total_molar_flow()
    }

    /// Volumetric flow (m3/s) derived from the phase density when the stream
    /// is molar-flow tagged
    pub fn vol_flow(&self) -> f64 {
        match self.flow {
            FlowRate::Volumetric(q) => q,
            FlowRate::Molar(n) => n * (self.phase.molar_mass / 1000.0) / self.phase.mass_density,
        }
    }

    /// Total mass flow (kg/s)
    pub fn mass_flow(&self) -> f64 {
        self.total_molar_flow() * self.phase.molar_mass / 1000.0
    }

    /// Per-species mass flows (kg/s) in canonical order
    pub fn mass_flows(&self) -> DVector<f64> {
        let molar_masses = self.phase.component_table().molar_masses();
        let molar_flows = self.molar_flows();
        DVector::from_iterator(
            molar_flows.len(),
            molar_flows
                .iter()
                .zip(molar_masses.iter())
                .map(|(n_dot, m)| n_dot * m / 1000.0),
        )
    }

    /// Convective energy flow (W): total molar flow times the mixture molar
    /// enthalpy at the stream composition and temperature
    pub fn energy_flow(&self) -> Result<f64, PhaseError> {
        Ok(self.total_molar_flow() * self.phase.molar_enthalpy()?)
    }

    /// Same flow tag over another phase: the per-evaluation outlet view used
    /// while an integration step is running
    pub fn with_phase(&self, phase: PhaseState) -> StreamState {
        StreamState {
            phase,
            flow: self.flow,
        }
    }
}
