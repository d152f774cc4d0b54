//! Utility collaborators consumed by the energy balance. Pure functions of
//! the current reactor temperature and configured parameters - no state.

/// Heat capacity of cooling water (J/kg/K)
pub const CP_WATER: f64 = 4180.0;
/// Density of cooling water (kg/m3)
pub const RO_WATER: f64 = 997.0;

/// Cooling-water supply available to a jacketed unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoolingWater {
    /// m3/s
    pub vol_flow: f64,
    /// Supply temperature (K)
    pub temp_in: f64,
}

impl CoolingWater {
    /// Cooling water at the default supply temperature of 298.15 K
    pub fn new(vol_flow: f64) -> Self {
        Self {
            vol_flow,
            temp_in: 298.15,
        }
    }

    pub fn with_temp_in(mut self, temp_in: f64) -> Self {
        self.temp_in = temp_in;
        self
    }

    pub fn mass_flow(&self) -> f64 {
        self.vol_flow * RO_WATER
    }

    /// Achievable heat-exchange duty (W) for the available flow: the duty that
    /// heats the full water stream from supply to the reactor temperature
    pub fn max_duty(&self, reactor_temp: f64) -> f64 {
        self.mass_flow() * CP_WATER * (reactor_temp - self.temp_in)
    }
}

/// Jacket/coil exchange configuration: overall UA coefficient plus the
/// cooling-water supply behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatExchangeConfig {
    /// Overall heat transfer coefficient times area (W/K)
    pub ua: f64,
    pub cooling: CoolingWater,
}

impl HeatExchangeConfig {
    pub fn new(ua: f64, cooling: CoolingWater) -> Self {
        Self { ua, cooling }
    }

    /// Heat removed from the unit (W) at the given reactor temperature.
    /// Linear in T so the numeric and symbolic balance paths stay identical
    pub fn duty(&self, reactor_temp: f64) -> f64 {
        self.ua * (reactor_temp - self.cooling.temp_in)
    }
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cooling_water_defaults() {
        let cw = CoolingWater::new(100.0);
        assert_eq!(cw.temp_in, 298.15);
        assert_relative_eq!(cw.mass_flow(), 100.0 * RO_WATER, max_relative = 1e-12);
    }

    #[test]
    fn test_max_duty_sign() {
        let cw = CoolingWater::new(0.001);
        assert!(cw.max_duty(350.0) > 0.0);
        assert_eq!(cw.max_duty(cw.temp_in), 0.0);
        assert!(cw.max_duty(280.0) < 0.0);
    }

    #[test]
    fn test_exchange_duty_is_linear_in_temperature() {
        let hx = HeatExchangeConfig::new(50.0, CoolingWater::new(0.001));
        let d1 = hx.duty(320.0);
        let d2 = hx.duty(340.0);
        assert_relative_eq!(d2 - d1, 50.0 * 20.0, max_relative = 1e-12);
    }
}
