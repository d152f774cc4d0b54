use RustedSciThe::symbolic::symbolic_engine::Expr;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PropertyEvaluationError {
    #[error("property '{property}' undefined at {temperature} K. Valid range: {range_low} - {range_high} K")]
    OutOfValidityRange {
        property: String,
        temperature: f64,
        range_low: f64,
        range_high: f64,
    },
    #[error("no '{property}' correlation defined for component '{component}'")]
    MissingCorrelation { property: String, component: String },
}

/// Common interface of all property correlation models: value at a temperature,
/// validity range and a symbolic rendering for equation assembly.
#[enum_dispatch]
pub trait PropertyCorrelation {
    fn evaluate(&self, property: &str, temperature: f64) -> Result<f64, PropertyEvaluationError>;
    fn valid_range(&self) -> Option<(f64, f64)>;
    fn to_expr(&self, temperature: Expr) -> Expr;
}

/// Temperature-independent property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantModel {
    pub value: f64,
}

impl ConstantModel {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl PropertyCorrelation for ConstantModel {
    fn evaluate(&self, _property: &str, _temperature: f64) -> Result<f64, PropertyEvaluationError> {
        Ok(self.value)
    }
    fn valid_range(&self) -> Option<(f64, f64)> {
        None
    }
    fn to_expr(&self, _temperature: Expr) -> Expr {
        Expr::Const(self.value)
    }
}

/// Polynomial in temperature: value = sum_k( coeffs[k]*T^k )
///
/// An optional validity range guards against extrapolating fitted coefficients;
/// evaluation outside the range is an error, not a silent extrapolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialModel {
    pub coeffs: Vec<f64>,
    pub temp_range: Option<(f64, f64)>,
}

impl PolynomialModel {
    pub fn new(coeffs: Vec<f64>, temp_range: Option<(f64, f64)>) -> Self {
        Self { coeffs, temp_range }
    }
}

impl PropertyCorrelation for PolynomialModel {
    fn evaluate(&self, property: &str, temperature: f64) -> Result<f64, PropertyEvaluationError> {
        if let Some((t_low, t_high)) = self.temp_range {
            if temperature < t_low || temperature > t_high {
                return Err(PropertyEvaluationError::OutOfValidityRange {
                    property: property.to_string(),
                    temperature,
                    range_low: t_low,
                    range_high: t_high,
                });
            }
        }
        // Horner scheme
        let mut value = 0.0;
        for coeff in self.coeffs.iter().rev() {
            value = value * temperature + coeff;
        }
        Ok(value)
    }
    fn valid_range(&self) -> Option<(f64, f64)> {
        self.temp_range
    }
    fn to_expr(&self, temperature: Expr) -> Expr {
        let mut value = Expr::Const(0.0);
        for coeff in self.coeffs.iter().rev() {
            value = value * temperature.clone() + Expr::Const(*coeff);
        }
        value
    }
}

/// Property correlation model attached to a component record. Deserialized from
/// the input data file as {"model": "constant", ...} or {"model": "polynomial", ...}
#[enum_dispatch(PropertyCorrelation)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum CorrelationModel {
    Constant(ConstantModel),
    Polynomial(PolynomialModel),
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////
