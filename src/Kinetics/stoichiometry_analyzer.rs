use crate::Kinetics::KineticsEngine::KineticsError;
use regex::Regex;
use std::collections::HashMap;

/// One parsed chemical equation: signed participation split into reagent and
/// product coefficient maps. Coefficients are written as "2*B" or "2B";
/// a bare species name means coefficient 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReaction {
    pub equation: String,
    pub reagents: HashMap<String, f64>,
    pub products: HashMap<String, f64>,
}

/// Parse a reaction equation like "A + 2*B => 3*C" (separator "=>" or "=")
pub fn parse_reaction_equation(equation: &str) -> Result<ParsedReaction, KineticsError> {
    let (lhs, rhs) = if let Some((l, r)) = equation.split_once("=>") {
        (l, r)
    } else if let Some((l, r)) = equation.split_once('=') {
        (l, r)
    } else {
        return Err(KineticsError::MalformedEquation(format!(
            "no '=>' or '=' separator in '{}'",
            equation
        )));
    };

    let reagents = parse_side(lhs, equation)?;
    let products = parse_side(rhs, equation)?;
    if reagents.is_empty() || products.is_empty() {
        return Err(KineticsError::MalformedEquation(format!(
            "empty reaction side in '{}'",
            equation
        )));
    }
    Ok(ParsedReaction {
        equation: equation.to_string(),
        reagents,
        products,
    })
}

fn parse_side(side: &str, equation: &str) -> Result<HashMap<String, f64>, KineticsError> {
    // coefficient (optional, "2", "0.5", with or without '*') followed by a species name
    let term_re = Regex::new(r"^(?:(\d+(?:\.\d+)?)\s*\*?\s*)?([A-Za-z][A-Za-z0-9_()]*)$")
        .expect("term regex is valid");
    let mut coefficients: HashMap<String, f64> = HashMap::new();
    for term in side.split('+') {
        let term = term.trim();
        if term.is_empty() {
            return Err(KineticsError::MalformedEquation(format!(
                "empty term in '{}'",
                equation
            )));
        }
        let captures = term_re.captures(term).ok_or_else(|| {
            KineticsError::MalformedEquation(format!(
                "cannot parse term '{}' in '{}'",
                term, equation
            ))
        })?;
        let coeff = match captures.get(1) {
            Some(c) => c.as_str().parse::<f64>().map_err(|_| {
                KineticsError::MalformedEquation(format!(
                    "bad coefficient in term '{}' of '{}'",
                    term, equation
                ))
            })?,
            None => 1.0,
        };
        let species = captures[2].to_string();
        // the same species may appear twice on a side; coefficients add up
        *coefficients.entry(species).or_insert(0.0) += coeff;
    }
    Ok(coefficients)
}

/// Collects parsed reactions and produces the stoichiometric data structures:
/// the signed stoichiometry matrix (reactions x species, negative = consumed)
/// and the matrix of concentration powers for the kinetic function. As a rule
/// the concentration powers coincide with the reagent coefficients (law of
/// mass action); for empirical reactions they may be overridden on the engine.
#[derive(Debug, Clone, Default)]
pub struct StoichAnalyzer {
    pub reactions: Vec<ParsedReaction>,
}

impl StoichAnalyzer {
    pub fn new() -> Self {
        Self {
            reactions: Vec::new(),
        }
    }

    pub fn add_equation(&mut self, equation: &str) -> Result<(), KineticsError> {
        let parsed = parse_reaction_equation(equation)?;
        self.reactions.push(parsed);
        Ok(())
    }

    /// Union of all species referenced by the reactions, in first-appearance order
    pub fn search_substances(&self) -> Vec<String> {
        let mut substances: Vec<String> = Vec::new();
        for reaction in &self.reactions {
            for side in [&reaction.reagents, &reaction.products] {
                let mut names: Vec<&String> = side.keys().collect();
                names.sort();
                for name in names {
                    if !substances.contains(name) {
                        substances.push(name.clone());
                    }
                }
            }
        }
        substances
    }

    /// Signed stoichiometry matrix aligned to `species_order`
    /// (products positive, reagents negative). A species referenced by a
    /// reaction but absent from `species_order` is an error.
    pub fn stoich_matrix(&self, species_order: &[String]) -> Result<Vec<Vec<f64>>, KineticsError> {
        let mut matrix = Vec::with_capacity(self.reactions.len());
        for reaction in &self.reactions {
            let mut row = vec![0.0; species_order.len()];
            for (species, coeff) in &reaction.reagents {
                let i = index_of(species_order, species, &reaction.equation)?;
                row[i] -= coeff;
            }
            for (species, coeff) in &reaction.products {
                let i = index_of(species_order, species, &reaction.equation)?;
                row[i] += coeff;
            }
            matrix.push(row);
        }
        Ok(matrix)
    }

    /// Concentration powers of the kinetic function aligned to `species_order`:
    /// default = reagent coefficients
    pub fn reagent_orders(&self, species_order: &[String]) -> Result<Vec<Vec<f64>>, KineticsError> {
        let mut matrix = Vec::with_capacity(self.reactions.len());
        for reaction in &self.reactions {
            let mut row = vec![0.0; species_order.len()];
            for (species, coeff) in &reaction.reagents {
                let i = index_of(species_order, species, &reaction.equation)?;
                row[i] += coeff;
            }
            matrix.push(row);
        }
        Ok(matrix)
    }

    /// Per-reaction mass imbalance sum_i( nu_ij*M_i ) in g/mol. Zero for a
    /// mass-consistent reaction; nonzero values flag lumped/empirical equations
    pub fn mass_imbalance(
        &self,
        species_order: &[String],
        molar_masses: &[f64],
    ) -> Result<Vec<f64>, KineticsError> {
        let matrix = self.stoich_matrix(species_order)?;
        Ok(matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(molar_masses.iter())
                    .map(|(nu, m)| nu * m)
                    .sum()
            })
            .collect())
    }
}

fn index_of(
    species_order: &[String],
    species: &str,
    equation: &str,
) -> Result<usize, KineticsError> {
    species_order
        .iter()
        .position(|s| s == species)
        .ok_or_else(|| KineticsError::UnknownSpecies {
            species: species.to_string(),
            equation: equation.to_string(),
        })
}

/////////////////////////////////////////TESTS/////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_equation() {
        let parsed = parse_reaction_equation("A=>B").unwrap();
        assert_eq!(parsed.reagents.get("A"), Some(&1.0));
        assert_eq!(parsed.products.get("B"), Some(&1.0));
    }

    #[test]
    fn test_parse_with_coefficients() {
        let parsed = parse_reaction_equation("A + 2*B => 3*C").unwrap();
        assert_eq!(parsed.reagents.get("A"), Some(&1.0));
        assert_eq!(parsed.reagents.get("B"), Some(&2.0));
        assert_eq!(parsed.products.get("C"), Some(&3.0));
    }

    #[test]
    fn test_parse_bare_integer_prefix() {
        let parsed = parse_reaction_equation("2H2 + O2 => 2H2O").unwrap();
        assert_eq!(parsed.reagents.get("H2"), Some(&2.0));
        assert_eq!(parsed.reagents.get("O2"), Some(&1.0));
        assert_eq!(parsed.products.get("H2O"), Some(&2.0));
    }

    #[test]
    fn test_parse_equals_separator() {
        let parsed = parse_reaction_equation("B = A + C").unwrap();
        assert_eq!(parsed.reagents.len(), 1);
        assert_eq!(parsed.products.len(), 2);
    }

    #[test]
    fn test_malformed_equation_rejected() {
        assert!(parse_reaction_equation("A + B").is_err());
        assert!(parse_reaction_equation("A + => B").is_err());
        assert!(parse_reaction_equation("=> B").is_err());
        assert!(parse_reaction_equation("A => 2*").is_err());
    }

    #[test]
    fn test_stoich_matrix_signs() {
        let mut analyzer = StoichAnalyzer::new();
        analyzer.add_equation("A + 2*B => 3*C").unwrap();
        let order = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let matrix = analyzer.stoich_matrix(&order).unwrap();
        assert_eq!(matrix, vec![vec![-1.0, -2.0, 3.0]]);
    }

    #[test]
    fn test_reagent_orders_default_to_coefficients() {
        let mut analyzer = StoichAnalyzer::new();
        analyzer.add_equation("A + 2*B => 3*C").unwrap();
        let order = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let powers = analyzer.reagent_orders(&order).unwrap();
        assert_eq!(powers, vec![vec![1.0, 2.0, 0.0]]);
    }

    #[test]
    fn test_unknown_species_rejected() {
        let mut analyzer = StoichAnalyzer::new();
        analyzer.add_equation("A => D").unwrap();
        let order = vec!["A".to_string(), "B".to_string()];
        match analyzer.stoich_matrix(&order) {
            Err(KineticsError::UnknownSpecies { species, .. }) => assert_eq!(species, "D"),
            _ => panic!("Expected UnknownSpecies error"),
        }
    }

    #[test]
    fn test_mass_imbalance() {
        let mut analyzer = StoichAnalyzer::new();
        // isomerization: balanced
        analyzer.add_equation("A=>B").unwrap();
        // lumped: not balanced
        analyzer.add_equation("A=>C").unwrap();
        let order = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let imbalance = analyzer
            .mass_imbalance(&order, &[92.14, 92.14, 46.07])
            .unwrap();
        assert!(imbalance[0].abs() < 1e-12);
        assert!((imbalance[1] - (46.07 - 92.14)).abs() < 1e-9);
    }

    #[test]
    fn test_search_substances_first_appearance_order() {
        let mut analyzer = StoichAnalyzer::new();
        analyzer.add_equation("B=>A").unwrap();
        analyzer.add_equation("A=>C").unwrap();
        let substances = analyzer.search_substances();
        assert_eq!(substances[0], "B");
        assert!(substances.contains(&"A".to_string()));
        assert!(substances.contains(&"C".to_string()));
        assert_eq!(substances.len(), 3);
    }
}
