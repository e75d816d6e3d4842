//! Discrete parameter priors over the finite search grid.
//!
//! Every parameter of the grid carries a [`DiscretePrior`]: its candidate
//! values and their probabilities. Priors come either from a continuous
//! reference distribution evaluated at the grid points and renormalized
//! ([`get_temp_prior`]), or uniformly over the values actually observed in a
//! set of optimization results ([`add_cost_priors_to_temp_priors`]).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Exp, Gamma, LogNormal, Normal, Uniform};

use crate::{
    Error, Result,
    config::CostFunctionSpec,
    inference::OptimizationRow,
    types::{ParamValue, ParameterSubset, Parameters},
    utils::normalize_weights,
};

/// Tolerance for the sum-to-one check.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-9;

/// Name of the softmax temperature parameter.
pub const TEMPERATURE: &str = "temp";

/// Probability distribution over a finite list of parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretePrior {
    entries: Vec<(ParamValue, f64)>,
}

impl DiscretePrior {
    /// Pair values with probabilities.
    ///
    /// Normalization is checked separately by [`DiscretePrior::check_normalized`]
    /// so the failure can name the parameter.
    pub fn new(values: Vec<ParamValue>, probabilities: Vec<f64>) -> Result<Self> {
        if values.len() != probabilities.len() {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "prior has {} values but {} probabilities",
                    values.len(),
                    probabilities.len()
                ),
            });
        }
        Ok(Self {
            entries: values.into_iter().zip(probabilities).collect(),
        })
    }

    /// Equal mass on every value.
    pub fn uniform(values: Vec<ParamValue>) -> Self {
        let mass = if values.is_empty() {
            0.0
        } else {
            1.0 / values.len() as f64
        };
        Self {
            entries: values.into_iter().map(|value| (value, mass)).collect(),
        }
    }

    /// All mass on a single value (used for parameters a baseline ignores).
    pub fn point(value: ParamValue) -> Self {
        Self {
            entries: vec![(value, 1.0)],
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &ParamValue> {
        self.entries.iter().map(|(value, _)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn probability(&self, value: &ParamValue) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == value)
            .map(|(_, probability)| *probability)
    }

    pub fn log_probability(&self, value: &ParamValue) -> Option<f64> {
        self.probability(value).map(f64::ln)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, probability)| probability).sum()
    }

    /// # Errors
    ///
    /// Returns [`Error::PriorNotNormalized`] unless the probabilities sum to 1
    /// within [`NORMALIZATION_TOLERANCE`].
    pub fn check_normalized(&self, parameter: &str) -> Result<()> {
        let total = self.total();
        if (total - 1.0).abs() > NORMALIZATION_TOLERANCE || !total.is_finite() {
            return Err(Error::PriorNotNormalized {
                parameter: parameter.to_string(),
                total,
            });
        }
        Ok(())
    }
}

/// Priors for every parameter of one prior configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorSet(BTreeMap<String, DiscretePrior>);

impl PriorSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, parameter: impl Into<String>, prior: DiscretePrior) {
        self.0.insert(parameter.into(), prior);
    }

    pub fn get(&self, parameter: &str) -> Option<&DiscretePrior> {
        self.0.get(parameter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DiscretePrior)> {
        self.0.iter()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.0
            .iter()
            .try_for_each(|(parameter, prior)| prior.check_normalized(parameter))
    }

    /// Sum of `ln prior[param][value]` over every parameter of this set not in `skip`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParameter`] if `params` lacks a prior's parameter,
    /// [`Error::MissingPriorValue`] if its value has no mass in the prior.
    pub fn log_prior(&self, params: &Parameters, skip: &ParameterSubset) -> Result<f64> {
        let mut total = 0.0;
        for (parameter, prior) in &self.0 {
            if skip.contains(parameter) {
                continue;
            }
            let value = params.require(parameter)?;
            total += prior
                .log_probability(value)
                .ok_or_else(|| Error::MissingPriorValue {
                    parameter: parameter.clone(),
                    value: value.to_string(),
                })?;
        }
        Ok(total)
    }
}

impl FromIterator<(String, DiscretePrior)> for PriorSet {
    fn from_iter<T: IntoIterator<Item = (String, DiscretePrior)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Named prior configurations, e.g. `uniform` or `expon`.
pub type PriorCatalog = BTreeMap<String, PriorSet>;

/// Continuous reference distribution whose density shapes a discrete prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum ReferenceDistribution {
    Uniform { low: f64, high: f64 },
    Gamma { shape: f64, rate: f64 },
    LogNormal { location: f64, scale: f64 },
    Exponential { rate: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl ReferenceDistribution {
    /// Density at each point.
    pub fn densities(&self, points: &[f64]) -> Result<Vec<f64>> {
        fn invalid(err: impl std::fmt::Display) -> Error {
            Error::InvalidDistribution {
                message: err.to_string(),
            }
        }

        let pdf: Box<dyn Fn(f64) -> f64> = match *self {
            ReferenceDistribution::Uniform { low, high } => {
                let dist = Uniform::new(low, high).map_err(invalid)?;
                Box::new(move |x| dist.pdf(x))
            }
            ReferenceDistribution::Gamma { shape, rate } => {
                let dist = Gamma::new(shape, rate).map_err(invalid)?;
                Box::new(move |x| dist.pdf(x))
            }
            ReferenceDistribution::LogNormal { location, scale } => {
                let dist = LogNormal::new(location, scale).map_err(invalid)?;
                Box::new(move |x| dist.pdf(x))
            }
            ReferenceDistribution::Exponential { rate } => {
                let dist = Exp::new(rate).map_err(invalid)?;
                Box::new(move |x| dist.pdf(x))
            }
            ReferenceDistribution::Normal { mean, std_dev } => {
                let dist = Normal::new(mean, std_dev).map_err(invalid)?;
                Box::new(move |x| dist.pdf(x))
            }
        };
        Ok(points.iter().map(|&x| pdf(x)).collect())
    }
}

/// Map a continuous distribution onto a finite grid of candidate values.
///
/// With `inverse`, the density is read at `1 / value` for each candidate,
/// for parameters whose natural scale is an inverse rate (temperature as the
/// inverse of rationality). Probabilities are renormalized over the grid.
///
/// # Examples
///
/// ```
/// use costometer::priors::{ReferenceDistribution, get_temp_prior};
/// use costometer::types::ParamValue;
///
/// let rv = ReferenceDistribution::Exponential { rate: 1.0 };
/// let prior = get_temp_prior(&rv, &[0.5, 1.0, 2.0], false)?;
/// assert!((prior.total() - 1.0).abs() < 1e-12);
/// assert!(prior.probability(&ParamValue::Number(0.5)) > prior.probability(&ParamValue::Number(2.0)));
/// # Ok::<(), costometer::Error>(())
/// ```
pub fn get_temp_prior(
    rv: &ReferenceDistribution,
    candidate_values: &[f64],
    inverse: bool,
) -> Result<DiscretePrior> {
    let points: Vec<f64> = if inverse {
        candidate_values.iter().map(|value| 1.0 / value).collect()
    } else {
        candidate_values.to_vec()
    };

    let densities = rv.densities(&points)?;
    let normalizer: f64 = densities.iter().sum();
    let probabilities = normalize_weights(densities).ok_or_else(|| Error::InvalidDistribution {
        message: format!("density sums to {normalizer} over candidate values {candidate_values:?}"),
    })?;

    DiscretePrior::new(
        candidate_values
            .iter()
            .copied()
            .map(ParamValue::Number)
            .collect(),
        probabilities,
    )
}

/// A parameter prior with an explicit continuous shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedPrior {
    pub rv: ReferenceDistribution,
    #[serde(default)]
    pub inverse: bool,
}

/// Definition of one named prior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempPriorDetails {
    pub rv: ReferenceDistribution,
    pub possible_temps: Vec<f64>,
    #[serde(default = "default_inverse")]
    pub inverse: bool,
    /// Cost parameters that get a shaped prior instead of the uniform one.
    #[serde(default)]
    pub parameters: BTreeMap<String, ShapedPrior>,
}

fn default_inverse() -> bool {
    true
}

/// Build one [`PriorSet`] per named prior configuration.
///
/// Each set holds the temperature prior from [`get_temp_prior`] and a prior
/// for every cost parameter that has a constant value, plus
/// `additional_params`. Those are uniform over the distinct non-text values
/// found in `softmax_rows`, unless the configuration gives them a shape, in
/// which case the shape is evaluated at the same observed values.
///
/// # Errors
///
/// Returns [`Error::PriorNotNormalized`] if any resulting prior does not sum
/// to 1, e.g. because a parameter never appears in the rows.
pub fn add_cost_priors_to_temp_priors(
    softmax_rows: &[OptimizationRow],
    cost_spec: &CostFunctionSpec,
    temp_prior_details: &BTreeMap<String, TempPriorDetails>,
    additional_params: &[String],
) -> Result<PriorCatalog> {
    let mut catalog = PriorCatalog::new();

    for (prior_name, details) in temp_prior_details {
        let mut priors = PriorSet::new();
        priors.insert(
            TEMPERATURE,
            get_temp_prior(&details.rv, &details.possible_temps, details.inverse)?,
        );

        for parameter in cost_spec.constant_values().keys().chain(additional_params) {
            let observed: BTreeSet<ParamValue> = softmax_rows
                .iter()
                .filter_map(|row| row.params.get(parameter))
                .filter(|value| !value.is_text())
                .cloned()
                .collect();
            let observed: Vec<ParamValue> = observed.into_iter().collect();

            let prior = match details.parameters.get(parameter) {
                Some(shaped) => {
                    let numeric: Vec<f64> = observed.iter().filter_map(ParamValue::as_f64).collect();
                    get_temp_prior(&shaped.rv, &numeric, shaped.inverse)?
                }
                None => DiscretePrior::uniform(observed),
            };
            priors.insert(parameter.clone(), prior);
        }

        priors.validate()?;
        catalog.insert(prior_name.clone(), priors);
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_reads_density_at_reciprocal() {
        let rv = ReferenceDistribution::Exponential { rate: 1.0 };
        let direct = get_temp_prior(&rv, &[0.5, 2.0], false).unwrap();
        let inverse = get_temp_prior(&rv, &[2.0, 0.5], true).unwrap();
        let a = direct.probability(&ParamValue::Number(0.5)).unwrap();
        let b = inverse.probability(&ParamValue::Number(2.0)).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn zero_density_grid_is_rejected() {
        let rv = ReferenceDistribution::Uniform {
            low: 10.0,
            high: 20.0,
        };
        let err = get_temp_prior(&rv, &[1.0, 2.0], false).unwrap_err();
        assert!(matches!(err, Error::InvalidDistribution { .. }));
    }

    #[test]
    fn unnormalized_prior_is_rejected() {
        let prior = DiscretePrior::new(vec![1.0.into(), 2.0.into()], vec![0.3, 0.3]).unwrap();
        let err = prior.check_normalized("temp").unwrap_err();
        assert!(matches!(err, Error::PriorNotNormalized { .. }));
    }

    #[test]
    fn log_prior_skips_held_constant_parameters() {
        let mut priors = PriorSet::new();
        priors.insert("a", DiscretePrior::uniform(vec![0.0.into(), 1.0.into()]));
        priors.insert("b", DiscretePrior::uniform(vec![0.0.into(), 1.0.into()]));
        let params = Parameters::new().with("a", 1.0).with("b", 0.0);

        let full = priors.log_prior(&params, &ParameterSubset::empty()).unwrap();
        let nested = priors
            .log_prior(&params, &["b"].into_iter().collect())
            .unwrap();
        assert!((full - 2.0 * 0.5f64.ln()).abs() < 1e-12);
        assert!((nested - 0.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn log_prior_reports_values_outside_support() {
        let mut priors = PriorSet::new();
        priors.insert("a", DiscretePrior::uniform(vec![0.0.into()]));
        let params = Parameters::new().with("a", 3.0);
        let err = priors
            .log_prior(&params, &ParameterSubset::empty())
            .unwrap_err();
        assert!(matches!(err, Error::MissingPriorValue { .. }));
    }
}
