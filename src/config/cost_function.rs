//! Cost-function descriptions and the registry they are resolved from.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, Result,
    config::read_yaml,
    types::{ParamValue, ParameterSubset},
};

/// Contents of a `cost_functions/{name}.yaml` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDetails {
    /// Name the planning library knows the function by, when it differs
    /// from the file name.
    #[serde(default)]
    pub cost_function_name: Option<String>,
    pub cost_parameter_args: Vec<String>,
    /// Display names for the arguments, in argument order.
    #[serde(default)]
    pub cost_parameter_names: Vec<String>,
    #[serde(default)]
    pub latex_mapping: BTreeMap<String, String>,
    /// The value at which each nestable parameter switches its term off.
    #[serde(default)]
    pub constant_values: BTreeMap<String, ParamValue>,
    /// Held-constant subset (comma-joined names, `""` for none) -> model name.
    #[serde(default)]
    pub model_name: BTreeMap<ParameterSubset, String>,
    /// Environment parameters forwarded to the planning library.
    #[serde(default)]
    pub env_params: BTreeMap<String, serde_yaml::Value>,
}

/// A validated cost function: its arguments, constants, and the closed set
/// of nested models it declares.
#[derive(Debug, Clone, PartialEq)]
pub struct CostFunctionSpec {
    name: String,
    details: CostDetails,
}

impl CostFunctionSpec {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when a constant names an
    /// unknown argument, or a model-name rule holds constant a parameter
    /// without a constant value.
    pub fn new(name: impl Into<String>, details: CostDetails) -> Result<Self> {
        let name = name.into();
        if let Some(unknown) = details
            .constant_values
            .keys()
            .find(|key| !details.cost_parameter_args.contains(key))
        {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "cost function '{name}' has a constant value for '{unknown}', \
                     which is not one of its arguments"
                ),
            });
        }
        for subset in details.model_name.keys() {
            if let Some(unknown) = subset
                .iter()
                .find(|parameter| !details.constant_values.contains_key(*parameter))
            {
                return Err(Error::InvalidConfiguration {
                    message: format!(
                        "cost function '{name}' names model '{subset}', but '{unknown}' \
                         has no constant value"
                    ),
                });
            }
        }
        Ok(Self { name, details })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name to hand to the planning library.
    pub fn implementation_name(&self) -> &str {
        self.details
            .cost_function_name
            .as_deref()
            .unwrap_or(&self.name)
    }

    pub fn parameter_args(&self) -> &[String] {
        &self.details.cost_parameter_args
    }

    pub fn constant_values(&self) -> &BTreeMap<String, ParamValue> {
        &self.details.constant_values
    }

    /// Display name of the nested model holding `subset` constant, if the
    /// cost function declares one.
    pub fn model_name(&self, subset: &ParameterSubset) -> Option<&str> {
        self.details.model_name.get(subset).map(String::as_str)
    }

    pub fn model_names(&self) -> &BTreeMap<ParameterSubset, String> {
        &self.details.model_name
    }

    /// LaTeX rendering of a parameter, falling back to its name.
    pub fn latex_name<'a>(&'a self, parameter: &'a str) -> &'a str {
        self.details
            .latex_mapping
            .get(parameter)
            .map_or(parameter, String::as_str)
    }

    pub fn details(&self) -> &CostDetails {
        &self.details
    }
}

/// Declared cost-function names, resolved once at load time.
#[derive(Debug, Clone, Default)]
pub struct CostFunctionRegistry {
    specs: BTreeMap<String, CostFunctionSpec>,
}

impl CostFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: CostFunctionSpec) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    /// Read `{dir}/{name}.yaml` for every name.
    pub fn load<I, S>(dir: &Path, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            let path: PathBuf = dir.join(format!("{name}.yaml"));
            debug!(cost_function = name, path = %path.display(), "loading cost function");
            let details: CostDetails = read_yaml(&path)?;
            registry.register(CostFunctionSpec::new(name, details)?);
        }
        Ok(registry)
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownCostFunction`] for undeclared names.
    pub fn get(&self, name: &str) -> Result<&CostFunctionSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| Error::UnknownCostFunction {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CostFunctionSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR_DEPTH: &str = r#"
cost_parameter_args: [depth_cost_weight, static_cost_weight]
cost_parameter_names: ["Depth cost", "Static cost"]
latex_mapping:
  depth_cost_weight: "$\\lambda$"
constant_values:
  depth_cost_weight: 0
model_name:
  "": "Full"
  "depth_cost_weight": "No depth"
"#;

    #[test]
    fn parses_model_name_rules() {
        let details: CostDetails = serde_yaml::from_str(LINEAR_DEPTH).unwrap();
        let spec = CostFunctionSpec::new("linear_depth", details).unwrap();
        assert_eq!(spec.model_name(&ParameterSubset::empty()), Some("Full"));
        assert_eq!(
            spec.model_name(&["depth_cost_weight"].into_iter().collect()),
            Some("No depth")
        );
        assert_eq!(spec.latex_name("depth_cost_weight"), "$\\lambda$");
        assert_eq!(spec.latex_name("static_cost_weight"), "static_cost_weight");
        assert_eq!(spec.implementation_name(), "linear_depth");
    }

    #[test]
    fn model_rules_may_only_hold_nestable_parameters() {
        let mut details: CostDetails = serde_yaml::from_str(LINEAR_DEPTH).unwrap();
        details
            .model_name
            .insert(["static_cost_weight"].into_iter().collect(), "Bad".into());
        assert!(matches!(
            CostFunctionSpec::new("linear_depth", details),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn unknown_name_lists_the_registered_ones() {
        let details: CostDetails = serde_yaml::from_str(LINEAR_DEPTH).unwrap();
        let mut registry = CostFunctionRegistry::new();
        registry.register(CostFunctionSpec::new("linear_depth", details).unwrap());

        match registry.get("dist_depth") {
            Err(Error::UnknownCostFunction { name, known }) => {
                assert_eq!(name, "dist_depth");
                assert_eq!(known, "linear_depth");
            }
            other => panic!("expected UnknownCostFunction, got {other:?}"),
        }
    }
}
