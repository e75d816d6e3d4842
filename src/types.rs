//! Newtype wrappers for parameter values, parameterizations, and parameter subsets.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A single grid value for a cost or policy parameter.
///
/// Numbers cover the usual weights and temperatures; text covers categorical
/// parameters; `Null` is the placeholder used by baselines that ignore the
/// parameter entirely (the random policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Null,
}

impl ParamValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the value is categorical text.
    pub fn is_text(&self) -> bool {
        matches!(self, ParamValue::Text(_))
    }

    /// Whether the value is the null placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Rendering used inside canonical parameter strings.
    fn canonical_fragment(&self) -> String {
        match self {
            ParamValue::Number(value) => format!("{value:.2}"),
            ParamValue::Text(text) => text.clone(),
            ParamValue::Null => "None".to_string(),
        }
    }

    /// Rendering inside [`Parameters::encode`]: text is JSON-quoted so it
    /// never reads back as a number or `None`, and may contain `;` or `=`.
    fn encoded_fragment(&self) -> String {
        match self {
            ParamValue::Text(text) => serde_json::Value::String(text.clone()).to_string(),
            other => other.to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ParamValue::Null => 0,
            ParamValue::Number(_) => 1,
            ParamValue::Text(_) => 2,
        }
    }
}

fn normalized(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParamValue {}

impl PartialOrd for ParamValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParamValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ParamValue::Number(a), ParamValue::Number(b)) => {
                normalized(*a).total_cmp(&normalized(*b))
            }
            (ParamValue::Text(a), ParamValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            ParamValue::Number(value) => normalized(*value).to_bits().hash(state),
            ParamValue::Text(text) => text.hash(state),
            ParamValue::Null => {}
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(value) => write!(f, "{value}"),
            ParamValue::Text(text) => write!(f, "{text}"),
            ParamValue::Null => write!(f, "None"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(f64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl FromStr for ParamValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "None" {
            return Ok(ParamValue::Null);
        }
        Ok(trimmed
            .parse::<f64>()
            .map(ParamValue::Number)
            .unwrap_or_else(|_| ParamValue::Text(trimmed.to_string())))
    }
}

/// One point of the search grid: parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
    /// Create an empty parameterization.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Look up a value, failing if the parameter is absent.
    pub fn require(&self, name: &str) -> Result<&ParamValue> {
        self.0.get(name).ok_or_else(|| Error::MissingParameter {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Restrict to the given parameter names, failing on any that are absent.
    pub fn project<'a, I>(&self, names: I) -> Result<Parameters>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut projected = Parameters::new();
        for name in names {
            projected.insert(name.clone(), self.require(name)?.clone());
        }
        Ok(projected)
    }

    /// Canonical string keying action-value tables: values ordered by
    /// parameter name, numbers with two decimals, joined by `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::types::Parameters;
    ///
    /// let params = Parameters::new()
    ///     .with("static_cost_weight", 1.0)
    ///     .with("depth_cost_weight", 10.0);
    /// assert_eq!(params.param_string(), "10.00_1.00");
    /// ```
    pub fn param_string(&self) -> String {
        self.0
            .values()
            .map(ParamValue::canonical_fragment)
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Reversible `name=value;name=value` encoding used in tabular exports.
    ///
    /// Text values are written as JSON strings. Parameter names must not
    /// contain `;` or `=`.
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::types::Parameters;
    ///
    /// let params = Parameters::new().with("kind", "1").with("temp", 0.5);
    /// assert_eq!(params.encode(), r#"kind="1";temp=0.5"#);
    /// assert_eq!(params.encode().parse::<Parameters>()?, params);
    /// # Ok::<(), costometer::Error>(())
    /// ```
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={}", value.encoded_fragment()))
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn malformed_parameters(message: String) -> Error {
    Error::SerializationContext {
        operation: "decode parameters".to_string(),
        message,
    }
}

impl FromStr for Parameters {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut params = Parameters::new();
        let mut rest = s.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        while !rest.is_empty() {
            let (name, tail) = rest.split_once('=').ok_or_else(|| {
                malformed_parameters(format!("entry '{rest}' is not of the form name=value"))
            })?;
            let tail = tail.trim_start();

            let (value, tail) = if tail.starts_with('"') {
                let mut stream = serde_json::Deserializer::from_str(tail).into_iter::<String>();
                let text = stream
                    .next()
                    .ok_or_else(|| malformed_parameters(format!("'{name}' has no value")))??;
                let tail = tail[stream.byte_offset()..].trim_start();
                if !(tail.is_empty() || tail.starts_with(';')) {
                    return Err(malformed_parameters(format!(
                        "unexpected '{tail}' after quoted value of '{name}'"
                    )));
                }
                (ParamValue::Text(text), tail)
            } else {
                match tail.split_once(';') {
                    Some((value, tail)) => (value.parse()?, tail),
                    None => (tail.parse()?, ""),
                }
            };

            params.insert(name.trim(), value);
            rest = tail.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        }
        Ok(params)
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A set of parameter names, e.g. the parameters a nested model holds at
/// their constant value.
///
/// Written as the comma-joined sorted names (the empty set is `""`), which is
/// also its serialized form so it can key maps in any format.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterSubset(BTreeSet<String>);

impl ParameterSubset {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &ParameterSubset) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Copy of this subset with one more parameter.
    pub fn with(&self, name: &str) -> Self {
        let mut names = self.0.clone();
        names.insert(name.to_string());
        Self(names)
    }
}

impl<S: Into<String>> FromIterator<S> for ParameterSubset {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ParameterSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().cloned().collect::<Vec<_>>().join(",");
        write!(f, "{joined}")
    }
}

impl FromStr for ParameterSubset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

impl Serialize for ParameterSubset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParameterSubset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(ParamValue::Number(-0.0), ParamValue::Number(0.0));
    }

    #[test]
    fn null_sorts_before_numbers() {
        assert!(ParamValue::Null < ParamValue::Number(-5.0));
        assert!(ParamValue::Number(100.0) < ParamValue::Text("a".into()));
    }

    #[test]
    fn parameters_encoding_is_reversible() {
        let params = Parameters::new()
            .with("depth_cost_weight", 10.0)
            .with("temp", 0.5)
            .with("kind", "forward")
            .with("gamma", ParamValue::Null);
        let decoded: Parameters = params.encode().parse().unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn text_values_keep_their_type_through_encoding() {
        let params = Parameters::new()
            .with("level", "1")
            .with("label", "None")
            .with("path", "a=b;c \"d\"")
            .with("temp", 2.0);
        let decoded: Parameters = params.encode().parse().unwrap();
        assert_eq!(decoded, params);
        assert_eq!(decoded.get("level"), Some(&ParamValue::Text("1".into())));
        assert_eq!(decoded.get("label"), Some(&ParamValue::Text("None".into())));
    }

    #[test]
    fn unquoted_values_still_decode() {
        let decoded: Parameters = "depth_cost_weight=10; kind=forward;;gamma=None"
            .parse()
            .unwrap();
        assert_eq!(
            decoded,
            Parameters::new()
                .with("depth_cost_weight", 10.0)
                .with("kind", "forward")
                .with("gamma", ParamValue::Null)
        );
        assert!(r#"kind="open"x"#.parse::<Parameters>().is_err());
        assert!("temp".parse::<Parameters>().is_err());
    }

    #[test]
    fn subset_display_is_sorted_and_parses_back() {
        let subset: ParameterSubset = ["static_cost_weight", "depth_cost_weight"]
            .into_iter()
            .collect();
        assert_eq!(subset.to_string(), "depth_cost_weight,static_cost_weight");
        assert_eq!(subset.to_string().parse::<ParameterSubset>().unwrap(), subset);
        assert_eq!("".parse::<ParameterSubset>().unwrap(), ParameterSubset::empty());
    }

    #[test]
    fn param_value_deserializes_from_yaml_scalars() {
        let values: Vec<ParamValue> = serde_yaml::from_str("[1, 0.5, forward, ~]").unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Number(1.0),
                ParamValue::Number(0.5),
                ParamValue::Text("forward".into()),
                ParamValue::Null
            ]
        );
    }
}
