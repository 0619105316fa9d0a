//! Feature calculators: registry, parameter grids, and the execution unit
//!
//! A calculator is a named, parameterized pure function of a series' values.
//! Scalar calculators return one number per parameter binding; combiner
//! calculators return an ordered set of labeled components per binding,
//! sharing intermediate state (an FFT pass, a regression fit) across the
//! components instead of recomputing it per output.

mod combiner;
mod registry;
mod scalar;

pub use combiner::{ArCoefficient, FftCoefficient, LinearTrend};
pub use registry::{CalculatorDescriptor, FeatureRegistry};
pub use scalar::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TsfeatError};

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // {:?} keeps the ".0" on whole floats, so float and int values
            // never collide in canonical names
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{:?}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// An ordered set of named parameter values
///
/// Order is declaration order from the parameter grid and is part of the
/// canonical serialization, so a binding always reproduces the same feature
/// column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamBinding(Vec<(String, ParamValue)>);

impl ParamBinding {
    /// The empty binding (parameterless calculators)
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn new(params: Vec<(&str, ParamValue)>) -> Self {
        Self(
            params
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Single-parameter convenience constructor
    pub fn single(name: &str, value: ParamValue) -> Self {
        Self::new(vec![(name, value)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> {
        self.0.iter()
    }

    fn get(&self, name: &str) -> Result<&ParamValue> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| TsfeatError::ConfigError(format!("missing parameter '{}'", name)))
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(TsfeatError::ConfigError(format!(
                "parameter '{}' should be an integer, got {}",
                name, other
            ))),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(TsfeatError::ConfigError(format!(
                "parameter '{}' should be a number, got {}",
                name, other
            ))),
        }
    }

    pub fn get_text(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(TsfeatError::ConfigError(format!(
                "parameter '{}' should be text, got {}",
                name, other
            ))),
        }
    }

    /// Canonical serialization: `name_value` pairs joined by `__`
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}_{}", name, value))
            .collect::<Vec<_>>()
            .join("__")
    }
}

/// Canonical identifier for one calculator + parameter binding output column
///
/// Format: `<calculator>__<p1>_<v1>__<p2>_<v2>[__<component>]`. Stable across
/// runs and human-reconstructable; table columns are ordered by this string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey(String);

impl FeatureKey {
    pub fn new(calculator: &str, binding: &ParamBinding) -> Self {
        if binding.is_empty() {
            Self(calculator.to_string())
        } else {
            Self(format!("{}__{}", calculator, binding.canonical()))
        }
    }

    /// Key for one component of a combiner output
    pub fn with_component(calculator: &str, binding: &ParamBinding, component: &str) -> Self {
        let base = Self::new(calculator, binding);
        Self(format!("{}__{}", base.0, component))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reverse the canonical naming: decompose a column name into its
    /// calculator, parameter binding, and (for combiners) component
    ///
    /// Parameter chunks split at their last underscore, so underscored
    /// parameter names (`max_bins_10`) and signed values (`min_-1.0`)
    /// round-trip. The calculator kind decides whether the trailing chunk
    /// is a component label or a parameter.
    pub fn parse(name: &str, kind: CalculatorKind) -> Result<ParsedKey> {
        let mut chunks = name.split("__");
        let calculator = chunks
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                TsfeatError::ConfigError(format!("empty feature column name '{}'", name))
            })?
            .to_string();
        let mut chunks: Vec<&str> = chunks.collect();

        let component = match kind {
            CalculatorKind::Scalar => None,
            CalculatorKind::Combiner => {
                let last = chunks.pop().ok_or_else(|| {
                    TsfeatError::ConfigError(format!(
                        "combiner column '{}' is missing its component label",
                        name
                    ))
                })?;
                Some(last.to_string())
            }
        };

        let mut params = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let (param, value) = chunk.rsplit_once('_').ok_or_else(|| {
                TsfeatError::ConfigError(format!(
                    "malformed parameter chunk '{}' in column '{}'",
                    chunk, name
                ))
            })?;
            if param.is_empty() || value.is_empty() {
                return Err(TsfeatError::ConfigError(format!(
                    "malformed parameter chunk '{}' in column '{}'",
                    chunk, name
                )));
            }
            params.push((param, parse_param_value(value)));
        }

        Ok(ParsedKey {
            calculator,
            binding: ParamBinding::new(params),
            component,
        })
    }
}

/// A feature key decomposed back into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedKey {
    pub calculator: String,
    pub binding: ParamBinding,
    pub component: Option<String>,
}

/// Typed parse of a serialized parameter value: bool, then integer (no
/// decimal point), then float, else text
fn parse_param_value(s: &str) -> ParamValue {
    match s {
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        _ => {}
    }
    if let Ok(v) = s.parse::<i64>() {
        return ParamValue::Int(v);
    }
    if let Ok(v) = s.parse::<f64>() {
        return ParamValue::Float(v);
    }
    ParamValue::Text(s.to_string())
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calculation kind of a calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculatorKind {
    /// One binding, one numeric output
    Scalar,
    /// One binding, an ordered sequence of labeled numeric components
    Combiner,
}

/// Output of a single calculator execution
#[derive(Debug, Clone, PartialEq)]
pub enum CalcOutput {
    Scalar(f64),
    Components(Vec<(String, f64)>),
}

/// A named, parameterized pure function of a series' values
///
/// Implementations must be deterministic in (values, parameters) and free of
/// side effects; the scheduler relies on this to share the registry across
/// workers without synchronization.
pub trait Calculator: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> CalculatorKind {
        CalculatorKind::Scalar
    }

    /// Declared parameter grid; finite, enumerable without execution
    fn default_grid(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::empty()]
    }

    /// Validate a binding against the calculator's parameter domain
    ///
    /// Length-dependent constraints (e.g. lag vs. series length) are checked
    /// at execution time instead; this hook covers everything knowable at
    /// registry load.
    fn validate(&self, _binding: &ParamBinding) -> Result<()> {
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput>;
}

/// Execute one calculator against one series' values (the execution unit)
///
/// Empty input, non-numeric values, and invalid parameter/length combinations
/// are reported as `CalculatorError`; the caller decides whether that aborts
/// (standalone use) or degrades to a sentinel cell (scheduled extraction).
pub fn execute(
    calculator: &dyn Calculator,
    values: &[f64],
    binding: &ParamBinding,
) -> Result<CalcOutput> {
    let fail = |reason: String| TsfeatError::CalculatorError {
        calculator: calculator.name().to_string(),
        parameters: binding.canonical(),
        reason,
    };

    if values.is_empty() {
        return Err(fail("empty input series".to_string()));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(fail(format!("non-numeric value at position {}", pos)));
    }

    let output = calculator.compute(values, binding).map_err(|e| match e {
        err @ TsfeatError::CalculatorError { .. } => err,
        other => fail(other.to_string()),
    })?;

    match (&output, calculator.kind()) {
        (CalcOutput::Scalar(_), CalculatorKind::Scalar) => Ok(output),
        (CalcOutput::Components(_), CalculatorKind::Combiner) => Ok(output),
        _ => Err(fail("output arity does not match declared kind".to_string())),
    }
}

/// Expand one execution result into (key, value) cells
pub fn expand_output(
    calculator: &dyn Calculator,
    binding: &ParamBinding,
    output: CalcOutput,
) -> Vec<(FeatureKey, f64)> {
    match output {
        CalcOutput::Scalar(value) => vec![(FeatureKey::new(calculator.name(), binding), value)],
        CalcOutput::Components(components) => components
            .into_iter()
            .map(|(label, value)| {
                (
                    FeatureKey::with_component(calculator.name(), binding, &label),
                    value,
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_binding() {
        let binding = ParamBinding::new(vec![
            ("lag", ParamValue::Int(3)),
            ("q", ParamValue::Float(0.1)),
        ]);
        assert_eq!(binding.canonical(), "lag_3__q_0.1");
    }

    #[test]
    fn test_float_formatting_keeps_decimal_point() {
        assert_eq!(ParamValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::Float(0.05).to_string(), "0.05");
        assert_eq!(ParamValue::Int(1).to_string(), "1");
    }

    #[test]
    fn test_feature_key_format() {
        let binding = ParamBinding::single("lag", ParamValue::Int(2));
        let key = FeatureKey::new("autocorrelation", &binding);
        assert_eq!(key.as_str(), "autocorrelation__lag_2");

        let key = FeatureKey::new("mean", &ParamBinding::empty());
        assert_eq!(key.as_str(), "mean");

        let key = FeatureKey::with_component("fft_coefficient", &ParamBinding::single("attr", ParamValue::Text("abs".into())), "coeff_3");
        assert_eq!(key.as_str(), "fft_coefficient__attr_abs__coeff_3");
    }

    #[test]
    fn test_parse_inverts_canonical_names() {
        let binding = ParamBinding::single("lag", ParamValue::Int(3));
        let key = FeatureKey::new("autocorrelation", &binding);
        let parsed = FeatureKey::parse(key.as_str(), CalculatorKind::Scalar).unwrap();
        assert_eq!(parsed.calculator, "autocorrelation");
        assert_eq!(parsed.binding, binding);
        assert_eq!(parsed.component, None);

        // underscored parameter names and signed float values round-trip
        let binding = ParamBinding::new(vec![
            ("min", ParamValue::Float(-1.0)),
            ("max", ParamValue::Float(1.0)),
        ]);
        let key = FeatureKey::new("range_count", &binding);
        let parsed = FeatureKey::parse(key.as_str(), CalculatorKind::Scalar).unwrap();
        assert_eq!(parsed.binding, binding);

        let parsed =
            FeatureKey::parse("binned_entropy__max_bins_10", CalculatorKind::Scalar).unwrap();
        assert_eq!(parsed.binding.get_int("max_bins").unwrap(), 10);

        let parsed = FeatureKey::parse("mean", CalculatorKind::Scalar).unwrap();
        assert!(parsed.binding.is_empty());
    }

    #[test]
    fn test_parse_combiner_components() {
        let parsed = FeatureKey::parse(
            "fft_coefficient__attr_abs__coeff_3",
            CalculatorKind::Combiner,
        )
        .unwrap();
        assert_eq!(parsed.calculator, "fft_coefficient");
        assert_eq!(parsed.binding.get_text("attr").unwrap(), "abs");
        assert_eq!(parsed.component.as_deref(), Some("coeff_3"));

        // empty-binding combiner: the only chunk is the component
        let parsed = FeatureKey::parse("linear_trend__slope", CalculatorKind::Combiner).unwrap();
        assert!(parsed.binding.is_empty());
        assert_eq!(parsed.component.as_deref(), Some("slope"));

        // a combiner column without any component label is malformed
        assert!(FeatureKey::parse("linear_trend", CalculatorKind::Combiner).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_chunks() {
        assert!(FeatureKey::parse("quantile__q", CalculatorKind::Scalar).is_err());
        assert!(FeatureKey::parse("quantile___0.5", CalculatorKind::Scalar).is_err());
    }

    #[test]
    fn test_parse_value_typing() {
        assert_eq!(parse_param_value("3"), ParamValue::Int(3));
        assert_eq!(parse_param_value("-1"), ParamValue::Int(-1));
        assert_eq!(parse_param_value("1.0"), ParamValue::Float(1.0));
        assert_eq!(parse_param_value("0.25"), ParamValue::Float(0.25));
        assert_eq!(parse_param_value("true"), ParamValue::Bool(true));
        assert_eq!(parse_param_value("abs"), ParamValue::Text("abs".to_string()));
    }

    #[test]
    fn test_execute_rejects_empty_and_non_finite() {
        let calc = Mean;
        let err = execute(&calc, &[], &ParamBinding::empty()).unwrap_err();
        assert!(err.to_string().contains("empty input"));

        let err = execute(&calc, &[1.0, f64::NAN], &ParamBinding::empty()).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }
}
