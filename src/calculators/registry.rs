//! Feature registry
//!
//! Init-only catalog of calculators and their parameter grids. The registry
//! is validated eagerly when built and never mutated afterwards, so it is
//! shared read-only across extraction workers without synchronization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::calculators::{
    ArCoefficient, Autocorrelation, BinnedEntropy, C3, Calculator, CalculatorKind,
    CountAboveMean, CountBelowMean, FeatureKey, FftCoefficient, FirstLocationOfMaximum,
    Kurtosis, LargeStandardDeviation, Length, LinearTrend, LongestStrikeAboveMean, Maximum,
    Mean, MeanAbsChange, Median, Minimum, NumberPeaks, ParamBinding, Quantile, RangeCount,
    Skewness, StandardDeviation, SumValues, TimeReversalAsymmetryStatistic, ValueCount,
    Variance, AbsEnergy,
};
use crate::error::{Result, TsfeatError};

/// Static description of one registered calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatorDescriptor {
    pub name: String,
    pub kind: CalculatorKind,
    /// Declared parameter grid; finite and enumerable without execution
    pub grid: Vec<ParamBinding>,
}

/// Catalog of calculators with their active parameter grids
pub struct FeatureRegistry {
    /// Sorted by calculator name for deterministic enumeration
    entries: Vec<(Arc<dyn Calculator>, Vec<ParamBinding>)>,
    index: HashMap<&'static str, usize>,
}

/// Cheap order and moment statistics, enough for quick first-pass runs
const MINIMAL_NAMES: [&str; 8] = [
    "length",
    "maximum",
    "mean",
    "median",
    "minimum",
    "standard_deviation",
    "sum_values",
    "variance",
];

fn builtin_calculators() -> Vec<Arc<dyn Calculator>> {
    vec![
        Arc::new(AbsEnergy),
        Arc::new(ArCoefficient),
        Arc::new(Autocorrelation),
        Arc::new(BinnedEntropy),
        Arc::new(C3),
        Arc::new(CountAboveMean),
        Arc::new(CountBelowMean),
        Arc::new(FftCoefficient),
        Arc::new(FirstLocationOfMaximum),
        Arc::new(Kurtosis),
        Arc::new(LargeStandardDeviation),
        Arc::new(Length),
        Arc::new(LinearTrend),
        Arc::new(LongestStrikeAboveMean),
        Arc::new(Maximum),
        Arc::new(Mean),
        Arc::new(MeanAbsChange),
        Arc::new(Median),
        Arc::new(Minimum),
        Arc::new(NumberPeaks),
        Arc::new(Quantile),
        Arc::new(RangeCount),
        Arc::new(Skewness),
        Arc::new(StandardDeviation),
        Arc::new(SumValues),
        Arc::new(TimeReversalAsymmetryStatistic),
        Arc::new(ValueCount),
        Arc::new(Variance),
    ]
}

static GLOBAL: OnceLock<FeatureRegistry> = OnceLock::new();

impl FeatureRegistry {
    /// Build a registry from calculators with their default grids
    ///
    /// Every default binding is validated here, so an invalid parameter
    /// domain fails at load time rather than mid-extraction.
    pub fn from_calculators(calculators: Vec<Arc<dyn Calculator>>) -> Result<Self> {
        let mut entries: Vec<(Arc<dyn Calculator>, Vec<ParamBinding>)> = Vec::new();
        for calc in calculators {
            let grid = calc.default_grid();
            if grid.is_empty() {
                return Err(TsfeatError::ConfigError(format!(
                    "calculator '{}' declares an empty parameter grid",
                    calc.name()
                )));
            }
            for binding in &grid {
                calc.validate(binding).map_err(|e| {
                    TsfeatError::ConfigError(format!(
                        "calculator '{}', binding [{}]: {}",
                        calc.name(),
                        binding.canonical(),
                        e
                    ))
                })?;
            }
            entries.push((calc, grid));
        }

        entries.sort_by(|a, b| a.0.name().cmp(b.0.name()));

        let mut index = HashMap::new();
        for (i, (calc, _)) in entries.iter().enumerate() {
            if index.insert(calc.name(), i).is_some() {
                return Err(TsfeatError::ConfigError(format!(
                    "duplicate calculator name '{}'",
                    calc.name()
                )));
            }
        }

        Ok(Self { entries, index })
    }

    /// All built-in calculators with their full default grids
    pub fn comprehensive() -> Result<Self> {
        Self::from_calculators(builtin_calculators())
    }

    /// Cheap subset for quick runs
    pub fn minimal() -> Result<Self> {
        Self::comprehensive()?.subset(&MINIMAL_NAMES)
    }

    /// Process-wide comprehensive registry, initialized on first use
    pub fn global() -> &'static FeatureRegistry {
        GLOBAL.get_or_init(|| {
            Self::comprehensive().expect("built-in calculator grids are valid")
        })
    }

    /// Restrict to a named subset of calculators
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let i = self.lookup(name.as_ref())?;
            let (calc, grid) = &self.entries[i];
            entries.push((Arc::clone(calc), grid.clone()));
        }
        entries.sort_by(|a, b| a.0.name().cmp(b.0.name()));

        let mut index = HashMap::new();
        for (i, (calc, _)) in entries.iter().enumerate() {
            if index.insert(calc.name(), i).is_some() {
                return Err(TsfeatError::ConfigError(format!(
                    "duplicate calculator name '{}'",
                    calc.name()
                )));
            }
        }
        Ok(Self { entries, index })
    }

    /// Replace parameter grids for named calculators
    ///
    /// Overriding bindings are validated eagerly; an unknown calculator or an
    /// out-of-domain binding is a `ConfigError` before any scheduling begins.
    pub fn with_overrides(&self, overrides: &HashMap<String, Vec<ParamBinding>>) -> Result<Self> {
        for name in overrides.keys() {
            self.lookup(name)?;
        }

        let mut entries = Vec::with_capacity(self.entries.len());
        for (calc, grid) in &self.entries {
            let grid = match overrides.get(calc.name()) {
                Some(replacement) => {
                    if replacement.is_empty() {
                        return Err(TsfeatError::ConfigError(format!(
                            "override for '{}' is an empty grid",
                            calc.name()
                        )));
                    }
                    for binding in replacement {
                        calc.validate(binding).map_err(|e| {
                            TsfeatError::ConfigError(format!(
                                "override for '{}', binding [{}]: {}",
                                calc.name(),
                                binding.canonical(),
                                e
                            ))
                        })?;
                    }
                    replacement.clone()
                }
                None => grid.clone(),
            };
            entries.push((Arc::clone(calc), grid));
        }

        let index = self.index.clone();
        Ok(Self { entries, index })
    }

    /// Rebuild a narrowed registry from canonical column names
    ///
    /// The inverse of feature naming: each column name resolves against this
    /// catalog, its parameter binding is reconstructed from the name, and
    /// the result is a subset registry whose grids hold exactly the
    /// reconstructed bindings. Combiner component labels are dropped, since
    /// one binding produces every component. Unknown calculators and
    /// malformed or out-of-domain bindings are `ConfigError`s.
    pub fn from_column_names<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureRegistry> {
        if names.is_empty() {
            return Err(TsfeatError::ConfigError(
                "no feature column names given".to_string(),
            ));
        }

        let mut grids: HashMap<String, Vec<ParamBinding>> = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let calculator = name.split("__").next().unwrap_or("");
            let calc = self.get(calculator)?;
            let parsed = FeatureKey::parse(name, calc.kind())?;
            let grid = grids.entry(parsed.calculator).or_default();
            if !grid.contains(&parsed.binding) {
                grid.push(parsed.binding);
            }
        }

        let calculators: Vec<&String> = grids.keys().collect();
        self.subset(&calculators)?.with_overrides(&grids)
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            TsfeatError::ConfigError(format!("unknown calculator name '{}'", name))
        })
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Calculator>> {
        Ok(&self.entries[self.lookup(name)?].0)
    }

    /// Active grid for one calculator
    pub fn grid(&self, name: &str) -> Result<&[ParamBinding]> {
        Ok(&self.entries[self.lookup(name)?].1)
    }

    /// Iterate calculators with their active grids, ordered by name
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<dyn Calculator>, &[ParamBinding])> {
        self.entries.iter().map(|(c, g)| (c, g.as_slice()))
    }

    /// Ordered descriptors for every registered calculator
    pub fn descriptors(&self) -> Vec<CalculatorDescriptor> {
        self.entries
            .iter()
            .map(|(calc, grid)| CalculatorDescriptor {
                name: calc.name().to_string(),
                kind: calc.kind(),
                grid: grid.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
