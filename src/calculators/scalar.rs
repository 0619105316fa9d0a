//! Scalar feature calculators
//!
//! Each calculator maps one series and one parameter binding to one numeric
//! value. Degenerate inputs follow a crate-wide rule: dispersion statistics
//! of a constant series are 0 (the documented degenerate value), while
//! undefined combinations (a lag not fitting into the series, too few values
//! for a moment estimate) are `CalculatorError`s, never silent NaN.

use crate::calculators::{CalcOutput, Calculator, ParamBinding, ParamValue};
use crate::error::{Result, TsfeatError};

fn domain_error(reason: String) -> TsfeatError {
    TsfeatError::ConfigError(reason)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (ddof = 0)
fn var_pop(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Quantile with linear interpolation between order statistics
fn quantile_interpolated(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Arithmetic mean
pub struct Mean;

impl Calculator for Mean {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(mean(values)))
    }
}

/// Median (linear interpolation for even length)
pub struct Median;

impl Calculator for Median {
    fn name(&self) -> &'static str {
        "median"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(quantile_interpolated(
            &sorted_copy(values),
            0.5,
        )))
    }
}

/// Population variance; 0 for a constant series
pub struct Variance;

impl Calculator for Variance {
    fn name(&self) -> &'static str {
        "variance"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(var_pop(values)))
    }
}

/// Population standard deviation; 0 for a constant series
pub struct StandardDeviation;

impl Calculator for StandardDeviation {
    fn name(&self) -> &'static str {
        "standard_deviation"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(var_pop(values).sqrt()))
    }
}

/// Smallest value
pub struct Minimum;

impl Calculator for Minimum {
    fn name(&self) -> &'static str {
        "minimum"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(
            values.iter().cloned().fold(f64::INFINITY, f64::min),
        ))
    }
}

/// Largest value
pub struct Maximum;

impl Calculator for Maximum {
    fn name(&self) -> &'static str {
        "maximum"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(
            values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ))
    }
}

/// Sum of all values
pub struct SumValues;

impl Calculator for SumValues {
    fn name(&self) -> &'static str {
        "sum_values"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(values.iter().sum()))
    }
}

/// Sum of squared values
pub struct AbsEnergy;

impl Calculator for AbsEnergy {
    fn name(&self) -> &'static str {
        "abs_energy"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(values.iter().map(|v| v * v).sum()))
    }
}

/// Series length
pub struct Length;

impl Calculator for Length {
    fn name(&self) -> &'static str {
        "length"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        Ok(CalcOutput::Scalar(values.len() as f64))
    }
}

/// Mean absolute first difference
pub struct MeanAbsChange;

impl Calculator for MeanAbsChange {
    fn name(&self) -> &'static str {
        "mean_abs_change"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        if values.len() < 2 {
            return Err(domain_error("requires at least 2 values".to_string()));
        }
        let sum: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        Ok(CalcOutput::Scalar(sum / (values.len() - 1) as f64))
    }
}

/// Bias-adjusted sample skewness (Fisher-Pearson G1); 0 for a constant series
pub struct Skewness;

impl Calculator for Skewness {
    fn name(&self) -> &'static str {
        "skewness"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let n = values.len() as f64;
        if values.len() < 3 {
            return Err(domain_error("requires at least 3 values".to_string()));
        }
        let m2 = central_moment(values, 2);
        if m2 == 0.0 {
            return Ok(CalcOutput::Scalar(0.0));
        }
        let g1 = central_moment(values, 3) / m2.powf(1.5);
        Ok(CalcOutput::Scalar(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)))
    }
}

/// Bias-adjusted excess kurtosis (G2); 0 for a constant series
pub struct Kurtosis;

impl Calculator for Kurtosis {
    fn name(&self) -> &'static str {
        "kurtosis"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let n = values.len() as f64;
        if values.len() < 4 {
            return Err(domain_error("requires at least 4 values".to_string()));
        }
        let m2 = central_moment(values, 2);
        if m2 == 0.0 {
            return Ok(CalcOutput::Scalar(0.0));
        }
        let g2 = central_moment(values, 4) / (m2 * m2) - 3.0;
        let adjusted = ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
        Ok(CalcOutput::Scalar(adjusted))
    }
}

/// Number of values above the series mean
pub struct CountAboveMean;

impl Calculator for CountAboveMean {
    fn name(&self) -> &'static str {
        "count_above_mean"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let m = mean(values);
        Ok(CalcOutput::Scalar(
            values.iter().filter(|&&v| v > m).count() as f64,
        ))
    }
}

/// Number of values below the series mean
pub struct CountBelowMean;

impl Calculator for CountBelowMean {
    fn name(&self) -> &'static str {
        "count_below_mean"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let m = mean(values);
        Ok(CalcOutput::Scalar(
            values.iter().filter(|&&v| v < m).count() as f64,
        ))
    }
}

/// Length of the longest run of consecutive values above the mean
pub struct LongestStrikeAboveMean;

impl Calculator for LongestStrikeAboveMean {
    fn name(&self) -> &'static str {
        "longest_strike_above_mean"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let m = mean(values);
        let mut longest = 0usize;
        let mut current = 0usize;
        for &v in values {
            if v > m {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        Ok(CalcOutput::Scalar(longest as f64))
    }
}

/// Relative first position of the maximum, in [0, 1)
pub struct FirstLocationOfMaximum;

impl Calculator for FirstLocationOfMaximum {
    fn name(&self) -> &'static str {
        "first_location_of_maximum"
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let mut best = 0usize;
        for (i, &v) in values.iter().enumerate() {
            if v > values[best] {
                best = i;
            }
        }
        Ok(CalcOutput::Scalar(best as f64 / values.len() as f64))
    }
}

/// Autocorrelation at a fixed lag
pub struct Autocorrelation;

impl Calculator for Autocorrelation {
    fn name(&self) -> &'static str {
        "autocorrelation"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        (0..10)
            .map(|lag| ParamBinding::single("lag", ParamValue::Int(lag)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let lag = binding.get_int("lag")?;
        if lag < 0 {
            return Err(domain_error(format!("lag must be non-negative, got {}", lag)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let lag = binding.get_int("lag")? as usize;
        let n = values.len();
        if lag >= n {
            return Err(domain_error(format!(
                "lag {} exceeds series length {}",
                lag, n
            )));
        }
        let variance = var_pop(values);
        if variance == 0.0 {
            return Err(domain_error(
                "autocorrelation undefined for constant series".to_string(),
            ));
        }
        let m = mean(values);
        let cov: f64 = (0..n - lag)
            .map(|t| (values[t] - m) * (values[t + lag] - m))
            .sum::<f64>()
            / (n - lag) as f64;
        Ok(CalcOutput::Scalar(cov / variance))
    }
}

/// Quantile of the value distribution
pub struct Quantile;

impl Calculator for Quantile {
    fn name(&self) -> &'static str {
        "quantile"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        [0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9]
            .iter()
            .map(|&q| ParamBinding::single("q", ParamValue::Float(q)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let q = binding.get_float("q")?;
        if !(0.0..=1.0).contains(&q) {
            return Err(domain_error(format!("q must lie in [0, 1], got {}", q)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let q = binding.get_float("q")?;
        Ok(CalcOutput::Scalar(quantile_interpolated(
            &sorted_copy(values),
            q,
        )))
    }
}

/// Number of peaks of at least support `n`
///
/// A value is a peak of support n when it is strictly larger than its n
/// neighbors on both sides.
pub struct NumberPeaks;

impl Calculator for NumberPeaks {
    fn name(&self) -> &'static str {
        "number_peaks"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        [1, 3, 5]
            .iter()
            .map(|&n| ParamBinding::single("n", ParamValue::Int(n)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let n = binding.get_int("n")?;
        if n < 1 {
            return Err(domain_error(format!("n must be at least 1, got {}", n)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let support = binding.get_int("n")? as usize;
        let len = values.len();
        if len < 2 * support + 1 {
            return Ok(CalcOutput::Scalar(0.0));
        }
        let mut peaks = 0usize;
        for i in support..len - support {
            let is_peak =
                (1..=support).all(|j| values[i] > values[i - j] && values[i] > values[i + j]);
            if is_peak {
                peaks += 1;
            }
        }
        Ok(CalcOutput::Scalar(peaks as f64))
    }
}

/// Entropy of the binned value distribution
pub struct BinnedEntropy;

impl Calculator for BinnedEntropy {
    fn name(&self) -> &'static str {
        "binned_entropy"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::single("max_bins", ParamValue::Int(10))]
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let bins = binding.get_int("max_bins")?;
        if bins < 1 {
            return Err(domain_error(format!(
                "max_bins must be at least 1, got {}",
                bins
            )));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let bins = binding.get_int("max_bins")? as usize;
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if hi == lo {
            // all mass in one bin
            return Ok(CalcOutput::Scalar(0.0));
        }
        let width = (hi - lo) / bins as f64;
        let mut counts = vec![0usize; bins];
        for &v in values {
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        let n = values.len() as f64;
        let entropy = counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum();
        Ok(CalcOutput::Scalar(entropy))
    }
}

/// Third-order nonlinearity measure: mean of x(t) * x(t+lag) * x(t+2*lag)
pub struct C3;

impl Calculator for C3 {
    fn name(&self) -> &'static str {
        "c3"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        (1..4)
            .map(|lag| ParamBinding::single("lag", ParamValue::Int(lag)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let lag = binding.get_int("lag")?;
        if lag < 1 {
            return Err(domain_error(format!("lag must be at least 1, got {}", lag)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let lag = binding.get_int("lag")? as usize;
        let n = values.len();
        if 2 * lag >= n {
            return Err(domain_error(format!(
                "lag {} does not fit twice into series length {}",
                lag, n
            )));
        }
        let sum: f64 = (0..n - 2 * lag)
            .map(|t| values[t] * values[t + lag] * values[t + 2 * lag])
            .sum();
        Ok(CalcOutput::Scalar(sum / (n - 2 * lag) as f64))
    }
}

/// Time reversal asymmetry statistic at a fixed lag
pub struct TimeReversalAsymmetryStatistic;

impl Calculator for TimeReversalAsymmetryStatistic {
    fn name(&self) -> &'static str {
        "time_reversal_asymmetry_statistic"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        (1..4)
            .map(|lag| ParamBinding::single("lag", ParamValue::Int(lag)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let lag = binding.get_int("lag")?;
        if lag < 1 {
            return Err(domain_error(format!("lag must be at least 1, got {}", lag)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let lag = binding.get_int("lag")? as usize;
        let n = values.len();
        if 2 * lag >= n {
            return Err(domain_error(format!(
                "lag {} does not fit twice into series length {}",
                lag, n
            )));
        }
        let sum: f64 = (0..n - 2 * lag)
            .map(|t| {
                let a = values[t + 2 * lag];
                let b = values[t + lag];
                let c = values[t];
                a * a * b - b * c * c
            })
            .sum();
        Ok(CalcOutput::Scalar(sum / (n - 2 * lag) as f64))
    }
}

/// 1.0 when the standard deviation exceeds r times the value range
pub struct LargeStandardDeviation;

impl Calculator for LargeStandardDeviation {
    fn name(&self) -> &'static str {
        "large_standard_deviation"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        (0..10)
            .map(|r| ParamBinding::single("r", ParamValue::Float(r as f64 * 0.05)))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let r = binding.get_float("r")?;
        if r < 0.0 {
            return Err(domain_error(format!("r must be non-negative, got {}", r)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let r = binding.get_float("r")?;
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let std = var_pop(values).sqrt();
        Ok(CalcOutput::Scalar(if std > r * (hi - lo) { 1.0 } else { 0.0 }))
    }
}

/// Number of occurrences of one exact value
pub struct ValueCount;

impl Calculator for ValueCount {
    fn name(&self) -> &'static str {
        "value_count"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        [0, 1, -1]
            .iter()
            .map(|&v| ParamBinding::single("value", ParamValue::Int(v)))
            .collect()
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let target = binding.get_float("value")?;
        Ok(CalcOutput::Scalar(
            values.iter().filter(|&&v| v == target).count() as f64,
        ))
    }
}

/// Number of values inside the half-open interval [min, max)
pub struct RangeCount;

impl Calculator for RangeCount {
    fn name(&self) -> &'static str {
        "range_count"
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::new(vec![
            ("min", ParamValue::Float(-1.0)),
            ("max", ParamValue::Float(1.0)),
        ])]
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let lo = binding.get_float("min")?;
        let hi = binding.get_float("max")?;
        if lo >= hi {
            return Err(domain_error(format!(
                "min {} must be below max {}",
                lo, hi
            )));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let lo = binding.get_float("min")?;
        let hi = binding.get_float("max")?;
        Ok(CalcOutput::Scalar(
            values.iter().filter(|&&v| v >= lo && v < hi).count() as f64,
        ))
    }
}
