//! Combiner calculators
//!
//! A combiner produces an ordered set of labeled components from one
//! parameter binding. The shared intermediate state (the DFT pass, the
//! regression fit, the Levinson-Durbin recursion) is computed once per
//! execution instead of once per output column.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::calculators::{CalcOutput, Calculator, CalculatorKind, ParamBinding, ParamValue};
use crate::error::{Result, TsfeatError};

fn domain_error(reason: String) -> TsfeatError {
    TsfeatError::ConfigError(reason)
}

/// Number of DFT coefficients reported per attribute
const FFT_COEFFICIENTS: usize = 10;

/// Discrete Fourier coefficients of the series
///
/// One binding selects the reported attribute (real, imag, abs or angle in
/// degrees); the components are the first coefficients `coeff_0` ..
/// `coeff_9` (fewer when the series is shorter). The transform itself is
/// computed once per execution and shared across coefficients.
pub struct FftCoefficient;

const FFT_ATTRS: [&str; 4] = ["real", "imag", "abs", "angle"];

impl Calculator for FftCoefficient {
    fn name(&self) -> &'static str {
        "fft_coefficient"
    }

    fn kind(&self) -> CalculatorKind {
        CalculatorKind::Combiner
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        FFT_ATTRS
            .iter()
            .map(|&attr| ParamBinding::single("attr", ParamValue::Text(attr.to_string())))
            .collect()
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let attr = binding.get_text("attr")?;
        if !FFT_ATTRS.contains(&attr) {
            return Err(domain_error(format!(
                "attr must be one of real/imag/abs/angle, got '{}'",
                attr
            )));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let attr = binding.get_text("attr")?;
        let n = values.len();
        let n_coeffs = FFT_COEFFICIENTS.min(n);

        let mut components = Vec::with_capacity(n_coeffs);
        for k in 0..n_coeffs {
            let mut re = 0.0;
            let mut im = 0.0;
            for (t, &x) in values.iter().enumerate() {
                let angle = -2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
                re += x * angle.cos();
                im += x * angle.sin();
            }
            let value = match attr {
                "real" => re,
                "imag" => im,
                "abs" => (re * re + im * im).sqrt(),
                // degrees, matching numpy's angle(x, deg=True)
                _ => im.atan2(re).to_degrees(),
            };
            components.push((format!("coeff_{}", k), value));
        }

        Ok(CalcOutput::Components(components))
    }
}

/// Ordinary least-squares trend over the sample index
///
/// Single empty binding; one fit yields the components `slope`, `intercept`,
/// `rvalue`, `pvalue` (two-sided t-test on the slope) and `stderr`.
pub struct LinearTrend;

impl Calculator for LinearTrend {
    fn name(&self) -> &'static str {
        "linear_trend"
    }

    fn kind(&self) -> CalculatorKind {
        CalculatorKind::Combiner
    }

    fn compute(&self, values: &[f64], _binding: &ParamBinding) -> Result<CalcOutput> {
        let n = values.len();
        if n < 3 {
            return Err(domain_error("requires at least 3 values".to_string()));
        }
        let nf = n as f64;

        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / nf;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (t, &y) in values.iter().enumerate() {
            let dx = t as f64 - x_mean;
            let dy = y - y_mean;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let (slope, intercept, rvalue, pvalue, stderr) = if syy == 0.0 {
            // constant series: flat trend, no evidence either way
            (0.0, y_mean, 0.0, 1.0, 0.0)
        } else {
            let slope = sxy / sxx;
            let intercept = y_mean - slope * x_mean;
            let rvalue = sxy / (sxx * syy).sqrt();
            let df = nf - 2.0;
            let residual_ss = syy - slope * sxy;
            let stderr = (residual_ss / df / sxx).sqrt();
            let pvalue = if stderr == 0.0 {
                // exact linear relationship
                0.0
            } else {
                let t_stat = slope / stderr;
                let dist = StudentsT::new(0.0, 1.0, df)
                    .map_err(|e| domain_error(format!("t-distribution: {}", e)))?;
                (2.0 * (1.0 - dist.cdf(t_stat.abs()))).clamp(0.0, 1.0)
            };
            (slope, intercept, rvalue, pvalue, stderr)
        };

        Ok(CalcOutput::Components(vec![
            ("slope".to_string(), slope),
            ("intercept".to_string(), intercept),
            ("rvalue".to_string(), rvalue),
            ("pvalue".to_string(), pvalue),
            ("stderr".to_string(), stderr),
        ]))
    }
}

/// Autoregressive model coefficients via Levinson-Durbin
///
/// One binding fixes the model order `k`; the recursion runs once and the
/// components are the fitted coefficients `coeff_1` .. `coeff_k`.
pub struct ArCoefficient;

impl Calculator for ArCoefficient {
    fn name(&self) -> &'static str {
        "ar_coefficient"
    }

    fn kind(&self) -> CalculatorKind {
        CalculatorKind::Combiner
    }

    fn default_grid(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::single("k", ParamValue::Int(4))]
    }

    fn validate(&self, binding: &ParamBinding) -> Result<()> {
        let k = binding.get_int("k")?;
        if k < 1 {
            return Err(domain_error(format!("k must be at least 1, got {}", k)));
        }
        Ok(())
    }

    fn compute(&self, values: &[f64], binding: &ParamBinding) -> Result<CalcOutput> {
        let k = binding.get_int("k")? as usize;
        let n = values.len();
        if n <= k {
            return Err(domain_error(format!(
                "order {} requires more than {} values, got {}",
                k, k, n
            )));
        }

        let mean = values.iter().sum::<f64>() / n as f64;
        // biased autocovariances of the demeaned series
        let mut acov = vec![0.0; k + 1];
        for (lag, slot) in acov.iter_mut().enumerate() {
            *slot = (0..n - lag)
                .map(|t| (values[t] - mean) * (values[t + lag] - mean))
                .sum::<f64>()
                / n as f64;
        }
        if acov[0] == 0.0 {
            return Err(domain_error(
                "AR coefficients undefined for constant series".to_string(),
            ));
        }

        // Levinson-Durbin recursion
        let mut phi = vec![0.0; k + 1];
        let mut prev = vec![0.0; k + 1];
        let mut error = acov[0];
        for order in 1..=k {
            let mut acc = acov[order];
            for j in 1..order {
                acc -= prev[j] * acov[order - j];
            }
            let reflection = acc / error;
            phi[order] = reflection;
            for j in 1..order {
                phi[j] = prev[j] - reflection * prev[order - j];
            }
            error *= 1.0 - reflection * reflection;
            if error <= 0.0 {
                return Err(domain_error(format!(
                    "prediction error vanished at order {}",
                    order
                )));
            }
            prev[..=order].copy_from_slice(&phi[..=order]);
        }

        let components = (1..=k)
            .map(|j| (format!("coeff_{}", j), phi[j]))
            .collect();
        Ok(CalcOutput::Components(components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::execute;

    fn components(
        calc: &dyn Calculator,
        values: &[f64],
        binding: &ParamBinding,
    ) -> Vec<(String, f64)> {
        match execute(calc, values, binding).unwrap() {
            CalcOutput::Components(c) => c,
            other => panic!("expected components, got {:?}", other),
        }
    }

    #[test]
    fn test_fft_coefficient_zero_is_sum() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let binding = ParamBinding::single("attr", ParamValue::Text("real".into()));
        let comps = components(&FftCoefficient, &values, &binding);
        assert_eq!(comps[0].0, "coeff_0");
        assert!((comps[0].1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_fft_of_pure_cosine() {
        // cos(2*pi*t/8) concentrates in coefficient 1 with abs = n/2
        let n = 8;
        let values: Vec<f64> = (0..n)
            .map(|t| (2.0 * std::f64::consts::PI * t as f64 / n as f64).cos())
            .collect();
        let binding = ParamBinding::single("attr", ParamValue::Text("abs".into()));
        let comps = components(&FftCoefficient, &values, &binding);
        assert!((comps[1].1 - 4.0).abs() < 1e-9, "got {}", comps[1].1);
        assert!(comps[2].1.abs() < 1e-9);
    }

    #[test]
    fn test_linear_trend_exact_line() {
        let values: Vec<f64> = (0..10).map(|t| 2.0 * t as f64 + 1.0).collect();
        let comps = components(&LinearTrend, &values, &ParamBinding::empty());
        let by_name = |name: &str| comps.iter().find(|(n, _)| n == name).unwrap().1;

        assert!((by_name("slope") - 2.0).abs() < 1e-9);
        assert!((by_name("intercept") - 1.0).abs() < 1e-9);
        assert!((by_name("rvalue") - 1.0).abs() < 1e-9);
        assert!(by_name("pvalue") < 1e-9);
    }

    #[test]
    fn test_linear_trend_constant_series() {
        let values = [5.0; 10];
        let comps = components(&LinearTrend, &values, &ParamBinding::empty());
        let by_name = |name: &str| comps.iter().find(|(n, _)| n == name).unwrap().1;

        assert_eq!(by_name("slope"), 0.0);
        assert_eq!(by_name("intercept"), 5.0);
        assert_eq!(by_name("pvalue"), 1.0);
    }

    #[test]
    fn test_ar_coefficient_recovers_ar1() {
        // impulse response of AR(1) with phi = 0.5; the lag-1 coefficient of
        // the biased autocovariance estimate converges to phi
        let values: Vec<f64> = (0..200).map(|t| 0.5_f64.powi(t)).collect();
        let binding = ParamBinding::single("k", ParamValue::Int(1));
        let comps = components(&ArCoefficient, &values, &binding);
        assert_eq!(comps.len(), 1);
        assert!((comps[0].1 - 0.5).abs() < 0.15, "got {}", comps[0].1);
    }

    #[test]
    fn test_ar_coefficient_rejects_short_series() {
        let binding = ParamBinding::single("k", ParamValue::Int(4));
        assert!(execute(&ArCoefficient, &[1.0, 2.0], &binding).is_err());
    }
}
