//! Multiple-testing correction
//!
//! Controls the expected false discovery rate across all simultaneously
//! tested features: Benjamini-Hochberg under independence / positive
//! dependence, Benjamini-Yekutieli under arbitrary dependence. Features
//! computed from the same series are not independent, so arbitrary
//! dependence is the safer default upstream.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TsfeatError};

/// Dependency structure assumed between the tested p-values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyAssumption {
    /// Independent or positively dependent tests (Benjamini-Hochberg)
    Independent,
    /// No assumption (Benjamini-Yekutieli)
    Arbitrary,
}

fn validate(pvalues: &[f64], alpha: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(TsfeatError::ConfigError(format!(
            "significance level must lie in [0, 1], got {}",
            alpha
        )));
    }
    for (i, &p) in pvalues.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(TsfeatError::ConfigError(format!(
                "p-value at index {} outside [0, 1]: {}",
                i, p
            )));
        }
    }
    Ok(())
}

/// Step-up selection: indices of all p-values at rank <= the largest k with
/// p_(k) <= k/m * effective_alpha
fn step_up(pvalues: &[f64], effective_alpha: f64) -> Vec<usize> {
    let m = pvalues.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        pvalues[a]
            .partial_cmp(&pvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut cutoff_rank = None;
    for (rank0, &idx) in order.iter().enumerate() {
        let k = (rank0 + 1) as f64;
        if pvalues[idx] <= k / m as f64 * effective_alpha {
            cutoff_rank = Some(rank0);
        }
    }

    let mut selected: Vec<usize> = match cutoff_rank {
        Some(rank0) => order[..=rank0].to_vec(),
        None => Vec::new(),
    };
    selected.sort_unstable();
    selected
}

/// Benjamini-Hochberg procedure at level `alpha`
pub fn benjamini_hochberg(pvalues: &[f64], alpha: f64) -> Result<Vec<usize>> {
    validate(pvalues, alpha)?;
    Ok(step_up(pvalues, alpha))
}

/// Benjamini-Yekutieli procedure at level `alpha`
///
/// BH with alpha deflated by the harmonic factor c(m) = sum_{i<=m} 1/i.
pub fn benjamini_yekutieli(pvalues: &[f64], alpha: f64) -> Result<Vec<usize>> {
    validate(pvalues, alpha)?;
    let m = pvalues.len();
    if m == 0 {
        return Ok(Vec::new());
    }
    let harmonic: f64 = (1..=m).map(|i| 1.0 / i as f64).sum();
    Ok(step_up(pvalues, alpha / harmonic))
}

/// Select feature indices under the configured dependency assumption
pub fn select(
    pvalues: &[f64],
    alpha: f64,
    assumption: DependencyAssumption,
) -> Result<Vec<usize>> {
    match assumption {
        DependencyAssumption::Independent => benjamini_hochberg(pvalues, alpha),
        DependencyAssumption::Arbitrary => benjamini_yekutieli(pvalues, alpha),
    }
}
