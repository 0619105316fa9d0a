//! Non-parametric hypothesis tests
//!
//! Rank-based tests used by the relevance tester, with the standard
//! large-sample approximations: Mann-Whitney U and Kruskal-Wallis with tie
//! correction, Kendall tau-b with the tie-adjusted variance of S. The
//! statistic-to-p-value step goes through `statrs` distributions.
//!
//! Degenerate inputs (no rank variance left after ties) are reported as
//! `StatisticalTestError`; the tester decides how to recover.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::{Result, TsfeatError};

fn degenerate(reason: &str) -> TsfeatError {
    TsfeatError::StatisticalTestError {
        feature: String::new(),
        reason: reason.to_string(),
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| degenerate(&format!("normal distribution: {}", e)))
}

/// 1-based average ranks plus tie group sizes
fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut tie_sizes = Vec::new();
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        tie_sizes.push(j - i + 1);
        i = j + 1;
    }
    (ranks, tie_sizes)
}

/// Two-sided Mann-Whitney U test (tie-corrected normal approximation with
/// continuity correction)
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<f64> {
    let n1 = x.len();
    let n2 = y.len();
    if n1 == 0 || n2 == 0 {
        return Err(degenerate("empty sample"));
    }

    let mut combined = Vec::with_capacity(n1 + n2);
    combined.extend_from_slice(x);
    combined.extend_from_slice(y);
    let n = (n1 + n2) as f64;
    let (ranks, tie_sizes) = average_ranks(&combined);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);

    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| (t * t * t - t) as f64)
        .sum::<f64>()
        / (n * (n - 1.0));
    let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term);
    if variance <= 0.0 {
        return Err(degenerate("all values tied, rank variance is zero"));
    }

    let mean = (n1 * n2) as f64 / 2.0;
    let z = (u - mean - 0.5) / variance.sqrt();
    let p = 2.0 * (1.0 - standard_normal()?.cdf(z));
    Ok(p.clamp(0.0, 1.0))
}

/// Two-sided Kendall tau-b test (tie-adjusted normal approximation)
///
/// Returns (tau_b, p_value).
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let n = x.len();
    if n != y.len() {
        return Err(degenerate("samples differ in length"));
    }
    if n < 2 {
        return Err(degenerate("fewer than 2 observations"));
    }

    let mut concordant = 0i64;
    let mut discordant = 0i64;
    for i in 0..n {
        for j in i + 1..n {
            let s = (x[i] - x[j]) * (y[i] - y[j]);
            if s > 0.0 {
                concordant += 1;
            } else if s < 0.0 {
                discordant += 1;
            }
        }
    }
    let s = (concordant - discordant) as f64;

    let (_, ties_x) = average_ranks(x);
    let (_, ties_y) = average_ranks(y);
    let nf = n as f64;
    let n0 = nf * (nf - 1.0) / 2.0;
    let t1: f64 = ties_x.iter().map(|&t| (t * (t - 1)) as f64 / 2.0).sum();
    let t2: f64 = ties_y.iter().map(|&t| (t * (t - 1)) as f64 / 2.0).sum();
    let denom = (n0 - t1) * (n0 - t2);
    if denom <= 0.0 {
        return Err(degenerate("a sample is entirely tied"));
    }
    let tau = s / denom.sqrt();

    let v0 = nf * (nf - 1.0) * (2.0 * nf + 5.0);
    let vt: f64 = ties_x
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * (t - 1.0) * (2.0 * t + 5.0)
        })
        .sum();
    let vu: f64 = ties_y
        .iter()
        .map(|&u| {
            let u = u as f64;
            u * (u - 1.0) * (2.0 * u + 5.0)
        })
        .sum();
    let sum_t1: f64 = ties_x.iter().map(|&t| (t * (t - 1)) as f64).sum();
    let sum_u1: f64 = ties_y.iter().map(|&u| (u * (u - 1)) as f64).sum();
    let sum_t2: f64 = ties_x.iter().map(|&t| (t * (t - 1) * t.saturating_sub(2)) as f64).sum();
    let sum_u2: f64 = ties_y.iter().map(|&u| (u * (u - 1) * u.saturating_sub(2)) as f64).sum();

    let v1 = sum_t1 * sum_u1 / (2.0 * nf * (nf - 1.0));
    let v2 = if n > 2 {
        sum_t2 * sum_u2 / (9.0 * nf * (nf - 1.0) * (nf - 2.0))
    } else {
        0.0
    };
    let var_s = (v0 - vt - vu) / 18.0 + v1 + v2;
    if var_s <= 0.0 {
        return Err(degenerate("variance of S is zero"));
    }

    let z = s / var_s.sqrt();
    let p = 2.0 * (1.0 - standard_normal()?.cdf(z.abs()));
    Ok((tau, p.clamp(0.0, 1.0)))
}

/// Kruskal-Wallis k-sample rank test (tie-corrected chi-squared approximation)
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<f64> {
    let k = groups.len();
    if k < 2 {
        return Err(degenerate("needs at least 2 groups"));
    }
    if groups.iter().any(|g| g.is_empty()) {
        return Err(degenerate("empty group"));
    }

    let combined: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = combined.len() as f64;
    let (ranks, tie_sizes) = average_ranks(&combined);

    let mut h = 0.0;
    let mut pos = 0;
    for group in groups {
        let r_sum: f64 = ranks[pos..pos + group.len()].iter().sum();
        h += r_sum * r_sum / group.len() as f64;
        pos += group.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let correction = 1.0
        - tie_sizes
            .iter()
            .map(|&t| (t * t * t - t) as f64)
            .sum::<f64>()
            / (n * n * n - n);
    if correction <= 0.0 {
        return Err(degenerate("all values tied, rank variance is zero"));
    }
    h /= correction;

    let dist = ChiSquared::new((k - 1) as f64)
        .map_err(|e| degenerate(&format!("chi-squared distribution: {}", e)))?;
    Ok((1.0 - dist.cdf(h)).clamp(0.0, 1.0))
}

/// Simes combination of dependent p-values into one
///
/// Used to collapse a within-feature family of pairwise tests into a single
/// p-value: min over ranks i of m * p_(i) / i.
pub fn simes_combine(pvalues: &[f64]) -> Result<f64> {
    if pvalues.is_empty() {
        return Err(degenerate("no p-values to combine"));
    }
    let mut sorted = pvalues.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let m = sorted.len() as f64;
    let combined = sorted
        .iter()
        .enumerate()
        .map(|(i, &p)| m * p / (i + 1) as f64)
        .fold(f64::INFINITY, f64::min);
    Ok(combined.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    // reference values computed independently from the same standard
    // approximations (tie-corrected normal / chi-squared)

    #[test]
    fn test_average_ranks_with_ties() {
        let (ranks, ties) = average_ranks(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(ties, vec![1, 1, 2]);
    }

    #[test]
    fn test_mann_whitney_no_ties() {
        let x = [1.1, 2.3, 3.1, 4.8, 5.2, 6.9];
        let y = [2.0, 3.5, 4.1, 7.3, 8.8, 9.1, 10.2];
        let p = mann_whitney_u(&x, &y).unwrap();
        assert!((p - 0.17473582321524717).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_mann_whitney_with_ties() {
        let x = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0];
        let y = [2.0, 3.0, 3.0, 4.0, 4.0, 5.0];
        let p = mann_whitney_u(&x, &y).unwrap();
        assert!((p - 0.07840293453326797).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_mann_whitney_symmetric_in_sample_order() {
        let x = [1.0, 5.0, 3.0, 8.0];
        let y = [2.0, 9.0, 4.0, 7.0, 6.0];
        let p_xy = mann_whitney_u(&x, &y).unwrap();
        let p_yx = mann_whitney_u(&y, &x).unwrap();
        assert!((p_xy - p_yx).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_all_tied_is_degenerate() {
        let x = [1.0; 5];
        let y = [1.0; 5];
        assert!(mann_whitney_u(&x, &y).is_err());
    }

    #[test]
    fn test_kendall_tau_no_ties() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0, 10.0, 9.0];
        let (tau, p) = kendall_tau_b(&x, &y).unwrap();
        assert!((tau - 0.7777777777777778).abs() < 1e-10);
        assert!((p - 0.0017451186995289802).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_kendall_tau_with_ties() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y = [3.0, 1.0, 2.0, 5.0, 4.0, 4.0, 8.0, 6.0, 9.0, 9.0];
        let (tau, p) = kendall_tau_b(&x, &y).unwrap();
        assert!((tau - 0.7501937734175208).abs() < 1e-10);
        assert!((p - 0.002925020095679187).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_kendall_constant_sample_is_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [5.0; 4];
        assert!(kendall_tau_b(&x, &y).is_err());
    }

    #[test]
    fn test_kruskal_wallis_reference() {
        let groups = vec![
            vec![2.9, 3.0, 2.5, 2.6, 3.2],
            vec![3.8, 2.7, 4.0, 2.4],
            vec![2.8, 3.4, 3.7, 2.2, 2.0],
        ];
        let p = kruskal_wallis(&groups).unwrap();
        assert!((p - 0.6799647735788935).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_kruskal_wallis_separated_groups() {
        let groups = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![10.0, 11.0, 12.0, 13.0],
            vec![20.0, 21.0, 22.0, 23.0],
        ];
        let p = kruskal_wallis(&groups).unwrap();
        assert!((p - 0.007276706499332492).abs() < 1e-10, "got {}", p);
    }

    #[test]
    fn test_simes_combine() {
        let p = simes_combine(&[0.01, 0.04, 0.9]).unwrap();
        // min(3*0.01/1, 3*0.04/2, 3*0.9/3) = 0.03
        assert!((p - 0.03).abs() < 1e-12);

        let p = simes_combine(&[1.0, 1.0]).unwrap();
        assert_eq!(p, 1.0);
    }
}
