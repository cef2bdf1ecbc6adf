//! Two-sample Kolmogorov–Smirnov comparison between the chain arm and the
//! prior-only arm of the Geweke test. A small p-value means the two marginal
//! distributions diverge, which for this harness implies a flawed transition
//! kernel in the engine under test.
//!
//! The asymptotic KS distribution follows *Numerical Recipes* (3rd edition).

use crate::error::GewekeError;

/// Outcome of a two-sample KS test at significance `level`.
#[derive(Debug, Clone, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
    pub level: f64,
    pub is_rejected: bool,
}

/// Runs a two-sample KS test. Both samples must have more than 7 values for
/// the asymptotic p-value to be trustworthy; smaller samples are rejected as
/// a [`GewekeError::Data`].
pub fn ks_test(sample_a: &[f64], sample_b: &[f64], level: f64) -> Result<KsResult, GewekeError> {
    if sample_a.len() <= 7 || sample_b.len() <= 7 {
        return Err(GewekeError::Data(format!(
            "KS test needs more than 7 values per sample, got {} and {}",
            sample_a.len(),
            sample_b.len()
        )));
    }
    if !(0.0..=1.0).contains(&level) {
        return Err(GewekeError::Config(format!(
            "significance level must lie in [0, 1], got {level}"
        )));
    }

    let statistic = ks_statistic(sample_a, sample_b)?;
    let n = sample_a.len() as f64;
    let m = sample_b.len() as f64;
    let p_value = ks_complement_cdf((n * m / (n + m)).sqrt() * statistic);
    Ok(KsResult {
        statistic,
        p_value,
        level,
        is_rejected: p_value < level,
    })
}

/// Maximum absolute difference between the two empirical CDFs.
pub fn ks_statistic(sample_a: &[f64], sample_b: &[f64]) -> Result<f64, GewekeError> {
    if sample_a.is_empty() || sample_b.is_empty() {
        return Err(GewekeError::Data(
            "KS statistic needs two non-empty samples".into(),
        ));
    }

    let mut a = sample_a.to_vec();
    let mut b = sample_b.to_vec();
    a.sort_unstable_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    b.sort_unstable_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut max_diff: f64 = 0.0;

    // Walk both sorted samples jointly; after consuming every value <= x the
    // EDF difference at x is |i/n - j/m|.
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        max_diff = max_diff.max(diff);
    }
    Ok(max_diff)
}

/// Complementary CDF of the Kolmogorov–Smirnov distribution, Q_KS(z).
fn ks_complement_cdf(z: f64) -> f64 {
    debug_assert!(z >= 0.0);
    if z == 0.0 {
        return 1.0;
    }
    if z < 1.18 {
        return 1.0 - ks_cdf(z);
    }
    let x = (-2.0 * z * z).exp();
    2.0 * (x - x.powi(4) + x.powi(9))
}

/// CDF of the Kolmogorov–Smirnov distribution, P_KS(z).
fn ks_cdf(z: f64) -> f64 {
    debug_assert!(z >= 0.0);
    if z == 0.0 {
        return 0.0;
    }
    if z < 1.18 {
        let y = (-std::f64::consts::PI.powi(2) / (8.0 * z * z)).exp();
        return (2.0 * std::f64::consts::PI).sqrt() / z
            * (y + y.powf(9.0) + y.powf(25.0) + y.powf(49.0));
    }
    let x = (-2.0 * z * z).exp();
    1.0 - 2.0 * (x - x.powi(4) + x.powi(9))
}
