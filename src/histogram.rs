/*!
Turns a raw pooled sample into a display-ready histogram.

Two numerical hazards recur in these samples: nominally positive statistics
that collapse to sub-epsilon positive values through floating underflow, and
heavy-tailed or near-discrete support that breaks naive binning. The binning
policy is chosen per statistic name through an injectable [`PolicyTable`], so
a new statistic is classified by configuration rather than by editing the
binning code.

# Examples

```rust
use mini_geweke::histogram::{filter_eps, generate_log_bins_unique};

let pooled = vec![1e-200, 2.0, 2.0, 3.0];
assert_eq!(filter_eps(&pooled), vec![2.0, 2.0, 3.0]);
let edges = generate_log_bins_unique(&pooled).unwrap();
assert_eq!(edges, vec![2.0, 3.0, 4.0]);
```
*/

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ndarray::ArrayView1;
use ndarray_stats::QuantileExt;

use crate::error::GewekeError;
use crate::grid::{linspace, log_linspace};

/// Positive values below this are treated as underflow artifacts, not real
/// support points, and are dropped before binning.
pub const EPS_CUTOFF: f64 = 1e-100;

/// Default number of log-spaced bin edges.
pub const DEFAULT_N_BINS: usize = 31;

/// Removes every value `v` with `0 < v < 1e-100`. Values `<= 0` or
/// `>= 1e-100` pass through unchanged, so the filter is idempotent.
pub fn filter_eps(sample: &[f64]) -> Vec<f64> {
    sample
        .iter()
        .copied()
        .filter(|&v| !(0.0 < v && v < EPS_CUTOFF))
        .collect()
}

/// Clips every value to the closed interval [P0.5, P99.5] of the sample,
/// preserving length and order. Keeps a handful of heavy-tail outliers from
/// dominating the bin width of a continuous statistic.
pub fn clip_extremes(sample: &[f64]) -> Result<Vec<f64>, GewekeError> {
    if sample.is_empty() {
        return Err(GewekeError::Data("cannot clip an empty sample".into()));
    }
    let mut sorted = sample.to_vec();
    sorted.sort_unstable_by(cmp_f64);
    let lower = percentile(&sorted, 0.5);
    let upper = percentile(&sorted, 99.5);
    Ok(sample.iter().map(|&v| v.clamp(lower, upper)).collect())
}

/// Produces `n_bins` edges evenly spaced in log-space between the filtered
/// sample's min and max, inclusive.
pub fn generate_log_bins(sample: &[f64], n_bins: usize) -> Result<Vec<f64>, GewekeError> {
    if n_bins < 2 {
        return Err(GewekeError::Data(format!(
            "need at least 2 edges, got {n_bins}"
        )));
    }
    let data = filter_eps(sample);
    let (min, max) = sample_range(&data)?;
    if min <= 0.0 {
        return Err(GewekeError::Data(format!(
            "log bins need positive values, sample min is {min}"
        )));
    }
    if min == max {
        return Err(GewekeError::Data(
            "sample has a single support point, log range is degenerate".into(),
        ));
    }
    Ok(log_linspace(min, max, n_bins))
}

/// Takes the sorted set of distinct filtered values as bin left-edges and
/// appends one closing edge at `last + (last - second_to_last)`, so every
/// distinct observed value falls in its own bin. Intended for statistics with
/// small discrete or near-discrete support, e.g. grid-valued hyperparameters.
pub fn generate_log_bins_unique(sample: &[f64]) -> Result<Vec<f64>, GewekeError> {
    let mut edges = filter_eps(sample);
    edges.sort_unstable_by(cmp_f64);
    edges.dedup();
    if edges.len() < 2 {
        return Err(GewekeError::Data(format!(
            "need at least 2 distinct values after filtering, got {}",
            edges.len()
        )));
    }
    if edges[0] <= 0.0 {
        return Err(GewekeError::Data(format!(
            "log bins need positive values, sample min is {}",
            edges[0]
        )));
    }
    let delta = edges[edges.len() - 1] - edges[edges.len() - 2];
    edges.push(edges[edges.len() - 1] + delta);
    Ok(edges)
}

/// Produces `n_bins + 1` evenly spaced edges covering the sample's range.
pub fn generate_linear_bins(sample: &[f64], n_bins: usize) -> Result<Vec<f64>, GewekeError> {
    if n_bins == 0 {
        return Err(GewekeError::Data("need at least 1 bin".into()));
    }
    let (min, max) = sample_range(sample)?;
    if min == max {
        return Err(GewekeError::Data(
            "sample has a single support point, range is degenerate".into(),
        ));
    }
    Ok(linspace(min, max, n_bins + 1))
}

/// Axis scale a histogram is meant to be drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinScale {
    Linear,
    Log,
}

/// A display-ready histogram: strictly increasing edges, one count per bin,
/// and the scale the edges were constructed for. Values equal to the last
/// edge land in the last bin; values outside the edge range are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSpec {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub scale: BinScale,
}

impl HistogramSpec {
    /// Bins `values` into `edges`, validating the edge invariants.
    pub fn new(values: &[f64], edges: Vec<f64>, scale: BinScale) -> Result<Self, GewekeError> {
        if edges.len() < 2 {
            return Err(GewekeError::Data(format!(
                "histogram needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if !edges.windows(2).all(|w| w[0] < w[1]) {
            return Err(GewekeError::Data(
                "histogram edges must be strictly increasing".into(),
            ));
        }
        if scale == BinScale::Log && edges[0] <= 0.0 {
            return Err(GewekeError::Data(
                "log-scale histogram edges must be strictly positive".into(),
            ));
        }

        let last = edges[edges.len() - 1];
        let mut counts = vec![0u64; edges.len() - 1];
        for &v in values {
            if v < edges[0] || v > last {
                continue;
            }
            let bin = if v == last {
                counts.len() - 1
            } else {
                edges.partition_point(|&e| e <= v) - 1
            };
            counts[bin] += 1;
        }
        Ok(HistogramSpec {
            edges,
            counts,
            scale,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// How a statistic's pooled sample is binned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinPolicy {
    /// One bin per distinct filtered value; log-scale axis. The default, for
    /// grid-valued and other near-discrete statistics.
    LogUnique,
    /// Clip extremes, then log-spaced bins. For continuous, possibly
    /// heavy-tailed positive statistics.
    LogClipped,
    /// Clip extremes, then evenly spaced bins. For statistics that live on a
    /// small linear range.
    Linear,
}

/// Per-statistic-name binning policy lookup: a wildcard default plus explicit
/// overrides, resolved once at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    default_policy: BinPolicy,
    overrides: BTreeMap<String, BinPolicy>,
}

impl Default for PolicyTable {
    /// The harness default: everything is log-unique except the scale
    /// hyperparameter (continuous, heavy-tailed) and the mean hyperparameter
    /// (linear support).
    fn default() -> Self {
        PolicyTable::new(BinPolicy::LogUnique)
            .with_policy("col_0_s", BinPolicy::LogClipped)
            .with_policy("col_0_mu", BinPolicy::Linear)
    }
}

impl PolicyTable {
    pub fn new(default_policy: BinPolicy) -> Self {
        PolicyTable {
            default_policy,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, name: impl Into<String>, policy: BinPolicy) -> Self {
        self.overrides.insert(name.into(), policy);
        self
    }

    pub fn policy_for(&self, name: &str) -> BinPolicy {
        self.overrides
            .get(name)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Bins `sample` according to the policy registered for `name`.
    pub fn analyze(&self, name: &str, sample: &[f64]) -> Result<HistogramSpec, GewekeError> {
        match self.policy_for(name) {
            BinPolicy::LogUnique => {
                let data = filter_eps(sample);
                let edges = generate_log_bins_unique(&data)?;
                HistogramSpec::new(&data, edges, BinScale::Log)
            }
            BinPolicy::LogClipped => {
                let data = clip_extremes(sample)?;
                let edges = generate_log_bins(&data, DEFAULT_N_BINS)?;
                HistogramSpec::new(&data, edges, BinScale::Log)
            }
            BinPolicy::Linear => {
                let data = clip_extremes(sample)?;
                let edges = generate_linear_bins(&data, DEFAULT_N_BINS)?;
                HistogramSpec::new(&data, edges, BinScale::Linear)
            }
        }
    }
}

/// Min and max of a sample, skipping NaNs. Errors on an empty sample.
fn sample_range(sample: &[f64]) -> Result<(f64, f64), GewekeError> {
    if sample.is_empty() {
        return Err(GewekeError::Data(
            "sample is empty after filtering".into(),
        ));
    }
    let view = ArrayView1::from(sample);
    let min = *view.min_skipnan();
    let max = *view.max_skipnan();
    if !min.is_finite() || !max.is_finite() {
        return Err(GewekeError::Data("sample has no finite values".into()));
    }
    Ok((min, max))
}

/// Linear-interpolation percentile of an ascending-sorted slice, matching the
/// numpy convention the reference harness used.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Sorts NaN after every real value.
fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    if a.is_nan() {
        return Ordering::Greater;
    }
    if b.is_nan() {
        return Ordering::Less;
    }
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn filter_eps_drops_only_subepsilon_positives() {
        let sample = vec![1e-200, 2.0, 2.0, 3.0];
        assert_eq!(filter_eps(&sample), vec![2.0, 2.0, 3.0]);

        // Zero, negatives, and values at or above the cutoff survive.
        let sample = vec![0.0, -1e-300, 1e-100, 5.0];
        assert_eq!(filter_eps(&sample), sample);
    }

    #[test]
    fn filter_eps_is_idempotent() {
        let sample = vec![1e-150, 0.0, 1.0, -2.0, 1e-99];
        let once = filter_eps(&sample);
        assert_eq!(filter_eps(&once), once);
    }

    #[test]
    fn log_bins_unique_gives_one_bin_per_distinct_value() {
        let edges = generate_log_bins_unique(&[1e-200, 2.0, 2.0, 3.0]).unwrap();
        assert_eq!(edges, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn log_bins_unique_edge_count_and_monotonicity() {
        let sample = vec![0.5, 1.0, 1.0, 4.0, 2.0, 0.5];
        let edges = generate_log_bins_unique(&sample).unwrap();
        // 4 distinct values + 1 closing edge.
        assert_eq!(edges.len(), 5);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
        assert_abs_diff_eq!(edges[4], 6.0); // 4 + (4 - 2)
    }

    #[test]
    fn log_bins_unique_needs_two_distinct_values() {
        assert!(generate_log_bins_unique(&[2.0, 2.0]).is_err());
        assert!(generate_log_bins_unique(&[]).is_err());
        assert!(generate_log_bins_unique(&[-1.0, 2.0]).is_err());
    }

    #[test]
    fn log_bins_span_filtered_range() {
        let sample = vec![1e-300, 1.0, 10.0, 100.0];
        let edges = generate_log_bins(&sample, 31).unwrap();
        assert_eq!(edges.len(), 31);
        assert_abs_diff_eq!(edges[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(edges[30], 100.0, epsilon = 1e-9);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn log_bins_reject_nonpositive_and_degenerate_samples() {
        assert!(generate_log_bins(&[1e-200], 31).is_err()); // empty after filter
        assert!(generate_log_bins(&[-1.0, 1.0], 31).is_err());
        assert!(generate_log_bins(&[3.0, 3.0], 31).is_err());
    }

    #[test]
    fn clip_extremes_bounds_length_and_order() {
        let sample: Vec<f64> = (1..=1000).map(|i| i as f64).collect();
        let clipped = clip_extremes(&sample).unwrap();
        assert_eq!(clipped.len(), sample.len());
        // numpy-style interpolated percentiles of 1..=1000.
        assert_abs_diff_eq!(clipped[0], 5.995, epsilon = 1e-9);
        assert_abs_diff_eq!(clipped[999], 995.005, epsilon = 1e-9);
        assert!(clipped.windows(2).all(|w| w[0] <= w[1]));
        // Interior values untouched.
        assert_abs_diff_eq!(clipped[499], 500.0);
    }

    #[test]
    fn clip_extremes_preserves_input_order() {
        let sample = vec![500.0, 1.0, 1000.0, 250.0];
        let clipped = clip_extremes(&sample).unwrap();
        assert_eq!(clipped.len(), 4);
        assert_eq!(clipped[0], 500.0);
        assert_eq!(clipped[3], 250.0);
        assert!(clipped[1] >= 1.0 && clipped[2] <= 1000.0);
    }

    #[test]
    fn clip_extremes_rejects_empty() {
        assert!(clip_extremes(&[]).is_err());
    }

    #[test]
    fn histogram_counts_with_closed_last_bin() {
        let spec = HistogramSpec::new(
            &[2.0, 2.5, 3.0, 4.0, 5.0],
            vec![2.0, 3.0, 4.0],
            BinScale::Log,
        )
        .unwrap();
        // [2,3): 2.0, 2.5; [3,4]: 3.0, 4.0; 5.0 out of range.
        assert_eq!(spec.counts, vec![2, 2]);
        assert_eq!(spec.total_count(), 4);
    }

    #[test]
    fn histogram_rejects_bad_edges() {
        assert!(HistogramSpec::new(&[], vec![1.0], BinScale::Linear).is_err());
        assert!(HistogramSpec::new(&[], vec![1.0, 1.0], BinScale::Linear).is_err());
        assert!(HistogramSpec::new(&[], vec![2.0, 1.0], BinScale::Linear).is_err());
        assert!(HistogramSpec::new(&[], vec![-1.0, 1.0], BinScale::Log).is_err());
        assert!(HistogramSpec::new(&[], vec![-1.0, 1.0], BinScale::Linear).is_ok());
    }

    #[test]
    fn policy_table_default_mirrors_harness_lookup() {
        let table = PolicyTable::default();
        assert_eq!(table.policy_for("col_0_s"), BinPolicy::LogClipped);
        assert_eq!(table.policy_for("col_0_mu"), BinPolicy::Linear);
        assert_eq!(table.policy_for("col_0_nu"), BinPolicy::LogUnique);
        assert_eq!(table.policy_for("anything_else"), BinPolicy::LogUnique);
    }

    #[test]
    fn policy_table_is_injectable() {
        let table = PolicyTable::new(BinPolicy::Linear).with_policy("x", BinPolicy::LogUnique);
        assert_eq!(table.policy_for("x"), BinPolicy::LogUnique);
        assert_eq!(table.policy_for("y"), BinPolicy::Linear);
    }

    #[test]
    fn analyze_applies_the_selected_policy() {
        let table = PolicyTable::default();

        let discrete = vec![1.0, 2.0, 2.0, 4.0];
        let spec = table.analyze("col_0_nu", &discrete).unwrap();
        assert_eq!(spec.scale, BinScale::Log);
        assert_eq!(spec.num_bins(), 3);
        assert_eq!(spec.counts, vec![1, 2, 1]);

        let continuous: Vec<f64> = (1..=500).map(|i| i as f64 / 10.0).collect();
        let spec = table.analyze("col_0_s", &continuous).unwrap();
        assert_eq!(spec.scale, BinScale::Log);
        assert_eq!(spec.num_bins(), DEFAULT_N_BINS - 1);

        let spec = table.analyze("col_0_mu", &continuous).unwrap();
        assert_eq!(spec.scale, BinScale::Linear);
        assert_eq!(spec.num_bins(), DEFAULT_N_BINS);
        assert_eq!(spec.total_count(), 500);
    }

    #[test]
    fn percentile_matches_numpy_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(percentile(&sorted, 0.0), 1.0);
        assert_abs_diff_eq!(percentile(&sorted, 100.0), 4.0);
        assert_abs_diff_eq!(percentile(&sorted, 50.0), 2.5);
        assert_abs_diff_eq!(percentile(&sorted, 25.0), 1.75);
    }
}
