/*!
Diagnostic-statistic collection.

After every chain step a fixed set of named scalar statistics is read off the
current latent state and appended to per-chain time series. The extractor set
is ordered and shared by all chains of a run; the aggregator later rejects
chains whose series disagree on the name set.
*/

use std::collections::BTreeMap;

use crate::engine::LatentState;
use crate::error::GewekeError;

/// A pure function reading one scalar statistic off a latent state.
///
/// Returns `None` when the statistic is undefined for this state (e.g. a
/// view-level statistic when the state has no views); the collector turns
/// that into a [`GewekeError::Data`] instead of recording a placeholder.
pub type ExtractorFn = fn(&LatentState) -> Option<f64>;

fn col_0_mu(state: &LatentState) -> Option<f64> {
    state.column_hyper(0).map(|h| h.mu)
}

fn col_0_nu(state: &LatentState) -> Option<f64> {
    state.column_hyper(0).map(|h| h.nu)
}

fn col_0_r(state: &LatentState) -> Option<f64> {
    state.column_hyper(0).map(|h| h.r)
}

fn col_0_s(state: &LatentState) -> Option<f64> {
    state.column_hyper(0).map(|h| h.s)
}

fn column_crp_alpha(state: &LatentState) -> Option<f64> {
    Some(state.column_crp_alpha())
}

fn view_0_crp_alpha(state: &LatentState) -> Option<f64> {
    state.view_crp_alpha(0)
}

/// An ordered, named set of statistic extractors.
#[derive(Clone)]
pub struct ExtractorSet {
    entries: Vec<(String, ExtractorFn)>,
}

impl ExtractorSet {
    /// An empty set. Must be populated before use; running a chain with an
    /// empty set is a configuration error.
    pub fn new() -> Self {
        ExtractorSet {
            entries: Vec::new(),
        }
    }

    /// Adds an extractor, replacing any previous one of the same name.
    pub fn with(mut self, name: impl Into<String>, func: ExtractorFn) -> Self {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, func));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Applies every extractor to `state` and appends the results to
    /// `series`, in insertion order.
    pub fn record(
        &self,
        state: &LatentState,
        series: &mut DiagnosticSeries,
    ) -> Result<(), GewekeError> {
        for (name, func) in &self.entries {
            let value = func(state).ok_or_else(|| {
                GewekeError::Data(format!("statistic `{name}` is undefined for this state"))
            })?;
            series.push(name, value);
        }
        Ok(())
    }
}

impl Default for ExtractorSet {
    /// The six statistics the harness tracks by default: column 0's four
    /// continuous hyperparameters plus the two CRP concentrations.
    fn default() -> Self {
        ExtractorSet::new()
            .with("col_0_mu", col_0_mu)
            .with("col_0_nu", col_0_nu)
            .with("col_0_r", col_0_r)
            .with("col_0_s", col_0_s)
            .with("column_crp_alpha", column_crp_alpha)
            .with("view_0_crp_alpha", view_0_crp_alpha)
    }
}

/// Per-chain time series of diagnostic statistics. One value is appended per
/// statistic per completed iteration, so every series has the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticSeries {
    series: BTreeMap<String, Vec<f64>>,
}

impl DiagnosticSeries {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, value: f64) {
        self.series.entry(name.to_string()).or_default().push(value);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn num_stats(&self) -> usize {
        self.series.len()
    }

    /// Number of completed iterations. All series share this length.
    pub fn num_iters(&self) -> usize {
        self.series.values().next().map_or(0, |v| v.len())
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<f64>> {
        self.series
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnHypers, ViewState};

    fn state_with(mu: f64) -> LatentState {
        LatentState {
            column_alpha: 2.0,
            column_assignments: vec![0],
            column_hypers: vec![ColumnHypers {
                mu,
                s: 1.0,
                r: 1.0,
                nu: 1.0,
            }],
            views: vec![ViewState {
                row_alpha: 0.5,
                row_assignments: vec![0; 3],
            }],
        }
    }

    #[test]
    fn default_set_tracks_six_statistics() {
        let set = ExtractorSet::default();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(
            names,
            vec![
                "col_0_mu",
                "col_0_nu",
                "col_0_r",
                "col_0_s",
                "column_crp_alpha",
                "view_0_crp_alpha"
            ]
        );
    }

    #[test]
    fn record_appends_one_value_per_statistic() {
        let set = ExtractorSet::default();
        let mut series = DiagnosticSeries::new();
        set.record(&state_with(0.1), &mut series).unwrap();
        set.record(&state_with(0.2), &mut series).unwrap();
        assert_eq!(series.num_stats(), 6);
        assert_eq!(series.num_iters(), 2);
        assert_eq!(series.get("col_0_mu").unwrap(), &[0.1, 0.2]);
        assert_eq!(series.get("column_crp_alpha").unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn undefined_statistic_is_a_data_error() {
        let mut bare = state_with(0.0);
        bare.views.clear();
        let set = ExtractorSet::new().with("view_0_crp_alpha", |s| s.view_crp_alpha(0));
        let mut series = DiagnosticSeries::new();
        let err = set.record(&bare, &mut series).unwrap_err();
        assert!(matches!(err, GewekeError::Data(_)), "got {err:?}");
    }

    #[test]
    fn with_replaces_same_name_in_place() {
        let set = ExtractorSet::new()
            .with("alpha", |s| Some(s.column_crp_alpha()))
            .with("alpha", |s| Some(s.column_crp_alpha() * 2.0));
        assert_eq!(set.len(), 1);
        let mut series = DiagnosticSeries::new();
        set.record(&state_with(0.0), &mut series).unwrap();
        assert_eq!(series.get("alpha").unwrap(), &[4.0]);
    }
}
