//! Deterministic grids of candidate hyperparameter values.
//!
//! The harness hands every inference step the same externally constructed
//! grids so that results are reproducible across chains and comparable to a
//! reference implementation that builds its grids the same way.

use num_traits::Float;

use crate::error::GewekeError;

/// Number of grid points used by the default grids. Must match the grid size
/// the engine under test was built with; mismatches are rejected as
/// configuration errors rather than truncated.
pub const DEFAULT_N_GRID: usize = 31;

/// Returns `n` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace<T: Float>(start: T, stop: T, n: usize) -> Vec<T> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / T::from(n - 1).unwrap();
    (0..n).map(|i| start + step * T::from(i).unwrap()).collect()
}

/// Returns `n` values from `start` to `stop` inclusive, evenly spaced in
/// log-space. Both endpoints must be positive.
pub fn log_linspace<T: Float>(start: T, stop: T, n: usize) -> Vec<T> {
    linspace(start.ln(), stop.ln(), n)
        .into_iter()
        .map(|x| x.exp())
        .collect()
}

/// The mean (`mu`) and scale (`s`) proposal grids forwarded verbatim to every
/// inference step.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperGrids {
    pub mu: Vec<f64>,
    pub s: Vec<f64>,
}

impl HyperGrids {
    /// Builds the default grids for a table with `num_rows` rows: `mu` linear
    /// on [-10, 10], `s` log-spaced on [1, 100/3 * num_rows], both with
    /// `n_grid` points.
    pub fn for_table(num_rows: usize, n_grid: usize) -> Result<Self, GewekeError> {
        if n_grid < 2 {
            return Err(GewekeError::Config(format!(
                "grid needs at least 2 points, got {n_grid}"
            )));
        }
        if num_rows == 0 {
            return Err(GewekeError::Config("table needs at least 1 row".into()));
        }
        let max_mu = 10.0;
        let max_s = max_mu * max_mu / 3.0 * num_rows as f64;
        Ok(HyperGrids {
            mu: linspace(-max_mu, max_mu, n_grid),
            s: log_linspace(1.0, max_s, n_grid),
        })
    }

    /// Number of points per grid. Both grids always share one size.
    pub fn len(&self) -> usize {
        self.mu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }
}
