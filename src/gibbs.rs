/*!
A small reference engine implementing the inference contract: grid-Gibbs over
per-column Normal mean/scale hyperparameters, with a single view and a single
row cluster.

The model: cell (r, c) ~ Normal(mu_c, sqrt(s_c)), with mu_c and s_c uniform
over the supplied proposal grids and every remaining hyperparameter (r, nu,
both CRP concentrations) uniform over fixed grids. Parameters without
likelihood influence have their prior as full conditional, so resampling them
from the grid prior is the exact Gibbs update. That makes this engine
provably correct, which is what the harness wants from its own self-tests:
the chain arm and the prior arm must agree.
*/

use ndarray::{Array2, ArrayView1};
use ndarray_stats::QuantileExt;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::chain::SeedCounter;
use crate::engine::{
    ColumnHypers, InferenceEngine, LatentState, RowMetadata, TableMetadata, ViewState,
};
use crate::error::EngineError;
use crate::grid::{log_linspace, HyperGrids};

pub struct GridGibbsEngine {
    seeds: SeedCounter,
    grids: HyperGrids,
}

impl GridGibbsEngine {
    /// `grids` must be the same grids later forwarded to every `transition`
    /// call; the engine publishes their size via `expected_grid_len` so the
    /// harness can reject mismatches up front.
    pub fn new(seed: u64, grids: HyperGrids) -> Self {
        GridGibbsEngine {
            seeds: SeedCounter::new(seed),
            grids,
        }
    }

    fn shape_grid(&self, n: usize) -> Vec<f64> {
        log_linspace(1.0, n.max(2) as f64, self.grids.len())
    }

    fn alpha_grid(&self, n: usize) -> Vec<f64> {
        let n = n.max(2) as f64;
        log_linspace(1.0 / n, n, self.grids.len())
    }

    fn draw_uniform(grid: &[f64], rng: &mut SmallRng) -> f64 {
        grid[rng.gen_range(0..grid.len())]
    }

    /// Draws one grid value with probability proportional to
    /// `exp(log_weight)`, computed stably through the max log-weight.
    fn draw_weighted(grid: &[f64], log_weights: &[f64], rng: &mut SmallRng) -> f64 {
        let max = *ArrayView1::from(log_weights).max_skipnan();
        let weights: Vec<f64> = log_weights.iter().map(|&lw| (lw - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        debug_assert!(approx::abs_diff_ne!(total, 0.0, epsilon = f64::MIN_POSITIVE));

        let mut u = rng.gen::<f64>() * total;
        for (&g, &w) in grid.iter().zip(&weights) {
            u -= w;
            if u <= 0.0 {
                return g;
            }
        }
        grid[grid.len() - 1]
    }

    fn column_log_lik(column: ArrayView1<f64>, mu: f64, s: f64) -> f64 {
        let norm = -0.5 * (2.0 * std::f64::consts::PI * s).ln();
        column
            .iter()
            .map(|&x| norm - (x - mu).powi(2) / (2.0 * s))
            .sum()
    }

    fn prior_state(&self, num_rows: usize, num_cols: usize, rng: &mut SmallRng) -> LatentState {
        let shape = self.shape_grid(num_rows);
        let column_hypers = (0..num_cols)
            .map(|_| ColumnHypers {
                mu: Self::draw_uniform(&self.grids.mu, rng),
                s: Self::draw_uniform(&self.grids.s, rng),
                r: Self::draw_uniform(&shape, rng),
                nu: Self::draw_uniform(&shape, rng),
            })
            .collect();
        LatentState {
            column_alpha: Self::draw_uniform(&self.alpha_grid(num_cols), rng),
            column_assignments: vec![0; num_cols],
            column_hypers,
            views: vec![ViewState {
                row_alpha: Self::draw_uniform(&self.alpha_grid(num_rows), rng),
                row_assignments: vec![0; num_rows],
            }],
        }
    }
}

impl InferenceEngine for GridGibbsEngine {
    fn initialize(
        &mut self,
        meta: &TableMetadata,
        rows: &RowMetadata,
        _table: &Array2<f64>,
    ) -> Result<LatentState, EngineError> {
        let mut rng = SmallRng::seed_from_u64(self.seeds.next_seed());
        Ok(self.prior_state(rows.num_rows(), meta.num_cols(), &mut rng))
    }

    fn transition(
        &mut self,
        meta: &TableMetadata,
        table: &Array2<f64>,
        state: &LatentState,
        grids: &HyperGrids,
    ) -> Result<LatentState, EngineError> {
        if grids.len() != self.grids.len() {
            return Err(EngineError::new(format!(
                "grid size {} does not match engine grid size {}",
                grids.len(),
                self.grids.len()
            )));
        }
        if state.num_cols() != meta.num_cols() || table.ncols() != meta.num_cols() {
            return Err(EngineError::new("state/table column count mismatch"));
        }

        let num_rows = table.nrows();
        let mut rng = SmallRng::seed_from_u64(self.seeds.next_seed());
        let shape = self.shape_grid(num_rows);

        let column_hypers = (0..meta.num_cols())
            .map(|col| {
                let data = table.column(col);
                let s_old = state.column_hypers[col].s;

                let mu_weights: Vec<f64> = grids
                    .mu
                    .iter()
                    .map(|&mu| Self::column_log_lik(data, mu, s_old))
                    .collect();
                let mu = Self::draw_weighted(&grids.mu, &mu_weights, &mut rng);

                let s_weights: Vec<f64> = grids
                    .s
                    .iter()
                    .map(|&s| Self::column_log_lik(data, mu, s))
                    .collect();
                let s = Self::draw_weighted(&grids.s, &s_weights, &mut rng);

                ColumnHypers {
                    mu,
                    s,
                    r: Self::draw_uniform(&shape, &mut rng),
                    nu: Self::draw_uniform(&shape, &mut rng),
                }
            })
            .collect();

        Ok(LatentState {
            column_alpha: Self::draw_uniform(&self.alpha_grid(meta.num_cols()), &mut rng),
            column_assignments: vec![0; meta.num_cols()],
            column_hypers,
            views: vec![ViewState {
                row_alpha: Self::draw_uniform(&self.alpha_grid(num_rows), &mut rng),
                row_assignments: vec![0; num_rows],
            }],
        })
    }

    fn sample_cell(
        &self,
        meta: &TableMetadata,
        state: &LatentState,
        _row: usize,
        col: usize,
        seed: u64,
    ) -> Result<f64, EngineError> {
        if col >= meta.num_cols() {
            return Err(EngineError::new(format!(
                "column {col} out of range for {}-column table",
                meta.num_cols()
            )));
        }
        let hypers = state
            .column_hyper(col)
            .ok_or_else(|| EngineError::new(format!("state has no hypers for column {col}")))?;
        let normal = Normal::new(hypers.mu, hypers.s.sqrt())
            .map_err(|e| EngineError::new(format!("bad cell distribution: {e}")))?;
        let mut rng = SmallRng::seed_from_u64(seed);
        Ok(normal.sample(&mut rng))
    }

    fn expected_grid_len(&self) -> Option<usize> {
        Some(self.grids.len())
    }
}
