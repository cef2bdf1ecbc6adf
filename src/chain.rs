/*!
The Geweke chain itself: alternate "resample latent state given data" with
"resample data given latent state", recording diagnostic statistics after
every inference sweep.

For a correct engine the marginal distribution of the recorded statistics
matches the prior; [`run_forward`] produces the prior-only reference samples
the chain output is compared against.
*/

use indicatif::ProgressBar;
use ndarray::Array2;

use crate::diagnostics::{DiagnosticSeries, ExtractorSet};
use crate::engine::{InferenceEngine, LatentState, TableGenerator, TableMetadata};
use crate::error::GewekeError;
use crate::grid::HyperGrids;

/// Explicit per-chain seed counter. Each call hands out the next seed in a
/// strictly increasing sequence, so repeated sampling calls within and across
/// iterations are independent draws. Never shared between chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCounter {
    next: u64,
}

impl SeedCounter {
    pub fn new(seed: u64) -> Self {
        SeedCounter { next: seed }
    }

    pub fn next_seed(&mut self) -> u64 {
        let seed = self.next;
        self.next = self.next.wrapping_add(1);
        seed
    }
}

/// One Markov chain of the Geweke test. Owns its engine, the current latent
/// state, and the current synthetic table; both are fully replaced on every
/// step and never shared with other chains.
pub struct GewekeChain<'a, E> {
    engine: E,
    meta: TableMetadata,
    table: Array2<f64>,
    state: LatentState,
    grids: &'a HyperGrids,
    seeds: SeedCounter,
    seed: u64,
    iters_done: usize,
}

impl<'a, E: InferenceEngine> GewekeChain<'a, E> {
    /// Generates the seeding table, initializes the engine's latent state
    /// from the prior, and returns the ready-to-step chain.
    pub fn new<G: TableGenerator>(
        mut engine: E,
        generator: &G,
        seed: u64,
        num_rows: usize,
        num_cols: usize,
        grids: &'a HyperGrids,
    ) -> Result<Self, GewekeError> {
        if let Some(expected) = engine.expected_grid_len() {
            if grids.len() != expected {
                return Err(GewekeError::Config(format!(
                    "engine expects grids of size {expected}, got {}",
                    grids.len()
                )));
            }
        }

        let (table, meta, rows) = generator.generate(seed, num_rows, num_cols)?;
        let state = engine
            .initialize(&meta, &rows, &table)
            .map_err(|e| GewekeError::engine(seed, 0, e))?;

        Ok(GewekeChain {
            engine,
            meta,
            table,
            state,
            grids,
            seeds: SeedCounter::new(seed),
            seed,
            iters_done: 0,
        })
    }

    /// Does one Geweke iteration: one inference sweep over the current table,
    /// then a full resample of the table from the model conditioned on the
    /// new state. Returns the new state.
    pub fn step(&mut self) -> Result<&LatentState, GewekeError> {
        let iteration = self.iters_done;
        self.state = self
            .engine
            .transition(&self.meta, &self.table, &self.state, self.grids)
            .map_err(|e| GewekeError::engine(self.seed, iteration, e))?;

        let (num_rows, num_cols) = self.table.dim();
        let mut table = Array2::<f64>::zeros((num_rows, num_cols));
        for row in 0..num_rows {
            for col in 0..num_cols {
                let seed = self.seeds.next_seed();
                table[[row, col]] = self
                    .engine
                    .sample_cell(&self.meta, &self.state, row, col, seed)
                    .map_err(|e| GewekeError::engine(self.seed, iteration, e))?;
            }
        }
        self.table = table;

        self.iters_done += 1;
        Ok(&self.state)
    }

    /// The current latent state without stepping.
    pub fn state(&self) -> &LatentState {
        &self.state
    }

    /// The current synthetic table without stepping.
    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }
}

/// Runs `chain` for exactly `num_iters` iterations, recording every extractor
/// after each step. There is no early exit: the caller inspects the returned
/// series after the fact. On any failure the whole series is discarded.
pub fn run_geweke<E: InferenceEngine>(
    chain: &mut GewekeChain<E>,
    num_iters: usize,
    extractors: &ExtractorSet,
) -> Result<DiagnosticSeries, GewekeError> {
    if extractors.is_empty() {
        return Err(GewekeError::Config("extractor set must be non-empty".into()));
    }

    let mut series = DiagnosticSeries::new();
    for _ in 0..num_iters {
        let state = chain.step()?;
        extractors.record(state, &mut series)?;
    }
    Ok(series)
}

/// Same as [`run_geweke`], but drives a progress bar one tick per iteration.
pub fn run_geweke_with_progress<E: InferenceEngine>(
    chain: &mut GewekeChain<E>,
    num_iters: usize,
    extractors: &ExtractorSet,
    pb: &ProgressBar,
) -> Result<DiagnosticSeries, GewekeError> {
    if extractors.is_empty() {
        return Err(GewekeError::Config("extractor set must be non-empty".into()));
    }

    pb.set_length(num_iters as u64);
    let mut series = DiagnosticSeries::new();
    for _ in 0..num_iters {
        let state = chain.step()?;
        extractors.record(state, &mut series)?;
        pb.inc(1);
    }
    Ok(series)
}

/// The prior-only arm of the Geweke comparison: draws `num_iters` independent
/// from-the-prior latent states (each over a freshly generated table) and
/// records the same statistics. No transitions are involved, so the returned
/// series is an exact sample from the prior marginal.
pub fn run_forward<E: InferenceEngine, G: TableGenerator>(
    mut engine: E,
    generator: &G,
    seed: u64,
    num_rows: usize,
    num_cols: usize,
    num_iters: usize,
    extractors: &ExtractorSet,
) -> Result<DiagnosticSeries, GewekeError> {
    if extractors.is_empty() {
        return Err(GewekeError::Config("extractor set must be non-empty".into()));
    }

    let mut seeds = SeedCounter::new(seed);
    let mut series = DiagnosticSeries::new();
    for iteration in 0..num_iters {
        let (table, meta, rows) = generator.generate(seeds.next_seed(), num_rows, num_cols)?;
        let state = engine
            .initialize(&meta, &rows, &table)
            .map_err(|e| GewekeError::engine(seed, iteration, e))?;
        extractors.record(&state, &mut series)?;
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnHypers, FactorialTableGen, RowMetadata, ViewState};
    use crate::error::EngineError;
    use crate::grid::HyperGrids;

    /// An engine whose state records how many transitions it has seen; cells
    /// are sampled as `seed as f64` so seed-derivation is observable.
    struct CountingEngine {
        transitions: usize,
        fail_at: Option<usize>,
    }

    impl CountingEngine {
        fn new() -> Self {
            CountingEngine {
                transitions: 0,
                fail_at: None,
            }
        }

        fn state(&self, num_cols: usize, num_rows: usize) -> LatentState {
            LatentState {
                column_alpha: 1.0 + self.transitions as f64,
                column_assignments: vec![0; num_cols],
                column_hypers: vec![
                    ColumnHypers {
                        mu: self.transitions as f64,
                        s: 1.0,
                        r: 1.0,
                        nu: 1.0,
                    };
                    num_cols
                ],
                views: vec![ViewState {
                    row_alpha: 1.0,
                    row_assignments: vec![0; num_rows],
                }],
            }
        }
    }

    impl InferenceEngine for CountingEngine {
        fn initialize(
            &mut self,
            meta: &TableMetadata,
            rows: &RowMetadata,
            _table: &Array2<f64>,
        ) -> Result<LatentState, EngineError> {
            Ok(self.state(meta.num_cols(), rows.num_rows()))
        }

        fn transition(
            &mut self,
            meta: &TableMetadata,
            table: &Array2<f64>,
            _state: &LatentState,
            _grids: &HyperGrids,
        ) -> Result<LatentState, EngineError> {
            if self.fail_at == Some(self.transitions) {
                return Err(EngineError::new("synthetic failure"));
            }
            self.transitions += 1;
            Ok(self.state(meta.num_cols(), table.nrows()))
        }

        fn sample_cell(
            &self,
            _meta: &TableMetadata,
            _state: &LatentState,
            _row: usize,
            _col: usize,
            seed: u64,
        ) -> Result<f64, EngineError> {
            Ok(seed as f64)
        }
    }

    fn test_grids() -> HyperGrids {
        HyperGrids::for_table(10, 31).unwrap()
    }

    #[test]
    fn seed_counter_is_strictly_increasing() {
        let mut seeds = SeedCounter::new(5);
        assert_eq!(seeds.next_seed(), 5);
        assert_eq!(seeds.next_seed(), 6);
        assert_eq!(seeds.next_seed(), 7);
    }

    #[test]
    fn series_length_equals_num_iters() {
        let grids = test_grids();
        let mut chain = GewekeChain::new(
            CountingEngine::new(),
            &FactorialTableGen::default(),
            0,
            10,
            2,
            &grids,
        )
        .unwrap();
        let extractors = ExtractorSet::default();
        let series = run_geweke(&mut chain, 5, &extractors).unwrap();
        for name in extractors.names() {
            let values = series.get(name).unwrap();
            assert_eq!(values.len(), 5, "series `{name}` has wrong length");
            assert!(values.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn zero_iterations_yields_empty_series() {
        let grids = test_grids();
        let mut chain = GewekeChain::new(
            CountingEngine::new(),
            &FactorialTableGen::default(),
            0,
            10,
            2,
            &grids,
        )
        .unwrap();
        let series = run_geweke(&mut chain, 0, &ExtractorSet::default()).unwrap();
        assert_eq!(series.num_iters(), 0);
    }

    #[test]
    fn empty_extractor_set_is_config_error() {
        let grids = test_grids();
        let mut chain = GewekeChain::new(
            CountingEngine::new(),
            &FactorialTableGen::default(),
            0,
            10,
            2,
            &grids,
        )
        .unwrap();
        let err = run_geweke(&mut chain, 5, &ExtractorSet::new()).unwrap_err();
        assert!(matches!(err, GewekeError::Config(_)), "got {err:?}");
    }

    #[test]
    fn engine_failure_carries_seed_and_iteration() {
        let grids = test_grids();
        let mut engine = CountingEngine::new();
        engine.fail_at = Some(3);
        let mut chain =
            GewekeChain::new(engine, &FactorialTableGen::default(), 9, 10, 2, &grids).unwrap();
        let err = run_geweke(&mut chain, 10, &ExtractorSet::default()).unwrap_err();
        match err {
            GewekeError::Engine {
                chain_seed,
                iteration,
                ..
            } => {
                assert_eq!(chain_seed, 9);
                assert_eq!(iteration, 3);
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[test]
    fn grid_size_mismatch_is_config_error() {
        struct FixedGridEngine(CountingEngine);
        impl InferenceEngine for FixedGridEngine {
            fn initialize(
                &mut self,
                meta: &TableMetadata,
                rows: &RowMetadata,
                table: &Array2<f64>,
            ) -> Result<LatentState, EngineError> {
                self.0.initialize(meta, rows, table)
            }
            fn transition(
                &mut self,
                meta: &TableMetadata,
                table: &Array2<f64>,
                state: &LatentState,
                grids: &HyperGrids,
            ) -> Result<LatentState, EngineError> {
                self.0.transition(meta, table, state, grids)
            }
            fn sample_cell(
                &self,
                meta: &TableMetadata,
                state: &LatentState,
                row: usize,
                col: usize,
                seed: u64,
            ) -> Result<f64, EngineError> {
                self.0.sample_cell(meta, state, row, col, seed)
            }
            fn expected_grid_len(&self) -> Option<usize> {
                Some(16)
            }
        }

        let grids = test_grids(); // 31 points
        let result = GewekeChain::new(
            FixedGridEngine(CountingEngine::new()),
            &FactorialTableGen::default(),
            0,
            10,
            2,
            &grids,
        );
        assert!(matches!(result, Err(GewekeError::Config(_))));
    }

    #[test]
    fn step_resamples_every_cell_with_fresh_seeds() {
        let grids = test_grids();
        let mut chain = GewekeChain::new(
            CountingEngine::new(),
            &FactorialTableGen::default(),
            100,
            3,
            2,
            &grids,
        )
        .unwrap();
        chain.step().unwrap();
        // CountingEngine echoes the cell seed, so the table is the seed
        // sequence 100..106 laid out row-major.
        let expected: Vec<f64> = (100..106).map(|s| s as f64).collect();
        let got: Vec<f64> = chain.table().iter().copied().collect();
        assert_eq!(got, expected);

        chain.step().unwrap();
        let expected: Vec<f64> = (106..112).map(|s| s as f64).collect();
        let got: Vec<f64> = chain.table().iter().copied().collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn forward_arm_has_requested_length() {
        let series = run_forward(
            CountingEngine::new(),
            &FactorialTableGen::default(),
            1,
            10,
            2,
            7,
            &ExtractorSet::default(),
        )
        .unwrap();
        assert_eq!(series.num_iters(), 7);
    }
}
