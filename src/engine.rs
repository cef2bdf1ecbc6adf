/*!
The external contracts the harness consumes: the inference engine under test
and the synthetic-data generator that seeds the very first latent state.

The engine is a black box to the harness. It only has to implement
[`InferenceEngine`]: build a latent state from a table, advance that state by
one sweep given the current table, and draw single cells from the model
conditioned on a state. The harness never inspects how the engine represents
its internals; diagnostics read the structured [`LatentState`] snapshot the
engine returns.

# Examples

```rust
use mini_geweke::engine::{FactorialTableGen, TableGenerator};

let gen = FactorialTableGen::default();
let (table, meta, rows) = gen.generate(0, 10, 2).unwrap();
assert_eq!(table.dim(), (10, 2));
assert_eq!(meta.num_cols(), 2);
assert_eq!(rows.num_rows(), 10);
```
*/

use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{EngineError, GewekeError};
use crate::grid::HyperGrids;

/// Column names and shape of an observed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub column_names: Vec<String>,
}

impl TableMetadata {
    pub fn for_columns(num_cols: usize) -> Self {
        TableMetadata {
            column_names: (0..num_cols).map(|i| format!("c{i}")).collect(),
        }
    }

    pub fn num_cols(&self) -> usize {
        self.column_names.len()
    }
}

/// Row names of an observed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMetadata {
    pub row_names: Vec<String>,
}

impl RowMetadata {
    pub fn for_rows(num_rows: usize) -> Self {
        RowMetadata {
            row_names: (0..num_rows).map(|i| format!("r{i}")).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.row_names.len()
    }
}

/// Per-column continuous hyperparameters (normal-gamma parameterization).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnHypers {
    pub mu: f64,
    pub s: f64,
    pub r: f64,
    pub nu: f64,
}

/// One view's row-clustering state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// CRP concentration of this view's row partition.
    pub row_alpha: f64,
    /// Row-cluster assignment per row.
    pub row_assignments: Vec<usize>,
}

/// Snapshot of the engine's current belief: the column partition into views,
/// each view's row partition, and per-column hyperparameters.
///
/// Diagnostics depend on this stable schema through the named accessors below
/// rather than traversing an engine-internal representation.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentState {
    /// CRP concentration of the column partition.
    pub column_alpha: f64,
    /// View assignment per column.
    pub column_assignments: Vec<usize>,
    /// Hyperparameters per column, aligned with `column_assignments`.
    pub column_hypers: Vec<ColumnHypers>,
    /// One entry per view.
    pub views: Vec<ViewState>,
}

impl LatentState {
    pub fn num_cols(&self) -> usize {
        self.column_hypers.len()
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Hyperparameters of column `col`, if the state has that many columns.
    pub fn column_hyper(&self, col: usize) -> Option<&ColumnHypers> {
        self.column_hypers.get(col)
    }

    /// CRP concentration of the column partition.
    pub fn column_crp_alpha(&self) -> f64 {
        self.column_alpha
    }

    /// CRP concentration of view `view`'s row partition, if that view exists.
    pub fn view_crp_alpha(&self, view: usize) -> Option<f64> {
        self.views.get(view).map(|v| v.row_alpha)
    }
}

/// The inference-engine contract.
///
/// `transition` must be internally seeded by engine-owned state (typically a
/// per-engine seed counter) so that a chain is fully reproducible from its
/// construction seed. `sample_cell` takes an explicit seed because the
/// harness derives a fresh, strictly increasing seed per drawn cell.
pub trait InferenceEngine {
    /// Builds a from-the-prior latent state for the given table.
    fn initialize(
        &mut self,
        meta: &TableMetadata,
        rows: &RowMetadata,
        table: &Array2<f64>,
    ) -> Result<LatentState, EngineError>;

    /// Performs one inference sweep, returning the successor state.
    fn transition(
        &mut self,
        meta: &TableMetadata,
        table: &Array2<f64>,
        state: &LatentState,
        grids: &HyperGrids,
    ) -> Result<LatentState, EngineError>;

    /// Draws one value for cell (`row`, `col`) from the model conditioned on
    /// `state`. `row` may exceed the observed table (a synthetic row).
    fn sample_cell(
        &self,
        meta: &TableMetadata,
        state: &LatentState,
        row: usize,
        col: usize,
        seed: u64,
    ) -> Result<f64, EngineError>;

    /// Grid size this engine was built for, if it has a fixed one. The
    /// harness rejects a [`HyperGrids`] of any other size as a configuration
    /// error instead of letting the engine truncate silently.
    fn expected_grid_len(&self) -> Option<usize> {
        None
    }
}

/// The data-generation collaborator: produces the synthetic table that seeds
/// the very first latent state of a chain.
pub trait TableGenerator {
    fn generate(
        &self,
        seed: u64,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<(Array2<f64>, TableMetadata, RowMetadata), GewekeError>;
}

/// Factorial-design table generator: rows are split round-robin into
/// `num_clusters` groups, and every (group, column) pair gets its own normal
/// component with mean uniform on [-max_mean, max_mean] and standard
/// deviation uniform on (0, max_std].
///
/// The default shape (one cluster, unit mean range, unit scale) is what the
/// Geweke harness uses: the generated values only seed the first latent
/// state, after which the table is resampled from the model every iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorialTableGen {
    pub num_clusters: usize,
    pub max_mean: f64,
    pub max_std: f64,
}

impl Default for FactorialTableGen {
    fn default() -> Self {
        FactorialTableGen {
            num_clusters: 1,
            max_mean: 1.0,
            max_std: 1.0,
        }
    }
}

impl TableGenerator for FactorialTableGen {
    fn generate(
        &self,
        seed: u64,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<(Array2<f64>, TableMetadata, RowMetadata), GewekeError> {
        if num_rows == 0 || num_cols == 0 {
            return Err(GewekeError::Config(format!(
                "table shape must be positive, got {num_rows}x{num_cols}"
            )));
        }
        if self.num_clusters == 0 {
            return Err(GewekeError::Config("num_clusters must be positive".into()));
        }

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut means = Array2::<f64>::zeros((self.num_clusters, num_cols));
        for m in means.iter_mut() {
            *m = rng.gen_range(-self.max_mean..=self.max_mean);
        }
        let stds: Vec<f64> = (0..num_cols)
            .map(|_| rng.gen::<f64>() * self.max_std + f64::EPSILON)
            .collect();

        let mut table = Array2::<f64>::zeros((num_rows, num_cols));
        for row in 0..num_rows {
            let cluster = row % self.num_clusters;
            for col in 0..num_cols {
                let normal = Normal::new(means[[cluster, col]], stds[col])
                    .map_err(|e| GewekeError::Config(format!("bad component: {e}")))?;
                table[[row, col]] = normal.sample(&mut rng);
            }
        }

        Ok((
            table,
            TableMetadata::for_columns(num_cols),
            RowMetadata::for_rows(num_rows),
        ))
    }
}
