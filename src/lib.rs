/*!
A compact harness for Geweke-style joint-distribution tests of
cross-categorization inference engines.

For a correctly implemented generative model and transition kernel, the
marginal distribution of synthetic data produced by alternating "resample
data given latent state" with "resample latent state given data" must match
the marginal obtained by sampling from the prior alone. This crate runs both
arms over any engine implementing the [`engine::InferenceEngine`] contract,
pools diagnostic statistics across independent chains, and bins the pooled
samples for distributional comparison.

# Example

```rust
use mini_geweke::aggregate::{run_chains, ChainSpec};
use mini_geweke::diagnostics::ExtractorSet;
use mini_geweke::engine::FactorialTableGen;
use mini_geweke::gibbs::GridGibbsEngine;
use mini_geweke::grid::HyperGrids;
use mini_geweke::histogram::PolicyTable;

let grids = HyperGrids::for_table(10, 31)?;
let specs = ChainSpec::for_chains(2, 10, 2, 20);
let pooled = run_chains(
    &specs,
    |spec| GridGibbsEngine::new(spec.seed, grids.clone()),
    &FactorialTableGen::default(),
    &ExtractorSet::default(),
    &grids,
)?;
assert_eq!(pooled["column_crp_alpha"].len(), 40);

let policies = PolicyTable::default();
let hist = policies.analyze("column_crp_alpha", &pooled["column_crp_alpha"])?;
assert!(hist.edges.windows(2).all(|w| w[0] < w[1]));
# Ok::<(), mini_geweke::error::GewekeError>(())
```
*/

pub mod aggregate;
pub mod chain;
pub mod compare;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod gibbs;
pub mod grid;
pub mod histogram;
pub mod io;
