/*!
Multi-chain fan-out and pooling.

Chains are embarrassingly parallel: each owns its engine, seed counter, table
and state, and never communicates with the others. They are run on the rayon
pool, and the per-statistic series are concatenated in the order the chain
specs were given, never completion order, so pooled output is reproducible
regardless of scheduling.
*/

use std::collections::BTreeMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::chain::{run_geweke, run_geweke_with_progress, GewekeChain};
use crate::diagnostics::{DiagnosticSeries, ExtractorSet};
use crate::engine::{InferenceEngine, TableGenerator};
use crate::error::GewekeError;
use crate::grid::HyperGrids;

/// The arguments of one independent chain run. Every chain gets its own seed;
/// shape and iteration count are usually shared but are per-spec so a caller
/// can mix table sizes deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    pub seed: u64,
    pub num_rows: usize,
    pub num_cols: usize,
    pub num_iters: usize,
}

impl ChainSpec {
    /// Specs for `num_chains` chains with seeds `0..num_chains`.
    pub fn for_chains(
        num_chains: usize,
        num_rows: usize,
        num_cols: usize,
        num_iters: usize,
    ) -> Vec<ChainSpec> {
        (0..num_chains as u64)
            .map(|seed| ChainSpec {
                seed,
                num_rows,
                num_cols,
                num_iters,
            })
            .collect()
    }
}

/// Runs one chain per spec in parallel and pools the results. The engine
/// factory is invoked once per chain so no engine (and no seed counter) is
/// ever shared between concurrently running chains.
pub fn run_chains<E, G, F>(
    specs: &[ChainSpec],
    make_engine: F,
    generator: &G,
    extractors: &ExtractorSet,
    grids: &HyperGrids,
) -> Result<BTreeMap<String, Vec<f64>>, GewekeError>
where
    E: InferenceEngine,
    G: TableGenerator + Sync,
    F: Fn(&ChainSpec) -> E + Sync,
{
    let runs: Vec<DiagnosticSeries> = specs
        .par_iter()
        .map(|spec| {
            let engine = make_engine(spec);
            let mut chain = GewekeChain::new(
                engine,
                generator,
                spec.seed,
                spec.num_rows,
                spec.num_cols,
                grids,
            )?;
            run_geweke(&mut chain, spec.num_iters, extractors)
        })
        .collect::<Result<_, _>>()?;

    pool_series(&runs)
}

/// Like [`run_chains`], with one progress bar per chain.
pub fn run_chains_with_progress<E, G, F>(
    specs: &[ChainSpec],
    make_engine: F,
    generator: &G,
    extractors: &ExtractorSet,
    grids: &HyperGrids,
) -> Result<BTreeMap<String, Vec<f64>>, GewekeError>
where
    E: InferenceEngine,
    G: TableGenerator + Sync,
    F: Fn(&ChainSpec) -> E + Sync,
{
    let multi = MultiProgress::new();
    let pb_style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("##-");

    let runs: Vec<DiagnosticSeries> = specs
        .par_iter()
        .enumerate()
        .map(|(i, spec)| {
            let pb = multi.add(ProgressBar::new(spec.num_iters as u64));
            pb.set_prefix(format!("Chain {i}"));
            pb.set_style(pb_style.clone());

            let engine = make_engine(spec);
            let mut chain = GewekeChain::new(
                engine,
                generator,
                spec.seed,
                spec.num_rows,
                spec.num_cols,
                grids,
            )?;
            let series = run_geweke_with_progress(&mut chain, spec.num_iters, extractors, &pb)?;
            pb.finish_with_message("Done!");
            Ok(series)
        })
        .collect::<Result<_, GewekeError>>()?;

    pool_series(&runs)
}

/// Concatenates each statistic's series chain-by-chain, in the order the runs
/// are given. Every run must carry exactly the same statistic names;
/// mismatches are rejected rather than intersected or padded.
pub fn pool_series(
    runs: &[DiagnosticSeries],
) -> Result<BTreeMap<String, Vec<f64>>, GewekeError> {
    let mut pooled: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let Some(first) = runs.first() else {
        return Ok(pooled);
    };
    let names: Vec<&str> = first.names().collect();

    for (idx, run) in runs.iter().enumerate() {
        let run_names: Vec<&str> = run.names().collect();
        if run_names != names {
            return Err(GewekeError::Schema(format!(
                "chain {idx} tracked statistics {run_names:?}, expected {names:?}"
            )));
        }
        for (name, values) in run.iter() {
            pooled.entry(name.to_string()).or_default().extend(values);
        }
    }
    Ok(pooled)
}
