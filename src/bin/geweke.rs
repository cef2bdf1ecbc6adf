//! Runs the Geweke test against the built-in grid-Gibbs reference engine and
//! prints per-statistic histograms plus chain-vs-prior KS results.

use std::error::Error;
use std::process::exit;

use mini_geweke::aggregate::{run_chains_with_progress, ChainSpec};
use mini_geweke::chain::run_forward;
use mini_geweke::compare::ks_test;
use mini_geweke::diagnostics::ExtractorSet;
use mini_geweke::engine::FactorialTableGen;
use mini_geweke::gibbs::GridGibbsEngine;
use mini_geweke::grid::{HyperGrids, DEFAULT_N_GRID};
use mini_geweke::histogram::PolicyTable;

struct Args {
    num_rows: usize,
    num_cols: usize,
    num_chains: usize,
    num_iters: usize,
    seed: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        num_rows: 10,
        num_cols: 2,
        num_chains: 2,
        num_iters: 2000,
        seed: 0,
    };

    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag.as_str() {
            "--num-rows" => args.num_rows = value.parse().map_err(|e| format!("{flag}: {e}"))?,
            "--num-cols" => args.num_cols = value.parse().map_err(|e| format!("{flag}: {e}"))?,
            "--num-chains" => {
                args.num_chains = value.parse().map_err(|e| format!("{flag}: {e}"))?
            }
            "--num-iters" => args.num_iters = value.parse().map_err(|e| format!("{flag}: {e}"))?,
            "--seed" => args.seed = value.parse().map_err(|e| format!("{flag}: {e}"))?,
            other => return Err(format!("unknown flag {other}")),
        }
    }
    Ok(args)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!(
                "usage: geweke [--num-rows N] [--num-cols N] [--num-chains N] \
                 [--num-iters N] [--seed N]"
            );
            exit(2);
        }
    };

    let grids = HyperGrids::for_table(args.num_rows, DEFAULT_N_GRID)?;
    let generator = FactorialTableGen::default();
    let extractors = ExtractorSet::default();

    let mut specs = ChainSpec::for_chains(args.num_chains, args.num_rows, args.num_cols, args.num_iters);
    for spec in &mut specs {
        spec.seed = spec.seed.wrapping_add(args.seed);
    }

    println!(
        "Running {} chains x {} iterations on a {}x{} table...",
        args.num_chains, args.num_iters, args.num_rows, args.num_cols
    );
    let pooled = run_chains_with_progress(
        &specs,
        |spec| GridGibbsEngine::new(spec.seed, grids.clone()),
        &generator,
        &extractors,
        &grids,
    )?;

    let forward_seed = args.seed.wrapping_add(args.num_chains as u64);
    let forward = run_forward(
        GridGibbsEngine::new(forward_seed, grids.clone()),
        &generator,
        forward_seed,
        args.num_rows,
        args.num_cols,
        args.num_chains * args.num_iters,
        &extractors,
    )?;

    let policies = PolicyTable::default();
    for (name, sample) in &pooled {
        println!("\n== {name} ==");

        let prior = forward.get(name).expect("forward arm tracks the same statistics");
        match ks_test(sample, prior, 0.01) {
            Ok(result) => println!(
                "KS vs prior: D = {:.4}, p = {:.4}{}",
                result.statistic,
                result.p_value,
                if result.is_rejected {
                    "  ** DIVERGED **"
                } else {
                    ""
                }
            ),
            Err(err) => println!("KS vs prior: {err}"),
        }

        match policies.analyze(name, sample) {
            Ok(hist) => {
                let peak = hist.counts.iter().copied().max().unwrap_or(1).max(1);
                for (i, &count) in hist.counts.iter().enumerate() {
                    let width = (count * 40 / peak) as usize;
                    println!(
                        "[{:>12.5e}, {:>12.5e}) {:>6} {}",
                        hist.edges[i],
                        hist.edges[i + 1],
                        count,
                        "#".repeat(width)
                    );
                }
            }
            Err(err) => println!("histogram: {err}"),
        }
    }

    Ok(())
}
