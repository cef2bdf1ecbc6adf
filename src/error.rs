//! Error taxonomy for the Geweke harness.
//!
//! Four failure classes cover the whole harness: bad harness parameters,
//! failures inside the inference engine under test, inconsistent diagnostics
//! schemas during aggregation, and degenerate samples during binning. None of
//! these are retried: a failing chain aborts its contribution outright rather
//! than being silently substituted.

use thiserror::Error;

/// Error raised by an implementation of the inference-engine contract.
///
/// Engines know nothing about chains or iteration counts; the chain runner
/// wraps this with that context (see [`GewekeError::Engine`]).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        EngineError(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum GewekeError {
    /// Invalid harness parameters, e.g. an empty extractor set or a value
    /// grid whose size the engine under test does not accept.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The inference engine under test failed. Carries the failing chain's
    /// seed and the iteration index at which it failed, so the engine bug can
    /// be reproduced in isolation.
    #[error("inference engine failed (chain seed {chain_seed}, iteration {iteration}): {source}")]
    Engine {
        chain_seed: u64,
        iteration: usize,
        source: EngineError,
    },

    /// Chains produced inconsistent statistic-name sets during aggregation.
    #[error("inconsistent diagnostics schema: {0}")]
    Schema(String),

    /// A binning precondition was violated (empty or degenerate sample after
    /// filtering), or a statistic was undefined for a latent state.
    #[error("degenerate sample: {0}")]
    Data(String),
}

impl GewekeError {
    /// Wraps an engine failure with the chain context required by the
    /// error-reporting contract.
    pub(crate) fn engine(chain_seed: u64, iteration: usize, source: EngineError) -> Self {
        GewekeError::Engine {
            chain_seed,
            iteration,
            source,
        }
    }
}
