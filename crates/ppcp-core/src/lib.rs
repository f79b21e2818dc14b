//! Conjugate Gamma-Poisson changepoint model.
//!
//! Scores how surprising a stretch of event data is relative to a fitted
//! rate. The pieces, leaf first:
//!
//! - [`time_scale`]: effective duration between two times (linear,
//!   shot-noise decay, seasonal, or caller supplied)
//! - [`data`]: cumulative event counts as a function of time or bin index
//! - [`model`]: marginal likelihoods and posterior parameters under a Gamma
//!   prior on the Poisson rate
//! - [`predictive`]: negative-binomial posterior-predictive tail probabilities
//! - [`scanner`]: forward scan that carries the posterior across a time grid

pub mod data;
pub mod error;
pub mod logging;
pub mod model;
pub mod predictive;
pub mod scanner;
pub mod time_scale;

pub use data::{CumulativeSeries, DataIndexOracle, EventTimes};
pub use error::{ModelError, Result};
pub use model::{
    Changepoint, CountSource, GammaPosterior, GammaPrior, MeanMode, PoissonProcessModel,
    PosteriorMean, SegmentModel, LOG_LIKELIHOOD_FLOOR,
};
pub use predictive::{
    NegBinomialPredictive, PValueEndpoints, PmfSweep, PmfTerm, PredictivePmf, ProbabilityScale,
    SurvivorMidpoint, Tail,
};
pub use scanner::{ScanState, ScanStep, SequentialScanner};
pub use time_scale::{SeasonalProfile, TimeScale, TimeScaleAdapter};
