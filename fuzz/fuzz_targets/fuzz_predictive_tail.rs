//! Fuzz target for posterior-predictive tail probabilities.
//!
//! Every accepted posterior and window must yield log p-values in
//! `[ln MIN_PROBABILITY, 0]` with ordered endpoints.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ppcp_config::TailMode;
use ppcp_core::{GammaPosterior, NegBinomialPredictive};

#[derive(Debug, Arbitrary)]
struct Input {
    shape: f64,
    rate: f64,
    duration: f64,
    count: u16,
    mode: u8,
}

fuzz_target!(|input: Input| {
    // keep sweeps short enough for the fuzzer's time budget
    if !(input.shape.abs() < 1e4 && input.rate.abs() < 1e4 && input.duration.abs() < 1e4) {
        return;
    }
    let posterior = GammaPosterior {
        shape: input.shape,
        rate: input.rate,
    };
    let Ok(engine) = NegBinomialPredictive::new(posterior, input.duration) else {
        return;
    };
    let mode = match input.mode % 3 {
        0 => TailMode::Lower,
        1 => TailMode::Upper,
        _ => TailMode::TwoSided,
    };
    let endpoints = engine.endpoints(u64::from(input.count), mode);
    assert!(endpoints.log_lower() <= endpoints.log_upper() + 1e-9);
    let log_p = endpoints.log_mid_p();
    assert!(log_p <= 0.0 && log_p >= ppcp_math::min_log_probability());
});
