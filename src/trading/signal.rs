//! Pluggable signal scoring.
//!
//! The lifecycle engine only requires the contract: a score in [0, 1],
//! 0 meaning strong sell and 1 strong buy. Strategy research is out of
//! scope; the default source is an explicit placeholder.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Produces a buy/sell strength score for a symbol at a price.
pub trait SignalSource: Send {
    /// Score in [0, 1]. Determinism is not required; range is.
    fn score(&mut self, symbol: &str, price: Decimal) -> f64;
}

/// Placeholder strategy returning uniform random scores, matching the
/// behavior of a bot whose real signal has not been wired in yet.
pub struct RandomSignal {
    rng: StdRng,
}

impl RandomSignal {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant for reproducible sessions.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for RandomSignal {
    fn score(&mut self, _symbol: &str, _price: Decimal) -> f64 {
        self.rng.gen_range(0.0..=1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scores_stay_in_range() {
        let mut signal = RandomSignal::from_seed(7);
        for _ in 0..1000 {
            let score = signal.score("BTCUSDT", dec!(50000));
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
