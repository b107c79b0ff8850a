//! Synthetic oracles for dry runs and tests: trial outcomes drawn from a known Elo difference.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::oracle::{MeasureError, Oracle};
use crate::outcome::{Outcome, Variant};
use crate::sprt::trinomial_probabilities;

/// Loss/Draw/Win probabilities of the new configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutcomeDistribution {
    pub loss: f64,
    pub draw: f64,
    pub win: f64,
}

impl OutcomeDistribution {
    pub fn from_elo(elo: f64, draw_rate: f64) -> Self {
        let [loss, draw, win] = trinomial_probabilities(elo, draw_rate.clamp(0.0, 1.0));
        Self { loss, draw, win }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Outcome {
        let roll: f64 = rng.random_range(0.0..1.0);
        if roll < self.win {
            Outcome::Win
        } else if roll < self.win + self.draw {
            Outcome::Draw
        } else {
            Outcome::Loss
        }
    }

    pub fn sample_n(&self, rng: &mut impl Rng, n: usize) -> Vec<Outcome> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Oracle whose new configuration is `elo` points stronger than the base.
///
/// Base always measures 0. New measures 1, 0 or -1 depending on an outcome drawn from a
/// generator seeded by `(seed, index)`, so a given index always gives the same answer.
#[derive(Clone, Debug)]
pub struct EloSimulator {
    distribution: OutcomeDistribution,
    seed: u64,
}

impl EloSimulator {
    pub fn new(elo: f64, draw_rate: f64, seed: u64) -> Self {
        Self {
            distribution: OutcomeDistribution::from_elo(elo, draw_rate),
            seed,
        }
    }

    pub fn distribution(&self) -> OutcomeDistribution {
        self.distribution
    }

    pub fn outcome_at(&self, index: u64) -> Outcome {
        let mut rng = StdRng::seed_from_u64(self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.distribution.sample(&mut rng)
    }
}

impl Oracle for EloSimulator {
    fn measure(&self, variant: Variant, index: u64) -> Result<f64, MeasureError> {
        Ok(match variant {
            Variant::Base => 0.0,
            Variant::New => match self.outcome_at(index) {
                Outcome::Win => 1.0,
                Outcome::Draw => 0.0,
                Outcome::Loss => -1.0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_sums_to_one() {
        let d = OutcomeDistribution::from_elo(60.0, 0.3);
        assert!((d.loss + d.draw + d.win - 1.0).abs() < 1e-12);
        assert_eq!(d.draw, 0.3);
        assert!(d.win > d.loss);
    }

    #[test]
    fn test_sample_frequencies() {
        let d = OutcomeDistribution::from_elo(0.0, 0.2);
        let mut rng = StdRng::seed_from_u64(1);
        let outcomes = d.sample_n(&mut rng, 20_000);
        let draws = outcomes.iter().filter(|o| **o == Outcome::Draw).count() as f64;
        assert!((draws / 20_000.0 - 0.2).abs() < 0.02);
    }

    #[test]
    fn test_simulator_is_reproducible() {
        let sim = EloSimulator::new(30.0, 0.25, 99);
        for index in 0..100 {
            let a = sim.measure(Variant::New, index).unwrap();
            let b = sim.measure(Variant::New, index).unwrap();
            assert_eq!(a, b);
            assert_eq!(Outcome::classify(0.0, a), sim.outcome_at(index));
        }
        assert_eq!(sim.measure(Variant::Base, 5), Ok(0.0));
    }
}
