use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::config::ConfigError;
use crate::outcome::{Outcome, PentanomialOutcome};

/// Outcome alphabet the likelihoods are computed over.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SprtMode {
    /// One Loss/Draw/Win per trial.
    #[default]
    Trinomial,
    /// Consecutive trials are grouped in pairs and scored 0, 0.5, 1, 1.5 or 2.
    Pentanomial,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SprtStatus {
    /// Not enough data to make a conclusion
    Continue,
    /// H0 (null hypothesis) is accepted - no improvement detected
    AcceptH0,
    /// H1 (alternative hypothesis) is accepted - improvement detected
    AcceptH1,
}

impl SprtStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SprtStatus::Continue => "",
            SprtStatus::AcceptH0 => "H0",
            SprtStatus::AcceptH1 => "H1",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, SprtStatus::Continue)
    }
}

impl fmt::Display for SprtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprtParameters {
    pub alpha: f64, // Type I error (false positive) probability
    pub beta: f64,  // Type II error (false negative) probability
    pub elo0: f64,  // H0: Elo difference is elo0 or less
    pub elo1: f64,  // H1: Elo difference is elo1 or more
    pub mode: SprtMode,
}

impl Default for SprtParameters {
    fn default() -> Self {
        Self {
            alpha: 0.0001,
            beta: 0.0001,
            elo0: 0.0,
            elo1: 50.0,
            mode: SprtMode::Trinomial,
        }
    }
}

impl SprtParameters {
    pub fn new(elo0: f64, elo1: f64, alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            elo0,
            elo1,
            mode: SprtMode::Trinomial,
        }
    }

    pub fn with_mode(mut self, mode: SprtMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Negated comparisons so that NaN is rejected too
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(ConfigError::InvalidBeta(self.beta));
        }
        // LA < 0 < LB only holds while alpha + beta < 1
        if self.alpha + self.beta >= 1.0 {
            return Err(ConfigError::ErrorRatesTooLarge {
                alpha: self.alpha,
                beta: self.beta,
            });
        }
        if !self.elo0.is_finite() {
            return Err(ConfigError::NonFiniteElo {
                name: "elo0",
                value: self.elo0,
            });
        }
        if !self.elo1.is_finite() {
            return Err(ConfigError::NonFiniteElo {
                name: "elo1",
                value: self.elo1,
            });
        }
        if self.elo0 > self.elo1 {
            return Err(ConfigError::InvertedElo {
                elo0: self.elo0,
                elo1: self.elo1,
            });
        }
        Ok(())
    }
}

/// Wald's decision thresholds on the LLR.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// LA: at or below this, H0 is accepted
    pub lower: f64,
    /// LB: at or above this, H1 is accepted
    pub upper: f64,
}

impl Bounds {
    pub fn from_error_rates(alpha: f64, beta: f64) -> Self {
        Self {
            lower: (beta / (1.0 - alpha)).ln(),
            upper: ((1.0 - beta) / alpha).ln(),
        }
    }

    pub fn classify(&self, llr: f64) -> SprtStatus {
        if llr >= self.upper {
            SprtStatus::AcceptH1
        } else if llr <= self.lower {
            SprtStatus::AcceptH0
        } else {
            SprtStatus::Continue
        }
    }
}

/// Expected score of a player who is `elo` points stronger than its opponent.
pub fn elo_to_score(elo: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-elo / 400.0))
}

/// Per-trial Loss/Draw/Win probabilities for one hypothesis, given a shared draw rate.
pub fn trinomial_probabilities(elo: f64, draw_rate: f64) -> [f64; 3] {
    let score = elo_to_score(elo);
    let decisive = 1.0 - draw_rate;
    [decisive * (1.0 - score), draw_rate, decisive * score]
}

/// Probabilities of the five pair buckets, assuming independent trials.
pub fn pentanomial_probabilities(elo: f64, draw_rate: f64) -> [f64; 5] {
    let [l, d, w] = trinomial_probabilities(elo, draw_rate);
    [l * l, 2.0 * l * d, 2.0 * w * l + d * d, 2.0 * w * d, w * w]
}

/// Sum of `count * ln(p1 / p0)` over the categories that were actually observed.
fn log_likelihood_ratio(counts: &[u64], p0: &[f64], p1: &[f64]) -> f64 {
    counts
        .iter()
        .zip(p0.iter().zip(p1.iter()))
        .filter(|(count, _)| **count > 0)
        .map(|(&count, (&q0, &q1))| {
            let ratio = (q1 / q0).ln();
            if ratio.is_finite() {
                count as f64 * ratio
            } else {
                0.0
            }
        })
        .sum()
}

/// LLR of H1 against H0 for Loss/Draw/Win counts.
///
/// The draw rate is estimated from the counts and shared by both hypotheses, so draws never
/// move the ratio and only the win/loss split matters.
pub fn trinomial_llr(params: &SprtParameters, counts: [u64; 3]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let draw_rate = counts[Outcome::Draw as usize] as f64 / total as f64;
    let p0 = trinomial_probabilities(params.elo0, draw_rate);
    let p1 = trinomial_probabilities(params.elo1, draw_rate);

    log_likelihood_ratio(&counts, &p0, &p1)
}

/// LLR of H1 against H0 for pair counts, LL through WW.
///
/// `counts` are the Loss/Draw/Win counts of the trials in those pairs. The per-trial draw rate
/// is taken from them, since the Even bucket mixes DD with WL.
pub fn pentanomial_llr(params: &SprtParameters, counts: [u64; 3], pair_counts: [u64; 5]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 || pair_counts.iter().sum::<u64>() == 0 {
        return 0.0;
    }

    let draw_rate = counts[Outcome::Draw as usize] as f64 / total as f64;
    let p0 = pentanomial_probabilities(params.elo0, draw_rate);
    let p1 = pentanomial_probabilities(params.elo1, draw_rate);

    log_likelihood_ratio(&pair_counts, &p0, &p1)
}

/// Performs a Sequential Probability Ratio Test (SPRT) comparing a new configuration to a base one
pub struct SprtCalculator {
    params: SprtParameters,
    bounds: Bounds,

    // Trial results, indexed by Outcome
    counts: [u64; 3],
    // Pair results, indexed by PentanomialOutcome. Only used in pentanomial mode.
    pair_counts: [u64; 5],
    pending: Option<Outcome>,

    llr: f64,
    status: SprtStatus,
}

impl SprtCalculator {
    /// Creates a new SPRT calculator with specified parameters
    pub fn new(params: SprtParameters) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            params,
            bounds: Bounds::from_error_rates(params.alpha, params.beta),
            counts: [0; 3],
            pair_counts: [0; 5],
            pending: None,
            llr: 0.0,
            status: SprtStatus::Continue,
        })
    }

    pub fn params(&self) -> &SprtParameters {
        &self.params
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn llr(&self) -> f64 {
        self.llr
    }

    pub fn status(&self) -> SprtStatus {
        self.status
    }

    /// Returns true if a conclusion has been reached
    pub fn has_conclusion(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn wins(&self) -> u64 {
        self.counts[Outcome::Win as usize]
    }

    pub fn draws(&self) -> u64 {
        self.counts[Outcome::Draw as usize]
    }

    pub fn losses(&self) -> u64 {
        self.counts[Outcome::Loss as usize]
    }

    /// Loss/Draw/Win counts
    pub fn counts(&self) -> [u64; 3] {
        self.counts
    }

    /// Pair counts, LL through WW. Stays zero in trinomial mode.
    pub fn pair_counts(&self) -> [u64; 5] {
        self.pair_counts
    }

    pub fn total_trials(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Records one outcome and returns the status after it.
    /// Once a conclusion has been reached further outcomes are ignored.
    pub fn record(&mut self, outcome: Outcome) -> SprtStatus {
        if self.status.is_terminal() {
            warn!(
                ?outcome,
                status = self.status.as_str(),
                "ignoring outcome recorded after a conclusion"
            );
            return self.status;
        }

        self.counts[outcome as usize] += 1;

        match self.params.mode {
            SprtMode::Trinomial => {
                self.llr = trinomial_llr(&self.params, self.counts);
            }
            SprtMode::Pentanomial => match self.pending.take() {
                None => self.pending = Some(outcome),
                Some(first) => {
                    self.pair_counts[PentanomialOutcome::from_pair(first, outcome).bucket()] += 1;
                    // No half pair is pending here, so counts cover exactly the paired trials
                    self.llr = pentanomial_llr(&self.params, self.counts, self.pair_counts);
                }
            },
        }

        self.status = self.bounds.classify(self.llr);
        self.status
    }

    /// Gets current statistics as a string
    pub fn stats_string(&self) -> String {
        format!(
            "W: {}, L: {}, D: {}, Total: {}",
            self.wins(),
            self.losses(),
            self.draws(),
            self.total_trials()
        )
    }
}

impl fmt::Display for SprtCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_trials();
        if total == 0 {
            return write!(f, "No trials recorded");
        }

        let win_rate = 100.0 * (self.wins() as f64) / (total as f64);

        write!(
            f,
            "Trials: {} (W: {}, L: {}, D: {}), Win rate: {:.2}%, LLR: {:.3} [{:.3}, {:.3}], Status: {:?}",
            total,
            self.wins(),
            self.losses(),
            self.draws(),
            win_rate,
            self.llr,
            self.bounds.lower,
            self.bounds.upper,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator(elo0: f64, elo1: f64) -> SprtCalculator {
        SprtCalculator::new(SprtParameters::new(elo0, elo1, 0.05, 0.05)).unwrap()
    }

    #[test]
    fn test_basic_functionality() {
        let mut sprt = calculator(0.0, 50.0);

        // Initially should have no conclusion
        assert_eq!(sprt.status(), SprtStatus::Continue);

        for _ in 0..20 {
            sprt.record(Outcome::Win);
        }
        for _ in 0..10 {
            sprt.record(Outcome::Loss);
        }
        for _ in 0..5 {
            sprt.record(Outcome::Draw);
        }

        assert_eq!(sprt.total_trials(), 35);
        assert_eq!(sprt.counts(), [10, 5, 20]);
        assert!(sprt.llr() > 0.0); // Should be positive with more wins
    }

    #[test]
    fn test_bounds_from_error_rates() {
        let bounds = Bounds::from_error_rates(0.0001, 0.0001);
        assert!((bounds.lower - (0.0001f64 / 0.9999).ln()).abs() < 1e-12);
        assert!((bounds.upper - (0.9999f64 / 0.0001).ln()).abs() < 1e-12);
        assert!(bounds.lower < 0.0 && bounds.upper > 0.0);
    }

    #[test]
    fn test_elo_to_score() {
        assert_eq!(elo_to_score(0.0), 0.5);
        assert!((elo_to_score(400.0) - 10.0 / 11.0).abs() < 1e-12);
        assert!((elo_to_score(-400.0) - 1.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_trial_llr() {
        let mut sprt = calculator(0.0, 50.0);
        sprt.record(Outcome::Win);
        let expected = (elo_to_score(50.0) / 0.5).ln();
        assert!((sprt.llr() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_all_draws_are_neutral() {
        let mut sprt = calculator(0.0, 50.0);
        for _ in 0..10_000 {
            assert_eq!(sprt.record(Outcome::Draw), SprtStatus::Continue);
        }
        assert_eq!(sprt.llr(), 0.0);
    }

    #[test]
    fn test_equal_elos_never_conclude() {
        let mut sprt = calculator(25.0, 25.0);
        for _ in 0..500 {
            sprt.record(Outcome::Win);
        }
        assert_eq!(sprt.llr(), 0.0);
        assert_eq!(sprt.status(), SprtStatus::Continue);
    }

    #[test]
    fn test_status_is_latched() {
        let mut sprt = calculator(0.0, 50.0);
        while !sprt.has_conclusion() {
            sprt.record(Outcome::Win);
        }
        assert_eq!(sprt.status(), SprtStatus::AcceptH1);
        let total = sprt.total_trials();
        let llr = sprt.llr();

        for _ in 0..1_000 {
            assert_eq!(sprt.record(Outcome::Loss), SprtStatus::AcceptH1);
        }
        assert_eq!(sprt.total_trials(), total);
        assert_eq!(sprt.llr(), llr);
    }

    #[test]
    fn test_losses_accept_h0() {
        let mut sprt = calculator(0.0, 50.0);
        while !sprt.has_conclusion() {
            sprt.record(Outcome::Loss);
        }
        assert_eq!(sprt.status(), SprtStatus::AcceptH0);
        assert!(sprt.llr() <= sprt.bounds().lower);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut a = calculator(0.0, 50.0);
        let mut b = calculator(0.0, 50.0);
        for o in [Outcome::Win, Outcome::Draw, Outcome::Loss, Outcome::Win] {
            a.record(o);
        }
        for o in [Outcome::Loss, Outcome::Win, Outcome::Win, Outcome::Draw] {
            b.record(o);
        }
        assert!((a.llr() - b.llr()).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_parameters() {
        let err = SprtCalculator::new(SprtParameters::new(0.0, 5.0, 0.0, 0.05)).err();
        assert_eq!(err, Some(ConfigError::InvalidAlpha(0.0)));

        let err = SprtCalculator::new(SprtParameters::new(0.0, 5.0, 0.05, f64::NAN)).err();
        assert!(matches!(err, Some(ConfigError::InvalidBeta(_))));

        let err = SprtCalculator::new(SprtParameters::new(10.0, 5.0, 0.05, 0.05)).err();
        assert_eq!(
            err,
            Some(ConfigError::InvertedElo {
                elo0: 10.0,
                elo1: 5.0
            })
        );

        let err = SprtCalculator::new(SprtParameters::new(0.0, 50.0, 0.6, 0.6)).err();
        assert_eq!(
            err,
            Some(ConfigError::ErrorRatesTooLarge {
                alpha: 0.6,
                beta: 0.6
            })
        );
        assert!(SprtCalculator::new(SprtParameters::new(0.0, 50.0, 0.5, 0.4999)).is_ok());

        let err = SprtCalculator::new(SprtParameters::new(0.0, f64::INFINITY, 0.05, 0.05)).err();
        assert!(matches!(
            err,
            Some(ConfigError::NonFiniteElo { name: "elo1", .. })
        ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(SprtStatus::Continue.as_str(), "");
        assert_eq!(SprtStatus::AcceptH0.to_string(), "H0");
        assert_eq!(SprtStatus::AcceptH1.to_string(), "H1");
    }

    #[test]
    fn test_pentanomial_updates_on_pairs() {
        let params = SprtParameters::new(0.0, 50.0, 0.05, 0.05).with_mode(SprtMode::Pentanomial);
        let mut sprt = SprtCalculator::new(params).unwrap();

        sprt.record(Outcome::Win);
        assert_eq!(sprt.llr(), 0.0);
        assert_eq!(sprt.pair_counts(), [0; 5]);

        sprt.record(Outcome::Win);
        assert_eq!(sprt.pair_counts(), [0, 0, 0, 0, 1]);
        let expected = 2.0 * (elo_to_score(50.0) / 0.5).ln();
        assert!((sprt.llr() - expected).abs() < 1e-12);
        assert_eq!(sprt.total_trials(), 2);
    }

    #[test]
    fn test_pentanomial_reaches_decision() {
        let params = SprtParameters::new(0.0, 50.0, 0.05, 0.05).with_mode(SprtMode::Pentanomial);
        let mut sprt = SprtCalculator::new(params).unwrap();
        let pattern = [Outcome::Win, Outcome::Draw, Outcome::Win, Outcome::Loss];
        for outcome in pattern.iter().cycle().take(10_000) {
            if sprt.record(*outcome).is_terminal() {
                break;
            }
        }
        assert_eq!(sprt.status(), SprtStatus::AcceptH1);
        assert!(sprt.llr().is_finite());
    }

    #[test]
    fn test_pentanomial_all_draws_is_neutral() {
        let params = SprtParameters::new(0.0, 50.0, 0.0001, 0.0001).with_mode(SprtMode::Pentanomial);
        let mut sprt = SprtCalculator::new(params).unwrap();
        for _ in 0..2_000 {
            assert_eq!(sprt.record(Outcome::Draw), SprtStatus::Continue);
        }
        assert_eq!(sprt.llr(), 0.0);
        assert_eq!(sprt.pair_counts(), [0, 0, 1_000, 0, 0]);
    }

    #[test]
    fn test_pentanomial_high_draw_rate() {
        // 75% draws, every decisive trial a win
        let params = SprtParameters::new(0.0, 50.0, 0.0001, 0.0001).with_mode(SprtMode::Pentanomial);
        let mut sprt = SprtCalculator::new(params).unwrap();
        let pattern = [Outcome::Win, Outcome::Draw, Outcome::Draw, Outcome::Draw];
        for outcome in pattern.iter().cycle().take(20_000) {
            if sprt.record(*outcome).is_terminal() {
                break;
            }
        }
        assert_eq!(sprt.status(), SprtStatus::AcceptH1);

        // The draw rate comes from the trials, not from the odd-quarter pair share
        let counts = [0, 3, 1];
        let pair_counts = [0, 0, 1, 1, 0];
        let p0 = pentanomial_probabilities(0.0, 0.75);
        let p1 = pentanomial_probabilities(50.0, 0.75);
        let expected = (p1[2] / p0[2]).ln() + (p1[3] / p0[3]).ln();
        assert!((pentanomial_llr(&params, counts, pair_counts) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_pentanomial_probabilities_sum_to_one() {
        for draw_rate in [0.0, 0.1, 0.5, 0.9] {
            let sum: f64 = pentanomial_probabilities(35.0, draw_rate).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_display() {
        let mut sprt = calculator(0.0, 50.0);
        assert_eq!(sprt.to_string(), "No trials recorded");
        sprt.record(Outcome::Win);
        assert!(sprt.to_string().starts_with("Trials: 1 (W: 1, L: 0, D: 0)"));
        assert_eq!(sprt.stats_string(), "W: 1, L: 0, D: 0, Total: 1");
    }
}
