use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Which of the two compared configurations a measurement belongs to.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Display,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Base,
    New,
}

/// Result of one paired trial, from the point of view of the new configuration.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
)]
pub enum Outcome {
    #[strum(serialize = "L")]
    Loss = 0,
    #[strum(serialize = "D")]
    Draw = 1,
    #[strum(serialize = "W")]
    Win = 2,
}

impl Outcome {
    pub fn classify(base: f64, new: f64) -> Self {
        if new > base {
            Outcome::Win
        } else if new == base {
            Outcome::Draw
        } else {
            Outcome::Loss
        }
    }

    /// Score in half points: loss 0, draw 1, win 2.
    pub const fn half_points(self) -> usize {
        self as usize
    }
}

/// Score of two consecutive trials, bucketed by total half points.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Display, EnumIter)]
pub enum PentanomialOutcome {
    #[strum(serialize = "LL")]
    LossLoss = 0,
    #[strum(serialize = "LD")]
    LossDraw = 1,
    /// Either two draws or one win and one loss.
    #[strum(serialize = "DD")]
    Even = 2,
    #[strum(serialize = "WD")]
    WinDraw = 3,
    #[strum(serialize = "WW")]
    WinWin = 4,
}

impl PentanomialOutcome {
    pub const fn from_pair(first: Outcome, second: Outcome) -> Self {
        match first.half_points() + second.half_points() {
            0 => PentanomialOutcome::LossLoss,
            1 => PentanomialOutcome::LossDraw,
            2 => PentanomialOutcome::Even,
            3 => PentanomialOutcome::WinDraw,
            _ => PentanomialOutcome::WinWin,
        }
    }

    pub const fn bucket(self) -> usize {
        self as usize
    }
}
