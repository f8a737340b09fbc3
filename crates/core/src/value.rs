use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, ValidationError};

pub const MIN_RANK: u8 = 1;
pub const MAX_RANK: u8 = 5;

/// A numeric personal rank, always within [1, 5].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(u8);

impl Rank {
    pub const BEST: Rank = Rank(1);
    pub const RUNNER_UP: Rank = Rank(2);

    pub fn new(rank: u8) -> Result<Self, ValidationError> {
        if (MIN_RANK..=MAX_RANK).contains(&rank) {
            Ok(Self(rank))
        } else {
            Err(ValidationError::RankOutOfRange(rank))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_best(self) -> bool {
        self.0 == MIN_RANK
    }
}

impl TryFrom<u8> for Rank {
    type Error = ValidationError;

    fn try_from(rank: u8) -> Result<Self, Self::Error> {
        Self::new(rank)
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-competitive ternary classification, used when the diner does not
/// want to assign a numeric rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TasteStatus {
    Acceptable,
    SecondChance,
    Dissatisfied,
}

impl TasteStatus {
    pub const ALL: [TasteStatus; 3] = [
        Self::Acceptable,
        Self::SecondChance,
        Self::Dissatisfied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acceptable => "acceptable",
            Self::SecondChance => "second_chance",
            Self::Dissatisfied => "dissatisfied",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "acceptable" => Ok(Self::Acceptable),
            "second_chance" => Ok(Self::SecondChance),
            "dissatisfied" => Ok(Self::Dissatisfied),
            _ => Err(CoreError::InvalidData(format!("unknown taste status: {s}"))),
        }
    }
}

/// A diner's assessment of a dish: either a numeric rank or a taste
/// status, never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankingValue {
    Numeric(Rank),
    Status(TasteStatus),
}

impl RankingValue {
    /// Build a numeric value, rejecting out-of-range ranks.
    pub fn numeric(rank: u8) -> Result<Self, ValidationError> {
        Ok(Self::Numeric(Rank::new(rank)?))
    }

    pub fn status(status: TasteStatus) -> Self {
        Self::Status(status)
    }

    pub fn rank(&self) -> Option<Rank> {
        match self {
            Self::Numeric(rank) => Some(*rank),
            Self::Status(_) => None,
        }
    }

    pub fn taste_status(&self) -> Option<TasteStatus> {
        match self {
            Self::Numeric(_) => None,
            Self::Status(status) => Some(*status),
        }
    }

    /// True when this value claims the single best slot in its bucket.
    pub fn is_best(&self) -> bool {
        matches!(self, Self::Numeric(rank) if rank.is_best())
    }
}

impl From<Rank> for RankingValue {
    fn from(rank: Rank) -> Self {
        Self::Numeric(rank)
    }
}

impl From<TasteStatus> for RankingValue {
    fn from(status: TasteStatus) -> Self {
        Self::Status(status)
    }
}
