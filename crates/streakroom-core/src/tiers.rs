//! Reward tiers for the 7-slot login cycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, ValidationError};

/// Number of slots in one streak cycle.
pub const CYCLE_LEN: usize = 7;

/// Index of the bonus slot ("day 7").
pub const BONUS_DAY: u8 = (CYCLE_LEN - 1) as u8;

/// Tokens a reward can be paid in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Kaia,
    Zoo,
    Wbtc,
}

impl Token {
    pub const ALL: [Token; 3] = [Token::Kaia, Token::Zoo, Token::Wbtc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Kaia => "KAIA",
            Token::Zoo => "ZOO",
            Token::Wbtc => "WBTC",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Token {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "KAIA" => Ok(Token::Kaia),
            "ZOO" => Ok(Token::Zoo),
            "WBTC" => Ok(Token::Wbtc),
            _ => Err(ValidationError::InvalidValue {
                field: "token".into(),
                message: format!("unknown token '{s}'"),
            }),
        }
    }
}

/// Reward paid for one day of the cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RewardTier {
    pub day_index: u8,
    pub amount: f64,
    pub token: Token,
}

impl RewardTier {
    pub fn is_bonus(&self) -> bool {
        self.day_index == BONUS_DAY
    }

    /// Short label shown on the streak card, e.g. `+2`.
    pub fn label(&self) -> String {
        format!("+{}", self.amount)
    }
}

/// Ordered lookup table of the seven tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: [RewardTier; CYCLE_LEN],
}

impl Default for TierTable {
    fn default() -> Self {
        const AMOUNTS: [f64; CYCLE_LEN] = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 10.0];
        let mut tiers = [RewardTier {
            day_index: 0,
            amount: 0.0,
            token: Token::Zoo,
        }; CYCLE_LEN];
        for (i, tier) in tiers.iter_mut().enumerate() {
            tier.day_index = i as u8;
            tier.amount = AMOUNTS[i];
        }
        Self { tiers }
    }
}

impl TierTable {
    /// Build a table from configured tiers.
    ///
    /// # Errors
    /// Returns an error unless there are exactly seven tiers, indexed 0..=6
    /// in order, with positive finite amounts.
    pub fn from_tiers(tiers: &[RewardTier]) -> Result<Self, ValidationError> {
        let tiers: [RewardTier; CYCLE_LEN] =
            tiers
                .try_into()
                .map_err(|_| ValidationError::InvalidValue {
                    field: "rewards.tiers".into(),
                    message: format!("expected {CYCLE_LEN} tiers, got {}", tiers.len()),
                })?;

        for (i, tier) in tiers.iter().enumerate() {
            if usize::from(tier.day_index) != i {
                return Err(ValidationError::InvalidValue {
                    field: "rewards.tiers".into(),
                    message: format!("tier {i} has day_index {}", tier.day_index),
                });
            }
            if !tier.amount.is_finite() || tier.amount <= 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: "rewards.tiers".into(),
                    message: format!("tier {i} amount must be positive, got {}", tier.amount),
                });
            }
        }
        Ok(Self { tiers })
    }

    /// Tier for a day index in `[0, 6]`.
    ///
    /// # Errors
    /// Returns [`ClaimError::OutOfRange`] for any other index.
    pub fn tier_for(&self, day_index: i64) -> Result<RewardTier, ClaimError> {
        usize::try_from(day_index)
            .ok()
            .and_then(|i| self.tiers.get(i))
            .copied()
            .ok_or(ClaimError::OutOfRange { day_index })
    }

    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }
}
