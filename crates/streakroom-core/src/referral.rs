//! Referral records and rewards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tiers::Token;

/// A referrer/referee pair. Each referee has at most one referrer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referee_id: String,
    pub created_at: DateTime<Utc>,
    pub reward_claimed: bool,
}

/// Amounts paid when a referral code is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReferralRewards {
    /// Paid to the owner of the code.
    pub reward_amount: f64,
    /// Paid to the new user who applied it.
    pub bonus_amount: f64,
    pub token: Token,
}

impl Default for ReferralRewards {
    fn default() -> Self {
        Self {
            reward_amount: 5.0,
            bonus_amount: 2.0,
            token: Token::Zoo,
        }
    }
}

/// Result of applying a referral code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralResult {
    pub referral_id: String,
    pub referrer_id: String,
    pub referee_id: String,
    pub referrer_reward: f64,
    pub referee_bonus: f64,
    pub token: Token,
}
