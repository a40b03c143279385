//! User profile read model.
//!
//! Balances are never stored; they are summed from the transaction ledger
//! whenever a profile is read, so a profile fetched right after a grant may
//! trail it only by the duration of that read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;
use crate::error::ValidationError;
use crate::streak::StreakStatus;
use crate::tiers::Token;

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 8;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Per-token balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Balances(BTreeMap<Token, f64>);

impl Balances {
    pub fn get(&self, token: Token) -> f64 {
        self.0.get(&token).copied().unwrap_or(0.0)
    }

    pub fn credit(&mut self, token: Token, amount: f64) {
        *self.0.entry(token).or_insert(0.0) += amount;
    }
}

/// Profile aggregate for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub referral_code: String,
    pub total_tasks_completed: u32,
    pub referral_count: u32,
    pub balances: Balances,
    pub created_at: DateTime<Utc>,
}

/// Partial profile edit. `None` leaves a field untouched; a blank value
/// clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Trim values, map blanks to `Some(None)` (clear), and check the avatar
    /// URL scheme.
    pub fn normalized(&self) -> Result<NormalizedUpdate, ValidationError> {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
        };
        let avatar_url = clean(&self.avatar_url);
        if let Some(Some(url)) = &avatar_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ValidationError::InvalidValue {
                    field: "avatar_url".into(),
                    message: format!("expected an http(s) URL, got '{url}'"),
                });
            }
        }
        Ok(NormalizedUpdate {
            display_name: clean(&self.display_name),
            avatar_url,
        })
    }
}

/// [`ProfileUpdate`] after normalization: outer `None` = untouched,
/// `Some(None)` = clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedUpdate {
    pub display_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

/// Profile read model bundled with streak progress and achievements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileOverview {
    pub profile: Profile,
    pub streak: StreakStatus,
    pub achievements: Vec<Achievement>,
}

/// Generate a random referral code from an unambiguous alphabet.
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

/// Normalize user-entered codes before lookup.
pub fn normalize_referral_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
