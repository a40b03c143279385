//! Per-user login streak ledger.
//!
//! The ledger tracks where the user is in the 7-slot cycle. It is created
//! lazily with defaults on the first claim attempt and mutated only through
//! [`StreakLedger::apply_claim`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, ValidationError};
use crate::tiers::{RewardTier, TierTable, Token, BONUS_DAY, CYCLE_LEN};

/// What happens after the bonus day has been claimed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Stay on the bonus day; every later claim repays the bonus tier.
    #[default]
    Freeze,
    /// The claim after a completed bonus day starts a fresh cycle at day 0.
    Wrap,
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePolicy::Freeze => f.write_str("freeze"),
            CyclePolicy::Wrap => f.write_str("wrap"),
        }
    }
}

impl FromStr for CyclePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freeze" => Ok(CyclePolicy::Freeze),
            "wrap" => Ok(CyclePolicy::Wrap),
            _ => Err(ValidationError::InvalidValue {
                field: "cycle_policy".into(),
                message: format!("expected 'freeze' or 'wrap', got '{s}'"),
            }),
        }
    }
}

/// Persisted streak state for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakLedger {
    pub user_id: String,
    /// Next day index to be claimed, in `[0, 6]`.
    pub current_day: u8,
    pub days_completed: BTreeSet<u8>,
    pub last_claimed_at: Option<DateTime<Utc>>,
    /// Completed cycles under [`CyclePolicy::Wrap`]; always 0 under `Freeze`.
    #[serde(default)]
    pub cycle: u32,
}

impl StreakLedger {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_day: 0,
            days_completed: BTreeSet::new(),
            last_claimed_at: None,
            cycle: 0,
        }
    }

    /// True once the bonus day has been claimed in the current cycle.
    pub fn bonus_claimed(&self) -> bool {
        self.current_day == BONUS_DAY && self.days_completed.contains(&BONUS_DAY)
    }

    /// Day index the next claim will pay, after any cycle rollover.
    pub fn next_claim_day(&self, policy: CyclePolicy) -> u8 {
        if policy == CyclePolicy::Wrap && self.bonus_claimed() {
            0
        } else {
            self.current_day
        }
    }

    /// Apply one claim at `now` and return the tier paid.
    ///
    /// The caller has already established that `now` is on a new calendar
    /// day. The ledger is only modified when the tier lookup succeeds.
    ///
    /// # Errors
    /// Returns [`ClaimError::OutOfRange`] if `current_day` has been corrupted
    /// to a value outside the cycle.
    pub fn apply_claim(
        &mut self,
        now: DateTime<Utc>,
        tiers: &TierTable,
        policy: CyclePolicy,
    ) -> Result<RewardTier, ClaimError> {
        let rollover = policy == CyclePolicy::Wrap && self.bonus_claimed();
        let day = if rollover { 0 } else { self.current_day };
        let tier = tiers.tier_for(i64::from(day))?;

        if rollover {
            self.cycle += 1;
            self.days_completed.clear();
        }
        self.current_day = day;
        self.days_completed.insert(day);
        self.last_claimed_at = Some(now);
        if self.current_day < BONUS_DAY {
            self.current_day += 1;
        }
        Ok(tier)
    }

    /// Check the structural invariants of a loaded ledger.
    pub fn validate(&self) -> Result<(), ClaimError> {
        if usize::from(self.current_day) >= CYCLE_LEN {
            return Err(ClaimError::OutOfRange {
                day_index: i64::from(self.current_day),
            });
        }
        if let Some(&bad) = self
            .days_completed
            .iter()
            .find(|&&d| usize::from(d) >= CYCLE_LEN)
        {
            return Err(ClaimError::OutOfRange {
                day_index: i64::from(bad),
            });
        }
        Ok(())
    }
}

/// Successful daily claim, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimResult {
    pub streak_days: u8,
    pub current_day: u8,
    pub days_completed: Vec<u8>,
    pub reward_amount: f64,
    pub reward_token: Token,
    pub claimed_at: DateTime<Utc>,
    pub cycle: u32,
    pub transaction_id: String,
}

/// One slot of the streak card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakDay {
    pub day_index: u8,
    pub reward: String,
    pub token: Token,
    pub bonus: bool,
    pub completed: bool,
}

/// Read-only view of a user's streak for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakStatus {
    pub user_id: String,
    pub current_day: u8,
    pub cycle: u32,
    pub last_claimed_at: Option<DateTime<Utc>>,
    pub claimed_today: bool,
    pub next_claim_at: Option<DateTime<Utc>>,
    pub next_reward: RewardTier,
    pub days: Vec<StreakDay>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn fresh_ledger_defaults() {
        let ledger = StreakLedger::new("u1");
        assert_eq!(ledger.current_day, 0);
        assert!(ledger.days_completed.is_empty());
        assert!(ledger.last_claimed_at.is_none());
        assert!(ledger.validate().is_ok());
    }

    #[test]
    fn first_claim_pays_day_zero() {
        let tiers = TierTable::default();
        let mut ledger = StreakLedger::new("u1");
        let tier = ledger.apply_claim(day(0), &tiers, CyclePolicy::Freeze).unwrap();
        assert_eq!(tier.day_index, 0);
        assert_eq!(ledger.current_day, 1);
        assert_eq!(ledger.days_completed.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(ledger.last_claimed_at, Some(day(0)));
    }

    #[test]
    fn freeze_stays_on_bonus_day() {
        let tiers = TierTable::default();
        let mut ledger = StreakLedger::new("u1");
        for n in 0..10 {
            ledger.apply_claim(day(n), &tiers, CyclePolicy::Freeze).unwrap();
            assert_eq!(i64::from(ledger.current_day), (n + 1).min(6));
        }
        assert_eq!(ledger.days_completed.len(), CYCLE_LEN);
        assert_eq!(ledger.cycle, 0);
        let tier = ledger.apply_claim(day(11), &tiers, CyclePolicy::Freeze).unwrap();
        assert!(tier.is_bonus());
    }

    #[test]
    fn wrap_starts_new_cycle_after_bonus() {
        let tiers = TierTable::default();
        let mut ledger = StreakLedger::new("u1");
        for n in 0..7 {
            ledger.apply_claim(day(n), &tiers, CyclePolicy::Wrap).unwrap();
        }
        assert!(ledger.bonus_claimed());
        assert_eq!(ledger.next_claim_day(CyclePolicy::Wrap), 0);
        assert_eq!(ledger.next_claim_day(CyclePolicy::Freeze), 6);

        let tier = ledger.apply_claim(day(7), &tiers, CyclePolicy::Wrap).unwrap();
        assert_eq!(tier.day_index, 0);
        assert_eq!(ledger.cycle, 1);
        assert_eq!(ledger.current_day, 1);
        assert_eq!(ledger.days_completed.iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn corrupted_day_is_rejected_without_mutation() {
        let tiers = TierTable::default();
        let mut ledger = StreakLedger::new("u1");
        ledger.current_day = 9;
        let before = ledger.clone();
        assert!(matches!(
            ledger.apply_claim(day(0), &tiers, CyclePolicy::Freeze),
            Err(ClaimError::OutOfRange { day_index: 9 })
        ));
        assert_eq!(ledger, before);
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn policy_round_trips_through_str() {
        assert_eq!("wrap".parse::<CyclePolicy>().unwrap(), CyclePolicy::Wrap);
        assert_eq!(CyclePolicy::Freeze.to_string(), "freeze");
        assert!("reset".parse::<CyclePolicy>().is_err());
    }
}
