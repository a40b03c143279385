//! Persistence seams used by the claim engine.
//!
//! [`crate::storage::Database`] implements every trait here. The engine only
//! relies on the contracts documented on each method, so another backend can
//! be substituted as long as it keeps the atomicity guarantees.

use chrono::{DateTime, Utc};

use crate::achievements::{Achievement, AchievementKind};
use crate::error::DatabaseError;
use crate::profile::{NormalizedUpdate, Profile};
use crate::referral::Referral;
use crate::streak::StreakLedger;
use crate::tasks::Task;
use crate::transaction::{Page, PageRequest, Transaction};

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer changed the row first, or the claim-day key was taken.
    Conflict,
}

/// Streak ledger and transaction persistence.
pub trait RewardStore {
    fn get_streak(&self, user_id: &str) -> Result<Option<StreakLedger>, DatabaseError>;

    /// Insert or update a ledger only if the stored `last_claimed_at` still
    /// equals `expected` (`None` meaning no row or a never-claimed row).
    fn upsert_streak(
        &self,
        ledger: &StreakLedger,
        expected: Option<DateTime<Utc>>,
    ) -> Result<CommitOutcome, DatabaseError>;

    fn append_transaction(&self, tx: &Transaction) -> Result<(), DatabaseError>;

    /// Conditional ledger upsert plus the daily-reward transaction, committed
    /// together or not at all. `claim_day` is unique per user.
    fn commit_claim(
        &self,
        ledger: &StreakLedger,
        expected: Option<DateTime<Utc>>,
        claim_day: &str,
        tx: &Transaction,
    ) -> Result<CommitOutcome, DatabaseError>;

    /// Newest first, ties broken by insertion order descending.
    fn list_transactions(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Transaction>, DatabaseError>;
}

/// Profile aggregate persistence.
pub trait ProfileStore {
    /// Fetch the profile, creating it with a fresh referral code if absent.
    fn ensure_profile(&self, user_id: &str, now: DateTime<Utc>) -> Result<Profile, DatabaseError>;

    /// Apply the fields present in `update`; absent fields are left alone.
    fn update_profile(&self, user_id: &str, update: &NormalizedUpdate) -> Result<(), DatabaseError>;

    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<String>, DatabaseError>;
}

/// Task catalog and one-time completions.
pub trait TaskStore {
    fn insert_task(&self, task: &Task) -> Result<(), DatabaseError>;

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, DatabaseError>;

    /// Newest first.
    fn list_tasks(&self) -> Result<Vec<Task>, DatabaseError>;

    fn completed_task_ids(&self, user_id: &str) -> Result<Vec<String>, DatabaseError>;

    /// Record the completion and its transaction atomically.
    /// Returns [`CommitOutcome::Conflict`] if the user already completed it.
    fn commit_task_completion(
        &self,
        user_id: &str,
        task_id: &str,
        tx: &Transaction,
    ) -> Result<CommitOutcome, DatabaseError>;
}

/// Referral records.
pub trait ReferralStore {
    /// Record the referral and both grants atomically.
    /// Returns [`CommitOutcome::Conflict`] if the referee already has a referrer.
    fn commit_referral(
        &self,
        referral: &Referral,
        grants: &[Transaction],
    ) -> Result<CommitOutcome, DatabaseError>;

    fn referrer_of(&self, referee_id: &str) -> Result<Option<String>, DatabaseError>;

    fn referrals_by(&self, referrer_id: &str) -> Result<Vec<Referral>, DatabaseError>;
}

/// Achievement standings.
pub trait AchievementStore {
    /// Current progress counted from the ledger: distinct daily claims for
    /// [`AchievementKind::LoginStreak`], referrals made for
    /// [`AchievementKind::Referral`].
    fn achievement_progress(&self, user_id: &str, kind: AchievementKind) -> Result<u32, DatabaseError>;

    /// Insert or refresh a standing. `unlocked_at` is only overwritten when
    /// the level rises.
    fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), DatabaseError>;

    fn achievements(&self, user_id: &str) -> Result<Vec<Achievement>, DatabaseError>;
}
