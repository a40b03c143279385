//! Claim engine: daily streak rewards plus task and referral grants.
//!
//! The engine owns no global state. Storage, clock, tiers and policy are
//! injected, and every operation takes the authenticated user explicitly.
//! A `None` user means the request carried no session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::achievements::{Achievement, AchievementKind};
use crate::clock::{Clock, DayBoundary, SystemClock};
use crate::error::{ClaimError, ConfigError, DatabaseError, ValidationError};
use crate::profile::{normalize_referral_code, Profile, ProfileOverview, ProfileUpdate};
use crate::referral::{Referral, ReferralResult, ReferralRewards};
use crate::storage::Config;
use crate::store::{
    AchievementStore, CommitOutcome, ProfileStore, ReferralStore, RewardStore, TaskStore,
};
use crate::streak::{ClaimResult, CyclePolicy, StreakDay, StreakLedger, StreakStatus};
use crate::tasks::{Task, TaskCompletionResult};
use crate::tiers::TierTable;
use crate::transaction::{Page, PageRequest, Transaction, TransactionType};

/// Attempts before a claim that keeps losing compare-and-swap races gives up.
const MAX_CLAIM_ATTEMPTS: usize = 3;

/// Orchestrates reward grants against a store.
pub struct ClaimEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    boundary: DayBoundary,
    tiers: TierTable,
    policy: CyclePolicy,
    referral: ReferralRewards,
    page_size: u32,
}

impl<S> ClaimEngine<S> {
    /// Engine with default tiers, UTC day boundaries and the freeze policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            boundary: DayBoundary::utc(),
            tiers: TierTable::default(),
            policy: CyclePolicy::default(),
            referral: ReferralRewards::default(),
            page_size: PageRequest::DEFAULT_PAGE_SIZE,
        }
    }

    /// Engine configured from a loaded [`Config`].
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn from_config(store: S, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            boundary: config.day_boundary()?,
            tiers: config.tier_table()?,
            policy: config.streak.cycle_policy,
            referral: config.referral_rewards(),
            page_size: config.history.page_size,
            ..Self::new(store)
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_boundary(mut self, boundary: DayBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_tiers(mut self, tiers: TierTable) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_policy(mut self, policy: CyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_referral_rewards(mut self, referral: ReferralRewards) -> Self {
        self.referral = referral;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }
}

fn authenticated(user: Option<&str>) -> Result<&str, ClaimError> {
    match user.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ClaimError::Unauthorized),
    }
}

impl<S: RewardStore + AchievementStore> ClaimEngine<S> {
    /// Claim today's streak reward.
    ///
    /// At most one claim per user per calendar day succeeds, including under
    /// concurrent requests: the ledger write is conditional on the
    /// `last_claimed_at` that was read, and the store rejects a second
    /// daily-reward transaction for the same day key.
    ///
    /// # Errors
    /// - [`ClaimError::Unauthorized`] without a user
    /// - [`ClaimError::AlreadyClaimed`] if today's reward was already granted
    /// - [`ClaimError::Persistence`] on storage failure
    pub fn claim_daily(&self, user: Option<&str>) -> Result<ClaimResult, ClaimError> {
        let user_id = authenticated(user)?;

        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            let now = self.clock.now();
            let mut ledger = self
                .store
                .get_streak(user_id)?
                .unwrap_or_else(|| StreakLedger::new(user_id));
            ledger.validate()?;

            if self.boundary.has_claimed_today(ledger.last_claimed_at, now) {
                tracing::warn!(user_id, "daily reward already claimed today");
                return Err(ClaimError::AlreadyClaimed);
            }

            let expected = ledger.last_claimed_at;
            let tier = ledger.apply_claim(now, &self.tiers, self.policy)?;
            let tx = Transaction::new(
                user_id,
                tier.amount,
                tier.token,
                TransactionType::DailyReward,
                now,
            )
            .with_description(format!("Day {} login reward", tier.day_index + 1));
            let day_key = self.boundary.day_key(now);

            match self.store.commit_claim(&ledger, expected, &day_key, &tx)? {
                CommitOutcome::Committed => {
                    tracing::info!(
                        user_id,
                        day = tier.day_index,
                        amount = tier.amount,
                        token = %tier.token,
                        day_key = %day_key,
                        "daily reward claimed"
                    );
                    self.refresh_achievement(user_id, AchievementKind::LoginStreak, now);
                    return Ok(ClaimResult {
                        streak_days: ledger.current_day,
                        current_day: ledger.current_day,
                        days_completed: ledger.days_completed.iter().copied().collect(),
                        reward_amount: tier.amount,
                        reward_token: tier.token,
                        claimed_at: now,
                        cycle: ledger.cycle,
                        transaction_id: tx.id,
                    });
                }
                CommitOutcome::Conflict => {
                    tracing::warn!(user_id, attempt, "claim lost a race, re-reading ledger");
                }
            }
        }

        Err(ClaimError::Persistence(DatabaseError::Conflict(format!(
            "streak for {user_id} kept changing during claim"
        ))))
    }

    /// Current streak state for display. Does not create a ledger.
    ///
    /// # Errors
    /// Returns an error without a user or on storage failure.
    pub fn streak_status(&self, user: Option<&str>) -> Result<StreakStatus, ClaimError> {
        let user_id = authenticated(user)?;
        let now = self.clock.now();
        let ledger = self
            .store
            .get_streak(user_id)?
            .unwrap_or_else(|| StreakLedger::new(user_id));
        ledger.validate()?;

        let claimed_today = self.boundary.has_claimed_today(ledger.last_claimed_at, now);
        let next_day = ledger.next_claim_day(self.policy);
        let next_reward = self.tiers.tier_for(i64::from(next_day))?;
        let rolling_over = next_day != ledger.current_day;

        let days = self
            .tiers
            .tiers()
            .iter()
            .map(|tier| StreakDay {
                day_index: tier.day_index,
                reward: tier.label(),
                token: tier.token,
                bonus: tier.is_bonus(),
                completed: !rolling_over && ledger.days_completed.contains(&tier.day_index),
            })
            .collect();

        Ok(StreakStatus {
            user_id: user_id.to_string(),
            current_day: ledger.current_day,
            cycle: ledger.cycle,
            last_claimed_at: ledger.last_claimed_at,
            claimed_today,
            next_claim_at: if claimed_today {
                self.boundary.next_day_start(now)
            } else {
                Some(now)
            },
            next_reward,
            days,
        })
    }

    /// One page of the user's transactions, newest first. Pages start at 1.
    ///
    /// # Errors
    /// Returns an error without a user, for page 0, or on storage failure.
    pub fn transactions(
        &self,
        user: Option<&str>,
        page: u32,
    ) -> Result<Page<Transaction>, ClaimError> {
        let user_id = authenticated(user)?;
        let request = PageRequest::new(page, self.page_size)?;
        Ok(self.store.list_transactions(user_id, request)?)
    }

    /// The user's achievement standings.
    ///
    /// # Errors
    /// Returns an error without a user or on storage failure.
    pub fn achievements(&self, user: Option<&str>) -> Result<Vec<Achievement>, ClaimError> {
        let user_id = authenticated(user)?;
        Ok(self.store.achievements(user_id)?)
    }

    /// Recount progress for one achievement after a committed grant.
    ///
    /// The grant itself already succeeded, so a failure here is logged and
    /// left for the next refresh.
    fn refresh_achievement(&self, user_id: &str, kind: AchievementKind, now: DateTime<Utc>) {
        let refreshed = self
            .store
            .achievement_progress(user_id, kind)
            .and_then(|progress| {
                let achievement = Achievement::evaluate(user_id, kind, progress, now);
                self.store.upsert_achievement(&achievement)
            });
        if let Err(e) = refreshed {
            tracing::warn!(user_id, kind = %kind, error = %e, "achievement refresh failed");
        }
    }
}

impl<S> ClaimEngine<S>
where
    S: RewardStore + AchievementStore + ProfileStore + TaskStore + ReferralStore,
{
    /// Profile with balances derived from the transaction ledger, bundled
    /// with streak progress and achievements. Creates the profile on first
    /// read.
    ///
    /// # Errors
    /// Returns an error without a user or on storage failure.
    pub fn profile(&self, user: Option<&str>) -> Result<ProfileOverview, ClaimError> {
        let user_id = authenticated(user)?;
        let profile = self.store.ensure_profile(user_id, self.clock.now())?;
        Ok(ProfileOverview {
            profile,
            streak: self.streak_status(Some(user_id))?,
            achievements: self.store.achievements(user_id)?,
        })
    }

    /// Change display name and/or avatar URL. Fields left as `None` are kept;
    /// blank values clear them.
    ///
    /// # Errors
    /// Returns an error without a user, for a non-http(s) avatar URL, or on
    /// storage failure.
    pub fn update_profile(
        &self,
        user: Option<&str>,
        update: &ProfileUpdate,
    ) -> Result<Profile, ClaimError> {
        let user_id = authenticated(user)?;
        let update = update.normalized()?;
        self.store.ensure_profile(user_id, self.clock.now())?;
        self.store.update_profile(user_id, &update)?;
        tracing::info!(user_id, "profile updated");
        Ok(self.store.ensure_profile(user_id, self.clock.now())?)
    }

    /// Add a task to the catalog.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn add_task(&self, task: &Task) -> Result<(), ClaimError> {
        self.store.insert_task(task)?;
        tracing::info!(task_id = %task.id, title = %task.title, "task added");
        Ok(())
    }

    /// The task catalog, newest first.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_tasks(&self) -> Result<Vec<Task>, ClaimError> {
        Ok(self.store.list_tasks()?)
    }

    /// Ids of tasks the user has completed.
    ///
    /// # Errors
    /// Returns an error without a user or on storage failure.
    pub fn completed_tasks(&self, user: Option<&str>) -> Result<Vec<String>, ClaimError> {
        let user_id = authenticated(user)?;
        Ok(self.store.completed_task_ids(user_id)?)
    }

    /// All tasks paired with whether `user` has completed each. An anonymous
    /// caller sees every task as open.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn tasks(&self, user: Option<&str>) -> Result<Vec<(Task, bool)>, ClaimError> {
        let tasks = self.list_tasks()?;
        let done = match self.completed_tasks(user) {
            Ok(ids) => ids,
            Err(ClaimError::Unauthorized) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(tasks
            .into_iter()
            .map(|task| {
                let completed = done.contains(&task.id);
                (task, completed)
            })
            .collect())
    }

    /// Complete a task once and receive its reward.
    ///
    /// # Errors
    /// - [`ClaimError::Unauthorized`] without a user
    /// - [`ClaimError::TaskNotFound`] for an unknown id
    /// - [`ClaimError::TaskAlreadyCompleted`] on a repeat completion
    pub fn complete_task(
        &self,
        user: Option<&str>,
        task_id: &str,
    ) -> Result<TaskCompletionResult, ClaimError> {
        let user_id = authenticated(user)?;
        if task_id.trim().is_empty() {
            return Err(ValidationError::Empty("task_id".into()).into());
        }
        let task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| ClaimError::TaskNotFound(task_id.to_string()))?;

        let now = self.clock.now();
        self.store.ensure_profile(user_id, now)?;
        let tx = Transaction::new(
            user_id,
            task.reward_amount,
            task.reward_token,
            TransactionType::TaskCompletion,
            now,
        )
        .with_description(format!("Task completed: {}", task.title))
        .with_reference(task.id.clone());

        match self.store.commit_task_completion(user_id, &task.id, &tx)? {
            CommitOutcome::Committed => {
                tracing::info!(user_id, task_id = %task.id, amount = task.reward_amount, "task reward granted");
                Ok(TaskCompletionResult {
                    task_id: task.id,
                    reward_amount: task.reward_amount,
                    reward_token: task.reward_token,
                    completed_at: now,
                    transaction_id: tx.id,
                })
            }
            CommitOutcome::Conflict => {
                tracing::warn!(user_id, task_id = %task.id, "task already completed");
                Err(ClaimError::TaskAlreadyCompleted(task.id))
            }
        }
    }

    /// Apply another user's referral code.
    ///
    /// The code owner receives a `referral_reward`, the caller a
    /// `referral_bonus`. Each user can be referred once.
    ///
    /// # Errors
    /// - [`ClaimError::Unauthorized`] without a user
    /// - [`ClaimError::InvalidReferralCode`] for an unknown code
    /// - [`ClaimError::SelfReferral`] for the caller's own code
    /// - [`ClaimError::AlreadyReferred`] if the caller already has a referrer
    pub fn apply_referral(
        &self,
        user: Option<&str>,
        code: &str,
    ) -> Result<ReferralResult, ClaimError> {
        let referee_id = authenticated(user)?;
        let code = normalize_referral_code(code);
        if code.is_empty() {
            return Err(ValidationError::Empty("referral_code".into()).into());
        }
        let referrer_id = self
            .store
            .find_user_by_referral_code(&code)?
            .ok_or_else(|| ClaimError::InvalidReferralCode(code.clone()))?;
        if referrer_id == referee_id {
            return Err(ClaimError::SelfReferral);
        }
        if self.store.referrer_of(referee_id)?.is_some() {
            return Err(ClaimError::AlreadyReferred);
        }

        let now = self.clock.now();
        self.store.ensure_profile(referee_id, now)?;
        let referral = Referral {
            id: Uuid::new_v4().to_string(),
            referrer_id: referrer_id.clone(),
            referee_id: referee_id.to_string(),
            created_at: now,
            reward_claimed: true,
        };

        let mut grants = Vec::with_capacity(2);
        if self.referral.reward_amount > 0.0 {
            grants.push(
                Transaction::new(
                    &referrer_id,
                    self.referral.reward_amount,
                    self.referral.token,
                    TransactionType::ReferralReward,
                    now,
                )
                .with_description("Referral reward")
                .with_reference(referee_id),
            );
        }
        if self.referral.bonus_amount > 0.0 {
            grants.push(
                Transaction::new(
                    referee_id,
                    self.referral.bonus_amount,
                    self.referral.token,
                    TransactionType::ReferralBonus,
                    now,
                )
                .with_description("Referral sign-up bonus")
                .with_reference(&referrer_id),
            );
        }

        match self.store.commit_referral(&referral, &grants)? {
            CommitOutcome::Committed => {
                tracing::info!(referrer_id = %referrer_id, referee_id, "referral applied");
                self.refresh_achievement(&referrer_id, AchievementKind::Referral, now);
                Ok(ReferralResult {
                    referral_id: referral.id,
                    referrer_id,
                    referee_id: referee_id.to_string(),
                    referrer_reward: self.referral.reward_amount,
                    referee_bonus: self.referral.bonus_amount,
                    token: self.referral.token,
                })
            }
            CommitOutcome::Conflict => Err(ClaimError::AlreadyReferred),
        }
    }

    /// Referrals made with the user's code, newest first.
    ///
    /// # Errors
    /// Returns an error without a user or on storage failure.
    pub fn referrals(&self, user: Option<&str>) -> Result<Vec<Referral>, ClaimError> {
        let user_id = authenticated(user)?;
        Ok(self.store.referrals_by(user_id)?)
    }
}
