//! # Streakroom Core Library
//!
//! Core logic for a daily login-streak and reward-claim engine. A user claims
//! at most once per calendar day; consecutive claims walk a seven-tier reward
//! table whose last day is a bonus. Every grant is recorded in an append-only
//! transaction ledger from which balances are derived.
//!
//! ## Architecture
//!
//! - **Clock**: injectable time source and the calendar-day boundary
//! - **Tiers / Streak**: the reward table and the per-user streak ledger
//! - **Engine**: claim orchestration, tasks and referrals over a store
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`ClaimEngine`]: claim, status, history, profile, achievements, tasks, referrals
//! - [`Database`]: SQLite implementation of the store traits
//! - [`Config`]: application configuration management

pub mod achievements;
pub mod api;
pub mod clock;
pub mod engine;
pub mod error;
pub mod profile;
pub mod referral;
pub mod storage;
pub mod store;
pub mod streak;
pub mod tasks;
pub mod tiers;
pub mod transaction;

pub use achievements::{Achievement, AchievementKind};
pub use api::{respond, ApiResponse};
pub use clock::{Clock, DayBoundary, FixedClock, SystemClock};
pub use engine::ClaimEngine;
pub use error::{ClaimError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use profile::{Balances, Profile, ProfileOverview, ProfileUpdate};
pub use referral::{Referral, ReferralResult, ReferralRewards};
pub use storage::{Config, Database};
pub use store::{AchievementStore, CommitOutcome, ProfileStore, ReferralStore, RewardStore, TaskStore};
pub use streak::{ClaimResult, CyclePolicy, StreakDay, StreakLedger, StreakStatus};
pub use tasks::{Task, TaskCompletionResult};
pub use tiers::{RewardTier, TierTable, Token};
pub use transaction::{Page, PageRequest, Transaction, TransactionType};
