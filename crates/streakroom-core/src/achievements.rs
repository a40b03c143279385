//! Multi-level achievements.
//!
//! Each kind has seven targets. The level is the number of targets the
//! user's progress has reached; progress is recounted from the ledger after
//! every grant, so re-evaluating is always safe.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Distinct daily claims needed for each login-streak level.
pub const LOGIN_STREAK_TARGETS: [u32; 7] = [3, 7, 14, 30, 60, 90, 180];

/// Referrals needed for each referral level.
pub const REFERRAL_TARGETS: [u32; 7] = [10, 25, 50, 75, 100, 150, 200];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    LoginStreak,
    Referral,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 2] = [AchievementKind::LoginStreak, AchievementKind::Referral];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::LoginStreak => "login_streak",
            AchievementKind::Referral => "referral",
        }
    }

    pub fn targets(&self) -> &'static [u32; 7] {
        match self {
            AchievementKind::LoginStreak => &LOGIN_STREAK_TARGETS,
            AchievementKind::Referral => &REFERRAL_TARGETS,
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login_streak" => Ok(AchievementKind::LoginStreak),
            "referral" => Ok(AchievementKind::Referral),
            _ => Err(ValidationError::InvalidValue {
                field: "achievement_type".into(),
                message: format!("unknown achievement '{s}'"),
            }),
        }
    }
}

/// One user's standing in one achievement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub user_id: String,
    pub achievement_type: AchievementKind,
    /// 0 until the first target is reached, 7 at most.
    pub achievement_level: u8,
    pub current_progress: u32,
    /// Target for the next level; the top target once every level is reached.
    pub next_target: u32,
    /// When the current level was reached. `None` at level 0.
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    /// Standing for `progress`, as if evaluated at `now`.
    pub fn evaluate(
        user_id: impl Into<String>,
        kind: AchievementKind,
        progress: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let targets = kind.targets();
        let level = targets.iter().take_while(|&&t| progress >= t).count();
        let next_target = targets.get(level).copied().unwrap_or(targets[targets.len() - 1]);
        Self {
            user_id: user_id.into(),
            achievement_type: kind,
            achievement_level: level as u8,
            current_progress: progress,
            next_target,
            unlocked_at: (level > 0).then_some(now),
        }
    }

    pub fn is_maxed(&self) -> bool {
        usize::from(self.achievement_level) == self.achievement_type.targets().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_targets() {
        let now = Utc::now();
        let a = Achievement::evaluate("u", AchievementKind::LoginStreak, 2, now);
        assert_eq!((a.achievement_level, a.next_target), (0, 3));
        assert!(a.unlocked_at.is_none());

        let a = Achievement::evaluate("u", AchievementKind::LoginStreak, 7, now);
        assert_eq!((a.achievement_level, a.next_target), (2, 14));
        assert_eq!(a.unlocked_at, Some(now));

        let a = Achievement::evaluate("u", AchievementKind::Referral, 500, now);
        assert_eq!((a.achievement_level, a.next_target), (7, 200));
        assert!(a.is_maxed());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in AchievementKind::ALL {
            assert_eq!(kind.as_str().parse::<AchievementKind>().unwrap(), kind);
        }
        assert!("karma".parse::<AchievementKind>().is_err());
    }
}
