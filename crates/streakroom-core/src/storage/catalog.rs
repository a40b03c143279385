//! Profile, achievement, task and referral tables.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::achievements::{Achievement, AchievementKind};
use crate::error::DatabaseError;
use crate::profile::{generate_referral_code, Balances, NormalizedUpdate, Profile};
use crate::referral::Referral;
use crate::store::{AchievementStore, CommitOutcome, ProfileStore, ReferralStore, TaskStore};
use crate::tasks::Task;
use crate::tiers::Token;
use crate::transaction::Transaction;

use super::database::{
    format_timestamp, insert_transaction, is_constraint_violation, optional_timestamp_column,
    parse_column, timestamp_column, Database,
};

const REFERRAL_CODE_ATTEMPTS: usize = 5;

impl Database {
    fn load_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let row = self
            .conn()
            .query_row(
                "SELECT display_name, avatar_url, referral_code, total_tasks_completed, created_at
                 FROM user_profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        timestamp_column(row, 4)?,
                    ))
                },
            )
            .optional()?;

        let Some((display_name, avatar_url, referral_code, total_tasks_completed, created_at)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(Profile {
            user_id: user_id.to_string(),
            display_name,
            avatar_url,
            referral_code,
            total_tasks_completed,
            referral_count: self.referral_count(user_id)?,
            balances: self.balances(user_id)?,
            created_at,
        }))
    }

    /// Per-token sums over the user's transactions.
    pub fn balances(&self, user_id: &str) -> Result<Balances, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT token, COALESCE(SUM(amount), 0)
             FROM transactions
             WHERE user_id = ?1
             GROUP BY token",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((parse_column::<Token>(row, 0)?, row.get::<_, f64>(1)?))
        })?;

        let mut balances = Balances::default();
        for row in rows {
            let (token, amount) = row?;
            balances.credit(token, amount);
        }
        Ok(balances)
    }

    fn referral_count(&self, user_id: &str) -> Result<u32, DatabaseError> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM referrals WHERE referrer_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }
}

impl ProfileStore for Database {
    fn ensure_profile(&self, user_id: &str, now: DateTime<Utc>) -> Result<Profile, DatabaseError> {
        if let Some(profile) = self.load_profile(user_id)? {
            return Ok(profile);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let code = generate_referral_code();
            let result = self.conn().execute(
                "INSERT INTO user_profiles (user_id, referral_code, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user_id, code, format_timestamp(now)],
            );
            match result {
                Ok(_) => break,
                // Referral code collision; the user_id conflict is absorbed above.
                Err(e) if is_constraint_violation(&e) && attempts < REFERRAL_CODE_ATTEMPTS => {
                    tracing::debug!(user_id, "referral code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!(user_id, "profile created");

        self.load_profile(user_id)?.ok_or_else(|| {
            DatabaseError::QueryFailed(format!("profile for {user_id} vanished after insert"))
        })
    }

    fn update_profile(&self, user_id: &str, update: &NormalizedUpdate) -> Result<(), DatabaseError> {
        let (set_name, name) = match &update.display_name {
            Some(name) => (true, name.as_deref()),
            None => (false, None),
        };
        let (set_avatar, avatar) = match &update.avatar_url {
            Some(url) => (true, url.as_deref()),
            None => (false, None),
        };
        self.conn().execute(
            "UPDATE user_profiles SET
                display_name = CASE WHEN ?2 THEN ?3 ELSE display_name END,
                avatar_url   = CASE WHEN ?4 THEN ?5 ELSE avatar_url END
             WHERE user_id = ?1",
            params![user_id, set_name, name, set_avatar, avatar],
        )?;
        Ok(())
    }

    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT user_id FROM user_profiles WHERE referral_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl TaskStore for Database {
    fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO tasks
                (id, title, description, reward_amount, reward_token, task_type, redirect_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.id,
                task.title,
                task.description,
                task.reward_amount,
                task.reward_token.as_str(),
                task.task_type,
                task.redirect_url,
                format_timestamp(task.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, DatabaseError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, title, description, reward_amount, reward_token, task_type, redirect_url, created_at
                 FROM tasks WHERE id = ?1",
                params![task_id],
                row_to_task,
            )
            .optional()?)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, description, reward_amount, reward_token, task_type, redirect_url, created_at
             FROM tasks ORDER BY created_at DESC, rowid DESC",
        )?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn completed_task_ids(&self, user_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT task_id FROM task_completions WHERE user_id = ?1 ORDER BY completed_at",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn commit_task_completion(
        &self,
        user_id: &str,
        task_id: &str,
        tx: &Transaction,
    ) -> Result<CommitOutcome, DatabaseError> {
        let db_tx = self.begin_immediate()?;

        let inserted = db_tx.execute(
            "INSERT INTO task_completions (user_id, task_id, completed_at) VALUES (?1, ?2, ?3)",
            params![user_id, task_id, format_timestamp(tx.created_at)],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Ok(CommitOutcome::Conflict),
            Err(e) => return Err(e.into()),
        }
        insert_transaction(&db_tx, tx, None)?;
        db_tx.execute(
            "UPDATE user_profiles SET total_tasks_completed = total_tasks_completed + 1
             WHERE user_id = ?1",
            params![user_id],
        )?;

        db_tx.commit()?;
        Ok(CommitOutcome::Committed)
    }
}

impl ReferralStore for Database {
    fn commit_referral(
        &self,
        referral: &Referral,
        grants: &[Transaction],
    ) -> Result<CommitOutcome, DatabaseError> {
        let db_tx = self.begin_immediate()?;

        let inserted = db_tx.execute(
            "INSERT INTO referrals (id, referrer_id, referee_id, created_at, reward_claimed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                referral.id,
                referral.referrer_id,
                referral.referee_id,
                format_timestamp(referral.created_at),
                referral.reward_claimed,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Ok(CommitOutcome::Conflict),
            Err(e) => return Err(e.into()),
        }
        for grant in grants {
            insert_transaction(&db_tx, grant, None)?;
        }

        db_tx.commit()?;
        Ok(CommitOutcome::Committed)
    }

    fn referrer_of(&self, referee_id: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT referrer_id FROM referrals WHERE referee_id = ?1",
                params![referee_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn referrals_by(&self, referrer_id: &str) -> Result<Vec<Referral>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, referrer_id, referee_id, created_at, reward_claimed
             FROM referrals WHERE referrer_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let referrals = stmt
            .query_map(params![referrer_id], |row| {
                Ok(Referral {
                    id: row.get(0)?,
                    referrer_id: row.get(1)?,
                    referee_id: row.get(2)?,
                    created_at: timestamp_column(row, 3)?,
                    reward_claimed: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(referrals)
    }
}

impl AchievementStore for Database {
    fn achievement_progress(&self, user_id: &str, kind: AchievementKind) -> Result<u32, DatabaseError> {
        let sql = match kind {
            AchievementKind::LoginStreak => {
                "SELECT COUNT(*) FROM transactions
                 WHERE user_id = ?1 AND claim_day IS NOT NULL"
            }
            AchievementKind::Referral => "SELECT COUNT(*) FROM referrals WHERE referrer_id = ?1",
        };
        Ok(self.conn().query_row(sql, params![user_id], |row| row.get(0))?)
    }

    fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), DatabaseError> {
        let now = format_timestamp(Utc::now());
        self.conn().execute(
            "INSERT INTO achievements
                (user_id, achievement_type, achievement_level, current_progress, next_target,
                 unlocked_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(user_id, achievement_type) DO UPDATE SET
                unlocked_at = CASE
                    WHEN excluded.achievement_level > achievements.achievement_level
                    THEN excluded.unlocked_at
                    ELSE achievements.unlocked_at
                END,
                achievement_level = MAX(excluded.achievement_level, achievements.achievement_level),
                current_progress = excluded.current_progress,
                next_target = excluded.next_target,
                updated_at = excluded.updated_at",
            params![
                achievement.user_id,
                achievement.achievement_type.as_str(),
                achievement.achievement_level,
                achievement.current_progress,
                achievement.next_target,
                achievement.unlocked_at.map(format_timestamp),
                now,
            ],
        )?;
        tracing::debug!(
            user_id = %achievement.user_id,
            kind = %achievement.achievement_type,
            level = achievement.achievement_level,
            "achievement refreshed"
        );
        Ok(())
    }

    fn achievements(&self, user_id: &str) -> Result<Vec<Achievement>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id, achievement_type, achievement_level, current_progress, next_target, unlocked_at
             FROM achievements WHERE user_id = ?1
             ORDER BY achievement_type",
        )?;
        let achievements = stmt
            .query_map(params![user_id], |row| {
                Ok(Achievement {
                    user_id: row.get(0)?,
                    achievement_type: parse_column(row, 1)?,
                    achievement_level: row.get(2)?,
                    current_progress: row.get(3)?,
                    next_target: row.get(4)?,
                    unlocked_at: optional_timestamp_column(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(achievements)
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        reward_amount: row.get(3)?,
        reward_token: parse_column(row, 4)?,
        task_type: row.get(5)?,
        redirect_url: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}
