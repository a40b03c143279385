//! One-time reward tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::tiers::Token;

/// A task users can complete once for a fixed reward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_amount: f64,
    pub reward_token: Token,
    pub task_type: String,
    pub redirect_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build a task with a fresh id.
    ///
    /// # Errors
    /// Returns an error if the title is blank or the reward is not positive.
    pub fn new(
        title: impl Into<String>,
        reward_amount: f64,
        reward_token: Token,
        task_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::Empty("title".into()));
        }
        if !reward_amount.is_finite() || reward_amount <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "reward_amount".into(),
                message: format!("must be positive, got {reward_amount}"),
            });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title,
            description: String::new(),
            reward_amount,
            reward_token,
            task_type: task_type.into(),
            redirect_url: None,
            created_at,
        })
    }
}

/// Result of completing a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCompletionResult {
    pub task_id: String,
    pub reward_amount: f64,
    pub reward_token: Token,
    pub completed_at: DateTime<Utc>,
    pub transaction_id: String,
}
