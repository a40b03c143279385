//! Append-only reward transactions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::tiers::Token;

/// Why a grant was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    DailyReward,
    TaskCompletion,
    ReferralReward,
    ReferralBonus,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::DailyReward => "daily_reward",
            TransactionType::TaskCompletion => "task_completion",
            TransactionType::ReferralReward => "referral_reward",
            TransactionType::ReferralBonus => "referral_bonus",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily_reward" => Ok(TransactionType::DailyReward),
            "task_completion" => Ok(TransactionType::TaskCompletion),
            "referral_reward" => Ok(TransactionType::ReferralReward),
            "referral_bonus" => Ok(TransactionType::ReferralBonus),
            _ => Err(ValidationError::InvalidValue {
                field: "transaction_type".into(),
                message: format!("unknown transaction type '{s}'"),
            }),
        }
    }
}

/// An immutable record of a reward grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub token: Token,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    /// Task id or counterpart user id, when the grant has one.
    pub reference_id: Option<String>,
}

impl Transaction {
    pub fn new(
        user_id: impl Into<String>,
        amount: f64,
        token: Token,
        transaction_type: TransactionType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            amount,
            token,
            transaction_type,
            created_at,
            description: None,
            reference_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }
}

/// Pagination request for history reads. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// # Errors
    /// Returns an error for page 0 or an empty page size.
    pub fn new(page: u32, page_size: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage { page });
        }
        if page_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page_size".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self { page, page_size })
    }

    pub fn first() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_storage_format() {
        for t in [
            TransactionType::DailyReward,
            TransactionType::TaskCompletion,
            TransactionType::ReferralReward,
            TransactionType::ReferralBonus,
        ] {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                serde_json::Value::String(t.as_str().into())
            );
        }
        assert!("airdrop".parse::<TransactionType>().is_err());
    }

    #[test]
    fn transaction_serializes_type_field() {
        let tx = Transaction::new("u1", 2.0, Token::Zoo, TransactionType::DailyReward, Utc::now())
            .with_description("Day 3 login reward");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "daily_reward");
        assert_eq!(json["token"], "ZOO");
        assert_eq!(json["description"], "Day 3 login reward");
    }

    #[test]
    fn page_request_rejects_zero() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
        assert_eq!(PageRequest::first().offset(), 0);
    }

    #[test]
    fn page_math() {
        let page: Page<u8> = Page {
            items: vec![],
            page: 2,
            page_size: 10,
            total: 21,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let empty: Page<u8> = Page {
            items: vec![],
            page: 1,
            page_size: 10,
            total: 0,
        };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }
}
