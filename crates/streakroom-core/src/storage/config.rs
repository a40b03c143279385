//! TOML-based application configuration.
//!
//! Stores engine settings including:
//! - The reference timezone that cuts calendar days
//! - What happens after the bonus day of a cycle
//! - Optional reward tier overrides
//! - Referral payouts
//! - History page size
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::DayBoundary;
use crate::error::ConfigError;
use crate::referral::ReferralRewards;
use crate::streak::CyclePolicy;
use crate::tiers::{RewardTier, TierTable, Token};
use crate::transaction::PageRequest;

/// Streak-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakConfig {
    /// Offset of the reference timezone from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

/// Reward tier overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RewardsConfig {
    /// Seven tiers replacing the built-in table when set.
    #[serde(default)]
    pub tiers: Option<Vec<RewardTier>>,
}

/// Referral payouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralConfig {
    #[serde(default = "default_referral_reward")]
    pub reward_amount: f64,
    #[serde(default = "default_referral_bonus")]
    pub bonus_amount: f64,
    #[serde(default = "default_referral_token")]
    pub token: Token,
}

/// Transaction history display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub streak: StreakConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub referral: ReferralConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_referral_reward() -> f64 {
    ReferralRewards::default().reward_amount
}
fn default_referral_bonus() -> f64 {
    ReferralRewards::default().bonus_amount
}
fn default_referral_token() -> Token {
    ReferralRewards::default().token
}
fn default_page_size() -> u32 {
    PageRequest::DEFAULT_PAGE_SIZE
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            cycle_policy: CyclePolicy::Freeze,
        }
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            reward_amount: default_referral_reward(),
            bonus_amount: default_referral_bonus(),
            token: default_referral_token(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(invalid("config key is empty".into()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| invalid("unknown config key".into()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| invalid("unknown config key".into()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_)
                    | serde_json::Value::Array(_)
                    | serde_json::Value::Null => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| invalid("unknown config key".into()))?;
        }

        Err(invalid("unknown config key".into()))
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or validated, or the
    /// default cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails validation.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.day_boundary()?;
        self.tier_table()?;
        if self.history.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "history.page_size".into(),
                message: "must be at least 1".into(),
            });
        }
        for (key, amount) in [
            ("referral.reward_amount", self.referral.reward_amount),
            ("referral.bonus_amount", self.referral.bonus_amount),
        ] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be a non-negative amount, got {amount}"),
                });
            }
        }
        Ok(())
    }

    /// Reference timezone for day boundaries.
    ///
    /// # Errors
    /// Returns an error if the configured offset is out of range.
    pub fn day_boundary(&self) -> Result<DayBoundary, ConfigError> {
        DayBoundary::from_offset_minutes(self.streak.utc_offset_minutes).map_err(|e| {
            ConfigError::InvalidValue {
                key: "streak.utc_offset_minutes".into(),
                message: e.to_string(),
            }
        })
    }

    /// Reward tiers, using the override when present.
    ///
    /// # Errors
    /// Returns an error if the override is malformed.
    pub fn tier_table(&self) -> Result<TierTable, ConfigError> {
        match &self.rewards.tiers {
            Some(tiers) => TierTable::from_tiers(tiers).map_err(|e| ConfigError::InvalidValue {
                key: "rewards.tiers".into(),
                message: e.to_string(),
            }),
            None => Ok(TierTable::default()),
        }
    }

    pub fn referral_rewards(&self) -> ReferralRewards {
        ReferralRewards {
            reward_amount: self.referral.reward_amount,
            bonus_amount: self.referral.bonus_amount,
            token: self.referral.token,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.streak.cycle_policy, CyclePolicy::Freeze);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[streak]\nutc_offset_minutes = 480\n").unwrap();
        assert_eq!(parsed.streak.utc_offset_minutes, 480);
        assert_eq!(parsed.history.page_size, 10);
        assert_eq!(parsed.referral.token, Token::Zoo);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("streak.cycle_policy").as_deref(), Some("freeze"));
        assert_eq!(cfg.get("history.page_size").as_deref(), Some("10"));
        assert!(cfg.get("streak.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("streak.cycle_policy", "wrap").unwrap();
        cfg.apply("streak.utc_offset_minutes", "-300").unwrap();
        cfg.apply("referral.bonus_amount", "2.5").unwrap();
        assert_eq!(cfg.streak.cycle_policy, CyclePolicy::Wrap);
        assert_eq!(cfg.day_boundary().unwrap().offset_minutes(), -300);
        assert_eq!(cfg.referral.bonus_amount, 2.5);
    }

    #[test]
    fn apply_rejects_unknown_and_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.apply("streak.nonexistent_key", "1").is_err());
        assert!(cfg.apply("streak.cycle_policy", "reset").is_err());
        assert!(cfg.apply("streak.utc_offset_minutes", "5000").is_err());
        assert!(cfg.apply("history.page_size", "0").is_err());
        assert!(cfg.apply("history.page_size", "ten").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn tier_override_is_validated() {
        let mut cfg = Config::default();
        let mut tiers = TierTable::default().tiers().to_vec();
        tiers[6].amount = 20.0;
        tiers[6].token = Token::Kaia;
        cfg.rewards.tiers = Some(tiers.clone());
        assert_eq!(cfg.tier_table().unwrap().tier_for(6).unwrap().token, Token::Kaia);

        tiers.pop();
        cfg.rewards.tiers = Some(tiers);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("history.page_size", "25").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().history.page_size, 25);
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "streak = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
