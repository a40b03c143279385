pub mod config;
pub mod profile;
pub mod referral;
pub mod rewards;
pub mod task;

use std::fmt;

use serde::Serialize;
use streakroom_core::{respond, ClaimEngine, ClaimError, Config, Database};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// A request that produced a non-200 envelope. The envelope is already on
/// stdout; only the exit code is left to report.
#[derive(Debug)]
pub struct StatusError(pub u16);

impl StatusError {
    /// 400 → 2, 401 → 3, everything else → 1.
    pub fn exit_code(&self) -> i32 {
        match self.0 {
            401 => 3,
            400..=499 => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed with status {}", self.0)
    }
}

impl std::error::Error for StatusError {}

/// Open the database and build an engine from the saved config.
pub fn engine() -> Result<ClaimEngine<Database>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let engine = ClaimEngine::from_config(db, &config)?;
    tracing::debug!(
        policy = %engine.policy(),
        utc_offset_minutes = config.streak.utc_offset_minutes,
        "engine ready"
    );
    Ok(engine)
}

/// Print the JSON envelope for `result` and fail with its status if not 200.
pub fn emit<T: Serialize>(result: Result<T, ClaimError>) -> CommandResult {
    let (status, body) = respond(result);
    println!("{}", serde_json::to_string_pretty(&body)?);
    if status == 200 {
        Ok(())
    } else {
        Err(Box::new(StatusError(status)))
    }
}
