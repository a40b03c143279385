use clap::Subcommand;

use super::{emit, engine, CommandResult};

#[derive(Subcommand)]
pub enum RewardsAction {
    /// Claim today's streak reward
    Claim,
    /// Show streak progress and the next reward
    Status,
}

pub fn run(action: RewardsAction, user: Option<&str>) -> CommandResult {
    let engine = engine()?;
    match action {
        RewardsAction::Claim => emit(engine.claim_daily(user)),
        RewardsAction::Status => emit(engine.streak_status(user)),
    }
}

pub fn history(user: Option<&str>, page: u32) -> CommandResult {
    let engine = engine()?;
    emit(engine.transactions(user, page))
}
