use clap::Subcommand;

use super::{emit, engine, CommandResult};

#[derive(Subcommand)]
pub enum ReferralAction {
    /// Apply another user's referral code
    Apply {
        /// Referral code (case-insensitive)
        code: String,
    },
    /// List users referred with your code
    List,
}

pub fn run(action: ReferralAction, user: Option<&str>) -> CommandResult {
    let engine = engine()?;
    match action {
        ReferralAction::Apply { code } => emit(engine.apply_referral(user, &code)),
        ReferralAction::List => emit(engine.referrals(user)),
    }
}
