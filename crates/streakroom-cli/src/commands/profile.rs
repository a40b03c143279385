use clap::Subcommand;
use streakroom_core::ProfileUpdate;

use super::{emit, engine, CommandResult};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show profile, balances, streak and achievements
    Show,
    /// Update display name and/or avatar; pass an empty value to clear
    Update {
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New avatar URL (http or https)
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// List achievement levels and progress
    Achievements,
}

pub fn run(action: ProfileAction, user: Option<&str>) -> CommandResult {
    let engine = engine()?;
    match action {
        ProfileAction::Show => emit(engine.profile(user)),
        ProfileAction::Update { name, avatar_url } => {
            let update = ProfileUpdate {
                display_name: name,
                avatar_url,
            };
            emit(engine.update_profile(user, &update))
        }
        ProfileAction::Achievements => emit(engine.achievements(user)),
    }
}
