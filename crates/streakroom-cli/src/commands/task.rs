//! Task catalog commands.

use chrono::Utc;
use clap::Subcommand;
use serde::Serialize;
use streakroom_core::{ClaimError, Task, Token};

use super::{emit, engine, CommandResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to the catalog
    Add {
        /// Task title
        title: String,
        /// Reward paid on completion
        #[arg(long)]
        reward: f64,
        /// Reward token: KAIA, ZOO or WBTC
        #[arg(long, default_value = "ZOO")]
        token: String,
        /// Free-form task type (e.g. "social")
        #[arg(long = "type", default_value = "general")]
        task_type: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Link opened when the task is started
        #[arg(long)]
        url: Option<String>,
    },
    /// List tasks with your completion state
    List,
    /// Complete a task and receive its reward
    Complete {
        /// Task ID
        id: String,
    },
}

#[derive(Serialize)]
struct TaskView {
    #[serde(flatten)]
    task: Task,
    completed: bool,
}

pub fn run(action: TaskAction, user: Option<&str>) -> CommandResult {
    let engine = engine()?;
    match action {
        TaskAction::Add {
            title,
            reward,
            token,
            task_type,
            description,
            url,
        } => {
            let result = token
                .parse::<Token>()
                .and_then(|token| Task::new(title, reward, token, task_type, Utc::now()))
                .map_err(ClaimError::from)
                .and_then(|mut task| {
                    task.description = description.unwrap_or_default();
                    task.redirect_url = url;
                    engine.add_task(&task)?;
                    Ok(task)
                });
            emit(result)
        }
        TaskAction::List => {
            let views = engine.tasks(user).map(|tasks| {
                tasks
                    .into_iter()
                    .map(|(task, completed)| TaskView { task, completed })
                    .collect::<Vec<_>>()
            });
            emit(views)
        }
        TaskAction::Complete { id } => emit(engine.complete_task(user, &id)),
    }
}
