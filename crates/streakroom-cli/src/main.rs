use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "streakroom-cli", version, about = "Streakroom CLI")]
struct Cli {
    /// Authenticated user id
    #[arg(long, global = true, env = "STREAKROOM_USER")]
    user: Option<String>,

    /// Log at debug level to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily streak rewards
    Rewards {
        #[command(subcommand)]
        action: commands::rewards::RewardsAction,
    },
    /// Transaction history, newest first
    History {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Profile and balances
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// One-time reward tasks
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Referral codes
    Referral {
        #[command(subcommand)]
        action: commands::referral::ReferralAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show the reward tier table
    Tiers,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user = cli.user.as_deref();
    let result = match cli.command {
        Commands::Rewards { action } => commands::rewards::run(action, user),
        Commands::History { page } => commands::rewards::history(user, page),
        Commands::Profile { action } => commands::profile::run(action, user),
        Commands::Task { action } => commands::task::run(action, user),
        Commands::Referral { action } => commands::referral::run(action, user),
        Commands::Config { action } => commands::config::run(action),
        Commands::Tiers => commands::config::tiers(),
    };

    if let Err(e) = result {
        if let Some(status) = e.downcast_ref::<commands::StatusError>() {
            std::process::exit(status.exit_code());
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
