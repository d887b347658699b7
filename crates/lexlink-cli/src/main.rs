//! LexLink CLI - terminal client for the LexLink marketplace session.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use lexlink_auth::{AuthConfig, Role, SessionManager};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "lexlink")]
#[command(about = "Sign in to LexLink and manage the local session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (falls back to LEXLINK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a one-time code
    Login {
        /// Email address to sign in with
        #[arg(long, conflicts_with = "phone")]
        email: Option<String>,

        /// Phone number to sign in with
        #[arg(long)]
        phone: Option<String>,

        /// Account role
        #[arg(long, value_enum, default_value = "client")]
        role: RoleArg,
    },
    /// Show the local session state
    Status,
    /// Fetch the signed-in user's profile from the server
    Me,
    /// Sign out and clear stored tokens
    Logout,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Lawyer,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Lawyer => Role::Lawyer,
            RoleArg::Client => Role::Client,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.api_url {
        Some(url) => AuthConfig::new(url.clone())?,
        None => AuthConfig::from_env()?,
    };
    let store = lexlink_storage::create_token_store()?;
    let session = SessionManager::new(config, store);

    // Logout only touches local state; no need to resolve the session first.
    if matches!(cli.command, Commands::Logout) {
        return commands::logout(&session, &cli.format);
    }

    session.initialize().await?;

    match cli.command {
        Commands::Login { email, phone, role } => {
            commands::login(&session, email, phone, role.into(), &cli.format).await
        }
        Commands::Status => commands::status(&session, &cli.format),
        Commands::Me => commands::me(&session, &cli.format).await,
        Commands::Logout => unreachable!("handled above"),
    }
}
