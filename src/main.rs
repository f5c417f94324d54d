use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use movecar::config::MovecarConfig;
use movecar::credentials::{generate_public_code, hash_password, verify_password, IpHasher};
use movecar::notify::{BarkMessage, BarkNotifier, BarkTarget};

/// Operator tooling for a movecar deployment.
#[derive(Debug, Parser)]
#[command(name = "movecar", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective configuration
    Config,
    /// Hash a password for storage
    HashPassword { password: String },
    /// Check a password against a stored hash
    VerifyPassword { password: String, stored: String },
    /// Generate a new public code
    NewCode,
    /// Hash a client address with the configured secret
    HashIp { ip: String },
    /// Send a test Bark push notification
    SendBark {
        /// Device token from the Bark app
        #[arg(long)]
        token: String,
        /// Bark server; defaults to the configured one
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long, default_value = "Test notification")]
        title: String,
        #[arg(long, default_value = "This is a test notification")]
        body: String,
        /// Link opened when the notification is tapped
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    debug!(command = ?cli.command, "Starting movecar");

    match cli.command {
        Command::Config => {
            let config = MovecarConfig::load(cli.config.as_deref())?;
            info!(
                window_secs = config.submission.window_secs,
                max_events = config.submission.max_events,
                min_interval_secs = config.notification.min_interval_secs,
                "Configuration loaded"
            );
            print!("{}", config.to_yaml()?);
        }
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password));
        }
        Command::VerifyPassword { password, stored } => {
            if !verify_password(&password, &stored) {
                println!("mismatch");
                return Ok(ExitCode::FAILURE);
            }
            println!("ok");
        }
        Command::NewCode => {
            println!("{}", generate_public_code());
        }
        Command::HashIp { ip } => {
            let config = MovecarConfig::load(cli.config.as_deref())?;
            println!("{}", IpHasher::new(config.app_secret).hash(&ip));
        }
        Command::SendBark {
            token,
            base_url,
            title,
            body,
            url,
        } => {
            let config = MovecarConfig::load(cli.config.as_deref())?;
            let base_url = base_url.unwrap_or(config.notification.bark_base_url);
            let target = BarkTarget::new(&base_url, &token)?;
            let mut message = BarkMessage::new(title, body);
            if let Some(url) = url {
                message = message.with_url(url);
            }

            if let Err(e) = BarkNotifier::new()?.send(&target, &message).await {
                error!(error = %e, "Bark delivery failed");
                return Ok(ExitCode::FAILURE);
            }
            println!("sent");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so command output stays pipeable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
