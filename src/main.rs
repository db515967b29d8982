//! apns - legacy binary APNs client
//!
//! Sends single notifications through the push gateway and drains the
//! feedback service.

mod config;

use apns_client::{FeedbackClient, NotificationClient};
use apns_protocol::{AlertItem, CommandFormat, DeviceToken, FeedbackRecord, Payload, Priority};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apns")]
#[command(about = "Client for the legacy binary Apple Push Notification service")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "APNS_CONFIG")]
    config: Option<PathBuf>,

    /// Use the sandbox environment
    #[arg(long)]
    sandbox: bool,

    /// PEM file with the client certificate and private key
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Passphrase for an encrypted private key
    #[arg(long)]
    passphrase: Option<String>,

    /// CA certificate(s) to verify the gateway against
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Skip server certificate verification (INSECURE)
    #[arg(long, short = 'k')]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one notification
    Push {
        /// Device token, hex
        #[arg(short, long)]
        token: String,

        /// Alert body
        #[arg(short, long)]
        body: String,

        /// Badge number
        #[arg(long)]
        badge: Option<i64>,

        /// Sound file
        #[arg(long)]
        sound: Option<String>,

        /// Notification identifier echoed in error responses
        #[arg(short, long, default_value = "0")]
        identifier: u32,

        #[arg(long, value_enum, default_value = "immediate")]
        priority: PriorityArg,

        /// Command format: simple, enhanced or frame
        #[arg(long)]
        format: Option<CommandFormat>,

        /// Report delivery failures without failing
        #[arg(long)]
        non_strict: bool,
    },

    /// Print and drain the feedback service
    Feedback {
        /// Keep going when a record cannot be handled
        #[arg(long)]
        no_panic: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Immediate,
    ConservePower,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Immediate => Priority::Immediate,
            PriorityArg::ConservePower => Priority::ConservePower,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;
    if cli.sandbox {
        config.sandbox = true;
    }
    if let Some(cert) = cli.cert {
        config.tls.certificate = Some(cert);
    }
    if let Some(passphrase) = cli.passphrase {
        config.tls.passphrase = Some(passphrase);
    }
    if let Some(ca_file) = cli.ca_file {
        config.tls.ca_file = Some(ca_file);
    }
    if cli.insecure {
        config.tls.insecure = true;
    }
    config.validate()?;

    match cli.command {
        Commands::Push {
            token,
            body,
            badge,
            sound,
            identifier,
            priority,
            format,
            non_strict,
        } => {
            let token = DeviceToken::parse(&token)?;
            let mut payload = Payload::new()
                .with_identifier(identifier)
                .with_priority(priority.into())
                .with_alert(AlertItem::new().with_body(body));
            if let Some(badge) = badge {
                payload = payload.with_badge(badge);
            }
            if let Some(sound) = sound {
                payload = payload.with_sound(sound);
            }

            let connection = config.gateway_connection();
            tracing::info!("Sending notification via {}", connection.endpoint());
            let mut client = NotificationClient::new(connection)
                .with_format(format.unwrap_or(config.gateway.command_format))
                .with_read_delay(config.gateway.read_delay());

            let result = client.send(&token, &mut payload, !non_strict).await;
            client.disconnect().await;
            match result {
                Ok(true) => println!("{} notification {}", "Sent".green(), identifier),
                Ok(false) => {
                    eprintln!("{} notification {}", "Not delivered".yellow(), identifier);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Feedback { no_panic } => {
            let connection = config.feedback_connection();
            tracing::info!("Reading feedback from {}", connection.endpoint());
            let mut client = FeedbackClient::new(connection);

            let processed = client
                .process(
                    |record| {
                        println!("{}", format_record(record));
                        Ok(true)
                    },
                    !no_panic,
                )
                .await
                .map_err(|e| {
                    eprintln!("{}: {}", "Error".red(), e);
                    e
                })?;

            let stats = client.stats();
            eprintln!(
                "{} {} read, {} processed, {} unprocessed, {} errors",
                "Feedback:".bold(),
                stats.read,
                processed.to_string().green(),
                stats.unprocessed,
                stats.errors
            );
        }
    }

    Ok(())
}

fn format_record(record: &FeedbackRecord) -> String {
    match record.time() {
        Some(time) => format!("{} - {}", time.format("%Y-%m-%d %H:%M:%S"), record.token.cyan()),
        None => format!("{} - {}", record.timestamp, record.token.cyan()),
    }
}
