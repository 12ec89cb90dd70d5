//! EQMS server - escalated query management
//!
//! Serves the HTTP API, runs the SLA escalation sweep, applies migrations
//! and issues development session tokens.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use eqms_api::{ApiServer, ApiServerConfig};
use eqms_auth::{JwtClaims, JwtValidator};
use eqms_control::{
    EscalationScheduler, EventBus, MailerConfig, Notifier, SchedulerConfig, TicketGateway,
};
use eqms_db::UserRole;

/// EQMS - tickets, SLA timers and tier escalation
#[derive(Parser, Debug)]
#[command(name = "eqms")]
#[command(about = "EQMS - escalated query management server")]
#[command(version = VERSION)]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:", global = true)]
    database_url: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API and the escalation scheduler
    Serve(ServeArgs),

    /// Apply database migrations and exit
    Migrate,

    /// Issue a session token (development only)
    #[command(long_about = r#"
Issue a session token signed with the shared secret, for local testing
without the external auth provider.

EXAMPLES:
  eqms issue-token --jwt-secret dev --user-id 6f1c... --role admin --email admin@example.com
    "#)]
    IssueToken(IssueTokenArgs),

    /// Run one escalation sweep and exit
    Sweep,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind the HTTP API
    #[arg(long, env = "EQMS_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// HS256 secret shared with the auth provider
    #[arg(long, env = "EQMS_JWT_SECRET")]
    jwt_secret: String,

    /// Issuer required on session tokens
    #[arg(long, env = "EQMS_JWT_ISSUER")]
    jwt_issuer: Option<String>,

    /// Seconds between escalation sweeps
    #[arg(long, env = "EQMS_SWEEP_INTERVAL", default_value = "30")]
    sweep_interval_secs: u64,

    /// HTTP mail relay endpoint (email is only logged when unset)
    #[arg(long, env = "EQMS_MAIL_RELAY_URL")]
    mail_relay_url: Option<String>,

    /// Bearer key for the mail relay
    #[arg(long, env = "EQMS_MAIL_RELAY_KEY")]
    mail_relay_key: Option<String>,

    /// Sender address for notification email
    #[arg(long, env = "EQMS_MAIL_FROM")]
    mail_from: Option<String>,

    /// Additional allowed CORS origin (repeatable)
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args, Debug)]
struct IssueTokenArgs {
    /// HS256 secret shared with the server
    #[arg(long, env = "EQMS_JWT_SECRET")]
    jwt_secret: String,

    /// User the token is issued for (a new ID when omitted)
    #[arg(long)]
    user_id: Option<Uuid>,

    /// Role claimed by the token
    #[arg(long, default_value = "user")]
    role: UserRole,

    /// Email used to provision the user on first sign-in
    #[arg(long)]
    email: Option<String>,

    #[arg(long, default_value = "eqms")]
    issuer: String,

    #[arg(long, default_value = "eqms-web")]
    audience: String,

    /// Token lifetime in hours
    #[arg(long, default_value = "24")]
    ttl_hours: i64,
}

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve(args) => serve(&cli.database_url, args).await,
        Commands::Migrate => {
            let db = eqms_db::connect(&cli.database_url)
                .await
                .context("Failed to connect to database")?;
            eqms_db::migrate(&db)
                .await
                .context("Failed to run migrations")?;
            Ok(())
        }
        Commands::IssueToken(args) => issue_token(args),
        Commands::Sweep => sweep_once(&cli.database_url).await,
    }
}

async fn serve(database_url: &str, args: ServeArgs) -> Result<()> {
    info!("Starting EQMS {}", VERSION);

    let db = eqms_db::connect(database_url)
        .await
        .context("Failed to connect to database")?;
    eqms_db::migrate(&db)
        .await
        .context("Failed to run migrations")?;

    let mut mailer_config = MailerConfig {
        relay_url: args.mail_relay_url,
        relay_key: args.mail_relay_key,
        ..Default::default()
    };
    if let Some(from) = args.mail_from {
        mailer_config.from = from;
    }
    let mailer = mailer_config
        .build()
        .context("Failed to configure mail transport")?;

    let notifier = Notifier::new(db.clone(), mailer);
    let gateway = TicketGateway::new(db, EventBus::default(), notifier);

    let scheduler = EscalationScheduler::spawn(
        gateway.clone(),
        SchedulerConfig {
            interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
        },
    );
    info!("Escalation sweep every {}s", args.sweep_interval_secs.max(1));

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: args.bind,
            enable_cors: !args.no_cors,
            cors_origins: args.cors_origins,
            jwt_secret: args.jwt_secret,
            jwt_issuer: args.jwt_issuer,
        },
        gateway,
    )?;

    let result = tokio::select! {
        result = server.start() => result,
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received, stopping server..."),
                Err(err) => error!("Error listening for shutdown signal: {}", err),
            }
            Ok(())
        }
    };

    scheduler.shutdown();
    info!("EQMS stopped");

    result
}

fn issue_token(args: IssueTokenArgs) -> Result<()> {
    let user_id = args.user_id.unwrap_or_else(Uuid::new_v4);

    let mut claims = JwtClaims::session(
        user_id.to_string(),
        args.issuer,
        args.audience,
        chrono::Duration::hours(args.ttl_hours),
    )
    .with_user_role(args.role.to_string());
    if let Some(email) = args.email {
        claims = claims.with_email(email);
    }

    let token = JwtValidator::encode(args.jwt_secret.as_bytes(), &claims)
        .context("Failed to sign token")?;

    println!("{}", token);
    Ok(())
}

async fn sweep_once(database_url: &str) -> Result<()> {
    let db = eqms_db::connect(database_url)
        .await
        .context("Failed to connect to database")?;
    eqms_db::migrate(&db)
        .await
        .context("Failed to run migrations")?;

    let mailer = MailerConfig::default()
        .build()
        .context("Failed to configure mail transport")?;
    let notifier = Notifier::new(db.clone(), mailer);
    let gateway = TicketGateway::new(db, EventBus::default(), notifier);

    let report = EscalationScheduler::new(gateway, SchedulerConfig::default())
        .sweep()
        .await
        .context("Sweep failed")?;

    info!(
        examined = report.examined,
        escalated = report.escalated,
        skipped_unknown = report.skipped_unknown,
        conflicts = report.conflicts,
        "Sweep complete"
    );

    // Let spawned notification sends drain before the runtime stops
    tokio::time::sleep(Duration::from_millis(500)).await;

    Ok(())
}
