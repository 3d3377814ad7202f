//! Timetable server: the HTTP API over PostgreSQL, plus an operator command
//! for minting admin invitations. With `--in-memory` nothing persists, so the
//! server mints a bootstrap invitation at startup instead.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use timetable_api::ApiServer;
use timetable_core::config::AppConfig;
use timetable_management::accounts;
use timetable_management::models::InvitationResponse;
use timetable_management::{HttpSolver, ManagementState, MemoryStore, PgStore, TimetableStore};
use timetable_platform::SessionManager;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "timetable-server")]
#[command(about = "University timetable management API")]
#[command(version)]
struct Cli {
    /// HTTP port (overrides config)
    #[arg(long, env = "TIMETABLE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// PostgreSQL connection string (overrides config)
    #[arg(long, env = "TIMETABLE__DATABASE__URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Use the in-process store seeded with demo data instead of PostgreSQL
        #[arg(long, default_value_t = false)]
        in_memory: bool,
    },
    /// Mint a single-use admin invitation in PostgreSQL and print its token.
    /// `serve --in-memory` prints its own bootstrap invitation instead.
    IssueInvite {
        /// Hours until the invitation expires (overrides config)
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetable_server=info,timetable_management=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(config, in_memory).await,
        Commands::IssueInvite { ttl_hours } => {
            let ttl_hours = ttl_hours.unwrap_or(config.auth.invitation_ttl_hours);
            issue_invite(&config, ttl_hours).await
        }
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    info!(max_connections = config.database.max_connections, "Database ready");
    Ok(PgStore::new(pool))
}

async fn serve(config: AppConfig, in_memory: bool) -> anyhow::Result<()> {
    info!("Timetable server starting up");

    let sessions = SessionManager::new(&config.auth.jwt_secret, config.auth.token_ttl_secs)
        .context("Set TIMETABLE__AUTH__JWT_SECRET")?;

    let store: Arc<dyn TimetableStore> = if in_memory {
        warn!("Running with the in-memory store; data is lost on exit");
        let store = MemoryStore::with_demo_data();
        let invitation = bootstrap_invitation(&store, config.auth.invitation_ttl_hours).await?;
        println!("Bootstrap admin invitation: {}", invitation.token);
        Arc::new(store)
    } else {
        Arc::new(connect(&config).await?)
    };

    let solver = HttpSolver::new(&config.solver).context("Failed to build solver client")?;

    info!(
        http_port = config.api.http_port,
        solver_url = %config.solver.url,
        reference_monday = %config.export.reference_monday,
        "Configuration loaded"
    );

    let state = ManagementState {
        store,
        sessions: Arc::new(sessions),
        solver: Arc::new(solver),
        reference_monday: config.export.reference_monday,
        invitation_ttl_hours: config.auth.invitation_ttl_hours,
    };
    let api_server = ApiServer::new(config, state);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Timetable server is ready to serve traffic");
    api_server.start_http().await
}

/// Mint the first admin invitation for a store that starts empty of admins.
async fn bootstrap_invitation(store: &dyn TimetableStore, ttl_hours: i64) -> anyhow::Result<InvitationResponse> {
    let invitation = accounts::issue_invitation(store, None, ttl_hours)
        .await
        .context("Failed to issue bootstrap invitation")?;
    warn!(expires_at = %invitation.expires_at, "Bootstrap admin invitation issued; token printed to stdout");
    Ok(invitation)
}

async fn issue_invite(config: &AppConfig, ttl_hours: i64) -> anyhow::Result<()> {
    anyhow::ensure!(ttl_hours > 0, "--ttl-hours must be positive");
    let store = connect(config).await?;
    let invitation = accounts::issue_invitation(&store, None, ttl_hours).await?;

    info!(expires_at = %invitation.expires_at, "Admin invitation issued");
    println!("{}", invitation.token);
    println!("Expires at {}", invitation.expires_at.to_rfc3339());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use timetable_core::types::Role;
    use timetable_management::models::AdminSignupRequest;

    #[tokio::test]
    async fn test_bootstrap_invitation_admits_first_admin() {
        let store = MemoryStore::with_demo_data();
        let sessions = SessionManager::new("test-secret-that-is-long-enough-for-hs256", 3600).unwrap();

        let invitation = bootstrap_invitation(&store, 24).await.unwrap();
        let created = accounts::admin_signup(
            &store,
            &sessions,
            AdminSignupRequest {
                name: Some("Root".into()),
                email: Some("root@uni.edu".into()),
                password: Some("s3cret!".into()),
                college_id: Some(1),
                department_id: None,
                invitation_token: Some(invitation.token),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_bootstrap_invitation_rejects_bad_lifetime() {
        let store = MemoryStore::new();
        assert!(bootstrap_invitation(&store, 0).await.is_err());
        assert!(bootstrap_invitation(&store, i64::MAX).await.is_err());
    }
}
