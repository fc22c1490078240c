use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use glossar::{
    AccountSecurityConfig, Glossar, GlossarBuilder, SqliteAccountRepository, SweepOutcome,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_USERNAME: &str = "alice";
const DEMO_PASSWORD: &str = "g3h3im";

/// Login endpoint and inactivity sweep for the glossary application
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database connection string
    #[arg(
        long,
        env = "GLOSSAR_DATABASE_URL",
        default_value = "sqlite://glossar.db?mode=rwc"
    )]
    database_url: String,

    #[command(flatten)]
    security: SecurityArgs,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SecurityArgs {
    /// Lock an account after this many consecutive failed logins
    #[arg(long, global = true, env = "GLOSSAR_MAX_FAILED_LOGIN_ATTEMPTS")]
    max_failed_login_attempts: Option<u32>,

    /// Deactivate accounts without a login for longer than this many minutes
    #[arg(long, global = true, env = "GLOSSAR_INACTIVITY_THRESHOLD_MINUTES")]
    inactivity_threshold_minutes: Option<u32>,

    /// Seconds between two inactivity sweeps
    #[arg(
        long,
        global = true,
        env = "GLOSSAR_SWEEP_INTERVAL_SECONDS",
        default_value_t = 180
    )]
    sweep_interval_seconds: u64,
}

impl SecurityArgs {
    fn config(&self) -> Result<AccountSecurityConfig> {
        if self.sweep_interval_seconds == 0 {
            bail!("--sweep-interval-seconds must be greater than zero");
        }
        if self.inactivity_threshold_minutes == Some(0) {
            bail!("--inactivity-threshold-minutes must be greater than zero");
        }

        let mut config = AccountSecurityConfig::default()
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_seconds));
        if let Some(max) = self.max_failed_login_attempts {
            config = config.with_max_failed_login_attempts(max);
        }
        if let Some(minutes) = self.inactivity_threshold_minutes {
            config = config.with_inactivity_threshold_minutes(minutes);
        }
        Ok(config)
    }
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Serve the login endpoint and run the inactivity sweep in the background
    Serve {
        /// Address to listen on
        #[arg(long, env = "GLOSSAR_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Create the demo account `alice` unless it exists already
        #[arg(long)]
        seed_demo_account: bool,
    },
    /// Run database migrations
    Migrate,
    /// Run the inactivity sweep once and exit
    Sweep,
    /// Print version information
    Version,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect(cli: &Cli) -> Result<Glossar<SqliteAccountRepository>> {
    GlossarBuilder::new()
        .with_sqlite(&cli.database_url)
        .await
        .with_context(|| format!("connecting to {}", cli.database_url))?
        .with_config(cli.security.config()?)
        .apply_migrations(true)
        .build()
        .await
        .context("setting up the account store")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            bind,
            seed_demo_account,
        } => serve(&cli, *bind, *seed_demo_account).await,
        Commands::Migrate => {
            connect(&cli).await?;
            tracing::info!(database_url = %cli.database_url, "Migrations applied");
            Ok(())
        }
        Commands::Sweep => sweep(&cli).await,
        Commands::Version => {
            println!("Glossar v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(cli: &Cli, bind: SocketAddr, seed_demo_account: bool) -> Result<()> {
    let glossar = Arc::new(connect(cli).await?);

    if seed_demo_account {
        let account = glossar
            .ensure_account(DEMO_USERNAME, DEMO_PASSWORD)
            .await
            .context("seeding the demo account")?;
        tracing::info!(username = %account.username, "Demo account ready");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_task = glossar.start_sweep_task(shutdown_rx);

    let app = glossar_axum::routes(glossar.clone());
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(address = %bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving requests")?;

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("Inactivity sweep task already stopped");
    }
    if let Err(e) = sweep_task.await {
        tracing::warn!(error = %e, "Inactivity sweep task ended abnormally");
    }
    Ok(())
}

async fn sweep(cli: &Cli) -> Result<()> {
    let glossar = connect(cli).await?;

    match glossar.sweep_inactive_accounts().await? {
        SweepOutcome::Completed(report) => {
            for username in &report.deactivated {
                println!("{username}");
            }
            tracing::info!(count = report.count(), "Inactivity sweep finished");
        }
        SweepOutcome::Skipped => tracing::info!("Inactivity sweep already running"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
