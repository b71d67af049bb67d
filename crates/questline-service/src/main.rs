use clap::{Parser, ValueEnum};
use questline_core::{LedgerConfig, RepeatPenaltyPolicy, DEFAULT_RESET_UTC_OFFSET_MINUTES};
use questline_service::{build_router, ServiceConfig, ServiceState};
use questline_storage::StorageConfig;
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Auto,
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PenaltyMode {
    EveryUncomplete,
    OncePerClaim,
}

impl From<PenaltyMode> for RepeatPenaltyPolicy {
    fn from(mode: PenaltyMode) -> Self {
        match mode {
            PenaltyMode::EveryUncomplete => RepeatPenaltyPolicy::EveryUncomplete,
            PenaltyMode::OncePerClaim => RepeatPenaltyPolicy::OncePerClaim,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "questlined", version, about = "Questline task ledger REST service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8093
    #[arg(long, default_value = "127.0.0.1:8093", env = "QUESTLINE_LISTEN")]
    listen: SocketAddr,
    /// Storage backend. `auto` picks sqlite when a database url is configured.
    #[arg(long, value_enum, default_value_t = StorageMode::Auto, env = "QUESTLINE_STORAGE")]
    storage: StorageMode,
    /// SQLite url, e.g. sqlite://questline.db
    #[arg(long, env = "QUESTLINE_DATABASE_URL")]
    database_url: Option<String>,
    /// Max SQLite pool connections.
    #[arg(long, default_value_t = 5, env = "QUESTLINE_MAX_CONNECTIONS")]
    max_connections: u32,
    /// UTC offset, in minutes, of the timezone whose midnight starts a new day.
    #[arg(
        long,
        default_value_t = DEFAULT_RESET_UTC_OFFSET_MINUTES,
        env = "QUESTLINE_RESET_UTC_OFFSET_MINUTES",
        allow_negative_numbers = true
    )]
    reset_utc_offset_minutes: i32,
    /// How un-completing an already rewarded one-off task is charged.
    #[arg(long, value_enum, default_value_t = PenaltyMode::EveryUncomplete, env = "QUESTLINE_REPEAT_PENALTY")]
    repeat_penalty: PenaltyMode,
    /// Issue a session token for this username, print it, and exit.
    #[arg(long, value_name = "USERNAME")]
    issue_session: Option<String>,
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.storage {
        StorageMode::Memory => StorageConfig::Memory,
        StorageMode::Sqlite => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("storage=sqlite requires --database-url or DATABASE_URL")
            })?;
            StorageConfig::sqlite(database_url, cli.max_connections)
        }
        StorageMode::Auto => match resolved_url {
            Some(database_url) => StorageConfig::sqlite(database_url, cli.max_connections),
            None => StorageConfig::Memory,
        },
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "questline_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let storage = resolve_storage(&cli)?;
    let ledger = LedgerConfig {
        reset_utc_offset_minutes: cli.reset_utc_offset_minutes,
        repeat_penalty: cli.repeat_penalty.into(),
        ..LedgerConfig::default()
    };
    let state = ServiceState::bootstrap(ServiceConfig { storage, ledger }).await?;

    if let Some(username) = cli.issue_session.as_deref() {
        let token = state.engine.create_session(username).await?;
        println!("{token}");
        return Ok(());
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("questline-service REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
