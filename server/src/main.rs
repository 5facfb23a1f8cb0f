mod config;
mod graphql;
mod http;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::{HierarchyPath, MemoryStore, PolicyDraft, PolicyEngine, PrincipalId};
use platform_db::{self, DatabaseSettings, DbPool, SeaOrmStore, connect};
use platform_obs::{ObsConfig, init_tracing, shutdown_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

const ADMIN_POSITION: &str = "admin";

#[derive(Parser, Debug)]
#[command(name = "policy-server", version, about = "Org-scoped policy evaluation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Grant a principal policy administration at the root.
    Seed(SeedCommand),
    /// Print the GraphQL schema snapshot.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

#[derive(Args, Debug)]
struct SeedCommand {
    /// Principal that receives the admin position at `/`.
    #[arg(long)]
    principal: String,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve(cmd) => run_server(cmd, Arc::new(AppConfig::load()?)).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed(cmd) => run_seed(cmd).await,
        Command::SchemaPrint { output } => schema_print(output),
    };
    shutdown_tracing()?;
    result
}

async fn run_seed(cmd: SeedCommand) -> Result<()> {
    let principal = PrincipalId::parse(&cmd.principal).context("principal must not be blank")?;
    let pool = setup_pool().await?;
    let root = HierarchyPath::root();
    platform_db::upsert_membership(&pool, &principal, &root, ADMIN_POSITION, true).await?;
    let policy = platform_db::upsert_policy(
        &pool,
        PolicyDraft {
            key: Some("root-admin".into()),
            scope: root.to_string(),
            position_key: Some(ADMIN_POSITION.into()),
            inherit: true,
            actions: vec!["policy:manage".into()],
            resources: vec!["policy".into()],
            ..PolicyDraft::default()
        },
    )
    .await?;
    info!(%principal, policy = %policy.id, "root administrator seeded");
    Ok(())
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from("schema.graphql"));
    let engine = Arc::new(PolicyEngine::new(Arc::new(MemoryStore::default())));
    let sdl = graphql::build_schema(engine).sdl();
    std::fs::write(&target, sdl)
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(path = %target.display(), "schema snapshot written");
    Ok(())
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let engine = Arc::new(
        PolicyEngine::new(Arc::new(SeaOrmStore::new(pool.clone())))
            .with_store_timeout(config.store_timeout),
    );
    let state = AppState {
        pool,
        schema: graphql::build_schema(engine.clone()),
        engine,
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}
