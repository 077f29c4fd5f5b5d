pub mod error;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DatabaseTarget;
use crate::db::{
    Database, ProjectRepository, SqliteDatabase, TodoRepository, TodoStatus, UserRepository,
};
use error::{CliError, CliResult};

#[derive(Parser, Debug)]
#[command(name = "todos")]
#[command(author, version, about = "Todo database maintenance", long_about = None)]
pub struct Cli {
    /// Database file, or `:memory:` (default: TODOS_DB env or ~/.local/share/todos/todos.db)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Create or migrate the schema and print a summary
    Init,
    /// Check that the database can be opened and queried
    Health,
}

impl Cli {
    fn target(&self) -> DatabaseTarget {
        match &self.db {
            Some(value) => DatabaseTarget::parse(value),
            None => DatabaseTarget::from_env(),
        }
    }
}

/// Initialize tracing subscriber with env filter
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let db = SqliteDatabase::open(cli.target()).await.map_err(CliError::from)?;

    let output = match cli.command {
        Commands::Init => init(&db).await?,
        Commands::Health => health(&db).await?,
    };
    println!("{}", output);
    Ok(())
}

async fn init(db: &SqliteDatabase) -> CliResult<String> {
    db.ensure_schema().await?;

    let users = db.users().count().await?;
    let projects = db.projects().count().await?;
    let todos = db.todos().count().await?;
    let open = db.todos().count_by_status(TodoStatus::Todo).await?
        + db.todos().count_by_status(TodoStatus::InProgress).await?;

    Ok(format!(
        "Database ready at {}\n  users:    {}\n  projects: {}\n  todos:    {} ({} open)",
        db.target(),
        users,
        projects,
        todos,
        open
    ))
}

async fn health(db: &SqliteDatabase) -> CliResult<String> {
    if db.is_healthy().await {
        Ok(format!("Database at {} is healthy", db.target()))
    } else {
        Err(CliError::Unhealthy {
            target: db.target().to_string(),
        })
    }
}
