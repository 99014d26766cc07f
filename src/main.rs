//! Rowbound CLI - inspect and query databases managed by the row mapper

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use rowbound::config::{self, RowboundConfig};
use rowbound::storage::SqliteDao;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rowbound")]
#[command(version)]
#[command(about = "Declarative row mapper for SQLite")]
#[command(long_about = r#"
Rowbound maps annotated structs to SQLite tables. This tool works on the
resulting databases without any compiled-in types:
  • Run pass-through SQL and print rows as a table or JSON
  • List the tables a database contains
  • Write a starter rowbound.toml

Example usage:
  rowbound init --database data/app.db
  rowbound tables
  rowbound query "SELECT * FROM User" --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a raw SQL query and print the rows
    Query {
        /// SQL text, passed through as-is
        sql: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the tables in a database
    Tables {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        /// Database path to record in the config
        #[arg(short, long)]
        database: Option<String>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn open_dao(database: Option<PathBuf>, config: Option<&RowboundConfig>) -> anyhow::Result<SqliteDao> {
    let path = config::resolve_database_path(database.as_deref(), config);
    config::ensure_db_dir(&path)?;
    let pool = config.map(|c| c.pool.clone()).unwrap_or_default();
    tracing::debug!("opening {}", path.display());
    Ok(SqliteDao::open(&path, &pool)?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let loaded = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Query { sql, database, json } => {
            let dao = open_dao(database, loaded.as_ref())?;
            let rows = dao.query_raw(&sql)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("(no rows)");
            } else {
                println!("{}", rowbound::ui::rows_table(&rows));
                println!("{} row(s)", rows.len());
            }
        }

        Commands::Tables { database } => {
            let dao = open_dao(database, loaded.as_ref())?;
            let rows = dao.query_raw(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            for row in rows {
                if let Some(name) = row.get("name") {
                    println!("{}", name);
                }
            }
        }

        Commands::Init { database, force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let config = RowboundConfig {
                database: Some(database.unwrap_or_else(|| {
                    config::default_database_path().display().to_string()
                })),
                ..Default::default()
            };
            config::write_config(&path, &config, force)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}
