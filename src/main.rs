//! # QueryBridge CLI (`qb`)
//!
//! The `qb` binary drives the full system: database initialization,
//! document ingestion, retrieval-augmented queries, namespace
//! administration, and the two HTTP servers.
//!
//! ## Usage
//!
//! ```bash
//! qb <command>
//! ```
//!
//! Configuration comes from environment variables (a `.env` file in the
//! working directory is loaded automatically).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qb init` | Create the SQLite database and schema |
//! | `qb ingest <email> <files…>` | Ingest documents into a user's namespace |
//! | `qb query <email> "<question>"` | Ask a question against a user's documents |
//! | `qb stats <email>` | Show vector counts for a user's namespace |
//! | `qb delete <email>` | Drop a user's namespace |
//! | `qb serve api` | Start the chat + ingest + query API server |
//! | `qb serve auth` | Start the Google OAuth login server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! qb init
//!
//! # Ingest two PDFs for a user
//! qb ingest alice@example.com report.pdf notes.pdf
//!
//! # Ask a question
//! qb query alice@example.com "what were the Q3 numbers?"
//!
//! # Record the exchange in a session transcript
//! qb query alice@example.com "and Q4?" --session 3f2a…
//!
//! # Run both servers (separate terminals)
//! qb serve auth
//! qb serve api
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use querybridge::{config, ingest, migrate, query, server_api, server_auth, stats};

/// QueryBridge — chat with your PDFs over per-user vector namespaces.
///
/// All settings are read from environment variables; see the README for
/// the full list. A `.env` file in the working directory is honored.
#[derive(Parser)]
#[command(
    name = "qb",
    about = "QueryBridge — chat with your PDFs over per-user vector namespaces",
    version,
    long_about = "QueryBridge ingests PDF and text documents into per-user vector namespaces \
    backed by SQLite, answers questions over them with retrieval-augmented generation, and \
    ships a two-server web front-end: a Google OAuth login server and a chat/ingest/query API."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the vectors table. Idempotent;
    /// every other command also ensures the schema on startup, so this is
    /// only needed when you want the file in place ahead of time.
    Init,

    /// Ingest documents into a user's namespace.
    ///
    /// Extracts text from each file (PDF, .txt, .md), chunks it, embeds the
    /// chunks with the configured provider, and stores them under the
    /// namespace derived from the email. Files are processed concurrently
    /// and failures are reported per file.
    Ingest {
        /// Owner of the documents; determines the namespace.
        email: String,

        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a question against a user's documents.
    ///
    /// Embeds the question, retrieves the most similar chunks from the
    /// user's namespace, and generates an answer with the configured LLM.
    Query {
        /// Whose namespace to search.
        email: String,

        /// The question.
        query: String,

        /// Session id whose transcript should record this exchange.
        #[arg(long)]
        session: Option<String>,
    },

    /// Show vector counts for a user's namespace.
    Stats {
        email: String,
    },

    /// Drop a user's namespace, deleting all their vectors.
    Delete {
        email: String,
    },

    /// Start one of the HTTP servers.
    Serve {
        #[command(subcommand)]
        role: ServeRole,
    },
}

/// Server roles.
#[derive(Subcommand)]
enum ServeRole {
    /// Chat front-end, document ingest, and query API.
    ///
    /// Binds to `QB_API_BIND` (default `127.0.0.1:8000`). Requires the
    /// embedding provider and LLM credentials to be configured.
    Api,

    /// Google OAuth login server.
    ///
    /// Binds to `QB_AUTH_BIND` (default `127.0.0.1:5000`). Requires
    /// `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET`.
    Auth,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cfg = config::Config::from_env()?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Ingest { email, files } => {
            ingest::run_ingest(&cfg, &email, &files).await?;
        }
        Commands::Query {
            email,
            query,
            session,
        } => {
            query::run_query(&cfg, &email, &query, session.as_deref()).await?;
        }
        Commands::Stats { email } => {
            stats::run_stats(&cfg, &email).await?;
        }
        Commands::Delete { email } => {
            stats::run_delete(&cfg, &email).await?;
        }
        Commands::Serve { role } => {
            init_tracing();
            match role {
                ServeRole::Api => server_api::run_api_server(&cfg).await?,
                ServeRole::Auth => server_auth::run_auth_server(&cfg).await?,
            }
        }
    }

    Ok(())
}
