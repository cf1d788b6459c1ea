//! cfp-papers - conference paper submission service
//!
//! `serve` runs the HTTP API; `import` pushes a JSON or ZIP file through the
//! same save pipeline without a server and prints the API response.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::body::Bytes;
use cfp_common::config::{prepare_root_folder, resolve_root_folder, ServiceConfig, ROOT_FOLDER_ENV};
use cfp_common::db::{init_database, seed_topics};
use cfp_papers::paper_api::{self, PaperQuery, PaperRequest, PostBody};
use cfp_papers::{build_router, AppState};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cfp-papers
#[derive(Parser, Debug)]
#[command(name = "cfp-papers")]
#[command(about = "Conference paper submission API")]
#[command(version)]
struct Args {
    /// Root folder holding the paper database
    #[arg(short, long, global = true, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/cfp/config.toml); also
    /// consulted for `root_folder`
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "CFP_PORT")]
        port: Option<u16>,
    },
    /// Save papers from a JSON or ZIP file
    Import {
        /// JSON file (one paper object or an array) or ZIP archive
        file: PathBuf,

        /// Validate only; nothing is saved
        #[arg(long)]
        dry_run: bool,

        /// Ignore `pid` fields and create new papers
        #[arg(long)]
        ignore_pid: bool,

        /// Match papers without `pid` by title
        #[arg(long)]
        match_title: bool,

        /// Create unknown topics
        #[arg(long)]
        add_topics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cfp_papers=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting cfp-papers v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::load_from(path),
        None => ServiceConfig::load(),
    };

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        args.config.as_deref(),
    );
    let db_path = prepare_root_folder(&root_folder).context("Failed to prepare root folder")?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    let seeded = seed_topics(&pool, &config.topics).await?;
    if seeded > 0 {
        info!("Added {} configured topics", seeded);
    }

    match args.command {
        Command::Serve { port } => serve(pool, config, port).await,
        Command::Import {
            file,
            dry_run,
            ignore_pid,
            match_title,
            add_topics,
        } => {
            let query = PaperQuery {
                dryrun: Some(dry_run.to_string()),
                ignorepid: Some(ignore_pid.to_string()),
                matchtitle: Some(match_title.to_string()),
                addtopics: Some(add_topics.to_string()),
                ..Default::default()
            };
            import(pool, config, &file, &query).await
        }
    }
}

async fn serve(pool: SqlitePool, config: ServiceConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", config.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, port))?;

    let app = build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cfp-papers listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn import(
    pool: SqlitePool,
    config: ServiceConfig,
    file: &Path,
    query: &PaperQuery,
) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let is_zip = content.starts_with(b"PK\x03\x04")
        || file.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let body = if is_zip {
        PostBody::Zip(Bytes::from(content))
    } else {
        PostBody::Json(Bytes::from(content))
    };

    let state = AppState::new(pool, config);
    let jr = match paper_api::run(&state.db, state.config.clone(), query, PaperRequest::Post(body)).await {
        Ok(jr) => jr,
        Err(e) => e.to_json_result(),
    };
    let ok = jr.is_ok();
    println!("{}", serde_json::to_string_pretty(&jr.into_value())?);
    if !ok {
        warn!("Import of {} reported errors", file.display());
        std::process::exit(1);
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
