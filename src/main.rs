use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use student_records_api::auth::JwtKeys;
use student_records_api::config::{self, AppConfig};
use student_records_api::database::{
    DatabaseManager, MemoryStudentRepository, PgStudentRepository, StudentRepository,
};
use student_records_api::services::StudentService;
use student_records_api::storage::AttachmentStore;
use student_records_api::{app, RouterOptions};

#[derive(Parser)]
#[command(name = "student-records-api")]
#[command(about = "Student records API with profile picture uploads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Directory for uploaded pictures (overrides UPLOADS_DIR)")]
        uploads_dir: Option<PathBuf>,

        #[arg(long, help = "Keep records in memory instead of Postgres")]
        memory: bool,
    },

    #[command(about = "Print a bearer token signed with the configured secret")]
    Token {
        #[arg(help = "Subject to put in the token")]
        subject: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        uploads_dir: None,
        memory: false,
    }) {
        Commands::Serve {
            port,
            uploads_dir,
            memory,
        } => serve(config, port, uploads_dir, memory).await,
        Commands::Token { subject } => {
            let keys = JwtKeys::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_hours);
            println!("{}", keys.generate(&subject)?);
            Ok(())
        }
    }
}

async fn serve(
    config: &AppConfig,
    port: Option<u16>,
    uploads_dir: Option<PathBuf>,
    memory: bool,
) -> anyhow::Result<()> {
    tracing::info!("Starting Student Records API in {:?} mode", config.environment);

    let keys = JwtKeys::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_hours);
    if !keys.is_configured() {
        bail!("JWT_SECRET must be set outside development");
    }

    let uploads_dir = uploads_dir.unwrap_or_else(|| config.uploads.directory.clone());
    let attachments = AttachmentStore::open(&uploads_dir, config.uploads.max_file_size_bytes)
        .await
        .with_context(|| format!("failed to prepare uploads directory {}", uploads_dir.display()))?;

    let mut database = None;
    let repository: Arc<dyn StudentRepository> = if memory {
        tracing::warn!("Using in-memory student repository; records are lost on exit");
        Arc::new(MemoryStudentRepository::new())
    } else {
        let manager = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to database (use --memory to run without one)")?;
        manager.ensure_schema().await?;
        let repository = PgStudentRepository::new(manager.pool().clone());
        database = Some(manager);
        Arc::new(repository)
    };

    let service = StudentService::new(repository, attachments)
        .with_page_limits(config.api.default_page_size, config.api.max_page_size);
    let router = app(Arc::new(service), keys, &RouterOptions::from_config(config));

    let port = port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Student Records API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(manager) = database {
        manager.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
