//! Legal analyzer binary
//!
//! Run with: cargo run -p legal-analyzer -- serve --config analyzer.toml

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use legal_analyzer::{
    config::AnalyzerConfig,
    providers::{BlobStore, MemoryBlobStore, MemoryStatusStore, StatusSink},
    server::{
        state::{build_generator, build_ocr, build_pipeline},
        AnalyzerServer,
    },
    types::DocumentStatus,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "legal-analyzer")]
#[command(about = "Legal document analysis: extraction, LLM review, status tracking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override server.host
        #[arg(long)]
        host: Option<String>,
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Analyze one file and print the result
    Analyze {
        /// Document to analyze
        file: PathBuf,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legal_analyzer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Analyze { file, config } => {
            let config = load_config(config.as_deref())?;
            analyze(&file, config).await
        }
    }
}

/// File settings, then environment overrides, then validation
fn load_config(path: Option<&Path>) -> anyhow::Result<AnalyzerConfig> {
    let mut config = match path {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Storage backend: {:?}", config.storage.backend);
    tracing::info!("  - LLM backend: {:?}", config.llm.backend);
    tracing::info!("  - OCR: {}", config.extraction.use_ocr);
    tracing::info!("  - Max input chars: {}", config.analysis.max_input_chars);

    Ok(config)
}

async fn serve(config: AnalyzerConfig) -> anyhow::Result<()> {
    let server = AnalyzerServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST   /api/upload                  - Upload a document");
    println!("  GET    /api/documents/:id           - Poll status and analysis");
    println!("  GET    /api/documents               - List documents");
    println!("  DELETE /api/documents/:id           - Delete a document");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;
    Ok(())
}

/// Run the pipeline once against an in-memory copy of `file`
async fn analyze(file: &Path, config: AnalyzerConfig) -> anyhow::Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let extension = file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let media_type = mime_guess::from_path(file)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let layout = config.storage.layout.clone();
    let id = uuid::Uuid::new_v4().to_string();
    let store = Arc::new(MemoryBlobStore::new());
    let statuses = Arc::new(MemoryStatusStore::new());

    store
        .put(&layout.raw_key(&id, &extension), Bytes::from(data), &media_type)
        .await?;
    statuses.update(&id, DocumentStatus::Uploaded).await?;

    let pipeline = build_pipeline(
        &config,
        store.clone(),
        statuses.clone(),
        build_generator(&config)?,
        build_ocr(&config)?,
    );

    let status = pipeline.run(&id, Some(media_type.as_str())).await;
    println!("{}: {}", file.display(), status);

    if status != DocumentStatus::Processed {
        anyhow::bail!(
            "{}",
            status.error_reason().unwrap_or("Document was not processed")
        );
    }

    let artifact = store.get(&layout.processed_key(&id)).await?;
    println!("{}", String::from_utf8_lossy(&artifact));
    Ok(())
}
