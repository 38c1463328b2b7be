use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use avatar_rag::adapters::Adapters;
use avatar_rag::config::Config;
use avatar_rag::error::Result;
use avatar_rag::services::{AvatarService, KnowledgeBase};

mod ask;
mod index;
mod serve;

#[derive(Parser)]
#[command(name = "avatar-rag")]
#[command(about = "Knowledge-grounded avatar answers over a single document")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output as JSON")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        help = "Config file to use instead of the global and project files"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Agent manifest (JSON, or YAML by extension)")]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Build the knowledge base and serve the HTTP API")]
    Serve {
        #[arg(long, help = "Address to bind (host:port)")]
        bind: Option<String>,
    },

    #[command(about = "Build the knowledge base and print its statistics")]
    Index,

    #[command(about = "Answer one question in the terminal")]
    Ask {
        #[arg(help = "Question to ask the avatar")]
        question: String,

        #[arg(long, help = "Print the answer as it is generated")]
        stream: bool,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(manifest) = cli.manifest {
        config.manifest_path = Some(manifest);
    }

    match cli.command {
        Commands::Serve { bind } => serve::run(config, bind).await,
        Commands::Index => index::run(config, cli.json).await,
        Commands::Ask { question, stream } => ask::run(config, question, stream, cli.json).await,
    }
}

/// Wires the adapters and builds the knowledge base. A cache that fails to
/// build is still returned; requests are then refused as not ready.
async fn build_service(config: &Config) -> Result<Arc<AvatarService>> {
    let adapters = Adapters::from_config(config)?;
    let knowledge = KnowledgeBase::build(
        &config.manifest_path(),
        &config.rag,
        adapters.embedder.as_ref(),
    )
    .await;

    if !knowledge.is_ready() {
        tracing::warn!("knowledge base is not ready; questions will be refused");
    }

    Ok(Arc::new(AvatarService::new(
        Arc::new(knowledge),
        adapters.embedder,
        adapters.generator,
        config.rag.top_k,
    )))
}
