use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use probsim::config::Config;
use probsim::db::{Database, LibSqlBackend, SimilarityBackend};
use probsim::embeddings::{EmbeddingApiClient, EmbeddingProvider, HttpEmbeddingProvider};
use probsim::services::{BatchOptions, MaintenanceService, SimilarityBatchRunner};

#[derive(Parser)]
#[command(name = "probsim")]
#[command(about = "Similarity engine for competition math problems")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute similarity edges for a batch of problems
    Batch {
        /// Number of source problems to process
        #[arg(long, default_value_t = 50)]
        count: u32,

        /// Skip problems that already have outgoing edges
        #[arg(long)]
        skip_processed: bool,

        /// Ensure embeddings only, without scoring or persisting
        #[arg(long)]
        embeddings_only: bool,

        /// Regenerate embeddings even when already present
        #[arg(long)]
        force_regenerate: bool,
    },
    /// List a problem's outgoing similarity edges
    List { problem_id: String },
    /// Remove one directed edge; the reverse edge is untouched
    Remove {
        source_id: String,
        target_id: String,
    },
    /// Remove all outgoing edges of a problem
    Clear { problem_id: String },
    /// Probe the embedding service readiness endpoint
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "probsim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate()?;

    match cli.command {
        Command::Batch {
            count,
            skip_processed,
            embeddings_only,
            force_regenerate,
        } => {
            let backend = connect(&config).await?;
            let provider: Arc<dyn EmbeddingProvider> =
                Arc::new(HttpEmbeddingProvider::new(&config.embeddings)?);
            let runner =
                SimilarityBatchRunner::new(backend, provider, config.similarity.clone());

            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received, finishing current problem...");
                    signal_token.cancel();
                }
            });

            let options = BatchOptions {
                count,
                skip_processed,
                embeddings_only,
                force_regenerate,
            };
            let summary = runner.run(&options, &cancel).await?;

            println!(
                "Selected {} problems: {} scored, {} skipped, {} embeddings-only, {} failed, {} edges created",
                summary.selected,
                summary.scored,
                summary.skipped,
                summary.embeddings_only,
                summary.failed,
                summary.edges_created,
            );
        }
        Command::List { problem_id } => {
            let backend = connect(&config).await?;
            let service = MaintenanceService::new(backend);
            let listed = service.list(&problem_id).await?;

            if listed.is_empty() {
                println!("No outgoing similarities for {problem_id}");
            } else {
                for item in listed {
                    let label = item.target_label.as_deref().unwrap_or("<deleted>");
                    let solution = item
                        .edge
                        .components
                        .solution
                        .map(|value| format!("{value:.3}"))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  {:.3}  {}  [statement {:.3} | solution {} | tags {:.3} | competition {:.3}]",
                        item.edge.target_id,
                        item.edge.score,
                        label,
                        item.edge.components.statement,
                        solution,
                        item.edge.components.tags,
                        item.edge.components.competition,
                    );
                }
            }
        }
        Command::Remove {
            source_id,
            target_id,
        } => {
            let backend = connect(&config).await?;
            let service = MaintenanceService::new(backend);

            if service.remove(&source_id, &target_id).await? {
                println!("Removed {source_id} -> {target_id}");
            } else {
                println!("No edge {source_id} -> {target_id}");
            }
        }
        Command::Clear { problem_id } => {
            let backend = connect(&config).await?;
            let service = MaintenanceService::new(backend);

            let cleared = service.clear(&problem_id).await?;
            println!("Cleared {cleared} outgoing edges of {problem_id}");
        }
        Command::Health => {
            let client = EmbeddingApiClient::new(&config.embeddings)?;
            let health = client.health().await?;
            println!(
                "status: {}  model_loaded: {}  model: {}",
                health.status, health.model_loaded, health.model_name
            );

            if !health.model_loaded {
                anyhow::bail!("Embedding model is not loaded");
            }
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<Arc<dyn SimilarityBackend>> {
    tracing::info!("Connecting to database...");
    let db = Database::new(&config.database).await?;
    Ok(Arc::new(LibSqlBackend::new(db)))
}
