mod config;

use crate::config::{LogFormat, RagentConfig};
use clap::{Parser, Subcommand};
use ragent_agent::{LlmClient, Orchestrator};
use ragent_core::RagentResult;
use ragent_gateway::GatewayServer;
use ragent_memory::{
    build_embedder, DocumentRetriever, EmbeddingProvider, Ingestor, TextChunker, VectorIndex,
};
use ragent_session::{InMemorySessionStore, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragent", about = "Ragent: document-grounded question answering")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ragent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Rebuild the vector index from the documents directory
    Ingest,
    /// Answer a single question and print the result as JSON
    Ask {
        query: String,
        /// Continue an existing session
        #[arg(long)]
        session_id: Option<String>,
    },
}

/// Everything a command needs, wired from one config.
struct Services {
    orchestrator: Arc<Orchestrator>,
    ingestor: Ingestor,
    sessions: Arc<InMemorySessionStore>,
}

impl Services {
    fn build(config: &RagentConfig) -> anyhow::Result<Self> {
        let embedder = build_embedder(&config.embedding)?;
        let llm = LlmClient::new(config.model.clone())?;
        info!(
            provider = ?config.model.provider,
            model = %config.model.model_id,
            "Completion backend ready"
        );
        Self::assemble(config, embedder, llm)
    }

    fn assemble(
        config: &RagentConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: LlmClient,
    ) -> anyhow::Result<Self> {
        let index = VectorIndex::shared();
        let chunker = TextChunker::new(config.index.chunk_size, config.index.chunk_overlap)?;
        let ingestor = Ingestor::new(
            index.clone(),
            embedder.clone(),
            chunker,
            config.embedding.batch_size,
        );
        let retriever = DocumentRetriever::new(index, embedder, config.index.top_k);
        let sessions = Arc::new(InMemorySessionStore::from_config(&config.session));

        Ok(Self {
            orchestrator: Arc::new(Orchestrator::new(llm, retriever, sessions.clone())),
            ingestor,
            sessions,
        })
    }

    async fn initialize_index(&self, config: &RagentConfig) -> RagentResult<()> {
        let origin = self
            .ingestor
            .initialize(&config.index.documents_dir, &config.index.store_path)
            .await?;
        info!(origin = ?origin, "Vector index ready");
        Ok(())
    }

    /// Like `initialize_index`, but a failure leaves the server running with
    /// an empty index; `/api/health` then reports it as uninitialized.
    async fn initialize_index_for_serving(&self, config: &RagentConfig) {
        if let Err(e) = self.initialize_index(config).await {
            error!(
                error = %e,
                external = e.is_external(),
                "Failed to initialize vector index, serving without documents"
            );
        }
    }
}

fn init_tracing(config: &RagentConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = RagentConfig::load(&cli.config).await?;
    init_tracing(&config);
    info!(
        config = %cli.config.display(),
        environment = ?config.environment,
        "Configuration loaded"
    );

    let services = Services::build(&config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let mut server_config = config.server.clone();
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            services.initialize_index_for_serving(&config).await;

            let sessions = services.sessions.clone();
            let interval = config.session.sweep_interval();
            let sweeper = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = sessions.sweep().await {
                        warn!(error = %e, "Session sweep failed");
                    }
                }
            });

            let app = GatewayServer::build(services.orchestrator.clone(), &server_config);
            let addr = server_config.bind_addr();
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "Ragent listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            sweeper.abort();
            let removed = services.sessions.sweep().await?;
            info!(removed, "Shutting down");
        }
        Commands::Ingest => {
            let added = services
                .ingestor
                .rebuild(&config.index.documents_dir, &config.index.store_path)
                .await?;
            println!(
                "Indexed {added} chunks from {} into {}",
                config.index.documents_dir.display(),
                config.index.store_path.display()
            );
        }
        Commands::Ask { query, session_id } => {
            services.initialize_index(&config).await?;
            let response = services
                .orchestrator
                .ask(&query, session_id.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragent_agent::{LlmBackend, LlmResponse, ToolChoice, ToolDescriptor};
    use ragent_core::{Message, RagentError};
    use std::path::Path;
    use std::time::Duration;

    /// An embedding service that is rate limiting every request.
    struct ThrottledEmbedding;

    #[async_trait]
    impl EmbeddingProvider for ThrottledEmbedding {
        async fn embed(&self, _text: &str) -> RagentResult<Vec<f32>> {
            Err(RagentError::Embedding("429 Too Many Requests".to_string()))
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    struct CannedBackend;

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
            _tool_choice: ToolChoice,
        ) -> RagentResult<LlmResponse> {
            Ok(LlmResponse::Done("No documents are loaded yet.".to_string()))
        }
    }

    async fn config_with_documents(root: &Path) -> RagentConfig {
        let mut config = RagentConfig::default();
        config.index.documents_dir = root.join("docs");
        config.index.store_path = root.join("store");
        tokio::fs::create_dir_all(&config.index.documents_dir).await.unwrap();
        tokio::fs::write(
            config.index.documents_dir.join("policy.txt"),
            "Employees get fifteen days of annual leave.",
        )
        .await
        .unwrap();
        config
    }

    fn services(config: &RagentConfig) -> Services {
        Services::assemble(
            config,
            Arc::new(ThrottledEmbedding),
            LlmClient::from_backend(Box::new(CannedBackend), Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_index_fails_when_embedder_is_down() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_documents(tmp.path()).await;
        let err = services(&config).initialize_index(&config).await.unwrap_err();
        assert!(matches!(err, RagentError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_server_runs_when_ingestion_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_documents(tmp.path()).await;
        let services = services(&config);
        services.initialize_index_for_serving(&config).await;
        assert!(!tmp.path().join("store").exists());

        let app = GatewayServer::build(services.orchestrator.clone(), &config.server);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let health: serde_json::Value = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["vector_store_initialized"], false);

        let answer: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{addr}/api/ask"))
            .json(&serde_json::json!({"query": "How many leave days do I get?"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(answer["answer"], "No documents are loaded yet.");
        assert_eq!(answer["sources"], serde_json::json!([]));
    }
}
