use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quorum_agent::prompt;
use quorum_agent::tools::{EventbriteTool, SearchNotesTool, WebSearchTool};
use quorum_agent::Agent;
use quorum_core::config::Config;
use quorum_ingest::pdf::PdfSource;
use quorum_ingest::worker::ChunkSource;
use quorum_ingest::youtube::YouTubeSource;
use quorum_server::AppState;

#[derive(Parser)]
#[command(
    name = "quorum",
    about = "Meeting-notes RAG chatbot backend for community meetups",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: 8000 or $PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ask a question from the command line (streams the answer)
    Ask {
        question: String,

        /// Allow the agent to use web search
        #[arg(long)]
        web: bool,
    },

    /// Search the meeting notes without answer synthesis
    Search {
        query: String,

        /// Number of results
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Restrict to sessions matching this filter
        #[arg(long)]
        session_filter: Option<String>,
    },

    /// Ingest a YouTube video or PDF slide deck
    Ingest {
        /// YouTube URL/video id, or path to a PDF file
        source: String,

        /// Session description, e.g. "General meetup November 2025"
        #[arg(long)]
        session_info: String,

        /// Transcript chunk size in characters
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,

        /// Segments carried over between chunks
        #[arg(long, default_value_t = 1)]
        overlap: usize,

        /// Caption language code
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Query a running server for health or job status
    Status {
        /// Upload job id (omit for server health)
        job_id: Option<String>,

        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = Config::from_env();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = AppState::from_config(config)?;
            tracing::info!("Starting Quorum server");
            quorum_server::serve(state).await?;
        }

        Commands::Ask { question, web } => {
            let state = AppState::from_config(config)?;
            let provider = state
                .provider
                .clone()
                .context("OPENAI_API_KEY not set")?;

            let template =
                prompt::load_prompt(state.config.prompt_dir.as_deref(), "assistant.txt");
            let instructions = prompt::build_instructions(&template, &[]);
            let mut agent = Agent::new(
                provider,
                state.config.openai.chat_model.clone(),
                instructions,
            );
            if let Some(rag) = &state.rag {
                agent.add_tool(Arc::new(SearchNotesTool::new(rag.clone())));
            }
            if let Some(events) = &state.events {
                agent.add_tool(Arc::new(EventbriteTool::new(events.clone())));
            }
            if web {
                if let Some(search) = &state.config.search {
                    agent.add_tool(Arc::new(WebSearchTool::new(
                        search.base_url.clone(),
                        search.api_key.clone(),
                    )?));
                }
            }

            let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(1);
            let printer = tokio::spawn(async move {
                let mut stdout = std::io::stdout();
                while let Some(delta) = rx.recv().await {
                    let _ = write!(stdout, "{delta}");
                    let _ = stdout.flush();
                }
            });

            agent.run(&question, tx).await?;
            printer.await?;
            println!();
        }

        Commands::Search {
            query,
            top_k,
            session_filter,
        } => {
            let state = AppState::from_config(config)?;
            let rag = state
                .rag
                .clone()
                .context("SUPABASE_URL / OPENAI_API_KEY not set")?;

            let hits = rag
                .search(&query, top_k, session_filter.as_deref())
                .await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (idx, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{} @ {}] (score {:.3})\n   {}\n",
                    idx + 1,
                    hit.session_info,
                    hit.timestamp,
                    hit.score,
                    hit.text
                );
            }
        }

        Commands::Ingest {
            source,
            session_info,
            chunk_size,
            overlap,
            language,
        } => {
            let state = AppState::from_config(config)?;
            let pipeline = state
                .pipeline
                .clone()
                .context("SUPABASE_URL / OPENAI_API_KEY not set")?;

            let source: Box<dyn ChunkSource> = if source.to_lowercase().ends_with(".pdf") {
                let path = std::path::Path::new(&source);
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("upload.pdf")
                    .to_string();
                Box::new(PdfSource::new(bytes, filename))
            } else {
                Box::new(YouTubeSource::new(&source, language, chunk_size, overlap)?)
            };

            let job_id = state.ledger.submit("Starting ingestion...");
            match pipeline.run(&job_id, &*source, &session_info).await {
                Ok(outcome) => println!("{}", outcome.message),
                Err(failure) => anyhow::bail!("{}: {}", failure.message, failure.error),
            }
        }

        Commands::Status { job_id, server } => {
            let url = match &job_id {
                Some(id) => format!("{server}/api/upload/status/{id}"),
                None => format!("{server}/health"),
            };
            let body: serde_json::Value = reqwest::get(&url)
                .await
                .with_context(|| format!("request to {url} failed"))?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
