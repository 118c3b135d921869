//! Shared application state.

use std::sync::Arc;

use quorum_agent::provider::{ChatProvider, OpenAiProvider};
use quorum_core::config::Config;
use quorum_events::EventsService;
use quorum_ingest::{IngestPipeline, JobLedger};
use quorum_rag::embeddings::EmbeddingsClient;
use quorum_rag::store::VectorStore;
use quorum_rag::RagService;
use quorum_trace::sink::{HttpTraceSink, NoopSink, TraceSink};
use quorum_trace::turns::TurnAggregator;
use tracing::info;

use crate::rate_limit::RateLimiter;

/// Everything handlers share. Integrations without credentials stay
/// `None` and surface as 503 at request time, so a partially
/// configured deployment still serves what it can.
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: RateLimiter,
    pub rag: Option<Arc<RagService>>,
    pub events: Option<Arc<EventsService>>,
    pub provider: Option<Arc<dyn ChatProvider>>,
    pub sink: Arc<dyn TraceSink>,
    pub turns: TurnAggregator,
    pub ledger: Arc<JobLedger>,
    pub pipeline: Option<Arc<IngestPipeline>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Arc<Self>> {
        let config = Arc::new(config);

        let rag = if config.supabase.is_some() && config.openai.api_key.is_some() {
            let embeddings = Arc::new(EmbeddingsClient::from_config(&config.openai)?);
            let store = Arc::new(VectorStore::from_config(config.supabase.as_ref())?);
            Some(Arc::new(RagService::new(embeddings, store)))
        } else {
            info!("Supabase or OpenAI credentials missing; search disabled");
            None
        };

        let events = match &config.eventbrite {
            Some(_) => Some(Arc::new(EventsService::from_config(
                config.eventbrite.as_ref(),
            )?)),
            None => {
                info!("Eventbrite credentials missing; events disabled");
                None
            }
        };

        let provider: Option<Arc<dyn ChatProvider>> = if config.openai.api_key.is_some() {
            Some(Arc::new(OpenAiProvider::from_config(&config.openai)?))
        } else {
            info!("OPENAI_API_KEY missing; chat disabled");
            None
        };

        let sink: Arc<dyn TraceSink> = if config.trace.enabled {
            Arc::new(HttpTraceSink::from_config(&config.trace)?)
        } else {
            Arc::new(NoopSink)
        };

        let ledger = Arc::new(JobLedger::new());
        let pipeline = rag.as_ref().map(|rag| {
            Arc::new(IngestPipeline::new(
                rag.embeddings().clone(),
                rag.store().clone(),
                ledger.clone(),
            ))
        });

        Ok(Arc::new(Self {
            limiter: RateLimiter::new(config.server.rate_limit),
            turns: TurnAggregator::new(sink.clone()),
            config,
            rag,
            events,
            provider,
            sink,
            ledger,
            pipeline,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
        }))
    }

    /// State with a caller-supplied sink, for tests.
    #[doc(hidden)]
    pub fn for_tests(config: Config, sink: Arc<dyn TraceSink>) -> Arc<Self> {
        let config = Arc::new(config);
        let ledger = Arc::new(JobLedger::new());
        Arc::new(Self {
            limiter: RateLimiter::new(config.server.rate_limit),
            turns: TurnAggregator::new(sink.clone()),
            config,
            rag: None,
            events: None,
            provider: None,
            sink,
            ledger,
            pipeline: None,
            http: reqwest::Client::new(),
        })
    }
}
