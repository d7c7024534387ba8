use super::QueryStage;
use crate::config::{AppConfig, TimeoutConfig};
use crate::context::{ChunkBudget, ChunkOptimizer, ContextBuilder, Generators};
use crate::errors::{AppError, ErrorKind, Result};
use crate::metrics;
use crate::models::{Chunk, QueryResult, SourceCitation};
use crate::registry::DocumentRegistry;
use crate::store::{VectorStore, WhereFilter};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One question against the index
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub query: String,

    /// Restrict retrieval to one document (content hash)
    pub document_id: Option<String>,

    /// Chunks wanted; candidates are over-fetched from this
    pub top_k: usize,
}

impl QueryParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            document_id: None,
            top_k: crate::DEFAULT_TOP_K,
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Time limits for the stages that call out of process
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub extraction: Duration,
    pub retrieval: Duration,
    pub generation: Duration,
}

impl From<&TimeoutConfig> for StageTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            extraction: config.extraction(),
            retrieval: config.retrieval(),
            generation: config.generation(),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Sequences extraction, retrieval, optimization, context building and
/// generation for each query.
///
/// Holds no per-query state; one instance serves concurrent queries.
pub struct QueryOrchestrator {
    store: Arc<dyn VectorStore>,
    registry: Arc<DocumentRegistry>,
    generators: Generators,
    optimizer: ChunkOptimizer,
    builder: ContextBuilder,
    timeouts: StageTimeouts,
    max_sources: usize,
    overfetch_factor: usize,
    max_candidates: usize,
}

impl QueryOrchestrator {
    pub fn new(
        store: Arc<dyn VectorStore>,
        registry: Arc<DocumentRegistry>,
        generators: Generators,
    ) -> Self {
        Self {
            store,
            registry,
            generators,
            optimizer: ChunkOptimizer::default(),
            builder: ContextBuilder::new(),
            timeouts: StageTimeouts::default(),
            max_sources: crate::MAX_SOURCES,
            overfetch_factor: crate::OVERFETCH_FACTOR,
            max_candidates: crate::MAX_CANDIDATES,
        }
    }

    /// Build from application config; invalid budgets fail here
    pub fn from_config(
        store: Arc<dyn VectorStore>,
        registry: Arc<DocumentRegistry>,
        generators: Generators,
        config: &AppConfig,
    ) -> Result<Self> {
        let retrieval = &config.retrieval;
        let budget = ChunkBudget::new(retrieval.max_tokens, retrieval.max_per_page)?;
        if retrieval.overfetch_factor == 0 || retrieval.max_candidates == 0 {
            return Err(AppError::invalid_argument(
                "overfetch_factor and max_candidates must be positive",
            ));
        }

        Ok(Self::new(store, registry, generators)
            .with_budget(budget)
            .with_timeouts(StageTimeouts::from(&config.timeouts))
            .with_max_sources(retrieval.max_sources)
            .with_candidate_limits(retrieval.overfetch_factor, retrieval.max_candidates))
    }

    pub fn with_budget(mut self, budget: ChunkBudget) -> Self {
        self.optimizer = ChunkOptimizer::new(budget);
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn with_candidate_limits(mut self, overfetch_factor: usize, max_candidates: usize) -> Self {
        self.overfetch_factor = overfetch_factor;
        self.max_candidates = max_candidates;
        self
    }

    /// Answer one query.
    ///
    /// Empty retrieval, an empty optimized set and a blank context each end
    /// the query with their own not-found error. Timeouts surface as
    /// `Timeout`; every other fault is reported as `Internal`.
    pub async fn run(&self, params: &QueryParams) -> Result<QueryResult> {
        let started = Instant::now();
        let result = self.execute(params, started).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(answer) => {
                metrics::record_query(elapsed, "success");
                info!(
                    sources = answer.sources.len(),
                    processing_time_ms = answer.processing_time_ms,
                    "Query answered"
                );
            }
            Err(e) => {
                let outcome = match e.kind() {
                    ErrorKind::NotFound => "not_found",
                    ErrorKind::Timeout => "timeout",
                    ErrorKind::Validation | ErrorKind::InvalidArgument => "invalid",
                    _ => "error",
                };
                metrics::record_query(elapsed, outcome);
                if e.kind() == ErrorKind::NotFound {
                    info!(reason = %e, "Query ended without an answer");
                } else {
                    warn!(error = %e, outcome, "Query failed");
                }
            }
        }

        result
    }

    async fn execute(&self, params: &QueryParams, started: Instant) -> Result<QueryResult> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_argument("query must not be empty"));
        }
        if !(1..=crate::MAX_TOP_K).contains(&params.top_k) {
            return Err(AppError::invalid_argument(format!(
                "top_k must be between 1 and {}, got {}",
                crate::MAX_TOP_K,
                params.top_k
            )));
        }
        let document_id = params
            .document_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let entities = self
            .stage(
                QueryStage::ExtractEntities,
                self.timeouts.extraction,
                self.generators.extractor.extract(query),
            )
            .await?;
        debug!(categories = entities.len(), "Entities extracted");

        let n_results =
            crate::initial_top_k(params.top_k, self.overfetch_factor, self.max_candidates);
        let candidates = self
            .stage(QueryStage::Retrieve, self.timeouts.retrieval, async {
                let filter = match document_id {
                    Some(id) => {
                        if !self.store.check_processed(id).await? {
                            return Err(AppError::DocumentNotFound { id: id.to_string() });
                        }
                        WhereFilter::for_source(id)
                    }
                    None => WhereFilter::default(),
                };
                self.store.query(query, n_results, &filter).await
            })
            .await?;
        debug!(candidates = candidates.len(), n_results, "Candidates retrieved");
        if candidates.is_empty() {
            return Err(AppError::NoRelevantInformation);
        }

        let optimized = self.timed(QueryStage::Optimize, || {
            self.optimizer.optimize(&candidates, &entities)
        });
        metrics::record_selection(candidates.len(), optimized.len());
        debug!(
            optimized = optimized.len(),
            max_tokens = self.optimizer.budget().max_tokens(),
            max_per_page = self.optimizer.budget().max_per_page(),
            "Candidates optimized"
        );
        if optimized.is_empty() {
            return Err(AppError::NoChunksAfterOptimization);
        }

        let context = self.timed(QueryStage::BuildContext, || {
            self.builder.build(&optimized, &entities)
        });
        debug!(context_chars = context.len(), "Context built");
        if context.trim().is_empty() {
            return Err(AppError::NoInformationAfterFiltering);
        }

        let reasoning = self
            .stage(
                QueryStage::GenerateReasoning,
                self.timeouts.generation,
                self.generators.reasoner.generate(query, &entities, &optimized),
            )
            .await?;

        let answer = self
            .stage(
                QueryStage::GenerateAnswer,
                self.timeouts.generation,
                self.generators.synthesizer.generate(query, &context),
            )
            .await?;

        let sources = self.citations(&optimized).await?;

        Ok(QueryResult {
            answer,
            reasoning,
            entities,
            sources,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn citations(&self, chunks: &[Chunk]) -> Result<Vec<SourceCitation>> {
        let mapping = self
            .registry
            .load()
            .await
            .map_err(|e| wrap_fault(QueryStage::Respond, e))?;

        Ok(chunks
            .iter()
            .take(self.max_sources)
            .map(|chunk| {
                let document = mapping
                    .get(&chunk.source_hash)
                    .map(String::as_str)
                    .unwrap_or("Unknown");
                SourceCitation::from_chunk(chunk, document)
            })
            .collect())
    }

    async fn stage<T, F>(&self, stage: QueryStage, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let outcome = tokio::time::timeout(limit, fut).await;
        metrics::record_stage(stage.as_str(), started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(wrap_fault(stage, e)),
            Err(_) => Err(AppError::Timeout {
                stage: stage.as_str().to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    fn timed<T>(&self, stage: QueryStage, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        metrics::record_stage(stage.as_str(), started.elapsed().as_secs_f64());
        value
    }
}

/// Keep explicit exits as they are; anything else becomes an internal error
/// naming the stage
fn wrap_fault(stage: QueryStage, error: AppError) -> AppError {
    match error.kind() {
        ErrorKind::NotFound
        | ErrorKind::Timeout
        | ErrorKind::Validation
        | ErrorKind::InvalidArgument => error,
        _ => AppError::Internal {
            message: format!("{} stage failed: {}", stage, error),
        },
    }
}
