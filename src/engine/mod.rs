//! Query answering engine
//!
//! Cascading orchestrator over the whole pipeline: cache lookup, grounded
//! generation from retrieved context, full-corpus fallback, terminal
//! refusal. Every stage hands off to the next on a negative outcome and
//! only non-negative answers are cached. `ask` never returns an error;
//! every failure maps to an error-route answer so callers always get
//! something presentable.

mod router;

pub use router::{QueryIntent, QueryRouter};

use crate::cache::ResponseCache;
use crate::classify::NegativeClassifier;
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::generate::{CompletionError, CompletionProvider, Generator};
use crate::retrieval::{HybridRetriever, RerankModel, Reranker};
use crate::store::{ChunkLevel, DocumentStore};
use crate::vector::VectorStore;
use chrono::Duration;
use std::sync::Arc;

/// Shortest query accepted, in characters
const MIN_QUERY_CHARS: usize = 3;

const UNAVAILABLE_MESSAGE: &str =
    "The language model service is unavailable right now. Please try again later.";
const SEARCH_FAILED_MESSAGE: &str = "Something went wrong while searching the documents.";
const EMPTY_CORPUS_MESSAGE: &str =
    "No documents have been ingested yet, so there is nothing to answer from.";
const SHORT_QUERY_MESSAGE: &str = "Please ask a complete question.";

/// Which stage of the cascade produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Exact-query cache hit
    Cache,
    /// Generated from retrieved, reranked context
    Grounded,
    /// Generated from the full corpus after grounded came up negative
    Fallback,
    /// Fallback reached with no ingested documents
    FallbackEmpty,
    /// Every stage came up negative
    Negative,
    /// Small talk answered without retrieval
    Conversational,
    /// Pipeline or provider failure
    Error,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Cache => "cache",
            Route::Grounded => "grounded",
            Route::Fallback => "fallback",
            Route::FallbackEmpty => "fallback_empty",
            Route::Negative => "negative",
            Route::Conversational => "conversational",
            Route::Error => "error",
        }
    }

    /// Where the answer text came from
    pub fn source(&self) -> &'static str {
        match self {
            Route::Cache => "cache",
            Route::Grounded => "documents",
            Route::Fallback => "full_corpus",
            Route::Conversational => "model",
            Route::FallbackEmpty | Route::Negative | Route::Error => "none",
        }
    }
}

/// Final answer with its provenance
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub route: Route,
}

impl Answer {
    fn new(text: impl Into<String>, route: Route) -> Self {
        Self {
            text: text.into(),
            route,
        }
    }

    pub fn source(&self) -> &'static str {
        self.route.source()
    }
}

pub struct QueryEngine {
    store: Arc<DocumentStore>,
    retriever: HybridRetriever,
    reranker: Reranker,
    assembler: ContextAssembler,
    classifier: NegativeClassifier,
    generator: Generator,
    cache: Arc<dyn ResponseCache>,
    router: QueryRouter,
    top_k: usize,
    ttl: Duration,
}

impl QueryEngine {
    pub fn new(
        store: Arc<DocumentStore>,
        vector: Arc<dyn VectorStore>,
        rerank_model: Arc<dyn RerankModel>,
        provider: Arc<dyn CompletionProvider>,
        cache: Arc<dyn ResponseCache>,
        searchable_level: ChunkLevel,
        config: &Config,
    ) -> Self {
        let retriever = HybridRetriever::new(
            vector,
            store.clone(),
            searchable_level,
            config.retrieval.clone(),
        );
        let reranker = Reranker::new(rerank_model, config.retrieval.rerank_weight);
        let assembler = ContextAssembler::new(store.clone(), config.context.clone());
        let classifier = NegativeClassifier::new(config.classifier.clone());
        let generator = Generator::new(
            provider,
            config.llm.clone(),
            config.classifier.refusal.clone(),
        );

        Self {
            store,
            retriever,
            reranker,
            assembler,
            classifier,
            generator,
            cache,
            router: QueryRouter::new(),
            top_k: config.retrieval.top_k,
            ttl: Duration::hours(config.cache.ttl_hours),
        }
    }

    /// Answer a query through the cascade. Infallible by contract: every
    /// failure becomes an error-route answer.
    pub async fn ask(&self, query: &str) -> Answer {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Answer::new(SHORT_QUERY_MESSAGE, Route::Error);
        }

        if let Some(cached) = self.cache.get(query) {
            tracing::info!("Answered from cache");
            return Answer::new(cached, Route::Cache);
        }

        match self.router.classify(query) {
            QueryIntent::Conversational => self.answer_conversational(query).await,
            QueryIntent::Document => self.answer_from_documents(query).await,
        }
    }

    async fn answer_from_documents(&self, query: &str) -> Answer {
        let candidates = match self.retriever.search(query, self.top_k).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Retrieval failed: {}", e);
                return Answer::new(SEARCH_FAILED_MESSAGE, Route::Error);
            }
        };

        let ranked = self.reranker.rerank(query, candidates, self.top_k);
        let context = self.assembler.build(&ranked);

        if context.is_empty() {
            tracing::info!("No usable context, skipping grounded generation");
            return self.answer_from_full_corpus(query).await;
        }

        match self.generator.grounded(query, &context).await {
            Ok(response) if self.classifier.is_negative(&response) => {
                tracing::info!("Grounded answer was negative, falling back to full corpus");
                self.answer_from_full_corpus(query).await
            }
            Ok(response) => {
                self.cache.set(query, &response, self.ttl);
                Answer::new(response, Route::Grounded)
            }
            Err(e) => self.provider_failure(e),
        }
    }

    async fn answer_from_full_corpus(&self, query: &str) -> Answer {
        let corpus = self.store.full_corpus_text();
        if corpus.is_empty() {
            return Answer::new(EMPTY_CORPUS_MESSAGE, Route::FallbackEmpty);
        }

        let context = self.assembler.truncate_external(&corpus, query);
        match self.generator.full_context(query, &context).await {
            Ok(response) if self.classifier.is_negative(&response) => {
                // Terminal stage: the refusal is the answer, never cached
                Answer::new(self.classifier.refusal(), Route::Negative)
            }
            Ok(response) => {
                self.cache.set(query, &response, self.ttl);
                Answer::new(response, Route::Fallback)
            }
            Err(e) => self.provider_failure(e),
        }
    }

    async fn answer_conversational(&self, query: &str) -> Answer {
        match self.generator.conversational(query).await {
            Ok(response) => {
                if !self.classifier.is_negative(&response) {
                    self.cache.set(query, &response, self.ttl);
                }
                Answer::new(response, Route::Conversational)
            }
            Err(e) => self.provider_failure(e),
        }
    }

    fn provider_failure(&self, error: CompletionError) -> Answer {
        tracing::error!("Completion provider failure: {}", error);
        Answer::new(UNAVAILABLE_MESSAGE, Route::Error)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evict expired cache entries, returning how many were removed
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }
}
