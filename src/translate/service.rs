//! Translation orchestration.
//! Per-request state machine: Requested → OracleCalled → Cleaned →
//! Validated → {Accepted, Retry, Fallback}. Bounded retries with a
//! reinforced prompt, deterministic fallback, quality caching, and
//! single-flight coalescing of concurrent identical requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clean::patterns::{PatternError, PatternLibrary};
use crate::clean::ContentCleaner;
use crate::config::{CacheConfig, PipelineConfig};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::script::Lang;
use crate::translate::cache::QualityCache;
use crate::translate::fallback::FallbackCatalog;
use crate::translate::oracle::{OracleError, OracleRequest, TranslationOracle};
use crate::translate::{Origin, TranslateRequest, Translation};
use crate::validate::PurityValidator;

/// All states a translation request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestPhase {
    Requested,
    OracleCalled,
    Cleaned,
    Validated,
    Accepted,
    Retry,
    Fallback,
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestPhase::Requested => write!(f, "Requested"),
            RequestPhase::OracleCalled => write!(f, "OracleCalled"),
            RequestPhase::Cleaned => write!(f, "Cleaned"),
            RequestPhase::Validated => write!(f, "Validated"),
            RequestPhase::Accepted => write!(f, "Accepted"),
            RequestPhase::Retry => write!(f, "Retry"),
            RequestPhase::Fallback => write!(f, "Fallback"),
        }
    }
}

impl RequestPhase {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: RequestPhase) -> bool {
        matches!(
            (self, next),
            (RequestPhase::Requested, RequestPhase::OracleCalled)
                // identity and cache hits short-circuit
                | (RequestPhase::Requested, RequestPhase::Accepted)
                // cancelled before the first attempt
                | (RequestPhase::Requested, RequestPhase::Fallback)
                | (RequestPhase::OracleCalled, RequestPhase::Cleaned)
                | (RequestPhase::OracleCalled, RequestPhase::Retry)
                | (RequestPhase::OracleCalled, RequestPhase::Fallback)
                | (RequestPhase::Cleaned, RequestPhase::Validated)
                | (RequestPhase::Validated, RequestPhase::Accepted)
                | (RequestPhase::Validated, RequestPhase::Retry)
                | (RequestPhase::Validated, RequestPhase::Fallback)
                | (RequestPhase::Retry, RequestPhase::OracleCalled)
                | (RequestPhase::Retry, RequestPhase::Fallback)
        )
    }
}

/// Tracks and logs the phase of one request.
struct PhaseTracker {
    request_id: String,
    phase: RequestPhase,
}

impl PhaseTracker {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            phase: RequestPhase::Requested,
        }
    }

    fn advance(&mut self, next: RequestPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(
                request_id = %self.request_id,
                from = %self.phase,
                to = %next,
                "invalid phase transition"
            );
        } else {
            debug!(
                request_id = %self.request_id,
                from = %self.phase,
                to = %next,
                "phase_transition"
            );
        }
        self.phase = next;
    }
}

/// Collapses concurrent identical requests onto one oracle call.
/// Waiters acquire the per-key lock, then re-check the cache.
struct RequestCoalescer {
    inflight: AsyncMutex<HashMap<[u8; 32], Arc<AsyncMutex<()>>>>,
}

impl RequestCoalescer {
    fn new() -> Self {
        Self {
            inflight: AsyncMutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: [u8; 32]) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(inflight.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
        };
        lock.lock_owned().await
    }
}

/// The pipeline entry point the UI layer calls.
pub struct TranslationService {
    oracle: Arc<dyn TranslationOracle>,
    cleaner: ContentCleaner,
    validator: Arc<PurityValidator>,
    cache: Arc<QualityCache>,
    fallbacks: FallbackCatalog,
    coalescer: RequestCoalescer,
    metrics: Arc<MetricsRegistry>,
    retry_budget: u32,
    oracle_timeout: Duration,
    cache_config: CacheConfig,
}

impl TranslationService {
    /// Build the service from configuration. Pattern-file problems are
    /// startup-fatal here, never per-request.
    pub fn new(
        oracle: Arc<dyn TranslationOracle>,
        config: &PipelineConfig,
    ) -> Result<Self, PatternError> {
        let library = match &config.pattern_file {
            Some(path) => PatternLibrary::load_from_file(path)?,
            None => PatternLibrary::builtin(),
        };
        let cache = Arc::new(QualityCache::new(config.cache.capacity, config.cache.ttl()));
        Ok(Self::assemble(oracle, config, library, cache))
    }

    /// Build with an externally constructed cache (e.g. one with a test
    /// clock).
    pub fn with_cache(
        oracle: Arc<dyn TranslationOracle>,
        config: &PipelineConfig,
        cache: Arc<QualityCache>,
    ) -> Result<Self, PatternError> {
        let library = match &config.pattern_file {
            Some(path) => PatternLibrary::load_from_file(path)?,
            None => PatternLibrary::builtin(),
        };
        Ok(Self::assemble(oracle, config, library, cache))
    }

    fn assemble(
        oracle: Arc<dyn TranslationOracle>,
        config: &PipelineConfig,
        library: PatternLibrary,
        cache: Arc<QualityCache>,
    ) -> Self {
        Self {
            oracle,
            cleaner: ContentCleaner::new(library, config.interleave_policy),
            validator: Arc::new(PurityValidator::new(config.purity)),
            cache,
            fallbacks: FallbackCatalog::new(),
            coalescer: RequestCoalescer::new(),
            metrics: Arc::new(MetricsRegistry::new()),
            retry_budget: config.retry_budget,
            oracle_timeout: config.oracle_timeout(),
            cache_config: config.cache,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<QualityCache> {
        &self.cache
    }

    pub fn cleaner(&self) -> &ContentCleaner {
        &self.cleaner
    }

    pub fn validator(&self) -> &PurityValidator {
        &self.validator
    }

    /// Spawn the periodic cache revalidation sweep on the current runtime.
    pub fn start_revalidation_loop(&self) -> tokio::task::JoinHandle<()> {
        QualityCache::start_revalidation_loop(
            Arc::clone(&self.cache),
            Arc::clone(&self.validator),
            self.cache_config.revalidate_interval(),
            self.cache_config.revalidate_sample,
        )
    }

    /// User feedback that a cached translation was wrong: drop the entry so
    /// the next request regenerates it.
    pub fn report_feedback(&self, source_text: &str, source_lang: Lang, target_lang: Lang) -> bool {
        let key = QualityCache::compute_key(
            source_lang,
            target_lang,
            self.cleaner.library().version(),
            source_text,
        );
        self.cache.invalidate(&key)
    }

    /// Translate with an internally managed cancellation token.
    pub async fn translate(&self, request: TranslateRequest) -> Translation {
        let cancel = CancellationToken::new();
        self.translate_with_cancel(request, &cancel).await
    }

    /// Full pipeline run. Always resolves to a displayable string: accepted
    /// clean text, a cached result, the unchanged input (same-language), or
    /// the deterministic fallback. Never an error.
    pub async fn translate_with_cancel(
        &self,
        request: TranslateRequest,
        cancel: &CancellationToken,
    ) -> Translation {
        let request_id = uuid::Uuid::new_v4().to_string();
        let total = self.metrics.span(metric_names::TRANSLATE_TOTAL);
        let mut tracker = PhaseTracker::new(&request_id);

        let source_lang = request
            .source_lang
            .or_else(|| Lang::detect(&request.source_text));

        // Same-language requests need no oracle: return the input unchanged.
        if source_lang == Some(request.target_lang) {
            tracker.advance(RequestPhase::Accepted);
            info!(request_id = %request_id, lang = %request.target_lang, "identity request");
            total.finish();
            return Translation {
                request_id,
                text: request.source_text,
                was_translated: false,
                purity_score: 1.0,
                origin: Origin::Identity,
            };
        }
        // Undetectable source: with a bilingual pair, assume the opposite
        // of the target.
        let source_lang = source_lang.unwrap_or_else(|| match request.target_lang {
            Lang::Arabic => Lang::French,
            Lang::French => Lang::Arabic,
        });

        let key = QualityCache::compute_key(
            source_lang,
            request.target_lang,
            self.cleaner.library().version(),
            &request.source_text,
        );

        let lookup = self.metrics.span(metric_names::CACHE_LOOKUP);
        let hit = self.cache.get(&key);
        lookup.finish();
        if let Some(hit) = hit {
            tracker.advance(RequestPhase::Accepted);
            info!(request_id = %request_id, "cache hit");
            total.finish();
            return Translation {
                request_id,
                text: hit.cleaned_text,
                was_translated: true,
                purity_score: hit.purity_score,
                origin: Origin::Cache,
            };
        }

        // At most one oracle call in flight per key; waiters re-check the
        // cache once the winner finishes.
        let _inflight = self.coalescer.acquire(key).await;
        if let Some(hit) = self.cache.get(&key) {
            tracker.advance(RequestPhase::Accepted);
            info!(request_id = %request_id, "cache hit after coalesced wait");
            total.finish();
            return Translation {
                request_id,
                text: hit.cleaned_text,
                was_translated: true,
                purity_score: hit.purity_score,
                origin: Origin::Cache,
            };
        }

        let attempts = self.retry_budget + 1;
        let mut reinforced = false;
        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                warn!(request_id = %request_id, attempt, "request cancelled");
                break;
            }
            tracker.advance(RequestPhase::OracleCalled);
            let oracle_request = OracleRequest {
                source_text: request.source_text.clone(),
                source_lang,
                target_lang: request.target_lang,
                reinforced,
            };
            let span = self.metrics.span(metric_names::ORACLE_CALL);
            let outcome = tokio::time::timeout(
                self.oracle_timeout,
                self.oracle.translate(&oracle_request, cancel),
            )
            .await
            .unwrap_or(Err(OracleError::Timeout));
            span.finish();

            let raw = match outcome {
                Ok(text) => text,
                Err(OracleError::Cancelled) => {
                    warn!(request_id = %request_id, attempt, "oracle call cancelled");
                    break;
                }
                Err(e) => {
                    warn!(request_id = %request_id, attempt, error = %e, "oracle call failed");
                    if attempt + 1 < attempts {
                        tracker.advance(RequestPhase::Retry);
                        reinforced = true;
                        continue;
                    }
                    break;
                }
            };

            let clean_span = self.metrics.span(metric_names::CLEAN);
            let cleaned = self.cleaner.clean(&raw, request.target_lang);
            clean_span.finish();
            tracker.advance(RequestPhase::Cleaned);

            let validate_span = self.metrics.span(metric_names::VALIDATE);
            let report = self
                .validator
                .validate(&cleaned.cleaned_text, request.target_lang);
            validate_span.finish();
            tracker.advance(RequestPhase::Validated);

            if report.passed {
                tracker.advance(RequestPhase::Accepted);
                self.cache
                    .put(key, cleaned.cleaned_text.clone(), &report, cleaned.confidence);
                info!(
                    request_id = %request_id,
                    attempt,
                    purity = report.purity,
                    confidence = cleaned.confidence,
                    "translation accepted"
                );
                total.finish();
                return Translation {
                    request_id,
                    text: cleaned.cleaned_text,
                    was_translated: true,
                    purity_score: report.purity,
                    origin: Origin::Oracle,
                };
            }

            // Logged for later pattern-library improvement.
            let pattern_ids: Vec<&str> = cleaned
                .actions_applied
                .iter()
                .map(|a| a.pattern_id.as_str())
                .collect();
            warn!(
                request_id = %request_id,
                attempt,
                reason = ?report.reason,
                purity = report.purity,
                ratios = ?report.script_ratios,
                patterns = ?pattern_ids,
                "validation failed"
            );

            if attempt + 1 < attempts && !cancel.is_cancelled() {
                tracker.advance(RequestPhase::Retry);
                reinforced = true;
            } else {
                break;
            }
        }

        tracker.advance(RequestPhase::Fallback);
        let text = self.fallbacks.select(&request.source_text, request.target_lang);
        info!(request_id = %request_id, target = %request.target_lang, "fallback returned");
        total.finish();
        Translation {
            request_id,
            text: text.to_string(),
            was_translated: false,
            purity_score: 1.0,
            origin: Origin::Fallback,
        }
    }
}
