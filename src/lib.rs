//! Saffi: mixed-script cleanup and purity validation for bilingual
//! (French/Arabic) legal-document generation.
//! The UI layer hands in generated or translated text; the pipeline strips
//! mixed-script contamination, validates target-language purity, and
//! resolves every request to a displayable string: accepted clean text or
//! a deterministic fallback, never mixed-language garbage or a raw error.

pub mod clean;
pub mod config;
pub mod metrics;
pub mod script;
pub mod translate;
pub mod validate;

pub use clean::patterns::{ContaminationPattern, PatternAction, PatternError, PatternLibrary};
pub use clean::{AppliedAction, CleaningResult, ContentCleaner};
pub use config::{ConfigError, InterleavePolicy, PipelineConfig, PurityConfig};
pub use script::{classify, ratios, Lang, ScriptKind, TextSpan};
pub use translate::cache::QualityCache;
pub use translate::oracle::{HttpOracle, OracleError, OracleRequest, TranslationOracle};
pub use translate::service::{RequestPhase, TranslationService};
pub use translate::{Origin, TranslateRequest, Translation};
pub use validate::{PurityFailure, PurityReport, PurityValidator};

/// Initialize tracing for embedding applications. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saffi=debug".parse().expect("default env filter")),
        )
        .with_target(true)
        .try_init();
}
