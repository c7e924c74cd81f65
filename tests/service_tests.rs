use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use saffi::{
    Lang, Origin, OracleError, OracleRequest, PipelineConfig, TranslateRequest,
    TranslationOracle, TranslationService,
};

const PURE_ARABIC: &str = "يلتزم الطرفان بتنفيذ جميع الالتزامات التعاقدية المنصوص عليها في هذا العقد";

/// Oracle returning scripted responses in order; once exhausted, every call
/// fails as unavailable. Counts invocations.
struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Self::new(&[])
    }

    fn with_delay(responses: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranslationOracle for ScriptedOracle {
    fn translate<'a>(
        &'a self,
        _request: &'a OracleRequest,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, OracleError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match next {
                Some(text) => Ok(text),
                None => Err(OracleError::Unavailable("scripted oracle exhausted".into())),
            }
        })
    }
}

fn service(oracle: Arc<ScriptedOracle>) -> TranslationService {
    TranslationService::new(oracle, &PipelineConfig::default()).unwrap()
}

fn contains_cyrillic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0400}'..='\u{052F}').contains(&c))
}

#[tokio::test]
async fn same_language_request_returns_input_without_oracle_call() {
    let oracle = ScriptedOracle::new(&[PURE_ARABIC]);
    let service = service(oracle.clone());

    let result = service
        .translate(TranslateRequest::new("Bonjour", Lang::French, Lang::French))
        .await;

    assert_eq!(result.text, "Bonjour");
    assert_eq!(result.origin, Origin::Identity);
    assert!(!result.was_translated);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn detected_source_language_also_short_circuits() {
    let oracle = ScriptedOracle::failing();
    let service = service(oracle.clone());

    let text = "هذا نص عربي واضح تماما ومفهوم للجميع دون أي غموض";
    let result = service
        .translate(TranslateRequest::detect_source(text, Lang::Arabic))
        .await;

    assert_eq!(result.origin, Origin::Identity);
    assert_eq!(result.text, text);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn oracle_failure_exhausts_budget_then_falls_back() {
    let oracle = ScriptedOracle::failing();
    let service = service(oracle.clone());

    let result = service
        .translate(TranslateRequest::new("Bonjour", Lang::French, Lang::Arabic))
        .await;

    assert_eq!(result.origin, Origin::Fallback);
    assert!(!result.was_translated);
    assert!(!result.text.is_empty());
    // Fallback is authored in the target language.
    assert!(result.text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)));
    // One initial attempt plus the default retry budget of two.
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn contaminated_oracle_output_never_reaches_the_user() {
    // Every response mixes Cyrillic and UI tokens and is too short to pass
    // once cleaned.
    let contaminated = "الوثيقة غير متوفرة недоступен V2";
    let oracle = ScriptedOracle::new(&[contaminated, contaminated, contaminated]);
    let service = service(oracle.clone());

    let result = service
        .translate(TranslateRequest::new(
            "Le contrat est résilié de plein droit.",
            Lang::French,
            Lang::Arabic,
        ))
        .await;

    assert_eq!(result.origin, Origin::Fallback);
    assert_eq!(oracle.calls(), 3);
    assert!(!result.text.is_empty());
    assert!(!contains_cyrillic(&result.text));
    assert!(!result.text.contains("V2"));
    assert!(!result.text.contains("AUTO-TRANSLATE"));
    assert!(!result.text.contains("Pro"));
}

#[tokio::test]
async fn accepted_translation_is_cached_and_reused() {
    let oracle = ScriptedOracle::new(&[PURE_ARABIC]);
    let service = service(oracle.clone());
    let request = TranslateRequest::new(
        "Les deux parties s'engagent à exécuter le contrat.",
        Lang::French,
        Lang::Arabic,
    );

    let first = service.translate(request.clone()).await;
    assert_eq!(first.origin, Origin::Oracle);
    assert!(first.was_translated);
    assert_eq!(first.text, PURE_ARABIC);
    assert!(first.purity_score >= 0.95);

    let second = service.translate(request).await;
    assert_eq!(second.origin, Origin::Cache);
    assert!(second.was_translated);
    assert_eq!(second.text, first.text);
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn failed_validation_retries_with_reinforced_prompt_then_accepts() {
    // First response is French (fails Arabic purity), second is clean Arabic.
    let oracle = ScriptedOracle::new(&[
        "Bonjour, ceci est une réponse entièrement en français.",
        PURE_ARABIC,
    ]);
    let service = service(oracle.clone());

    let result = service
        .translate(TranslateRequest::new(
            "Les parties conviennent de ce qui suit.",
            Lang::French,
            Lang::Arabic,
        ))
        .await;

    assert_eq!(result.origin, Origin::Oracle);
    assert_eq!(result.text, PURE_ARABIC);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn feedback_invalidation_forces_regeneration() {
    let oracle = ScriptedOracle::new(&[PURE_ARABIC, PURE_ARABIC]);
    let service = service(oracle.clone());
    let source = "Les deux parties s'engagent à exécuter le contrat.";
    let request = TranslateRequest::new(source, Lang::French, Lang::Arabic);

    service.translate(request.clone()).await;
    assert_eq!(oracle.calls(), 1);

    assert!(service.report_feedback(source, Lang::French, Lang::Arabic));
    let again = service.translate(request).await;
    assert_eq!(again.origin, Origin::Oracle);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_share_one_oracle_call() {
    let oracle = ScriptedOracle::with_delay(&[PURE_ARABIC], Duration::from_millis(50));
    let service = Arc::new(service(oracle.clone()));
    let request = TranslateRequest::new(
        "Les deux parties s'engagent à exécuter le contrat.",
        Lang::French,
        Lang::Arabic,
    );

    let a = tokio::spawn({
        let service = Arc::clone(&service);
        let request = request.clone();
        async move { service.translate(request).await }
    });
    let b = tokio::spawn({
        let service = Arc::clone(&service);
        let request = request.clone();
        async move { service.translate(request).await }
    });

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(oracle.calls(), 1);
    assert_eq!(a.text, PURE_ARABIC);
    assert_eq!(b.text, PURE_ARABIC);
    assert!(matches!(a.origin, Origin::Oracle | Origin::Cache));
    assert!(matches!(b.origin, Origin::Oracle | Origin::Cache));
}

#[tokio::test]
async fn cancelled_request_resolves_to_fallback_without_retries() {
    let oracle = ScriptedOracle::new(&[PURE_ARABIC]);
    let service = service(oracle.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service
        .translate_with_cancel(
            TranslateRequest::new("Bonjour tout le monde", Lang::French, Lang::Arabic),
            &cancel,
        )
        .await;

    assert_eq!(result.origin, Origin::Fallback);
    assert_eq!(oracle.calls(), 0);
}

#[test]
fn http_oracle_builds_without_network() {
    let oracle = saffi::HttpOracle::new(
        "test-key".into(),
        "https://api.example.test".into(),
        "test-model".into(),
        Duration::from_secs(5),
    );
    assert!(oracle.is_ok());
}

#[tokio::test]
async fn metrics_record_pipeline_timings() {
    let oracle = ScriptedOracle::new(&[PURE_ARABIC]);
    let service = service(oracle.clone());

    service
        .translate(TranslateRequest::new(
            "Les parties conviennent de ce qui suit.",
            Lang::French,
            Lang::Arabic,
        ))
        .await;

    let metrics = service.metrics();
    assert_eq!(metrics.sample_count("t_oracle_call"), 1);
    assert_eq!(metrics.sample_count("t_clean"), 1);
    assert_eq!(metrics.sample_count("t_validate"), 1);
    assert_eq!(metrics.sample_count("t_translate_total"), 1);
}
