//! Oracle boundary: the external text-generation service.
//! Treated as a fallible, possibly slow, possibly nondeterministic black
//! box that returns a string. The HTTP client adds connection pooling,
//! a simple request-interval limiter, and transport-level retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::script::Lang;

/// One oracle invocation.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub source_text: String,
    pub source_lang: Lang,
    pub target_lang: Lang,
    /// Strengthen the monolingual-output instruction after a failed
    /// validation round.
    pub reinforced: bool,
}

#[derive(Debug)]
pub enum OracleError {
    Unavailable(String),
    Timeout,
    RateLimited { retry_after_ms: u64 },
    Cancelled,
    InvalidResponse(String),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Unavailable(msg) => write!(f, "oracle unavailable: {msg}"),
            OracleError::Timeout => write!(f, "oracle timeout"),
            OracleError::RateLimited { retry_after_ms } => {
                write!(f, "rate limited, retry after {retry_after_ms}ms")
            }
            OracleError::Cancelled => write!(f, "oracle call cancelled"),
            OracleError::InvalidResponse(msg) => write!(f, "invalid oracle response: {msg}"),
        }
    }
}

/// Adapter for translation backends. Implemented by the HTTP client in
/// production and by scripted mocks in tests.
pub trait TranslationOracle: Send + Sync {
    fn translate<'a>(
        &'a self,
        request: &'a OracleRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, OracleError>>;
}

/// Chat-completions translation client.
pub struct HttpOracle {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    /// Tracks the next allowed request time.
    next_allowed: Arc<tokio::sync::Mutex<Instant>>,
    /// Minimum interval between requests (100ms = 10 req/s).
    min_interval: Duration,
}

impl HttpOracle {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            next_allowed: Arc::new(tokio::sync::Mutex::new(Instant::now())),
            min_interval: Duration::from_millis(100),
        })
    }

    /// Create a client from environment variables. Reads `SAFFI_ORACLE_KEY`,
    /// with `SAFFI_ORACLE_URL` and `SAFFI_ORACLE_MODEL` optional.
    pub fn from_env(timeout: Duration) -> Result<Self, OracleError> {
        let api_key = std::env::var("SAFFI_ORACLE_KEY").map_err(|_| {
            OracleError::Unavailable("SAFFI_ORACLE_KEY environment variable not set".into())
        })?;
        let base_url =
            std::env::var("SAFFI_ORACLE_URL").unwrap_or_else(|_| "https://api.deepseek.com".into());
        let model =
            std::env::var("SAFFI_ORACLE_MODEL").unwrap_or_else(|_| "deepseek-chat".into());
        Self::new(api_key, base_url, model, timeout)
    }

    /// Wait until the request-interval limiter allows a request.
    async fn interval_wait(&self) {
        let mut next = self.next_allowed.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep(*next - now).await;
        }
        *next = Instant::now() + self.min_interval;
    }

    /// Send request with transport-level retry.
    /// 429: Retry-After or 1s/2s/4s (max 3).
    /// 5xx: exponential backoff (max 2).
    /// Timeout: immediate retry once.
    async fn send_with_retry(
        &self,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, OracleError> {
        let mut attempt: u32 = 0;
        let max_429_retries: u32 = 3;
        let max_5xx_retries: u32 = 2;
        let mut timeout_retried = false;

        loop {
            if cancel.is_cancelled() {
                return Err(OracleError::Cancelled);
            }
            let result = self
                .http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp);
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt >= max_429_retries {
                        return Err(OracleError::RateLimited { retry_after_ms: 0 });
                    }
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| Duration::from_secs(1 << attempt));
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "429 rate limited, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = cancel.cancelled() => return Err(OracleError::Cancelled),
                    }
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= max_5xx_retries {
                        return Err(OracleError::Unavailable(format!(
                            "server error: {}",
                            resp.status()
                        )));
                    }
                    let wait = Duration::from_millis(500 * (1 << attempt));
                    warn!(
                        attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = cancel.cancelled() => return Err(OracleError::Cancelled),
                    }
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(OracleError::Unavailable(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(OracleError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => {
                    return Err(OracleError::Unavailable(e.to_string()));
                }
            }
        }
    }
}

impl TranslationOracle for HttpOracle {
    fn translate<'a>(
        &'a self,
        request: &'a OracleRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, OracleError>> {
        Box::pin(async move {
            self.interval_wait().await;

            if cancel.is_cancelled() {
                return Err(OracleError::Cancelled);
            }

            let body = serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system_prompt(request)},
                    {"role": "user", "content": build_user_prompt(request)}
                ],
                "max_tokens": estimate_max_tokens(&request.source_text),
                "stream": false,
                "temperature": 0.1
            });

            let response = tokio::select! {
                r = self.send_with_retry(&body, cancel) => r?,
                _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            };

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();
            if content.trim().is_empty() {
                return Err(OracleError::InvalidResponse("empty completion".into()));
            }
            Ok(content)
        })
    }
}

// --- Prompt construction ---

fn lang_name(lang: Lang) -> &'static str {
    match lang {
        Lang::French => "French",
        Lang::Arabic => "Arabic",
    }
}

fn system_prompt(request: &OracleRequest) -> String {
    let target = lang_name(request.target_lang);
    let mut prompt = format!(
        "You are a legal translator. Translate into {target}. Output only the translation, nothing else."
    );
    if request.reinforced {
        prompt.push_str(&format!(
            " Respond strictly in {target}. Never include interface labels, version tags, placeholders, or words from any other language."
        ));
    }
    prompt
}

/// Compact user prompt: {"t":"text","from":"fr","to":"ar"}
fn build_user_prompt(request: &OracleRequest) -> String {
    format!(
        "{{\"t\":\"{}\",\"from\":\"{}\",\"to\":\"{}\"}}",
        escape_json_string(&request.source_text),
        request.source_lang.code(),
        request.target_lang.code()
    )
}

/// Estimate max_tokens: (input_tokens * 1.2 + 64), capped for document-sized
/// passages.
fn estimate_max_tokens(text: &str) -> u32 {
    let estimated_input_tokens = text.len() as f64 / 3.0;
    let max = (estimated_input_tokens * 1.2 + 64.0) as u32;
    max.clamp(64, 2048)
}

/// Escape a string for embedding inside a JSON string value.
fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
