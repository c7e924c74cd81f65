//! Translation orchestration layer.
//! Shared request/result types; the oracle client, quality cache, fallback
//! catalog, and orchestration service live in the submodules.

pub mod cache;
pub mod fallback;
pub mod oracle;
pub mod service;

use serde::{Deserialize, Serialize};

use crate::script::Lang;

/// Translation request from the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub source_text: String,
    /// Detected from the text when absent.
    pub source_lang: Option<Lang>,
    pub target_lang: Lang,
}

impl TranslateRequest {
    pub fn new(source_text: impl Into<String>, source_lang: Lang, target_lang: Lang) -> Self {
        Self {
            source_text: source_text.into(),
            source_lang: Some(source_lang),
            target_lang,
        }
    }

    /// Request with source-language detection left to the service.
    pub fn detect_source(source_text: impl Into<String>, target_lang: Lang) -> Self {
        Self {
            source_text: source_text.into(),
            source_lang: None,
            target_lang,
        }
    }
}

/// Where a returned translation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    Oracle,
    Cache,
    Identity,
    Fallback,
}

/// Translation result handed back to the UI layer. Always a displayable
/// string in the target language; never an error object.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub request_id: String,
    pub text: String,
    pub was_translated: bool,
    /// Dominant-script share of the returned text.
    pub purity_score: f32,
    pub origin: Origin,
}
