//! Target-language purity validation.
//! Decides whether cleaned text is monoscript enough to show to the user.
//! Pure and stateless: the same input always yields the same report.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::PurityConfig;
use crate::script::{ratios, script_counts, Lang, ScriptKind};

/// Why validation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PurityFailure {
    /// Too short to validate meaningfully.
    InsufficientContent,
    /// Dominant-script share under the configured threshold.
    BelowThreshold,
    /// Foreign letter share above the configured ceiling.
    ForeignAboveCeiling,
    /// Cyrillic present; never a valid output script.
    ForbiddenScript,
}

impl std::fmt::Display for PurityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurityFailure::InsufficientContent => write!(f, "insufficient content"),
            PurityFailure::BelowThreshold => write!(f, "dominant script below threshold"),
            PurityFailure::ForeignAboveCeiling => write!(f, "foreign script above ceiling"),
            PurityFailure::ForbiddenScript => write!(f, "forbidden script present"),
        }
    }
}

/// One validation verdict. Derived from cleaned text only.
#[derive(Debug, Clone, Serialize)]
pub struct PurityReport {
    pub target: Lang,
    /// Raw per-script ratios over non-whitespace codepoints.
    pub script_ratios: HashMap<ScriptKind, f32>,
    /// Dominant-script share over letter codepoints. Digits and punctuation
    /// are script-neutral and do not count against the target script.
    pub purity: f32,
    pub passed: bool,
    pub threshold: f32,
    pub reason: Option<PurityFailure>,
}

pub struct PurityValidator {
    config: PurityConfig,
}

impl PurityValidator {
    pub fn new(config: PurityConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, cleaned_text: &str, target: Lang) -> PurityReport {
        let counts = script_counts(cleaned_text);
        let script_ratios = ratios(cleaned_text);
        let threshold = self.config.threshold;

        let letters = counts.letters();
        let purity = if letters == 0 {
            0.0
        } else {
            counts.count(target.script()) as f32 / letters as f32
        };
        let foreign_share = if letters == 0 {
            0.0
        } else {
            counts.count(target.foreign_script()) as f32 / letters as f32
        };

        let reason = if counts.non_ws < self.config.min_viable_chars {
            Some(PurityFailure::InsufficientContent)
        } else if counts.cyrillic > 0 {
            Some(PurityFailure::ForbiddenScript)
        } else if purity < threshold {
            Some(PurityFailure::BelowThreshold)
        } else if foreign_share > self.config.foreign_ceiling {
            Some(PurityFailure::ForeignAboveCeiling)
        } else {
            None
        };

        PurityReport {
            target,
            script_ratios,
            purity,
            passed: reason.is_none(),
            threshold,
            reason,
        }
    }
}
