//! Contamination pattern library.
//! An ordered, versioned list of known contamination signatures (UI labels,
//! version tags, placeholder markers, template leaks) with typed actions.
//! Loaded once at startup; immutable during a cleaning run. The library
//! version participates in cache keys so pattern upgrades invalidate stale
//! entries.

use std::ops::Range;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// What to do with a matched contamination signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternAction {
    Remove,
    Replace(String),
    /// Keep the match but force whitespace separation around it.
    Separate,
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern(Regex),
}

/// A single contamination signature with its action.
#[derive(Debug, Clone)]
pub struct ContaminationPattern {
    pub id: String,
    matcher: Matcher,
    pub action: PatternAction,
}

impl ContaminationPattern {
    fn literal(id: &str, lit: &str, action: PatternAction) -> Self {
        Self {
            id: id.to_string(),
            matcher: Matcher::Literal(lit.to_string()),
            action,
        }
    }

    fn regex(id: &str, pattern: &str, action: PatternAction) -> Self {
        Self {
            id: id.to_string(),
            matcher: Matcher::Pattern(
                Regex::new(pattern).expect("built-in contamination pattern must compile"),
            ),
            action,
        }
    }

    /// All match ranges in `text`, in order.
    pub fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        match &self.matcher {
            Matcher::Literal(lit) => text
                .match_indices(lit.as_str())
                .map(|(start, m)| start..start + m.len())
                .collect(),
            Matcher::Pattern(re) => re.find_iter(text).map(|m| m.range()).collect(),
        }
    }
}

/// Common English function words and labels that leak from prompt templates
/// into Arabic output. Matched word-bounded, case-sensitive (the leaks are
/// capitalized template tokens, and lowercase "article" is ordinary French).
pub const ENGLISH_FRAGMENTS: [&str; 10] = [
    "Defined",
    "Law",
    "Article",
    "Section",
    "Generated",
    "Translation",
    "Response",
    "Output",
    "Template",
    "Placeholder",
];

pub static ENGLISH_FRAGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = ENGLISH_FRAGMENTS.join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("english fragment regex")
});

/// On-disk pattern file format.
#[derive(Debug, Deserialize)]
struct PatternFile {
    version: u32,
    patterns: Vec<PatternSpec>,
}

#[derive(Debug, Deserialize)]
struct PatternSpec {
    id: String,
    #[serde(default)]
    literal: Option<String>,
    #[serde(default)]
    regex: Option<String>,
    action: ActionSpec,
    #[serde(default)]
    replacement: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionSpec {
    Remove,
    Replace,
    Separate,
}

#[derive(Debug)]
pub enum PatternError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Compile { id: String, error: regex::Error },
    Invalid { id: String, reason: &'static str },
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Io(e) => write!(f, "pattern file IO error: {e}"),
            PatternError::Parse(e) => write!(f, "pattern file parse error: {e}"),
            PatternError::Compile { id, error } => {
                write!(f, "pattern {id} failed to compile: {error}")
            }
            PatternError::Invalid { id, reason } => write!(f, "pattern {id} invalid: {reason}"),
        }
    }
}

impl From<std::io::Error> for PatternError {
    fn from(e: std::io::Error) -> Self {
        PatternError::Io(e)
    }
}

impl From<serde_json::Error> for PatternError {
    fn from(e: serde_json::Error) -> Self {
        PatternError::Parse(e)
    }
}

/// The ordered signature set applied by the cleaner's first pass.
pub struct PatternLibrary {
    version: u32,
    patterns: Vec<ContaminationPattern>,
}

impl PatternLibrary {
    /// Built-in signatures observed in generated legal documents, broadest
    /// first so the generic passes never see a fragmented signature.
    pub fn builtin() -> Self {
        let patterns = vec![
            ContaminationPattern::regex(
                "auto-translate-marker",
                r"(?i)AUTO[-_]TRANSLATE",
                PatternAction::Remove,
            ),
            ContaminationPattern::literal(
                "object-object",
                "[object Object]",
                PatternAction::Remove,
            ),
            // No word boundary: version tags arrive glued to the adjacent
            // script run ("...ملفاتV2").
            ContaminationPattern::regex("version-marker", r"V\d+", PatternAction::Remove),
            ContaminationPattern::regex("standalone-pro", r"\bPro\b", PatternAction::Remove),
            ContaminationPattern::regex("undefined-token", r"\bundefined\b", PatternAction::Remove),
            ContaminationPattern::regex("null-token", r"\bnull\b", PatternAction::Remove),
            ContaminationPattern::regex("nan-token", r"\bNaN\b", PatternAction::Remove),
        ];
        Self {
            version: 1,
            patterns,
        }
    }

    /// Load additional signatures from a JSON file and append them after the
    /// built-in set. The file's version becomes the library version.
    pub fn load_from_file(path: &Path) -> Result<Self, PatternError> {
        let content = std::fs::read_to_string(path)?;
        let file: PatternFile = serde_json::from_str(&content)?;

        let mut library = Self::builtin();
        library.version = file.version;
        for spec in file.patterns {
            library.patterns.push(compile_spec(spec)?);
        }
        Ok(library)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn patterns(&self) -> &[ContaminationPattern] {
        &self.patterns
    }
}

fn compile_spec(spec: PatternSpec) -> Result<ContaminationPattern, PatternError> {
    let action = match spec.action {
        ActionSpec::Remove => PatternAction::Remove,
        ActionSpec::Separate => PatternAction::Separate,
        ActionSpec::Replace => match spec.replacement {
            Some(replacement) => PatternAction::Replace(replacement),
            None => {
                return Err(PatternError::Invalid {
                    id: spec.id,
                    reason: "replace action requires a replacement",
                })
            }
        },
    };
    let matcher = match (spec.literal, spec.regex) {
        (Some(lit), None) => Matcher::Literal(lit),
        (None, Some(pattern)) => match Regex::new(&pattern) {
            Ok(re) => Matcher::Pattern(re),
            Err(error) => return Err(PatternError::Compile { id: spec.id, error }),
        },
        _ => {
            return Err(PatternError::Invalid {
                id: spec.id,
                reason: "exactly one of literal or regex is required",
            })
        }
    };
    Ok(ContaminationPattern {
        id: spec.id,
        matcher,
        action,
    })
}
