//! Script classification over Unicode codepoints.
//! Buckets each codepoint into a script kind via Unicode block membership,
//! merges adjacent same-script codepoints into spans, and computes the
//! per-script ratios the purity validator works from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Script bucket assigned to each codepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptKind {
    Arabic,
    Latin,
    Cyrillic,
    Digit,
    Punctuation,
    Other,
}

impl ScriptKind {
    /// Letter scripts are the ones that carry language identity.
    /// Digits and punctuation are script-neutral.
    #[inline]
    pub fn is_letter_script(self) -> bool {
        matches!(
            self,
            ScriptKind::Arabic | ScriptKind::Latin | ScriptKind::Cyrillic | ScriptKind::Other
        )
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptKind::Arabic => write!(f, "arabic"),
            ScriptKind::Latin => write!(f, "latin"),
            ScriptKind::Cyrillic => write!(f, "cyrillic"),
            ScriptKind::Digit => write!(f, "digit"),
            ScriptKind::Punctuation => write!(f, "punctuation"),
            ScriptKind::Other => write!(f, "other"),
        }
    }
}

/// A maximal run of same-script codepoints.
/// Offsets are byte positions into the string the span was classified from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub content: String,
    pub kind: ScriptKind,
}

/// Supported output languages of the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lang {
    French,
    Arabic,
}

impl Lang {
    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Lang::French => "fr",
            Lang::Arabic => "ar",
        }
    }

    pub fn from_code(code: &str) -> Option<Lang> {
        match code.trim().to_ascii_lowercase().as_str() {
            "fr" => Some(Lang::French),
            "ar" => Some(Lang::Arabic),
            _ => None,
        }
    }

    /// The letter script this language is written in.
    pub fn script(self) -> ScriptKind {
        match self {
            Lang::French => ScriptKind::Latin,
            Lang::Arabic => ScriptKind::Arabic,
        }
    }

    /// The opposing letter script of the bilingual pair.
    pub fn foreign_script(self) -> ScriptKind {
        match self {
            Lang::French => ScriptKind::Arabic,
            Lang::Arabic => ScriptKind::Latin,
        }
    }

    /// Detects the language of `text`: whatlang first, and when its trigram
    /// verdict is unreliable or outside the pair, the dominant letter script
    /// settles it, since the two supported languages are script-disjoint.
    pub fn detect(text: &str) -> Option<Lang> {
        if let Some(info) = whatlang::detect(text) {
            if info.is_reliable() {
                match info.lang() {
                    whatlang::Lang::Fra => return Some(Lang::French),
                    whatlang::Lang::Ara => return Some(Lang::Arabic),
                    _ => {}
                }
            }
        }
        match dominant_letter_script(text) {
            Some(ScriptKind::Arabic) => Some(Lang::Arabic),
            Some(ScriptKind::Latin) => Some(Lang::French),
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Classify a codepoint into its script bucket.
pub fn kind_of(c: char) -> ScriptKind {
    if c.is_whitespace() {
        return ScriptKind::Punctuation;
    }
    let u = c as u32;
    if c.is_ascii_digit() || (0x0660..=0x0669).contains(&u) || (0x06F0..=0x06F9).contains(&u) {
        return ScriptKind::Digit;
    }
    if is_arabic(u) {
        return ScriptKind::Arabic;
    }
    if is_latin(c, u) {
        return ScriptKind::Latin;
    }
    if is_cyrillic(u) {
        return ScriptKind::Cyrillic;
    }
    if is_punctuation(c, u) {
        return ScriptKind::Punctuation;
    }
    ScriptKind::Other
}

fn is_arabic(u: u32) -> bool {
    // Arabic punctuation inside the block is handled by is_punctuation;
    // the comma/semicolon/question mark are checked before letters below.
    if matches!(u, 0x060C | 0x061B | 0x061F) || (0x066A..=0x066D).contains(&u) {
        return false;
    }
    (0x0600..=0x06FF).contains(&u)
        || (0x0750..=0x077F).contains(&u)
        || (0x08A0..=0x08FF).contains(&u)
        || (0xFB50..=0xFDFF).contains(&u)
        || (0xFE70..=0xFEFF).contains(&u)
}

fn is_latin(c: char, u: u32) -> bool {
    c.is_ascii_alphabetic()
        || ((0x00C0..=0x00FF).contains(&u) && u != 0x00D7 && u != 0x00F7)
        || (0x0100..=0x024F).contains(&u)
}

fn is_cyrillic(u: u32) -> bool {
    (0x0400..=0x04FF).contains(&u) || (0x0500..=0x052F).contains(&u)
}

fn is_punctuation(c: char, u: u32) -> bool {
    c.is_ascii_punctuation()
        || matches!(u, 0x060C | 0x061B | 0x061F | 0x00AB | 0x00BB)
        || (0x066A..=0x066D).contains(&u)
        || (0x2000..=0x206F).contains(&u)
}

/// Walk the string once and merge adjacent same-script codepoints into spans.
/// Empty input yields an empty list.
pub fn classify(text: &str) -> Vec<TextSpan> {
    let mut spans: Vec<TextSpan> = Vec::new();
    for (idx, c) in text.char_indices() {
        let kind = kind_of(c);
        match spans.last_mut() {
            Some(span) if span.kind == kind && span.end == idx => {
                span.content.push(c);
                span.end = idx + c.len_utf8();
            }
            _ => spans.push(TextSpan {
                start: idx,
                end: idx + c.len_utf8(),
                content: c.to_string(),
                kind,
            }),
        }
    }
    spans
}

/// Per-script codepoint counts over a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCounts {
    pub arabic: usize,
    pub latin: usize,
    pub cyrillic: usize,
    pub digit: usize,
    pub punctuation: usize,
    pub other: usize,
    /// Total non-whitespace codepoints (the ratio denominator).
    pub non_ws: usize,
}

impl ScriptCounts {
    pub fn count(&self, kind: ScriptKind) -> usize {
        match kind {
            ScriptKind::Arabic => self.arabic,
            ScriptKind::Latin => self.latin,
            ScriptKind::Cyrillic => self.cyrillic,
            ScriptKind::Digit => self.digit,
            ScriptKind::Punctuation => self.punctuation,
            ScriptKind::Other => self.other,
        }
    }

    /// Codepoints belonging to letter scripts (digits/punctuation excluded).
    pub fn letters(&self) -> usize {
        self.arabic + self.latin + self.cyrillic + self.other
    }
}

pub fn script_counts(text: &str) -> ScriptCounts {
    let mut counts = ScriptCounts::default();
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        counts.non_ws += 1;
        match kind_of(c) {
            ScriptKind::Arabic => counts.arabic += 1,
            ScriptKind::Latin => counts.latin += 1,
            ScriptKind::Cyrillic => counts.cyrillic += 1,
            ScriptKind::Digit => counts.digit += 1,
            ScriptKind::Punctuation => counts.punctuation += 1,
            ScriptKind::Other => counts.other += 1,
        }
    }
    counts
}

/// Per-script ratios: codepoints of the kind over total non-whitespace
/// codepoints. Empty or whitespace-only input yields all-zero ratios; the
/// caller must treat that as a cannot-validate case.
pub fn ratios(text: &str) -> HashMap<ScriptKind, f32> {
    let counts = script_counts(text);
    let kinds = [
        ScriptKind::Arabic,
        ScriptKind::Latin,
        ScriptKind::Cyrillic,
        ScriptKind::Digit,
        ScriptKind::Punctuation,
        ScriptKind::Other,
    ];
    let mut out = HashMap::with_capacity(kinds.len());
    for kind in kinds {
        let ratio = if counts.non_ws == 0 {
            0.0
        } else {
            counts.count(kind) as f32 / counts.non_ws as f32
        };
        out.insert(kind, ratio);
    }
    out
}

/// The majority letter script of the text, if any letters are present.
/// Ties resolve in Arabic → Latin → Cyrillic order.
pub fn dominant_letter_script(text: &str) -> Option<ScriptKind> {
    let counts = script_counts(text);
    // max_by_key keeps the last maximum, so list in reverse preference order.
    let candidates = [
        (ScriptKind::Cyrillic, counts.cyrillic),
        (ScriptKind::Latin, counts.latin),
        (ScriptKind::Arabic, counts.arabic),
    ];
    candidates
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(kind, _)| kind)
}
