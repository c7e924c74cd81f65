//! Content cleaning pipeline.
//! Applies the contamination pattern library plus script-boundary heuristics
//! to generated text, as an ordered sequence of passes: known signatures,
//! Cyrillic runs, English fragments (Arabic targets), script interleaving,
//! whitespace normalization. Removed spans and applied actions are reported
//! against the original input offsets.

pub mod offsets;
pub mod patterns;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::InterleavePolicy;
use crate::script::{
    classify, dominant_letter_script, kind_of, script_counts, Lang, ScriptKind, TextSpan,
};

use self::offsets::TrackedText;
use self::patterns::{PatternAction, PatternLibrary, ENGLISH_FRAGMENT_RE};

pub const INVALID_ENCODING_ID: &str = "invalid-encoding";
pub const CYRILLIC_RUN_ID: &str = "cyrillic-run";
pub const ENGLISH_FRAGMENT_ID: &str = "english-fragment";
pub const SCRIPT_INTERLEAVE_ID: &str = "script-interleave";
pub const WHITESPACE_NORMALIZE_ID: &str = "whitespace-normalize";

static WS_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{A0}]{2,}").expect("whitespace run regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\n[ \t]*){3,}").expect("blank lines regex"));
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+[,.;:!?،؛؟)\]]").expect("space before punct regex"));

/// One pattern application, with the match span in original offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedAction {
    pub pattern_id: String,
    pub start: usize,
    pub end: usize,
}

/// Outcome of a cleaning invocation. Read-only once returned.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningResult {
    pub original_text: String,
    pub cleaned_text: String,
    /// Deleted text, located in the original input.
    pub removed_spans: Vec<TextSpan>,
    pub actions_applied: Vec<AppliedAction>,
    /// Heuristic 0..1 estimate, stepped down by the fraction of the input
    /// that had to be removed. Not a statistical guarantee.
    pub confidence: f32,
}

/// Applies the pattern library and script heuristics to a string.
pub struct ContentCleaner {
    library: PatternLibrary,
    policy: InterleavePolicy,
}

struct CleanRun {
    work: TrackedText,
    removed: Vec<TextSpan>,
    actions: Vec<AppliedAction>,
    removed_non_ws: usize,
}

impl CleanRun {
    fn new(text: &str) -> Self {
        Self {
            work: TrackedText::new(text),
            removed: Vec::new(),
            actions: Vec::new(),
            removed_non_ws: 0,
        }
    }

    /// Remove a current-text byte range, recording the removed span and the
    /// applied action against original offsets.
    fn remove_range(&mut self, range: std::ops::Range<usize>, pattern_id: &str) {
        let content = self.work.text()[range.clone()].to_string();
        let (start, end) = self.work.original_range(range.clone());
        self.removed_non_ws += content.chars().filter(|c| !c.is_whitespace()).count();
        self.removed.push(TextSpan {
            start,
            end,
            kind: span_kind(&content),
            content,
        });
        self.actions.push(AppliedAction {
            pattern_id: pattern_id.to_string(),
            start,
            end,
        });
        self.work.remove(range);
    }

    fn record_action(&mut self, range: std::ops::Range<usize>, pattern_id: &str) {
        let (start, end) = self.work.original_range(range);
        self.actions.push(AppliedAction {
            pattern_id: pattern_id.to_string(),
            start,
            end,
        });
    }
}

impl ContentCleaner {
    pub fn new(library: PatternLibrary, policy: InterleavePolicy) -> Self {
        Self { library, policy }
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Run the full pass pipeline. Never fails for valid UTF-8 input; lossy
    /// decoding artifacts (U+FFFD) are dropped and recorded as removed.
    pub fn clean(&self, text: &str, target: Lang) -> CleaningResult {
        let mut run = CleanRun::new(text);
        let original_non_ws = script_counts(text).non_ws;

        self.pass_invalid_encoding(&mut run);
        self.pass_signatures(&mut run);
        self.pass_cyrillic_runs(&mut run);
        if target == Lang::Arabic {
            self.pass_english_fragments(&mut run);
        }
        self.pass_script_interleave(&mut run);
        self.pass_normalize_whitespace(&mut run, text.len());

        let confidence = confidence_for(run.removed_non_ws, original_non_ws);
        if !run.removed.is_empty() {
            debug!(
                removed_spans = run.removed.len(),
                actions = run.actions.len(),
                confidence,
                "cleaning removed content"
            );
        }
        CleaningResult {
            original_text: text.to_string(),
            cleaned_text: run.work.into_text(),
            removed_spans: run.removed,
            actions_applied: run.actions,
            confidence,
        }
    }

    /// Pass 0: drop U+FFFD replacement characters left by lossy decoding of
    /// malformed oracle bytes.
    fn pass_invalid_encoding(&self, run: &mut CleanRun) {
        let matches: Vec<std::ops::Range<usize>> = run
            .work
            .text()
            .char_indices()
            .filter(|(_, c)| *c == '\u{FFFD}')
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
        for range in matches.into_iter().rev() {
            run.remove_range(range, INVALID_ENCODING_ID);
        }
    }

    /// Pass 1: known contamination signatures, in library order.
    fn pass_signatures(&self, run: &mut CleanRun) {
        for pattern in self.library.patterns() {
            let matches = pattern.find_all(run.work.text());
            if matches.is_empty() {
                continue;
            }
            debug!(pattern = %pattern.id, hits = matches.len(), "signature pass hit");
            for range in matches.into_iter().rev() {
                match &pattern.action {
                    PatternAction::Remove => run.remove_range(range, &pattern.id),
                    PatternAction::Replace(replacement) => {
                        let replacement = replacement.clone();
                        run.remove_range(range.clone(), &pattern.id);
                        run.work.insert(range.start, &replacement);
                    }
                    PatternAction::Separate => {
                        run.record_action(range.clone(), &pattern.id);
                        separate(&mut run.work, range);
                    }
                }
            }
        }
    }

    /// Pass 2: Cyrillic runs inside Arabic/Latin-majority text are removed
    /// entirely. Cyrillic is never a valid output script for this system.
    fn pass_cyrillic_runs(&self, run: &mut CleanRun) {
        let majority = dominant_letter_script(run.work.text());
        if !matches!(majority, Some(ScriptKind::Arabic) | Some(ScriptKind::Latin)) {
            return;
        }
        let cyrillic: Vec<std::ops::Range<usize>> = classify(run.work.text())
            .into_iter()
            .filter(|span| span.kind == ScriptKind::Cyrillic)
            .map(|span| span.start..span.end)
            .collect();
        for range in cyrillic.into_iter().rev() {
            run.remove_range(range, CYRILLIC_RUN_ID);
        }
    }

    /// Pass 3: prompt-template English leaking next to Arabic text.
    fn pass_english_fragments(&self, run: &mut CleanRun) {
        let matches: Vec<std::ops::Range<usize>> = ENGLISH_FRAGMENT_RE
            .find_iter(run.work.text())
            .map(|m| m.range())
            .filter(|r| arabic_adjacent(run.work.text(), r.clone()))
            .collect();
        for range in matches.into_iter().rev() {
            run.remove_range(range, ENGLISH_FRAGMENT_ID);
        }
    }

    /// Pass 4: alternating letter-script runs glued with no whitespace, the
    /// signature of concatenated UI strings. DropMinority removes runs whose
    /// script is not the text's dominant one; InsertSeparator keeps them and
    /// adds a space at each boundary.
    fn pass_script_interleave(&self, run: &mut CleanRun) {
        let spans = classify(run.work.text());
        match self.policy {
            InterleavePolicy::DropMinority => {
                let Some(dominant) = dominant_letter_script(run.work.text()) else {
                    return;
                };
                let doomed: Vec<std::ops::Range<usize>> = spans
                    .iter()
                    .enumerate()
                    .filter(|(i, span)| {
                        span.kind.is_letter_script()
                            && span.kind != dominant
                            && glued_to_foreign_letters(&spans, *i)
                    })
                    .map(|(_, span)| span.start..span.end)
                    .collect();
                for range in doomed.into_iter().rev() {
                    run.remove_range(range, SCRIPT_INTERLEAVE_ID);
                }
            }
            InterleavePolicy::InsertSeparator => {
                let boundaries: Vec<usize> = spans
                    .windows(2)
                    .filter(|pair| {
                        pair[0].end == pair[1].start
                            && pair[0].kind.is_letter_script()
                            && pair[1].kind.is_letter_script()
                            && pair[0].kind != pair[1].kind
                    })
                    .map(|pair| pair[1].start)
                    .collect();
                for at in boundaries.into_iter().rev() {
                    run.record_action(at..at, SCRIPT_INTERLEAVE_ID);
                    run.work.insert(at, " ");
                }
            }
        }
    }

    /// Pass 5: collapse repeated whitespace, cap blank lines, strip spaces
    /// before closing punctuation, trim.
    fn pass_normalize_whitespace(&self, run: &mut CleanRun, original_len: usize) {
        let before = run.work.text().to_string();

        let runs: Vec<std::ops::Range<usize>> = WS_RUN_RE
            .find_iter(run.work.text())
            .map(|m| m.range())
            .collect();
        for range in runs.into_iter().rev() {
            run.work.replace(range, " ");
        }

        let blanks: Vec<std::ops::Range<usize>> = BLANK_LINES_RE
            .find_iter(run.work.text())
            .map(|m| m.range())
            .collect();
        for range in blanks.into_iter().rev() {
            run.work.replace(range, "\n\n");
        }

        let hanging: Vec<std::ops::Range<usize>> = SPACE_BEFORE_PUNCT_RE
            .find_iter(run.work.text())
            .map(|m| {
                let punct_len = run.work.text()[m.range()]
                    .chars()
                    .next_back()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                m.start()..m.end() - punct_len
            })
            .collect();
        for range in hanging.into_iter().rev() {
            run.work.remove(range);
        }

        let leading = run.work.len() - run.work.text().trim_start().len();
        if leading > 0 {
            run.work.remove(0..leading);
        }
        let trimmed = run.work.text().trim_end().len();
        if trimmed < run.work.len() {
            run.work.remove(trimmed..run.work.len());
        }

        if run.work.text() != before {
            run.actions.push(AppliedAction {
                pattern_id: WHITESPACE_NORMALIZE_ID.to_string(),
                start: 0,
                end: original_len,
            });
        }
    }
}

fn confidence_for(removed_non_ws: usize, original_non_ws: usize) -> f32 {
    if removed_non_ws == 0 || original_non_ws == 0 {
        return 1.0;
    }
    let fraction = removed_non_ws as f32 / original_non_ws as f32;
    if fraction <= 0.2 {
        0.95
    } else if fraction <= 0.5 {
        0.8
    } else {
        0.6
    }
}

/// Script bucket for a removed slice: its dominant letter script, else the
/// bucket of its first non-whitespace codepoint.
fn span_kind(content: &str) -> ScriptKind {
    dominant_letter_script(content).unwrap_or_else(|| {
        content
            .chars()
            .find(|c| !c.is_whitespace())
            .map(kind_of)
            .unwrap_or(ScriptKind::Punctuation)
    })
}

/// Whether the nearest non-whitespace neighbor on either side of the range
/// is Arabic script.
fn arabic_adjacent(text: &str, range: std::ops::Range<usize>) -> bool {
    let before = text[..range.start]
        .chars()
        .rev()
        .find(|c| !c.is_whitespace());
    let after = text[range.end..].chars().find(|c| !c.is_whitespace());
    before.map(kind_of) == Some(ScriptKind::Arabic)
        || after.map(kind_of) == Some(ScriptKind::Arabic)
}

/// Whether span `i` touches a differing letter-script span with no
/// separator between them.
fn glued_to_foreign_letters(spans: &[TextSpan], i: usize) -> bool {
    let span = &spans[i];
    let glued_prev = i > 0 && {
        let prev = &spans[i - 1];
        prev.end == span.start && prev.kind.is_letter_script() && prev.kind != span.kind
    };
    let glued_next = i + 1 < spans.len() && {
        let next = &spans[i + 1];
        span.end == next.start && next.kind.is_letter_script() && next.kind != span.kind
    };
    glued_prev || glued_next
}

/// Force whitespace separation around a kept match.
fn separate(work: &mut TrackedText, range: std::ops::Range<usize>) {
    let needs_after = work.text()[range.end..]
        .chars()
        .next()
        .is_some_and(|c| !c.is_whitespace());
    if needs_after {
        work.insert(range.end, " ");
    }
    let needs_before = work.text()[..range.start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    if needs_before {
        work.insert(range.start, " ");
    }
}
