//! Deterministic fallback responses.
//! When the oracle is unavailable or retries are exhausted, the user is
//! shown a pre-authored paragraph in the target language, never the
//! contaminated text and never a raw error. Topic selection is a
//! case-insensitive keyword match over the source text, with a generic
//! paragraph per language as the default.

use crate::script::Lang;

struct FallbackTopic {
    id: &'static str,
    keywords: &'static [&'static str],
    french: &'static str,
    arabic: &'static str,
}

const TOPICS: &[FallbackTopic] = &[
    FallbackTopic {
        id: "contract",
        keywords: &["contrat", "عقد", "اتفاقية"],
        french: "La version traduite de ce contrat n'a pas pu être établie avec la fiabilité requise. \
                 Le texte original du contrat fait foi.",
        arabic: "تعذر إعداد ترجمة موثوقة لهذا العقد. يبقى النص الأصلي للعقد هو المرجع المعتمد بين الأطراف.",
    },
    FallbackTopic {
        id: "procedure",
        keywords: &["procédure", "tribunal", "دعوى", "محكمة", "إجراءات"],
        french: "La traduction de cet acte de procédure n'a pas pu être certifiée. \
                 Veuillez vous référer à l'acte original déposé auprès de la juridiction compétente.",
        arabic: "تعذر اعتماد ترجمة هذا الإجراء القضائي. يرجى الرجوع إلى الأصل المودع لدى الجهة القضائية المختصة.",
    },
    FallbackTopic {
        id: "notice",
        keywords: &["mise en demeure", "إعذار", "إنذار"],
        french: "La mise en demeure n'a pas pu être traduite de manière fiable. \
                 Le document original conserve sa pleine valeur juridique.",
        arabic: "تعذرت الترجمة الموثوقة لهذا الإعذار. يحتفظ المستند الأصلي بكامل حجيته القانونية.",
    },
];

const GENERIC_FRENCH: &str =
    "Une traduction fiable n'a pas pu être produite pour ce passage. \
     Veuillez réessayer ultérieurement ou vous reporter au texte d'origine.";

const GENERIC_ARABIC: &str =
    "تعذر إنتاج ترجمة موثوقة لهذا المقطع. يرجى إعادة المحاولة لاحقا أو الرجوع إلى النص الأصلي.";

/// Pre-authored fallback texts, topic-matched or generic.
pub struct FallbackCatalog;

impl FallbackCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Pick the fallback paragraph for a failed request. Deterministic:
    /// first topic whose keyword appears in the source text, else generic.
    pub fn select(&self, source_text: &str, target: Lang) -> &'static str {
        let haystack = source_text.to_lowercase();
        for topic in TOPICS {
            if topic.keywords.iter().any(|kw| haystack.contains(kw)) {
                tracing::debug!(topic = topic.id, target = %target, "topic fallback selected");
                return match target {
                    Lang::French => topic.french,
                    Lang::Arabic => topic.arabic,
                };
            }
        }
        match target {
            Lang::French => GENERIC_FRENCH,
            Lang::Arabic => GENERIC_ARABIC,
        }
    }
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        Self::new()
    }
}
