use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::sanitize::redactor::{PiiRedactor, RedactionSummary};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Redacted, whitespace-collapsed, trimmed text. Only `TextNormalizer` builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub struct TextNormalizer {
    redactor: PiiRedactor,
}

impl TextNormalizer {
    pub fn new(redactor: PiiRedactor) -> Self {
        Self { redactor }
    }

    pub fn normalize(&self, text: &str) -> SanitizedText {
        self.normalize_with_summary(text).0
    }

    /// Redact, collapse whitespace, redact again, trim.
    ///
    /// The second pass catches detections that only form once separator runs are
    /// collapsed (`555  123  4567`), which keeps the output free of any detectable
    /// PII and makes normalization idempotent.
    pub fn normalize_with_summary(&self, text: &str) -> (SanitizedText, RedactionSummary) {
        let (redacted, mut summary) = self.redactor.redact_with_summary(text);
        let collapsed = collapse_whitespace(&redacted);
        let (swept, second) = self.redactor.redact_with_summary(&collapsed);
        summary.merge(&second);
        (SanitizedText(swept.trim().to_string()), summary)
    }
}

/// A whitespace run containing a line break becomes `\n`; any other run becomes
/// a single space.
fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(text, |caps: &Captures| {
            if caps[0].chars().any(is_line_break) {
                "\n"
            } else {
                " "
            }
        })
        .into_owned()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}
