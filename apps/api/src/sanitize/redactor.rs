use std::borrow::Cow;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

/// Minimum digit count for a phone-shaped run to be treated as a phone number.
/// Shorter runs are years, counts, postcodes.
const MIN_PHONE_DIGITS: usize = 7;

/// Technology names shaped like `label.tld`. Compared case-insensitively against
/// the whole match, so `www.socket.io` or `socket.io/docs` is still redacted.
const TECH_NAMES: &[&str] = &["asp.net", "ado.net", "vb.net", "socket.io"];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").expect("email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.\-]?)?(?:\(\d{1,4}\)|\d{1,4})(?:[\s.\-]?\d{1,4}){1,4}")
        .expect("phone regex")
});

static LINKEDIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?linkedin\.com/in/[a-z0-9\-_]+").expect("linkedin regex")
});

static WEBSITE_BROAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?[a-z0-9\-_]+\.[a-z]{2,}(?:\.[a-z]{2,})?\b")
        .expect("broad website regex")
});

static WEBSITE_STRICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)https?://[^\s]+",
        r"|\bwww\.[a-z0-9\-_]+(?:\.[a-z0-9\-_]+)+(?:/[^\s]*)?",
        r"|\b[a-z0-9\-_]+(?:\.[a-z0-9\-_]+)*\.",
        r"(?:com|org|net|io|dev|me|co|ai|app|info|biz|xyz|tech|site|online|blog|page|so|sh|ch|de|uk|us|ca|fr|nl|eu|in)",
        r"\b(?:/[^\s]*)?",
    ))
    .expect("strict website regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    LinkedinProfile,
    Website,
}

impl PiiCategory {
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::Email => "[EMAIL_REMOVED]",
            PiiCategory::Phone => "[PHONE_REMOVED]",
            PiiCategory::LinkedinProfile => "[LINKEDIN_PROFILE_REMOVED]",
            PiiCategory::Website => "[WEBSITE_REMOVED]",
        }
    }
}

/// How aggressively domain-like tokens are treated as personal websites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteMode {
    /// Website detection disabled.
    Off,
    /// Explicit URLs, `www.` hosts and hosts under common TLDs, except known
    /// technology names such as `ASP.NET`.
    Strict,
    /// Any `label.tld` token. Also hits `Node.js` and `end.The`.
    Broad,
}

impl FromStr for WebsiteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(WebsiteMode::Off),
            "strict" => Ok(WebsiteMode::Strict),
            "broad" => Ok(WebsiteMode::Broad),
            other => Err(format!("unknown website redaction mode '{other}'")),
        }
    }
}

/// One category of PII detection. Implementations replace every detection in
/// `text` with the category placeholder, leftmost-first and non-overlapping.
pub trait PiiDetector: Send + Sync {
    fn category(&self) -> PiiCategory;

    /// Returns the redacted text and the number of substitutions made.
    fn redact<'a>(&self, text: &'a str) -> (Cow<'a, str>, usize);
}

/// A detector driven by a single regex, with an optional predicate that can veto
/// individual matches.
pub struct RegexDetector {
    category: PiiCategory,
    pattern: Regex,
    accept: Option<fn(&str) -> bool>,
}

impl RegexDetector {
    pub fn new(category: PiiCategory, pattern: Regex) -> Self {
        Self {
            category,
            pattern,
            accept: None,
        }
    }

    pub fn with_filter(mut self, accept: fn(&str) -> bool) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn email() -> Self {
        Self::new(PiiCategory::Email, EMAIL_RE.clone())
    }

    pub fn phone() -> Self {
        Self::new(PiiCategory::Phone, PHONE_RE.clone()).with_filter(has_phone_digit_count)
    }

    pub fn linkedin_profile() -> Self {
        Self::new(PiiCategory::LinkedinProfile, LINKEDIN_RE.clone())
    }

    /// `None` when website detection is switched off.
    pub fn website(mode: WebsiteMode) -> Option<Self> {
        match mode {
            WebsiteMode::Off => None,
            WebsiteMode::Strict => Some(
                Self::new(PiiCategory::Website, WEBSITE_STRICT_RE.clone())
                    .with_filter(is_not_tech_name),
            ),
            WebsiteMode::Broad => Some(Self::new(PiiCategory::Website, WEBSITE_BROAD_RE.clone())),
        }
    }
}

impl PiiDetector for RegexDetector {
    fn category(&self) -> PiiCategory {
        self.category
    }

    fn redact<'a>(&self, text: &'a str) -> (Cow<'a, str>, usize) {
        let placeholder = self.category.placeholder();
        let mut count = 0;
        let redacted = self.pattern.replace_all(text, |caps: &Captures| {
            let found = &caps[0];
            match self.accept {
                Some(accept) if !accept(found) => found.to_string(),
                _ => {
                    count += 1;
                    placeholder.to_string()
                }
            }
        });
        (redacted, count)
    }
}

fn has_phone_digit_count(candidate: &str) -> bool {
    candidate.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_PHONE_DIGITS
}

fn is_not_tech_name(candidate: &str) -> bool {
    !TECH_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(candidate))
}

/// Substitution counts from one redaction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedactionSummary {
    pub email: usize,
    pub phone: usize,
    pub linkedin_profile: usize,
    pub website: usize,
}

impl RedactionSummary {
    fn record(&mut self, category: PiiCategory, count: usize) {
        match category {
            PiiCategory::Email => self.email += count,
            PiiCategory::Phone => self.phone += count,
            PiiCategory::LinkedinProfile => self.linkedin_profile += count,
            PiiCategory::Website => self.website += count,
        }
    }

    pub fn merge(&mut self, other: &RedactionSummary) {
        self.email += other.email;
        self.phone += other.phone;
        self.linkedin_profile += other.linkedin_profile;
        self.website += other.website;
    }

    pub fn total(&self) -> usize {
        self.email + self.phone + self.linkedin_profile + self.website
    }
}

/// Applies detectors in order. Narrow categories must come before broad ones so
/// that e.g. a LinkedIn URL is not half-eaten by the website detector.
pub struct PiiRedactor {
    detectors: Vec<Box<dyn PiiDetector>>,
}

impl PiiRedactor {
    pub fn new(detectors: Vec<Box<dyn PiiDetector>>) -> Self {
        Self { detectors }
    }

    /// Email, phone, LinkedIn profile, then website (per `website_mode`).
    pub fn standard(website_mode: WebsiteMode) -> Self {
        let mut detectors: Vec<Box<dyn PiiDetector>> = vec![
            Box::new(RegexDetector::email()),
            Box::new(RegexDetector::phone()),
            Box::new(RegexDetector::linkedin_profile()),
        ];
        if let Some(website) = RegexDetector::website(website_mode) {
            detectors.push(Box::new(website));
        }
        Self::new(detectors)
    }

    pub fn categories(&self) -> Vec<PiiCategory> {
        self.detectors.iter().map(|d| d.category()).collect()
    }

    pub fn redact_with_summary(&self, text: &str) -> (String, RedactionSummary) {
        let mut summary = RedactionSummary::default();
        let mut current = text.to_string();
        for detector in &self.detectors {
            let (next, count) = detector.redact(&current);
            if count > 0 {
                summary.record(detector.category(), count);
                current = next.into_owned();
            }
        }
        (current, summary)
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::standard(WebsiteMode::Strict)
    }
}
