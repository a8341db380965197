// PII redaction and text normalization for extracted résumé text.
// Nothing leaves the ingestion pipeline without passing through TextNormalizer.

pub mod normalizer;
pub mod redactor;

pub use normalizer::{SanitizedText, TextNormalizer};
pub use redactor::{PiiRedactor, WebsiteMode};
