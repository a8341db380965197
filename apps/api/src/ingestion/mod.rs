// Résumé ingestion: rate gate, bounded fetch, PDF text extraction, sanitization.

pub mod extractor;
pub mod fetcher;
pub mod handlers;
pub mod identity;
pub mod pipeline;
