// Career generation: the second pipeline stage.
// Consumes sanitized résumé text only. All model calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod prompts;
