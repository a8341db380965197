use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::careers::prompts::{CAREERS_PROMPT, CAREERS_SYSTEM, NO_CONTEXT};
use crate::llm_client::{LlmClient, LlmError};
use crate::sanitize::SanitizedText;

/// Number of career paths the graph has room for.
pub const MAX_CAREERS: usize = 6;
/// Résumé text beyond this many characters is not sent to the model.
const MAX_RESUME_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerRecord {
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub time_to_get_there: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub work_required: String,
}

#[derive(Debug, Error)]
pub enum CareerError {
    #[error("Career model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("No career paths could be generated")]
    NoCareers,
}

/// Second pipeline stage: sanitized résumé plus optional free-text context in,
/// career suggestions out. Never receives unsanitized text.
#[async_trait]
pub trait CareerGenerator: Send + Sync {
    async fn generate(
        &self,
        resume: &SanitizedText,
        context: Option<&SanitizedText>,
    ) -> Result<Vec<CareerRecord>, CareerError>;
}

pub struct LlmCareerGenerator {
    llm: LlmClient,
}

impl LlmCareerGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CareerGenerator for LlmCareerGenerator {
    async fn generate(
        &self,
        resume: &SanitizedText,
        context: Option<&SanitizedText>,
    ) -> Result<Vec<CareerRecord>, CareerError> {
        let prompt = build_prompt(resume, context);
        let careers: Vec<CareerRecord> = self.llm.call_json(&prompt, CAREERS_SYSTEM).await?;
        let careers = finalize_careers(careers)?;
        info!(count = careers.len(), model = self.llm.model(), "career paths generated");
        Ok(careers)
    }
}

fn build_prompt(resume: &SanitizedText, context: Option<&SanitizedText>) -> String {
    let resume: String = resume.as_str().chars().take(MAX_RESUME_CHARS).collect();
    let context = context
        .map(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_CONTEXT);

    CAREERS_PROMPT
        .replace("{count}", &MAX_CAREERS.to_string())
        .replace("{context}", context)
        .replace("{resume}", &resume)
}

/// Drops untitled records and caps the list at `MAX_CAREERS`.
fn finalize_careers(careers: Vec<CareerRecord>) -> Result<Vec<CareerRecord>, CareerError> {
    let returned = careers.len();
    let careers: Vec<CareerRecord> = careers
        .into_iter()
        .filter(|c| !c.job_title.trim().is_empty())
        .take(MAX_CAREERS)
        .collect();

    if careers.is_empty() {
        warn!(returned, "model returned no usable career paths");
        return Err(CareerError::NoCareers);
    }
    Ok(careers)
}
