// Career generation prompt templates.

pub const CAREERS_SYSTEM: &str = "\
You are an experienced career coach. \
You suggest realistic next career paths based on a candidate's resume and stated interests. \
You MUST respond with valid JSON only: no markdown fences, no explanations. \
Some contact details in the resume were replaced with placeholders such as [EMAIL_REMOVED]; \
ignore them and never try to reconstruct them.";

pub const CAREERS_PROMPT: &str = r#"Suggest exactly {count} career paths for the candidate below.

RESUME:
{resume}

ADDITIONAL CONTEXT FROM THE CANDIDATE:
{context}

Return a JSON array of exactly {count} objects, each with these string fields:
[
  {
    "jobTitle": "name of the role",
    "jobDescription": "one or two sentences on what the role involves and why it suits the candidate",
    "timeToGetThere": "realistic time to reach the role, e.g. '6-12 months'",
    "salary": "typical salary range with currency",
    "difficulty": "Low" | "Medium" | "High",
    "workRequired": "concrete steps the candidate must take to get there"
  }
]

Favor roles that build on the candidate's demonstrated experience. If the additional context
names interests, include at least two paths that lean into them."#;

/// Shown to the model when the candidate supplied no extra context.
pub const NO_CONTEXT: &str = "(none provided)";
