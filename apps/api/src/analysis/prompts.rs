// All LLM prompt constants for the Analysis module.
// System prompts are composed with llm_client::prompts::json_system.

pub const PARSE_ROLE: &str =
    "You are an expert at extracting text and structured information from resume documents.";

/// Resume parsing prompt. The resume itself is sent as a document block ahead of it.
pub const PARSE_PROMPT: &str = r#"Extract the full text of the attached resume.
Skip page headers and footers and put the text in a sensible reading order.

Return a JSON object with this EXACT schema:
{
  "parsed_text": "the full extracted text",
  "extracted_skills": ["Go", "Kubernetes"],
  "extracted_experience_summaries": ["Led the migration of 40 services to Kubernetes"]
}

Rules:
- extracted_skills: key skills named anywhere in the resume.
- extracted_experience_summaries: short, distinct phrases from the work experience sections.
- If the document has no readable text, return an empty string for parsed_text."#;

pub const SPAM_ROLE: &str =
    "You are a screening specialist who detects spam, fabricated, or AI-generated resumes.";

/// Spam detection prompt template. Replace `{current_year}` and `{resume_text}` before sending.
pub const SPAM_PROMPT_TEMPLATE: &str = r#"The current year is {current_year}. Decide whether the resume below is spam or fabricated.

Judge dates against {current_year}:
- Claims dated in the recent past or within {current_year} are plausible unless other signals say otherwise.
- Degrees, awards or roles dated two or more years after {current_year} are highly suspicious.
- Small date inconsistencies around very recent events are acceptable when the rest reads as genuine.

Flag:
1. Verifiably false claims (future-dated awards, non-existent institutions, impossible qualifications).
2. Grossly exaggerated or impossible responsibilities, achievements or timelines.
3. Incoherent, nonsensical or placeholder text.
4. Generic templated text with no specific detail, typical of mass applications.

Do NOT flag a resume only because it is unconventional, ambitious or contains typos.

Return a JSON object with this EXACT schema:
{
  "is_spam": false,
  "confidence_score": 0.05,
  "explanation": "one or two sentences, mentioning any date reasoning"
}

confidence_score is between 0 and 1, where 1 means most confident the resume IS spam.

Resume text:
{resume_text}"#;

pub const RELEVANCY_ROLE: &str =
    "You are an expert recruiter who matches candidate resumes to job descriptions.";

/// Relevancy scoring prompt template. Replace `{job_description}` and `{resume_text}` before sending.
pub const RELEVANCY_PROMPT_TEMPLATE: &str = r#"Score how well the resume matches the job description.

Return a JSON object with this EXACT schema:
{
  "relevancy_score": 88,
  "matched_skills": ["Go", "Kubernetes"],
  "explanation": "a concise summary of the score that names the matched skills"
}

Rules:
- relevancy_score is a number from 0 to 100.
- matched_skills lists skills from the resume that the job description asks for.

Job description:
{job_description}

Resume text:
{resume_text}"#;
