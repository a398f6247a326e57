//! Prompts for OCR transcription and structured extraction.
//!
//! Every prompt the crate sends lives here so prompt regressions are caught
//! by unit tests rather than by reading provider logs.

use crate::provider::{ChatMessage, ImageData};
use crate::schema::resume_json_schema;

/// System prompt for structured extraction. `{schema}` is replaced with the
/// resume JSON Schema.
pub const PARSE_SYSTEM_PROMPT: &str = r#"You are a resume parser. Extract structured data from the provided resume text.

Rules:
- Return ONLY valid JSON matching the schema below. No markdown, no explanation, no extra text.
- Extract all information present in the resume. Do not invent or assume information.
- If a field is not present in the resume, use null for optional fields or an empty list for list fields.
- Dates should be preserved as they appear in the resume (e.g. "Jan 2023", "2023", "Present").
- For skills, group by category when the resume uses categories. If no categories, use a single group with category null.

JSON Schema:
{schema}"#;

/// Instruction placed ahead of the page images in the OCR request.
pub const OCR_PROMPT: &str = "Extract ALL text from the document image(s) below. \
Preserve the original structure, headings, bullet points, and formatting as closely as possible. \
Return ONLY the extracted text, no commentary or explanation.";

/// System prompt with the schema filled in.
pub fn parse_system_prompt() -> String {
    PARSE_SYSTEM_PROMPT.replace("{schema}", resume_json_schema())
}

/// `[system, user]` messages asking for `text` to be parsed.
pub fn build_parse_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(parse_system_prompt()),
        ChatMessage::user(format!(
            "Parse the following resume and return structured JSON:\n\n{text}"
        )),
    ]
}

/// A single user message: the OCR instruction followed by every page image.
pub fn build_ocr_messages(pages: Vec<ImageData>) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(OCR_PROMPT, pages)]
}
