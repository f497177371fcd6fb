//! Prompt templates for contract analysis

/// Fixed system instruction sent with every analysis request
pub const SYSTEM_INSTRUCTION: &str = r#"You are an experienced legal analyst reviewing a contract or other legal document.

Read the document provided by the user and respond with ONLY a JSON object of this exact shape:

{
  "summary": "a concise plain-language summary of the document",
  "pros": ["terms that favour or protect the reader"],
  "cons": ["terms that are unfavourable, risky or one-sided"],
  "loopholes": ["ambiguities, gaps or clauses that could be exploited"]
}

RULES:
1. Output strict JSON. No Markdown, no code fences, no commentary before or after the object
2. Always include all four keys, even when a list is empty
3. "summary" is a single string; "pros", "cons" and "loopholes" are arrays of short strings
4. Base every point on the document text; do not invent clauses that are not present"#;

/// Prompt builder for analysis requests
pub struct PromptBuilder;

impl PromptBuilder {
    /// User turn for a document, truncated to `max_chars` characters
    pub fn build_user_prompt(text: &str, max_chars: usize) -> String {
        let (body, truncated) = truncate_chars(text, max_chars);
        if truncated {
            tracing::debug!(
                "Document text truncated to {} characters for analysis",
                max_chars
            );
        }
        format!("Analyze the following legal document:\n\n{}", body)
    }
}

/// Prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}
