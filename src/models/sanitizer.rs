// SECURITY: Prompt Validation and Sanitization
//
// Runs before any backend or native resource is touched. validate() must
// succeed on the raw prompt before sanitize() is applied, and only the
// sanitized text is ever handed to a backend. The substring block list is a
// textual tripwire for injection-looking payloads, not a security boundary.

use crate::error::{GenerationError, Result};

/// Case-insensitive substrings that reject a prompt outright.
pub const SUSPICIOUS_PATTERNS: &[&str] = &[
    "system(",
    "exec(",
    "eval(",
    "\\x",
    ".dll",
    ".exe",
    "cmd.exe",
    "powershell",
];

#[derive(Debug, Clone)]
pub struct PromptSanitizer {
    max_prompt_length: usize,
}

impl PromptSanitizer {
    pub fn new(max_prompt_length: usize) -> Self {
        Self { max_prompt_length }
    }

    pub fn max_prompt_length(&self) -> usize {
        self.max_prompt_length
    }

    /// Checks a raw prompt and hands it back when it may proceed.
    pub fn validate<'a>(&self, prompt: Option<&'a str>) -> Result<&'a str> {
        let prompt = prompt
            .ok_or_else(|| GenerationError::InvalidPrompt("Prompt cannot be null".to_string()))?;

        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidPrompt(
                "Prompt cannot be empty".to_string(),
            ));
        }

        if prompt.chars().count() > self.max_prompt_length {
            return Err(GenerationError::InvalidPrompt(format!(
                "Prompt too long. Maximum length: {} characters",
                self.max_prompt_length
            )));
        }

        if contains_suspicious_content(prompt) {
            return Err(GenerationError::InvalidPrompt(
                "Prompt contains potentially harmful content".to_string(),
            ));
        }

        Ok(prompt)
    }

    /// Validate then sanitize in the required order.
    pub fn clean(&self, prompt: Option<&str>) -> Result<String> {
        let prompt = self.validate(prompt)?;
        Ok(sanitize(prompt))
    }
}

impl Default for PromptSanitizer {
    fn default() -> Self {
        Self::new(4000)
    }
}

pub fn contains_suspicious_content(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    SUSPICIOUS_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Strips ASCII control characters (keeping tab, LF and CR), trims
/// surrounding whitespace and collapses runs of three or more newlines to
/// exactly two. Idempotent.
///
/// Trimming uses Unicode `White_Space`, so U+00A0 and friends at the edges
/// are removed too, not only ASCII blanks.
pub fn sanitize(prompt: &str) -> String {
    let stripped: String = prompt.chars().filter(|c| !is_stripped_control(*c)).collect();
    collapse_newlines(stripped.trim())
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push(c);
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}
