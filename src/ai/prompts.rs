/// Base prompt sent with every image
pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in a short phrase of 3 to 8 words \
that would make a good filename. Mention the main subject and setting. \
Output only the phrase, no punctuation, no quotes, no explanation.";

/// Language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "English";

/// Build the full prompt: base prompt plus a language directive
pub fn build_describe_prompt(base_prompt: &str, language: &str) -> String {
    let language = language.trim();
    if language.is_empty() {
        return base_prompt.to_string();
    }
    format!("{} Respond in {}.", base_prompt.trim_end(), language)
}
