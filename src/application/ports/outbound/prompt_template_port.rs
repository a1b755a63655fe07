//! Prompt template loader port (§4.1 "loads `<prompt_type>.md` from a
//! prompts directory, replaces a `{{USER_INPUT}}` marker").

use async_trait::async_trait;

use crate::application::errors::PromptTemplateError;
use crate::domain::value_objects::PromptType;

#[async_trait]
pub trait PromptTemplatePort: Send + Sync {
    /// Returns the raw template text for `prompt_type`, or an error if the
    /// file is missing/unreadable (§4.1 `prompt_preparation` error kind).
    async fn load(&self, prompt_type: PromptType) -> Result<String, PromptTemplateError>;
}

/// §4.1 "replaces a `{{USER_INPUT}}` marker (or concatenates when
/// absent)". Pure function so it is independently testable.
pub fn substitute_user_input(template: &str, user_input: &str) -> String {
    const MARKER: &str = "{{USER_INPUT}}";
    if template.contains(MARKER) {
        template.replace(MARKER, user_input)
    } else {
        format!("{template}\n\n{user_input}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_marker_when_present() {
        let out = substitute_user_input("System: {{USER_INPUT}} end", "forest adventure");
        assert_eq!(out, "System: forest adventure end");
    }

    #[test]
    fn concatenates_when_marker_absent() {
        let out = substitute_user_input("System prompt", "forest adventure");
        assert_eq!(out, "System prompt\n\nforest adventure");
    }
}
