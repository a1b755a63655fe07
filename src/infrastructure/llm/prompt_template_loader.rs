//! Filesystem prompt template loader (§4.1 "loads `<prompt_type>.md` from a
//! prompts directory"), grounded on the teacher's plain-`std::fs` loading
//! style in `infrastructure/config.rs` (no templating crate, just files).

use async_trait::async_trait;
use std::path::PathBuf;

use crate::application::errors::PromptTemplateError;
use crate::application::ports::outbound::PromptTemplatePort;
use crate::domain::value_objects::PromptType;

pub struct FilesystemPromptTemplateLoader {
    prompts_dir: PathBuf,
}

impl FilesystemPromptTemplateLoader {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
        }
    }
}

#[async_trait]
impl PromptTemplatePort for FilesystemPromptTemplateLoader {
    async fn load(&self, prompt_type: PromptType) -> Result<String, PromptTemplateError> {
        let path = self.prompts_dir.join(prompt_type.template_file());
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PromptTemplateError::NotFound(path.display().to_string())
            } else {
                PromptTemplateError::Unreadable(path.display().to_string(), e.to_string())
            }
        })
    }
}
