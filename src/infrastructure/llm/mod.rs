pub mod http_ai_client;
pub mod prompt_template_loader;

pub use http_ai_client::HttpAiClient;
pub use prompt_template_loader::FilesystemPromptTemplateLoader;
