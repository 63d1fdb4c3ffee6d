pub mod generator;
pub mod llm;
pub mod prompts;
pub mod providers;

pub use generator::CommandGenerator;
pub use llm::{CompletionParams, LlmClient};
