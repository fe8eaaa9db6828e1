//! Natural-language to SQL pipeline for sqlchat.
//!
//! Composes prompts from conversation history, calls the completion service,
//! extracts and gates the generated SQL, executes it, and records the outcome
//! back into the conversation log.

pub mod completion;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prompt;
pub mod types;

pub use completion::{
    from_config, ArcCompletion, CompletionError, CompletionService, OpenAiCompletion,
    ScriptedCompletion,
};
pub use error::QueryError;
pub use extract::extract_sql;
pub use orchestrator::{apply_limit, new_conversation_id, QueryOrchestrator};
pub use prompt::{PromptComposer, SCHEMA_HINT, SYSTEM_INSTRUCTION};
pub use types::{PromptMessage, QueryRequest, QueryResponse, Role};
