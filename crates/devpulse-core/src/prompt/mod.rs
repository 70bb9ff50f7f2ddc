pub mod builder;
pub mod templates;

pub use builder::PromptBuilder;
pub use templates::{
    analysis_instruction, fallback_response, parse_suggestions, suggestion_instruction,
    summary_instruction, MAX_SUGGESTIONS, SYSTEM_PROMPT,
};
