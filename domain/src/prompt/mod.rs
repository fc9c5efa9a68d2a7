//! Prompt domain
//!
//! Templates for the condensation and grounded-answer prompts.

mod template;

pub use template::PromptTemplate;
