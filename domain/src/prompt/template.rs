//! Prompt templates for the conversation chain

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// Prompt asking the model to rewrite a follow-up as a standalone question.
    ///
    /// `chat_history` is the formatted transcript, possibly empty.
    pub fn condense_question(chat_history: &str, question: &str) -> String {
        format!(
            r#"Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{}
Follow Up Input: {}
Standalone question:"#,
            chat_history, question
        )
    }

    /// Prompt asking the model to answer from retrieved context only.
    pub fn answer_with_context(context: &str, question: &str) -> String {
        format!(
            r#"Answer the question based only on the following context:
{}

Question: {}
"#,
            context, question
        )
    }
}
