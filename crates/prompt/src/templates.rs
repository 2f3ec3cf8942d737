//! Built-in prompt templates.
//!
//! Every template can be replaced by a YAML file with the same id in the
//! configured prompts directory. Block tags never sit alone on a line, so
//! Handlebars' standalone-line trimming leaves the layout untouched.

use crate::types::PromptDefinition;

/// Grounded answer over retrieved context.
pub const GROUNDED_ANSWER_ID: &str = "answer.grounded";

/// Follow-up question rewrite.
pub const REPHRASE_ID: &str = "query.rephrase";

/// Groundedness check of a produced answer.
pub const EVALUATION_ID: &str = "answer.evaluate";

/// Answer given when the context does not cover the question.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information in the provided documents to answer this question.";

const GROUNDED_ANSWER: &str = "\
You are a helpful AI assistant that answers questions based on the provided context.

Instructions:
- Answer the question using ONLY the information from the context below
- If the context doesn't contain enough information, say \"{{insufficient}}\"
- Be concise but comprehensive
{{#if cite_sources}}- Cite the source document when possible
{{/if}}- If asked about something not in the context, politely decline and explain why

Context:
{{context}}

Remember: Only use information from the context above. Do not use your general knowledge.

{{#if history}}Previous conversation:{{#each history}}
{{label}}: {{content}}{{/each}}

{{/if}}Human: {{question}}

Assistant:";

const REPHRASE: &str = "\
Given the conversation history, rephrase the follow-up question to be a standalone question.

Chat History:{{#each history}}
{{label}}: {{content}}{{/each}}

Follow-up Question: {{question}}

Rephrased Standalone Question:";

const EVALUATION: &str = "\
Evaluate if the following answer is properly grounded in the provided context.

Question: {{question}}

Context: {{context}}

Answer: {{answer}}

Provide a brief evaluation:
1. Is the answer based on the context? (Yes/No)
2. Are there any hallucinations or unsupported claims? (Yes/No)
3. Brief explanation (1 sentence)

Format:
Grounded: Yes/No
Hallucinations: Yes/No
Explanation: <your explanation>";

/// All built-in definitions.
pub fn builtin_definitions() -> Vec<PromptDefinition> {
    vec![
        PromptDefinition {
            id: GROUNDED_ANSWER_ID.to_string(),
            title: "Grounded answer".to_string(),
            description: "Answers strictly from retrieved context.".to_string(),
            template: GROUNDED_ANSWER.to_string(),
        },
        PromptDefinition {
            id: REPHRASE_ID.to_string(),
            title: "Standalone question".to_string(),
            description: "Rewrites a follow-up into a self-contained search query.".to_string(),
            template: REPHRASE.to_string(),
        },
        PromptDefinition {
            id: EVALUATION_ID.to_string(),
            title: "Answer evaluation".to_string(),
            description: String::new(),
            template: EVALUATION.to_string(),
        },
    ]
}

/// Whether `id` names a built-in template.
pub fn is_builtin(id: &str) -> bool {
    [GROUNDED_ANSWER_ID, REPHRASE_ID, EVALUATION_ID].contains(&id)
}
