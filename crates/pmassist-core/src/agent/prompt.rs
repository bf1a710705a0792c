//! System prompt builder for the product-manager assistant.
//!
//! Sections are wrapped in XML tags so the model can tell persona, user
//! information, PRD rules, planning instructions and the running summary
//! apart.

use pmassist_types::todo::Todo;

const PERSONA: &str = "You are a friendly, knowledgeable product-manager assistant. You help \
users shape product ideas into clear requirements: you ask clarifying questions when a request \
is ambiguous, write and refine Product Requirements Documents (PRDs), and break them down into \
actionable plans. Explain things simply but thoroughly, break complex information into \
digestible pieces and end with an open invitation for follow-up questions. Always answer in the \
language the user writes in.";

const PLANNING_INSTRUCTIONS: &str = "Use the `write_todos` tool to plan multi-step work derived \
from a PRD: one todo per user story, each with detailed sub_todos that state WHAT to build, HOW, \
WHERE, and the acceptance criteria. Keep exactly one todo in_progress while you work on it and \
mark todos completed as soon as they are done. Do not use the tool for trivial requests that \
take only a step or two.";

/// Builds the per-turn system prompt.
///
/// Layout:
/// ```text
/// <persona>...</persona>
/// <user_information>user_id, thread_id</user_information>
/// <prd_rules>...</prd_rules>
/// <planning>...</planning>
/// <current_todos>...</current_todos>        (when a plan exists)
/// <conversation_summary>...</conversation_summary>  (after compaction)
/// ```
pub struct SystemPromptBuilder;

impl SystemPromptBuilder {
    pub fn build(user_id: &str, thread_id: &str, todos: &[Todo], summary: Option<&str>) -> String {
        let mut sections = Vec::with_capacity(6);

        sections.push(format!("<persona>\n{PERSONA}\n</persona>"));

        sections.push(format!(
            "<user_information>\nuser_id=\"{user_id}\"\nthread_id=\"{thread_id}\"\n</user_information>"
        ));

        sections.push(format!(
            "<prd_rules>\n\
             - Each thread owns at most one PRD and its id is the thread id (\"{thread_id}\").\n\
             - Use `generate_prd` to create the PRD for this thread; calling it again stores a new version.\n\
             - Use `update_prd` with a single section name to revise an existing PRD; other sections stay unchanged.\n\
             - After a PRD tool call, summarize what changed instead of repeating the whole document.\n\
             </prd_rules>"
        ));

        sections.push(format!("<planning>\n{PLANNING_INSTRUCTIONS}\n</planning>"));

        if !todos.is_empty() {
            let lines: Vec<String> = todos
                .iter()
                .map(|t| format!("- [{}] {}", t.status, t.content))
                .collect();
            sections.push(format!(
                "<current_todos>\n{}\n</current_todos>",
                lines.join("\n")
            ));
        }

        if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
            sections.push(format!(
                "<conversation_summary>\nEarlier parts of this conversation, summarized:\n{summary}\n</conversation_summary>"
            ));
        }

        sections.join("\n\n")
    }
}
