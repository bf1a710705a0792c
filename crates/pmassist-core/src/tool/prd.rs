//! `generate_prd` and `update_prd` tools.
//!
//! Both ask the model for structured JSON, validate it against
//! [`PrdDocument`], and persist through a [`PrdRepository`]. The PRD id is
//! always the id of the thread the turn runs on.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use pmassist_types::error::RepositoryError;
use pmassist_types::llm::{CompletionRequest, ToolDefinition};
use pmassist_types::prd::{PrdDocument, PrdRecord, PrdSection};

use crate::agent::engine::AgentEngine;
use crate::repository::prd::PrdRepository;

use super::{Tool, ToolContext, ToolError, input_schema, parse_input};

const PRD_SYSTEM_PROMPT: &str = r#"You are an expert Product Manager specialized in writing comprehensive Product Requirements Documents (PRDs).
Transform the user's request into a detailed, realistic PRD. Every section must be populated with specific content based on the request.

Section guidance:
- introduction: purpose of the product, scope (in and out), and measurable objectives.
- user_stories: 3-5 stories. Each has a title, "As a <subject_role>, I want <action_goal> so that <business_value>", personas with details, pre-conditions, an ordered "done when" flow, exception handling cases, measurable acceptance criteria and a definition of done (technical, QA, documentation).
- functional_requirements: core features prioritized as P0 (must-have), P1 (should-have), P2 (nice-to-have).
- non_functional_requirements: performance, security, usability/accessibility (e.g. WCAG 2.1 AA) and others as relevant.
- assumptions, dependencies: one item per entry.
- risks_and_mitigations: one entry per risk with likelihood, impact and mitigation.
- timeline: realistic phases based on 2-4 week agile sprints (discovery & design, development, testing, launch, post-launch) with a total.
- stakeholders: role and responsibility.
- metrics: KPIs with targets.

Quality standards: be specific over generic ("Support 10,000 concurrent users", not "handle many users"), include edge cases and error scenarios, consider mobile, desktop and accessibility, reference industry standards where relevant, and prioritize ruthlessly.

Respond with a single JSON object that validates against the provided JSON Schema. Do not wrap it in prose."#;

const UPDATE_SYSTEM_PROMPT: &str = r#"You are an expert Product Manager updating one section of an existing PRD based on user feedback.

Rules:
1. You receive the complete existing PRD for context.
2. Produce a new value for the section '{section}' ONLY. Do not output any other section.
3. Keep the exact structure of that section: a list of story objects for user_stories, a list of strings for list sections, a string for introduction and timeline.
4. Make changes realistic, specific and measurable. Add edge cases if relevant.

Respond with a single JSON object of the form {"{section}": <new value>}."#;

/// Settings shared by the PRD tools.
#[derive(Debug, Clone)]
pub struct PrdToolSettings {
    pub model: String,
    pub max_tokens: u32,
}

/// Pull a JSON value out of a model answer that may include code fences or
/// surrounding prose.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim);
    if let Some(Ok(value)) = unfenced.map(serde_json::from_str::<serde_json::Value>) {
        return Some(value);
    }

    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = trimmed.find(open)?;
        let end = trimmed.rfind(close)?;
        if start >= end {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    })
}

fn map_save_error(e: RepositoryError) -> ToolError {
    match e {
        RepositoryError::Forbidden(msg) => ToolError::Forbidden(msg),
        RepositoryError::Invalid(msg) => ToolError::InvalidInput(msg),
        other => ToolError::Repository(other),
    }
}

fn record_json(record: &PrdRecord) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(&record.document).map_err(|e| ToolError::Execution(e.to_string()))
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GeneratePrdInput {
    /// Natural-language description of the product or feature.
    feature: String,
}

/// Generate a full PRD and save it under the current thread id.
pub struct GeneratePrdTool<P: PrdRepository> {
    engine: AgentEngine,
    repo: Arc<P>,
    settings: PrdToolSettings,
}

impl<P: PrdRepository> GeneratePrdTool<P> {
    pub fn new(engine: AgentEngine, repo: Arc<P>, settings: PrdToolSettings) -> Self {
        Self {
            engine,
            repo,
            settings,
        }
    }
}

impl<P: PrdRepository> Tool for GeneratePrdTool<P> {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "generate_prd".to_string(),
            description: "Generate a comprehensive Product Requirements Document for a feature \
                and save it for this thread. Calling it again on the same thread stores a new \
                version."
                .to_string(),
            parameters: input_schema::<GeneratePrdInput>(),
        }
    }

    async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let GeneratePrdInput { feature } = parse_input(input)?;
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(ToolError::InvalidInput("feature must not be empty".into()));
        }

        let schema = serde_json::to_string(&PrdDocument::json_schema())
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let request = CompletionRequest::simple(
            &self.settings.model,
            PRD_SYSTEM_PROMPT,
            format!("Generate a comprehensive PRD for: {feature}\n\nJSON Schema:\n{schema}"),
            self.settings.max_tokens,
        );
        let response = self.engine.complete(&request, "generate_prd").await?;

        let value = extract_json(&response.content)
            .ok_or_else(|| ToolError::Execution("model did not return JSON".into()))?;
        let document: PrdDocument = serde_json::from_value(value)
            .map_err(|e| ToolError::Execution(format!("model returned an invalid PRD: {e}")))?;

        let record = self
            .repo
            .save(&ctx.thread_id, &ctx.user_id, &document)
            .await
            .map_err(map_save_error)?;
        info!(
            prd_id = %record.id,
            version = record.version,
            feature = %record.document.feature,
            "PRD generated"
        );

        Ok(serde_json::json!({
            "id": record.id,
            "version": record.version,
            "feature": record.document.feature,
            "prd": record_json(&record)?,
        }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdatePrdInput {
    /// What to change, in natural language.
    feedback: String,
    /// Section to rewrite, e.g. `user_stories` or `stakeholders`.
    section: String,
}

/// Rewrite one section of the thread's PRD and save a new version.
pub struct UpdatePrdTool<P: PrdRepository> {
    engine: AgentEngine,
    repo: Arc<P>,
    settings: PrdToolSettings,
}

impl<P: PrdRepository> UpdatePrdTool<P> {
    pub fn new(engine: AgentEngine, repo: Arc<P>, settings: PrdToolSettings) -> Self {
        Self {
            engine,
            repo,
            settings,
        }
    }
}

/// Interpret the model's answer as the new value of `section`.
fn section_value_from_answer(section: PrdSection, answer: &str) -> Option<serde_json::Value> {
    match extract_json(answer) {
        Some(serde_json::Value::Object(mut map)) if map.contains_key(section.as_str()) => {
            map.remove(section.as_str())
        }
        Some(value) => Some(value),
        // Text sections may come back as bare prose.
        None if !section.is_list() && !answer.trim().is_empty() => {
            Some(serde_json::Value::String(answer.trim().to_string()))
        }
        None => None,
    }
}

fn item_count(value: &serde_json::Value) -> i64 {
    value
        .as_array()
        .map(|items| items.len() as i64)
        .unwrap_or(0)
}

/// `Updated 'x'`, plus the signed item delta for list sections that grew or shrank.
pub fn change_summary(
    section: PrdSection,
    before: &serde_json::Value,
    after: &serde_json::Value,
) -> String {
    let diff = item_count(after) - item_count(before);
    if diff == 0 {
        format!("Updated '{section}'")
    } else {
        format!("Updated '{section}' ({diff:+} items)")
    }
}

impl<P: PrdRepository> Tool for UpdatePrdTool<P> {
    fn definition(&self) -> ToolDefinition {
        let sections: Vec<&str> = PrdSection::ALL.iter().map(PrdSection::as_str).collect();
        ToolDefinition {
            name: "update_prd".to_string(),
            description: format!(
                "Update one section of this thread's existing PRD based on feedback. Other \
                 sections are left unchanged. Sections: {}.",
                sections.join(", ")
            ),
            parameters: input_schema::<UpdatePrdInput>(),
        }
    }

    async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let UpdatePrdInput { feedback, section } = parse_input(input)?;
        let section: PrdSection = section.parse().map_err(ToolError::InvalidInput)?;
        if feedback.trim().is_empty() {
            return Err(ToolError::InvalidInput("feedback must not be empty".into()));
        }

        let existing = self.repo.get(&ctx.thread_id).await?.ok_or_else(|| {
            ToolError::NotFound(format!(
                "no PRD for thread {}; call generate_prd first",
                ctx.thread_id
            ))
        })?;
        if existing.user_id != ctx.user_id {
            return Err(ToolError::Forbidden(format!(
                "PRD {} belongs to another user",
                existing.id
            )));
        }

        let current_json = serde_json::to_string_pretty(&existing.document)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let request = CompletionRequest::simple(
            &self.settings.model,
            &UPDATE_SYSTEM_PROMPT.replace("{section}", section.as_str()),
            format!(
                "EXISTING PRD (context only):\n{current_json}\n\nUSER FEEDBACK: {feedback}\n\n\
                 Output only the new value of '{section}'."
            ),
            self.settings.max_tokens,
        );
        let response = self.engine.complete(&request, "update_prd").await?;

        let new_value = section_value_from_answer(section, &response.content)
            .ok_or_else(|| ToolError::Execution("model did not return a section value".into()))?;
        let before = existing.document.section_value(section);

        let mut document = existing.document.clone();
        document.replace_section(section, new_value).map_err(|e| {
            warn!(section = %section, error = %e, "Model returned a malformed section");
            ToolError::Execution(format!("model returned an invalid '{section}': {e}"))
        })?;
        let after = document.section_value(section);

        let record = self
            .repo
            .save(&existing.id, &ctx.user_id, &document)
            .await
            .map_err(map_save_error)?;
        let summary = change_summary(section, &before, &after);
        info!(prd_id = %record.id, version = record.version, %summary, "PRD updated");

        Ok(serde_json::json!({
            "summary": summary,
            "id": record.id,
            "version": record.version,
            "prd": record_json(&record)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::scripted::{ScriptedProvider, ScriptedTurn};
    use crate::testing::{InMemoryPrds, sample_prd};

    fn settings() -> PrdToolSettings {
        PrdToolSettings {
            model: "m".to_string(),
            max_tokens: 4096,
        }
    }

    fn engine(turns: Vec<ScriptedTurn>) -> AgentEngine {
        AgentEngine::new(BoxLlmProvider::new(ScriptedProvider::new(turns)))
    }

    fn ctx(thread: &str, user: &str) -> ToolContext {
        ToolContext::new(thread, user, Vec::new())
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#).unwrap()["a"], 1);
        assert_eq!(extract_json("```json\n{\"a\":2}\n```").unwrap()["a"], 2);
        assert_eq!(extract_json("Here you go: {\"a\":3} enjoy").unwrap()["a"], 3);
        assert_eq!(extract_json("items: [1, 2]").unwrap(), serde_json::json!([1, 2]));
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_change_summary() {
        let before = serde_json::json!(["a"]);
        let after = serde_json::json!(["a", "b", "c"]);
        assert_eq!(
            change_summary(PrdSection::Metrics, &before, &after),
            "Updated 'metrics' (+2 items)"
        );
        assert_eq!(
            change_summary(PrdSection::Metrics, &after, &before),
            "Updated 'metrics' (-2 items)"
        );
        assert_eq!(
            change_summary(PrdSection::Timeline, &serde_json::json!("Q1"), &serde_json::json!("Q2")),
            "Updated 'timeline'"
        );
    }

    #[tokio::test]
    async fn test_generate_prd_saves_version_one_then_two() {
        let doc = serde_json::to_string(&sample_prd("Checkout")).unwrap();
        let repo = Arc::new(InMemoryPrds::default());
        let tool = GeneratePrdTool::new(
            engine(vec![
                ScriptedTurn::text(&format!("```json\n{doc}\n```")),
                ScriptedTurn::text(&doc),
            ]),
            repo.clone(),
            settings(),
        );

        let first = tool
            .call(&ctx("t1", "u1"), serde_json::json!({"feature": "checkout"}))
            .await
            .unwrap();
        assert_eq!(first["id"], "t1");
        assert_eq!(first["version"], 1);
        assert_eq!(first["feature"], "Checkout");

        let second = tool
            .call(&ctx("t1", "u1"), serde_json::json!({"feature": "checkout"}))
            .await
            .unwrap();
        assert_eq!(second["version"], 2);
    }

    #[tokio::test]
    async fn test_generate_prd_rejects_non_json_answer() {
        let repo = Arc::new(InMemoryPrds::default());
        let tool = GeneratePrdTool::new(
            engine(vec![ScriptedTurn::text("Sorry, I can't.")]),
            repo.clone(),
            settings(),
        );
        let err = tool
            .call(&ctx("t1", "u1"), serde_json::json!({"feature": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
        assert!(repo.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_prd_changes_only_target_section() {
        let repo = Arc::new(InMemoryPrds::default());
        let original = repo.save("t1", "u1", &sample_prd("Checkout")).await.unwrap();

        let tool = UpdatePrdTool::new(
            engine(vec![ScriptedTurn::text(
                r#"{"stakeholders": ["PM: owns scope", "Eng lead: delivery"]}"#,
            )]),
            repo.clone(),
            settings(),
        );
        let out = tool
            .call(
                &ctx("t1", "u1"),
                serde_json::json!({"feedback": "add stakeholders", "section": "stakeholders"}),
            )
            .await
            .unwrap();

        assert_eq!(out["version"], 2);
        assert_eq!(out["summary"], "Updated 'stakeholders' (+2 items)");

        let updated = repo.get("t1").await.unwrap().unwrap();
        assert_eq!(updated.document.stakeholders.len(), 2);
        for section in PrdSection::ALL {
            if section != PrdSection::Stakeholders {
                assert_eq!(
                    updated.document.section_value(section),
                    original.document.section_value(section)
                );
            }
        }
        assert_eq!(updated.document.feature, original.document.feature);
    }

    #[tokio::test]
    async fn test_update_prd_accepts_bare_text_for_text_section() {
        let repo = Arc::new(InMemoryPrds::default());
        repo.save("t1", "u1", &sample_prd("Checkout")).await.unwrap();
        let tool = UpdatePrdTool::new(
            engine(vec![ScriptedTurn::text("Eight weeks across four sprints.")]),
            repo.clone(),
            settings(),
        );
        let out = tool
            .call(
                &ctx("t1", "u1"),
                serde_json::json!({"feedback": "shorter", "section": "timeline"}),
            )
            .await
            .unwrap();
        assert_eq!(out["summary"], "Updated 'timeline'");
        assert_eq!(
            repo.get("t1").await.unwrap().unwrap().document.timeline,
            "Eight weeks across four sprints."
        );
    }

    #[tokio::test]
    async fn test_update_prd_unknown_section() {
        let repo = Arc::new(InMemoryPrds::default());
        repo.save("t1", "u1", &sample_prd("Checkout")).await.unwrap();
        let provider = ScriptedProvider::new(Vec::new());
        let tool = UpdatePrdTool::new(
            AgentEngine::new(BoxLlmProvider::new(provider)),
            repo.clone(),
            settings(),
        );
        let err = tool
            .call(
                &ctx("t1", "u1"),
                serde_json::json!({"feedback": "x", "section": "pricing"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert_eq!(repo.get("t1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_update_prd_without_existing_prd() {
        let repo = Arc::new(InMemoryPrds::default());
        let tool = UpdatePrdTool::new(engine(Vec::new()), repo, settings());
        let err = tool
            .call(
                &ctx("t9", "u1"),
                serde_json::json!({"feedback": "x", "section": "metrics"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_prd_other_owner_forbidden() {
        let repo = Arc::new(InMemoryPrds::default());
        repo.save("t1", "owner", &sample_prd("Checkout")).await.unwrap();
        let tool = UpdatePrdTool::new(engine(Vec::new()), repo, settings());
        let err = tool
            .call(
                &ctx("t1", "intruder"),
                serde_json::json!({"feedback": "x", "section": "metrics"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_prd_wrong_shape_keeps_version() {
        let repo = Arc::new(InMemoryPrds::default());
        repo.save("t1", "u1", &sample_prd("Checkout")).await.unwrap();
        let tool = UpdatePrdTool::new(
            engine(vec![ScriptedTurn::text(r#"{"metrics": "not a list"}"#)]),
            repo.clone(),
            settings(),
        );
        let err = tool
            .call(
                &ctx("t1", "u1"),
                serde_json::json!({"feedback": "x", "section": "metrics"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
        assert_eq!(repo.get("t1").await.unwrap().unwrap().version, 1);
    }
}
