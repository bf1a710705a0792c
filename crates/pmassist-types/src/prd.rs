//! Product requirements document (PRD) types.
//!
//! `PrdDocument` is the structured body the model produces; `PrdRecord`
//! is the persisted, versioned form owned by a user and keyed by the id of
//! the thread that created it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Persona {
    pub name: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    pub label: String,
    pub explanation: String,
}

/// One step of a story's "done when" flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowStep {
    pub order: u32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExceptionCase {
    pub scenario: String,
    pub handling: String,
}

/// A user story: "As a <subject_role>, I want <action_goal> so that
/// <business_value>", plus its supporting detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Story {
    pub order: u32,
    pub title: String,
    pub subject_role: String,
    pub action_goal: String,
    pub business_value: String,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub pre_conditions: Vec<Condition>,
    #[serde(default)]
    pub done_when: Vec<FlowStep>,
    #[serde(default)]
    pub uses_flow_diagram: bool,
    #[serde(default)]
    pub exception_handling: Vec<ExceptionCase>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub definition_of_done: Vec<String>,
}

/// Structured PRD body, as generated by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrdDocument {
    pub feature: String,
    pub introduction: String,
    pub user_stories: Vec<Story>,
    pub functional_requirements: Vec<String>,
    pub non_functional_requirements: Vec<String>,
    pub assumptions: Vec<String>,
    pub dependencies: Vec<String>,
    pub risks_and_mitigations: Vec<String>,
    pub timeline: String,
    pub stakeholders: Vec<String>,
    pub metrics: Vec<String>,
}

impl PrdDocument {
    /// JSON Schema of the document, handed to the model as the output contract.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(PrdDocument)).unwrap_or_default()
    }

    /// Rejects documents that cannot be stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature.trim().is_empty() {
            return Err("feature must not be empty".to_string());
        }
        Ok(())
    }

    /// Current JSON value of one section.
    pub fn section_value(&self, section: PrdSection) -> serde_json::Value {
        let value = match section {
            PrdSection::Introduction => serde_json::to_value(&self.introduction),
            PrdSection::UserStories => serde_json::to_value(&self.user_stories),
            PrdSection::FunctionalRequirements => {
                serde_json::to_value(&self.functional_requirements)
            }
            PrdSection::NonFunctionalRequirements => {
                serde_json::to_value(&self.non_functional_requirements)
            }
            PrdSection::Assumptions => serde_json::to_value(&self.assumptions),
            PrdSection::Dependencies => serde_json::to_value(&self.dependencies),
            PrdSection::RisksAndMitigations => serde_json::to_value(&self.risks_and_mitigations),
            PrdSection::Timeline => serde_json::to_value(&self.timeline),
            PrdSection::Stakeholders => serde_json::to_value(&self.stakeholders),
            PrdSection::Metrics => serde_json::to_value(&self.metrics),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Replaces exactly one section with `value`, leaving every other field
    /// untouched. Fails if `value` does not have the section's shape.
    pub fn replace_section(
        &mut self,
        section: PrdSection,
        value: serde_json::Value,
    ) -> Result<(), serde_json::Error> {
        match section {
            PrdSection::Introduction => self.introduction = serde_json::from_value(value)?,
            PrdSection::UserStories => self.user_stories = serde_json::from_value(value)?,
            PrdSection::FunctionalRequirements => {
                self.functional_requirements = serde_json::from_value(value)?
            }
            PrdSection::NonFunctionalRequirements => {
                self.non_functional_requirements = serde_json::from_value(value)?
            }
            PrdSection::Assumptions => self.assumptions = serde_json::from_value(value)?,
            PrdSection::Dependencies => self.dependencies = serde_json::from_value(value)?,
            PrdSection::RisksAndMitigations => {
                self.risks_and_mitigations = serde_json::from_value(value)?
            }
            PrdSection::Timeline => self.timeline = serde_json::from_value(value)?,
            PrdSection::Stakeholders => self.stakeholders = serde_json::from_value(value)?,
            PrdSection::Metrics => self.metrics = serde_json::from_value(value)?,
        }
        Ok(())
    }
}

/// Sections of a PRD that `update_prd` may rewrite. `feature` is fixed
/// once generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrdSection {
    Introduction,
    UserStories,
    FunctionalRequirements,
    NonFunctionalRequirements,
    Assumptions,
    Dependencies,
    RisksAndMitigations,
    Timeline,
    Stakeholders,
    Metrics,
}

impl PrdSection {
    pub const ALL: [PrdSection; 10] = [
        PrdSection::Introduction,
        PrdSection::UserStories,
        PrdSection::FunctionalRequirements,
        PrdSection::NonFunctionalRequirements,
        PrdSection::Assumptions,
        PrdSection::Dependencies,
        PrdSection::RisksAndMitigations,
        PrdSection::Timeline,
        PrdSection::Stakeholders,
        PrdSection::Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrdSection::Introduction => "introduction",
            PrdSection::UserStories => "user_stories",
            PrdSection::FunctionalRequirements => "functional_requirements",
            PrdSection::NonFunctionalRequirements => "non_functional_requirements",
            PrdSection::Assumptions => "assumptions",
            PrdSection::Dependencies => "dependencies",
            PrdSection::RisksAndMitigations => "risks_and_mitigations",
            PrdSection::Timeline => "timeline",
            PrdSection::Stakeholders => "stakeholders",
            PrdSection::Metrics => "metrics",
        }
    }

    /// Whether the section holds a list (as opposed to free text).
    pub fn is_list(&self) -> bool {
        !matches!(self, PrdSection::Introduction | PrdSection::Timeline)
    }
}

impl fmt::Display for PrdSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrdSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PrdSection::ALL
            .into_iter()
            .find(|section| section.as_str() == normalized)
            .ok_or_else(|| format!("invalid PRD section: '{s}'"))
    }
}

/// A persisted, versioned PRD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrdRecord {
    /// Id of the thread that created the document.
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub document: PrdDocument,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
