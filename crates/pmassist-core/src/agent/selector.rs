//! Per-turn model routing by query complexity.
//!
//! When routing is configured, the base model classifies the latest query
//! as simple, medium or complex and the matching model runs the turn. Any
//! failure falls back to the default model.

use std::fmt;

use tracing::{debug, warn};

use pmassist_types::config::RoutingConfig;
use pmassist_types::llm::CompletionRequest;

use super::engine::AgentEngine;

const CLASSIFIER_PROMPT: &str = "You are a query complexity analyst. Classify the user query \
into one of three levels: simple, medium, or complex.\n\n\
Rules:\n\
- simple: direct questions or tasks solvable in one step (e.g. short factual Q&A, simple fix).\n\
- medium: requires reasoning, multi-step logic, or structured explanation (e.g. refactor, analysis request).\n\
- complex: involves long-form generation, system design, PRD creation, or high ambiguity.\n\n\
Answer with exactly one word: simple, medium, or complex.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// First word of `answer` naming a complexity level, case-insensitive.
/// Also accepts JSON answers such as `{"complexity": "Medium"}`.
pub fn parse_complexity(answer: &str) -> Option<Complexity> {
    answer
        .split(|c: char| !c.is_ascii_alphabetic())
        .find_map(|word| match word.to_ascii_lowercase().as_str() {
            "simple" => Some(Complexity::Simple),
            "medium" => Some(Complexity::Medium),
            "complex" => Some(Complexity::Complex),
            _ => None,
        })
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    default_model: String,
    routing: Option<RoutingConfig>,
}

impl ModelSelector {
    pub fn new(default_model: String, routing: Option<RoutingConfig>) -> Self {
        Self {
            default_model,
            routing,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Model to use for a turn whose latest user message is `query`.
    pub async fn select(&self, engine: &AgentEngine, query: &str) -> String {
        let Some(routing) = &self.routing else {
            return self.default_model.clone();
        };

        let request = CompletionRequest::simple(
            &self.default_model,
            CLASSIFIER_PROMPT,
            query.to_string(),
            16,
        );
        let answer = match engine.complete(&request, "classify").await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, "Complexity classification failed, using default model");
                return self.default_model.clone();
            }
        };

        match parse_complexity(&answer) {
            Some(level) => {
                let model = match level {
                    Complexity::Simple => &routing.simple,
                    Complexity::Medium => &routing.medium,
                    Complexity::Complex => &routing.complex,
                };
                debug!(complexity = %level, model = %model, "Model selected");
                model.clone()
            }
            None => {
                warn!(answer = %answer, "Unparseable complexity answer, using default model");
                self.default_model.clone()
            }
        }
    }
}
