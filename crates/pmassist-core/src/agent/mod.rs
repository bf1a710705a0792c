//! Agent execution for pmassist.
//!
//! - `AgentEngine`: traced wrapper around the LLM provider
//! - `SystemPromptBuilder`: per-turn XML-sectioned system prompt
//! - `ModelSelector`: optional complexity-based model routing
//! - `ContextSummarizer`: compacts long histories into a running summary
//! - `AgentRunner`: the tool-calling loop for one turn

pub mod engine;
pub mod prompt;
pub mod runner;
pub mod selector;
pub mod summarizer;
