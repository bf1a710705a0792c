//! LLM provider abstractions for pmassist.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `EchoProvider` / `ScriptedProvider`: offline and test providers

pub mod box_provider;
pub mod echo;
pub mod provider;
pub mod scripted;
