//! Business logic and port definitions for pmassist.
//!
//! This crate defines the "ports" (repository, LLM provider and tool traits)
//! that the infrastructure layer implements, plus the agent loop and chat
//! service built on them. It depends only on `pmassist-types`, never on
//! `pmassist-infra` or any database/IO crate.

pub mod agent;
pub mod chat;
pub mod llm;
pub mod repository;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;
