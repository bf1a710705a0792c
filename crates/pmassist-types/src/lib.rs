//! Shared domain types for pmassist.
//!
//! This crate contains the domain types used across the pmassist service:
//! threads and checkpoints, requirements documents, todos, memories, chat
//! events, LLM request shapes, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! schemars, secrecy.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod prd;
pub mod thread;
pub mod todo;
