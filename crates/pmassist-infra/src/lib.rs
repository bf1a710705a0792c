//! Infrastructure layer for pmassist.
//!
//! Implements the ports defined in `pmassist-core`: SQLite repositories,
//! the OpenAI-compatible LLM provider and the `http_request` tool, plus the
//! configuration loader and data directory layout.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod sqlite;
pub mod tool;
