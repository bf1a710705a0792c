//! Chat turns, thread ownership and history.
//!
//! `ChatService` is the entry point used by the HTTP layer and the CLI.
//! `ThreadLocks` serializes turns on the same thread.

pub mod locks;
pub mod service;
