//! Thread CLI commands: list a user's threads, print a thread's history.

use anyhow::Result;
use console::style;

use pmassist_types::llm::MessageRole;
use pmassist_types::thread::HistoryMessage;

use crate::state::AppState;

/// Longest message preview printed per history line.
const PREVIEW_CHARS: usize = 240;

/// `pmassist threads <user_id>`
pub async fn list_threads(
    state: &AppState,
    user_id: &str,
    limit: i64,
    offset: i64,
    json: bool,
) -> Result<()> {
    let threads = state
        .chat_service
        .list_threads(user_id, limit, offset)
        .await?;

    if json {
        let out = serde_json::json!({ "user_id": user_id, "threads": threads });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!();
        println!(
            "  {} No threads found for '{}'.",
            style("i").blue().bold(),
            style(user_id).cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("  Threads for '{}'", style(user_id).cyan().bold());
    println!();
    for thread in &threads {
        println!(
            "  {:<40} {}  {}",
            style(&thread.thread_id).cyan(),
            style(thread.updated_at.format("%Y-%m-%d %H:%M")).dim(),
            style(format!("{} checkpoints", thread.checkpoint_count)).dim()
        );
    }
    println!();
    println!(
        "  {} thread{}",
        style(threads.len()).bold(),
        if threads.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// `pmassist history <thread_id>`
pub async fn show_history(
    state: &AppState,
    thread_id: &str,
    user_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let history = state.chat_service.history(thread_id, user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!();
    println!("  Thread '{}'", style(&history.thread_id).cyan().bold());
    println!();
    for message in &history.messages {
        println!("  {}", format_message(message));
    }
    println!();
    match &history.prd {
        Some(prd) => println!(
            "  {} PRD '{}' (version {})",
            style("✓").green(),
            style(&prd.document.feature).cyan(),
            prd.version
        ),
        None => println!("  {} No PRD yet", style("i").blue()),
    }
    println!();
    Ok(())
}

fn format_message(message: &HistoryMessage) -> String {
    let role = match message.role {
        MessageRole::User => style("user").green().bold(),
        MessageRole::Assistant => style("assistant").cyan().bold(),
        MessageRole::Tool => style("tool").yellow(),
        MessageRole::System => style("system").dim(),
    };

    let body = if message.tool_calls.is_empty() {
        preview(&message.content)
    } else {
        format!("calls {}", message.tool_calls.join(", "))
    };

    match &message.name {
        Some(name) => format!("{role} [{name}]: {body}"),
        None => format!("{role}: {body}"),
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
