//! Generator input assembly: the memory turn, the recent window and the
//! summarization request.

use brain_core::HistoryMessage;
use database::{Message, MessageRole};

/// Tag opening the synthetic turn that carries long-term memory.
pub const MEMORY_TAG: &str = "[Conversation memory]";

/// Instruction for the summarization call.
pub const SUMMARIZER_PERSONA: &str = "You maintain the long-term memory of a private support conversation. \
You write in the third person about the user, in plain prose without lists or headings.";

/// Convert a stored turn to generator input.
pub fn to_history(message: &Message) -> HistoryMessage {
    match message.role {
        MessageRole::User => HistoryMessage::user(message.content.as_str()),
        MessageRole::Assistant => HistoryMessage::assistant(message.content.as_str()),
    }
}

/// Memory turn (when there is a summary) followed by the recent window, oldest first.
pub fn build_context(summary: Option<&str>, recent: &[Message]) -> Vec<HistoryMessage> {
    let mut messages = Vec::with_capacity(recent.len() + 1);
    if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(HistoryMessage::user(format!(
            "{MEMORY_TAG}\nWhat you already know about this person from earlier conversations:\n{summary}"
        )));
    }
    messages.extend(recent.iter().map(to_history));
    messages
}

/// Ask the generator to merge `turns` into the existing summary.
pub fn summary_request(existing: Option<&str>, turns: &[Message], max_sentences: usize) -> String {
    let mut request = String::new();

    match existing.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => {
            request.push_str("Current memory:\n");
            request.push_str(summary);
            request.push_str("\n\n");
        }
        None => request.push_str("There is no memory yet.\n\n"),
    }

    request.push_str("Conversation excerpt to fold in:\n");
    for turn in turns {
        let speaker = match turn.role {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        };
        request.push_str(speaker);
        request.push_str(": ");
        request.push_str(collapse_lines(&turn.content).as_str());
        request.push('\n');
    }

    request.push_str(&format!(
        "\nRewrite the memory so it keeps the themes already recorded, adds what is new in the excerpt \
and drops details that no longer matter. Use between 5 and {max_sentences} sentences. \
Reply with the memory text only."
    ));
    request
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
