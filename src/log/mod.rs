use tracing_subscriber::EnvFilter;

use crate::prompt;
use crate::wire::{ChatMessage, ContentPart, MessageContent};

const PREVIEW_CHARS: usize = 80;

/// Install the global subscriber. `RUST_LOG` wins over the debug flag.
pub fn init(debug: bool) {
    let fallback = if debug { "sitegen=debug,tower_http=debug" } else { "sitegen=info,tower_http=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

pub fn prompt_summary(messages: &[ChatMessage], model: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for (i, m) in messages.iter().enumerate() {
        let text = prompt::flatten_content(&m.content);
        let images = match &m.content {
            MessageContent::Parts(parts) => parts.iter().filter(|p| matches!(p, ContentPart::ImageUrl { .. })).count(),
            MessageContent::Text(_) => 0,
        };
        tracing::debug!(
            model,
            turn = i,
            role = ?m.role,
            chars = text.len(),
            images,
            "prompt: {}",
            preview(&text, PREVIEW_CHARS)
        );
    }
}

pub fn completion_summary(kind: &str, model: &str, chars: usize, seconds: f64) {
    tracing::info!(kind, model, chars, seconds = %format!("{seconds:.2}"), "generation finished");
}

pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
