//! Outbound replies, chunked to the platform's message limit.

use loopcast_config::MAX_MESSAGE_LEN;
use loopcast_core::{ChannelId, Gateway};
use tracing::warn;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Prefers line boundaries; a single line longer than the limit is cut
/// at the limit.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset just past the last character that still fits.
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let search_region = &remaining[..limit];
        let split_at = match search_region.rfind('\n') {
            Some(0) | None => limit,
            Some(p) => p,
        };

        let (chunk, rest) = remaining.split_at(split_at);
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = rest.strip_prefix('\n').unwrap_or(rest);
    }

    chunks
}

/// Send `text` to `channel`, splitting it when it is too long.
///
/// Reply failures are logged and otherwise ignored; a command that ran
/// still counts as handled.
pub async fn send_reply(gateway: &dyn Gateway, channel: ChannelId, text: &str) {
    for chunk in split_message(text, MAX_MESSAGE_LEN) {
        if let Err(e) = gateway.send(channel, &chunk).await {
            warn!(channel = %channel, error = %e, "Failed to send reply");
            break;
        }
    }
}
