//! Message text helpers

/// Discord's per-message character limit.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Split `text` into chunks of at most `limit` characters.
///
/// Breaks on line boundaries where it can and only cuts inside a line that
/// is longer than `limit` on its own. Whitespace-only chunks are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end_matches('\n').to_string())
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

/// Whether `text` mentions `name`, ignoring case.
pub fn mentions_name(text: &str, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && text.to_lowercase().contains(&name.to_lowercase())
}

/// Messages addressed to other bots' command parsers.
pub fn is_command(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('.') || text.starts_with('/')
}

/// The bot's own messages and other bots' are never answered.
pub fn is_ignored_author(author_id: u64, author_is_bot: bool, own_id: u64) -> bool {
    author_is_bot || author_id == own_id
}

/// Chat lines are single lines in history.
pub fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}
