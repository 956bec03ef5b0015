//! Discord message length utilities
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.4.0

/// Discord message content limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Truncate text to fit the message limit, adding ellipsis if needed.
///
/// Streamed partial edits can outgrow the limit mid-generation, so every
/// outbound edit goes through here. UTF-8 safe (never splits mid-character).
pub fn truncate_for_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        text.to_string()
    } else {
        // Find a safe UTF-8 boundary
        let mut end = MESSAGE_LIMIT - 3; // Room for "..."
        while !text.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
