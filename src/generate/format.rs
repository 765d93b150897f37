//! Reply formatting: the completion marker and length budget.
//!
//! Every delivered text ends with the `#ELI5` marker, including the apology
//! path, so downstream consumers can rely on it unconditionally.

/// The marker every generated reply must end with.
pub const COMPLETION_MARKER: &str = "#ELI5";

/// Default length budget for a reply (tweet-sized).
pub const DEFAULT_MAX_LENGTH: usize = 280;

/// Normalizes a raw generation into a marker-terminated reply within budget.
///
/// - Appends the marker when the text does not already end with it,
///   truncating the body first if the combination would not fit.
/// - Texts already ending with the marker are truncated only if over budget,
///   in which case the tail is replaced with `… #ELI5`.
pub fn format_response(raw: &str, max_length: usize) -> String {
    let marker_cost = COMPLETION_MARKER.len() + 1; // " #ELI5"
    let mut text = raw.trim().to_string();

    if !text.ends_with(COMPLETION_MARKER) {
        if text.len() + marker_cost > max_length {
            let allowed = max_length.saturating_sub(marker_cost);
            text = truncate_at_char_boundary(&text, allowed).trim_end().to_string();
        }
        text.push(' ');
        text.push_str(COMPLETION_MARKER);
    }

    if text.len() > max_length {
        let allowed = max_length.saturating_sub(marker_cost + '…'.len_utf8());
        let mut clipped = truncate_at_char_boundary(&text, allowed)
            .trim_end()
            .to_string();
        clipped.push('…');
        clipped.push(' ');
        clipped.push_str(COMPLETION_MARKER);
        text = clipped;
    }

    text
}

/// The deterministic reply used when every generation strategy has failed.
///
/// Carries the marker so the formatting invariant holds on the failure path.
pub fn apology(subject: &str) -> String {
    format!("Sorry, I couldn't explain '{subject}' right now. Try again later! {COMPLETION_MARKER}")
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
