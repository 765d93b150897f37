//! Subject extraction from raw mention text.
//!
//! A mention like `@eli5professor explain gravity #eli5` carries the subject
//! between the trigger handle and any trailing mention/hashtag noise. The
//! extractor is a pure function over the text:
//!
//! 1. Remove every occurrence of the trigger handle (`@name`, case-insensitive,
//!    word-bounded) and platform mention tokens (`<@123>`, `<@!123>`).
//! 2. Remove the marker hashtag (case-insensitive).
//! 3. Trim leading whitespace and punctuation.
//! 4. Cut at the first remaining `@` or `#` — whatever follows the subject is
//!    somebody else's conversation.
//!
//! An empty result means the mention is unparseable and is skipped upstream.

/// Extracts subjects for one configured trigger handle and marker tag.
#[derive(Debug, Clone)]
pub struct TopicExtractor {
    /// The bot's handle, without the `@`.
    handle: String,

    /// The trigger hashtag, without the `#` (e.g. `eli5`).
    marker: String,
}

impl TopicExtractor {
    pub fn new(handle: impl Into<String>, marker: impl Into<String>) -> Self {
        TopicExtractor {
            handle: handle.into(),
            marker: marker.into(),
        }
    }

    /// Returns the subject phrase, or `None` when nothing usable remains.
    pub fn extract(&self, text: &str) -> Option<String> {
        let mut remaining = strip_token_ci(text, &format!("@{}", self.handle));
        remaining = strip_platform_mentions(&remaining);
        remaining = strip_token_ci(&remaining, &format!("#{}", self.marker));

        let trimmed = remaining
            .trim_start_matches(|c: char| c.is_whitespace() || ":,-.@!#".contains(c))
            .trim();

        // Stop at another mention or hashtag, if any follows the subject
        let subject = match trimmed.find(['@', '#']) {
            Some(pos) => trimmed[..pos].trim(),
            None => trimmed,
        };

        if subject.is_empty() {
            None
        } else {
            Some(subject.to_string())
        }
    }
}

/// Removes every word-bounded, case-insensitive occurrence of `token`.
///
/// Word-bounded on the right: `@bot` must not eat the prefix of `@bottle`.
fn strip_token_ci(text: &str, token: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while !rest.is_empty() {
        match find_token_ci(rest, token) {
            Some(pos) => {
                result.push_str(&rest[..pos]);
                rest = &rest[pos + token.len()..];
            }
            None => {
                result.push_str(rest);
                break;
            }
        }
    }
    result
}

/// True when `token` occurs word-bounded and case-insensitively in `text`.
///
/// Shared with the listener's trigger filter.
pub(crate) fn contains_token_ci(text: &str, token: &str) -> bool {
    find_token_ci(text, token).is_some()
}

fn find_token_ci(text: &str, token: &str) -> Option<usize> {
    let mut search = 0;
    while search < text.len() {
        let candidate_start = text[search..]
            .char_indices()
            .find(|(offset, _)| {
                text[search + offset..]
                    .get(..token.len())
                    .is_some_and(|slice| slice.eq_ignore_ascii_case(token))
            })
            .map(|(offset, _)| search + offset)?;

        // Right word boundary: end of string or a non-alphanumeric character
        let after = candidate_start + token.len();
        let bounded = text[after..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if bounded {
            return Some(candidate_start);
        }
        search = candidate_start + 1;
    }
    None
}

/// Removes Discord-style raw mention tokens: `<@123>` and `<@!123>`.
fn strip_platform_mentions(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let tail = &rest[start + 2..];
        let digits = tail.strip_prefix('!').unwrap_or(tail);
        let digit_len = digits.chars().take_while(|c| c.is_ascii_digit()).count();
        let bang = tail.len() - digits.len();

        if digit_len > 0 && digits[digit_len..].starts_with('>') {
            result.push_str(&rest[..start]);
            rest = &rest[start + 2 + bang + digit_len + 1..];
        } else {
            result.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
        }
    }
    result.push_str(rest);
    result
}
