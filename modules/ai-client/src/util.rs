/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a markdown code fence (with or without a language tag) from a reply.
///
/// Chat models occasionally wrap even one-token answers in a fence, e.g.
/// "```\n7\n```" or "```text\n7\n```".
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end_matches("```").trim()
}
