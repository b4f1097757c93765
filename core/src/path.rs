//! Path template substitution and URL escaping.

/// Percent-encode a value for use in a URL path or form body.
///
/// Unreserved characters (`A-Z`, `a-z`, `0-9`, `-`, `_`, `.`, `~`) pass
/// through, space becomes `+`, and every other byte of the UTF-8 encoding is
/// written as `%XX`.
pub fn escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for b in input.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(char::from(b))
            }
            b' ' => result.push('+'),
            _ => result.push_str(&format!("%{b:02X}")),
        }
    }
    result
}

/// Substitute placeholders in a route path template.
///
/// Every literal occurrence of each placeholder key is replaced by the
/// escaped value, in the order the pairs are given. Keys are matched as plain
/// text, so callers should use non-overlapping tokens such as `{id}`.
/// Placeholders without a replacement stay in the path verbatim. Empty keys
/// are skipped.
pub fn resolve_path(template: &str, replacements: &[(&str, &str)]) -> String {
    replacements
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .fold(template.to_string(), |path, (key, value)| {
            path.replace(*key, &escape(value))
        })
}
