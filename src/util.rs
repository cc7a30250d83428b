/// Maximum number of characters of raw validator output kept in diagnostics
pub const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Truncate text to `len` characters, noting how much was dropped
pub fn truncate_chars(content: &str, len: usize) -> String {
    let total = content.chars().count();
    if total <= len {
        return content.to_string();
    }

    let mut result: String = content.chars().take(len).collect();
    result.push_str(&format!("\n---\ntruncated [{}/{} chars]", len, total));
    result
}
