//! Shared utility functions for the protobuilder crate.

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the first balanced object; braces inside
/// string literals are ignored.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + i + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Slice of `text` from the first `<tag` to the end of the last `</tag>`.
///
/// When the opening tag is present but the closing one is not, everything
/// from the opening tag on is returned so the caller's parser can report
/// the truncation.
pub fn extract_tagged_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)?;
    match text.rfind(&close) {
        Some(end) if end >= start => Some(&text[start..end + close.len()]),
        _ => Some(&text[start..]),
    }
}

/// Lowercase, dash-separated form of `text` suitable for a directory name.
/// At most `max_len` characters; `"prototype"` when nothing usable remains.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= max_len {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "prototype".to_string()
    } else {
        slug.to_string()
    }
}
