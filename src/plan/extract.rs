//! Locating the structured-data block inside free-form oracle output

use regex::Regex;

const FENCE_PATTERN: &str = r"```(?:json|JSON)?[ \t]*\r?\n?([\s\S]*?)\r?\n?```";

/// Extract the first top-level JSON object from oracle text.
///
/// Order: a Claude `{"result": "..."}` envelope is unwrapped first, then a
/// fenced block is preferred, then the whole string, then the outermost
/// balanced braces.
pub fn extract_json(s: &str) -> Option<String> {
    let trimmed = s.trim();

    // Claude CLI wraps the final text in {"result": "...", ...}
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(inner) = value.get("result").and_then(|r| r.as_str()) {
            if value.get("type").is_some() || value.get("session_id").is_some() {
                return extract_json(inner);
            }
        }
    }

    if let Ok(re) = Regex::new(FENCE_PATTERN) {
        for cap in re.captures_iter(s) {
            let Some(body) = cap.get(1) else { continue };
            let candidate = body.as_str().trim();
            if candidate.starts_with('{')
                && serde_json::from_str::<serde_json::Value>(candidate).is_ok()
            {
                return Some(candidate.to_string());
            }
        }
    }

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    let mut search_from = 0;
    while let Some(offset) = s[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&s[start..]) {
            let candidate = &s[start..start + end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate.to_string());
            }
        }
        search_from = start + 1;
    }

    None
}

/// Byte length of the balanced `{...}` block at the start of `s`, skipping
/// braces inside string literals
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
