const REDACTED: &str = "[REDACTED]";

const SENSITIVE_PATTERNS: &[&str] = &[
    "appid=",
    "access_key=",
    "api_key=",
    "api_key:",
    "apikey=",
    "apikey:",
    "token=",
    "token:",
    "secret=",
    "secret:",
    "password=",
    "password:",
    "authorization=",
    "authorization:",
];

/// Masks credential values that upstream errors tend to echo back
/// (query strings, header dumps).
pub fn redact_sensitive(input: &str) -> String {
    let mut output = input.to_string();
    for pattern in SENSITIVE_PATTERNS {
        output = redact_after_pattern(&output, pattern);
    }
    redact_bearer_token(&output)
}

fn redact_after_pattern(input: &str, pattern: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let is_authorization_pattern = pattern.starts_with("authorization");
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(pattern) {
        let start = cursor + found;
        let value_start = skip_whitespace(input, start + pattern.len());
        let (redaction_start, value_end) = if is_authorization_pattern
            && input[value_start..]
                .to_ascii_lowercase()
                .starts_with("bearer ")
        {
            let bearer_start = value_start + "bearer ".len();
            (bearer_start, find_value_end(input, bearer_start))
        } else {
            (value_start, find_value_end(input, value_start))
        };

        output.push_str(&input[cursor..redaction_start]);
        if redaction_start < value_end {
            output.push_str(REDACTED);
        }
        cursor = value_end;
    }

    output.push_str(&input[cursor..]);
    output
}

fn redact_bearer_token(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let pattern = "bearer ";
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(pattern) {
        let value_start = cursor + found + pattern.len();
        output.push_str(&input[cursor..value_start]);

        if input[value_start..].starts_with(REDACTED) {
            output.push_str(REDACTED);
            cursor = value_start + REDACTED.len();
            continue;
        }

        let value_end = find_value_end(input, value_start);
        if value_start < value_end {
            output.push_str(REDACTED);
        }
        cursor = value_end;
    }

    output.push_str(&input[cursor..]);
    output
}

fn skip_whitespace(input: &str, mut index: usize) -> usize {
    let bytes = input.as_bytes();
    while index < bytes.len() && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}

fn find_value_end(input: &str, mut index: usize) -> usize {
    let bytes = input.as_bytes();
    while index < bytes.len() {
        let byte = bytes[index];
        if byte.is_ascii_whitespace()
            || matches!(byte, b'&' | b',' | b';' | b')' | b']' | b'}' | b'"')
        {
            break;
        }
        index += 1;
    }
    index
}
