const OPENING_TAG: &str = "<title>";
const CLOSING_TAG: &str = "</title>";

/// Extracts the title of an HTML document
///
/// Tags are matched case-insensitively, but the returned text keeps the casing
/// of the original body. Returns an empty string if the document has no
/// complete `<title>...</title>` pair. No entity decoding or trimming is done.
pub fn extract_title(body: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with the original body
    let lowered = body.to_ascii_lowercase();

    let Some(start) = lowered.find(OPENING_TAG).map(|pos| pos + OPENING_TAG.len()) else {
        return String::new();
    };
    let Some(end) = lowered[start..].find(CLOSING_TAG).map(|pos| start + pos) else {
        return String::new();
    };

    ::log::trace!("Found title between bytes {} and {}", start, end);
    body[start..end].to_string()
}

/// Extracts the title, mapping a missing or empty title to `None`
pub fn extract_optional_title(body: &str) -> Option<String> {
    let title = extract_title(body);
    if title.is_empty() { None } else { Some(title) }
}
