/// Normalize a raw table or column name into a legal identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, leading and trailing
/// underscores are dropped, and an empty result becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
