/// Canonical comparable form of a label or prediction: lowercase, then keep
/// only `a-z` and `0-9`.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|character| matches!(character, 'a'..='z' | '0'..='9'))
        .collect()
}
