use crate::database_ops::steam::provider::CatalogEntry;

/// Case-insensitive substrings that mark a catalog entry as not worth a detail lookup.
pub const EXCLUDED_KEYWORDS: [&str; 2] = ["demo", "bundle"];

/// True when the display name is present and carries none of the excluded keywords.
pub fn is_candidate_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let lowered = name.to_lowercase();
    !EXCLUDED_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Selects the app ids eligible for detail retrieval, preserving catalog order.
pub fn eligible_app_ids(entries: &[CatalogEntry]) -> Vec<i64> {
    entries
        .iter()
        .filter(|e| is_candidate_name(&e.name))
        .map(|e| e.appid)
        .collect()
}
