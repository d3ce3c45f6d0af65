//! Shared query parameter helpers for API handlers.

/// Split a comma-separated id list (`?student_ids=a,b,c`).
pub fn split_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
