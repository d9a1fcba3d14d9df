//! ---
//! mqx_section: "02-exchange-routing"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Static binding table and exchange routing rules."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
//! Topic wildcard matching over dot-delimited routing keys.

/// Match a routing key against a topic binding pattern.
///
/// `*` matches exactly one segment, `#` matches zero or more segments.
/// Matching is case-sensitive and segment-exact: wildcards never match a
/// partial segment.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = split_segments(pattern);
    let key: Vec<&str> = split_segments(routing_key);
    matches_from(&pattern, &key)
}

fn split_segments(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split('.').collect()
    }
}

fn matches_from(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some(&"#") => {
            // `#` absorbs zero segments, or one segment and stays in play.
            matches_from(&pattern[1..], key)
                || (!key.is_empty() && matches_from(pattern, &key[1..]))
        }
        Some(&"*") => !key.is_empty() && matches_from(&pattern[1..], &key[1..]),
        Some(segment) => match key.first() {
            Some(head) => segment == head && matches_from(&pattern[1..], &key[1..]),
            None => false,
        },
    }
}
