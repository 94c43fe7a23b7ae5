//! Store Paths
//!
//! Paths are `/`-separated segments (`pages/homepage/components/{key}`).
//! Leading, trailing and doubled slashes are ignored. Segments may not be
//! empty or contain `.`, `#`, `$`, `[` or `]`.

use super::StoreError;
use regex::Regex;
use std::sync::OnceLock;

fn invalid_segment_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.#$\[\]]").expect("static regex"))
}

/// Non-empty segments of `path`
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form: segments joined by single slashes, no leading/trailing slash
pub fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

pub fn join(parent: &str, child: &str) -> String {
    let parent = normalize(parent);
    let child = normalize(child);
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child,
        (_, true) => parent,
        _ => format!("{}/{}", parent, child),
    }
}

/// True when one path is an ancestor of (or equal to) the other
pub fn is_related(a: &str, b: &str) -> bool {
    let mut a = segments(a);
    let mut b = segments(b);
    loop {
        match (a.next(), b.next()) {
            (Some(x), Some(y)) if x == y => continue,
            (Some(_), Some(_)) => return false,
            _ => return true,
        }
    }
}

/// Reject paths with forbidden characters; `allow_root` permits the empty path
pub fn validate(path: &str, allow_root: bool) -> Result<(), StoreError> {
    let mut count = 0;
    for segment in segments(path) {
        if invalid_segment_chars().is_match(segment) {
            return Err(StoreError::invalid_path(
                path,
                format!("segment '{}' contains a forbidden character", segment),
            ));
        }
        count += 1;
    }
    if count == 0 && !allow_root {
        return Err(StoreError::invalid_path(path, "the root cannot be written"));
    }
    Ok(())
}
