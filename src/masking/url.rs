//! URL-segment masking (spec §4.4 step 3, §7 design trade-off).
//!
//! Restricted to literal sensitive key names, never patterns, to keep
//! worst-case time linear in the string length: a pattern rule could in
//! principle be pathological, and nothing in spec §4.4 requires scanning
//! every segment against every pattern.

use std::collections::HashSet;

/// If `value` looks like a `/`-separated path, replace the segment
/// following any segment whose lowercased name is a known sensitive key.
/// Strings without `/` are returned unchanged.
pub fn mask_sensitive_segments(value: &str, literal_keys: &HashSet<String>, mask: &str) -> String {
    if !value.contains('/') || literal_keys.is_empty() {
        return value.to_string();
    }

    let mut segments: Vec<String> = value.split('/').map(str::to_string).collect();
    let mut i = 0;
    while i < segments.len() {
        if literal_keys.contains(&segments[i].to_ascii_lowercase()) && i + 1 < segments.len() {
            segments[i + 1] = mask.to_string();
            i += 2;
        } else {
            i += 1;
        }
    }
    segments.join("/")
}
