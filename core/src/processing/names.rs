//! Source-name canonicalization.
//!
//! Observing logs record the same pulsar under inconsistent spellings:
//! lower-case survey prefixes, `PSR` tags, stray whitespace, and B1950
//! designations for sources better known by their J2000 names.

/// Preferred J2000 names for sources commonly recorded under their B1950
/// designations.
const PREFERRED_NAMES: &[(&str, &str)] = &[
    ("B0329+54", "J0332+5434"),
    ("B0355+54", "J0358+5413"),
    ("B0531+21", "J0534+2200"),
    ("B0833-45", "J0835-4510"),
    ("B1133+16", "J1136+1551"),
    ("B1919+21", "J1921+2153"),
    ("B1937+21", "J1939+2134"),
];

/// Resolve a raw source-name string to its preferred form.
///
/// Total: unknown names pass through cleaned. The survey prefix (B/J) is
/// upper-cased; a leading `PSR` tag and all whitespace are stripped.
pub fn preferred_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("PSR")
        .or_else(|| trimmed.strip_prefix("psr"))
        .unwrap_or(trimmed);
    let mut cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.starts_with('b') || cleaned.starts_with('j') {
        cleaned[..1].make_ascii_uppercase();
    }
    for (b1950, j2000) in PREFERRED_NAMES {
        if cleaned == *b1950 {
            return (*j2000).to_string();
        }
    }
    cleaned
}
