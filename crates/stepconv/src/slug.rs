//! Filesystem-safe output names.

use unicode_normalization::UnicodeNormalization;

/// Name used when nothing of the input survives sanitizing.
pub const DEFAULT_FALLBACK: &str = "converted";

/// Slug of `name` with the default fallback.
///
/// ```
/// assert_eq!(stepconv::slugify("Bracket Mount v2"), "bracket-mount-v2");
/// assert_eq!(stepconv::slugify("日本語"), "converted");
/// ```
pub fn slugify(name: &str) -> String {
    slugify_with_fallback(name, DEFAULT_FALLBACK)
}

/// Slug of `name`: ASCII transliteration by compatibility decomposition,
/// spaces to hyphens, lower case, only `[a-z0-9._-]`, no repeated or
/// surrounding hyphens. Returns `fallback` when nothing is left.
pub fn slugify_with_fallback(name: &str, fallback: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let kept = ascii
        .replace(' ', "-")
        .to_ascii_lowercase()
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-'))
        .fold(String::with_capacity(ascii.len()), |mut slug, c| {
            if !(c == '-' && slug.ends_with('-')) {
                slug.push(c);
            }
            slug
        });
    match kept.trim_matches('-') {
        "" => fallback.to_string(),
        slug => slug.to_string(),
    }
}
