//! Identifier rules shared by every named construct.
//!
//! Names follow an NCName-like pattern: a letter first, then letters,
//! digits or underscores, optionally continued by `-`-separated segments.
//! Double dashes, leading digits, trailing dashes, periods and whitespace
//! are rejected. Lookup is case-insensitive, output is case-preserving.

/// Checks a name against the identifier rules.
pub fn is_valid_name(name: &str) -> bool {
    let mut segments = name.split('-');
    let first = match segments.next() {
        Some(s) => s,
        None => return false,
    };
    if !starts_with_letter(first) || !is_word(first) {
        return false;
    }
    segments.all(|s| !s.is_empty() && is_word(s))
}

fn starts_with_letter(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_word(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The case-insensitive key used for every lookup.
pub fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}
