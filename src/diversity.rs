//! Keyword fingerprints used to flag near-duplicate problem statements.
//!
//! The warning is advisory: similar ideas are still inserted, the warning
//! lands in `moderation_notes` for the moderator to weigh.

/// How many recent ideas a new draft is compared against.
pub const RECENT_WINDOW: usize = 20;

const MAX_KEYWORDS: usize = 10;
const MIN_TOKEN_LEN: usize = 4;
const SIMILARITY_THRESHOLD: f64 = 50.0;

/// Extracts up to ten unique lowercase tokens longer than four characters,
/// in order of first occurrence.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for raw in text.split_whitespace() {
        let token: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        if token.len() > MIN_TOKEN_LEN && !seen.contains(&token) {
            seen.push(token);
            if seen.len() == MAX_KEYWORDS {
                break;
            }
        }
    }
    seen
}

/// Compares a draft's keywords against recent idea fingerprints. Returns a
/// human-readable warning for the first recent idea sharing more than half of
/// the draft's keywords, scanning no further once one matches.
pub fn similarity_warning(new_keywords: &[String], recent: &[Vec<String>]) -> Option<String> {
    if new_keywords.is_empty() {
        return None;
    }
    for fingerprint in recent.iter().take(RECENT_WINDOW) {
        if fingerprint.is_empty() {
            continue;
        }
        let overlap = new_keywords
            .iter()
            .filter(|k| fingerprint.contains(k))
            .count();
        let similarity = overlap as f64 / new_keywords.len() as f64 * 100.0;
        if similarity > SIMILARITY_THRESHOLD {
            return Some(format!("{similarity:.0}% similar to recent idea"));
        }
    }
    None
}
