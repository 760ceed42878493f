use once_cell::sync::Lazy;
use regex::Regex;

/// Used when sanitising leaves nothing behind.
pub const SANITIZED_FALLBACK: &str = "video";

/// Used when the tool could not tell us a filename at all.
pub const DEFAULT_FILENAME: &str = "video.mp4";

const MAX_FILENAME_CHARS: usize = 120;

static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn sanitize_filename(name: &str) -> String {
    let replaced = ILLEGAL_CHARS.replace_all(name, "_");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let cleaned = collapsed.trim();

    if cleaned.is_empty() {
        return SANITIZED_FALLBACK.to_string();
    }

    cleaned.chars().take(MAX_FILENAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_illegal_characters_and_keeps_extension() {
        let sanitized = sanitize_filename("My Video: Part 1/2.mp4");
        assert_eq!(sanitized, "My Video_ Part 1_2.mp4");
        assert!(sanitized.chars().count() <= MAX_FILENAME_CHARS);
    }

    #[test]
    fn runs_of_illegal_characters_become_one_underscore() {
        assert_eq!(sanitize_filename(r#"a<>|"b\\/c?*.webm"#), "a_b_c_.webm");
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        assert_eq!(sanitize_filename("  Live \t at\n\nWembley   .mp4 \n"), "Live at Wembley .mp4");
    }

    #[test]
    fn long_names_are_capped_by_characters() {
        let name = "é".repeat(300);
        let sanitized = sanitize_filename(&name);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn blank_result_falls_back() {
        assert_eq!(sanitize_filename("   \n "), SANITIZED_FALLBACK);
        assert_eq!(sanitize_filename(""), SANITIZED_FALLBACK);
    }
}
