//! Token helpers for the keyword-scan grammar.
//!
//! Both command surfaces (engine wire and observer wire) separate
//! tokens with whitespace, recognize keywords case-insensitively and
//! let values run until the next keyword, which permits multi-word
//! names and paths.

/// Splits a wire line into its tokens.
#[must_use]
pub fn split_tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Returns the index of the first token matching `keyword`
/// case-insensitively.
#[must_use]
pub fn keyword_index(tokens: &[&str], keyword: &str) -> Option<usize> {
    tokens.iter().position(|t| t.eq_ignore_ascii_case(keyword))
}

/// Joins `tokens[start..end]` back into a value string.
///
/// Out-of-range bounds are clamped, so callers can pass "up to the next
/// keyword or the end" without bounds juggling.
#[must_use]
pub fn join_tokens(tokens: &[&str], start: usize, end: usize) -> String {
    let end = end.min(tokens.len());
    if start >= end {
        return String::new();
    }
    tokens[start..end].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_collapses_whitespace() {
        assert_eq!(
            split_tokens("  setoption   name  Depth "),
            vec!["setoption", "name", "Depth"]
        );
        assert!(split_tokens("   ").is_empty());
    }

    #[test]
    fn keyword_lookup_ignores_case() {
        let tokens = split_tokens("setplayers PLAYER1 3 player2 4");
        assert_eq!(keyword_index(&tokens, "player1"), Some(1));
        assert_eq!(keyword_index(&tokens, "player2"), Some(3));
        assert_eq!(keyword_index(&tokens, "player3"), None);
    }

    #[test]
    fn join_clamps_bounds() {
        let tokens = split_tokens("name Search Depth value 4");
        assert_eq!(join_tokens(&tokens, 1, 3), "Search Depth");
        assert_eq!(join_tokens(&tokens, 4, 99), "4");
        assert_eq!(join_tokens(&tokens, 9, 2), "");
    }
}
