/// Canonical cache key and lookup path segment for a country name.
///
/// Case-insensitive; spaces and hyphens both become underscores, so
/// `"United States"`, `"united-states"` and `"UNITED_STATES"` collide.
pub fn normalize_country(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Whether a normalized key is safe to splice into a remote path.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("United States", "united_states")]
    #[case("united-states", "united_states")]
    #[case("UNITED_STATES", "united_states")]
    #[case("  Sri Lanka ", "sri_lanka")]
    #[case("Guinea-Bissau", "guinea_bissau")]
    #[case("türkiye", "türkiye")]
    fn test_normalize_country(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_country(input), expected);
    }

    #[rstest]
    #[case("united_states", true)]
    #[case("türkiye", true)]
    #[case("", false)]
    #[case("../secrets", false)]
    #[case("a/b", false)]
    #[case("x.json", false)]
    fn test_is_valid_key(#[case] key: &str, #[case] expected: bool) {
        assert_eq!(is_valid_key(key), expected);
    }
}
