use derive_more::Display;
use ghstats_github::models::Visibility;

/// Store key for one user at one visibility.
///
/// Usernames are case-insensitive upstream, so the key is lowercased. Public
/// data lives under the bare username; other visibilities get their own tagged
/// entry so private repositories never leak into a public view.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(username: &str, visibility: Visibility) -> Self {
        let username = username.trim().to_lowercase();
        match visibility {
            Visibility::Public => Self(username),
            other => Self(format!("{username}:{other}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Octocat", Visibility::Public, "octocat")]
    #[case(" octocat ", Visibility::Public, "octocat")]
    #[case("Octocat", Visibility::Private, "octocat:private")]
    #[case("OCTOCAT", Visibility::All, "octocat:all")]
    fn test_cache_key(#[case] username: &str, #[case] visibility: Visibility, #[case] expected: &str) {
        assert_eq!(CacheKey::new(username, visibility).as_str(), expected);
    }
}
