use crate::models::{CountryRanking, GlobalUser};
use std::collections::HashMap;
use std::sync::Arc;

/// Every cached user across every cached country, ordered by public
/// contributions.
///
/// Always rebuilt from scratch. Countries are visited in key order and the
/// sort is stable, so equal counts keep a deterministic order. A login that
/// appears in several countries resolves to its first (highest) position.
#[derive(Debug, Clone, Default)]
pub(crate) struct GlobalIndex {
    users: Vec<GlobalUser>,
    positions: HashMap<String, usize>,
}

impl GlobalIndex {
    pub(crate) fn build(cache: &HashMap<String, Arc<CountryRanking>>) -> Self {
        let mut countries: Vec<(&String, &Arc<CountryRanking>)> = cache.iter().collect();
        countries.sort_by(|a, b| a.0.cmp(b.0));
        let mut users: Vec<GlobalUser> = countries
            .into_iter()
            .flat_map(|(country, ranking)| {
                ranking.users.iter().map(move |user| GlobalUser {
                    login: user.login.clone(),
                    country: country.clone(),
                    public_contributions: user.public_contributions,
                })
            })
            .collect();
        users.sort_by(|a, b| b.public_contributions.cmp(&a.public_contributions));

        let mut positions = HashMap::with_capacity(users.len());
        for (position, user) in users.iter().enumerate() {
            positions.entry(user.login.to_lowercase()).or_insert(position);
        }
        Self { users, positions }
    }

    /// 1-based rank of `login`, compared case-insensitively.
    pub(crate) fn rank_of(&self, login: &str) -> Option<usize> {
        self.positions.get(&login.to_lowercase()).map(|position| position + 1)
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    /// The first `limit` entries; everything when `limit` is `0` or exceeds
    /// the index.
    pub(crate) fn top(&self, limit: usize) -> Vec<GlobalUser> {
        let limit = if limit == 0 { self.users.len() } else { limit.min(self.users.len()) };
        self.users[..limit].to_vec()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CountryUser;
    use time::OffsetDateTime;

    pub(crate) fn user(login: &str, public_contributions: u64) -> CountryUser {
        CountryUser { login: login.to_string(), public_contributions, ..Default::default() }
    }

    fn ranking(country: &str, users: Vec<CountryUser>) -> (String, Arc<CountryRanking>) {
        let ranking = CountryRanking { country: country.to_string(), users, fetched_at: OffsetDateTime::UNIX_EPOCH };
        (country.to_string(), Arc::new(ranking))
    }

    #[test]
    fn test_merges_and_sorts_countries() {
        let cache = HashMap::from([
            ranking("germany", vec![user("b", 50), user("d", 10)]),
            ranking("france", vec![user("A", 100), user("c", 20)]),
        ]);
        let index = GlobalIndex::build(&cache);
        let logins: Vec<String> = index.top(0).into_iter().map(|u| u.login).collect();
        assert_eq!(logins, vec!["A", "b", "c", "d"]);
        assert_eq!(index.rank_of("a"), Some(1));
        assert_eq!(index.rank_of("B"), Some(2));
        assert_eq!(index.rank_of("nobody"), None);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_ties_keep_country_order() {
        let cache = HashMap::from([ranking("zambia", vec![user("z", 5)]), ranking("austria", vec![user("a", 5)])]);
        let index = GlobalIndex::build(&cache);
        assert_eq!(index.top(1)[0].country, "austria");
    }

    #[test]
    fn test_duplicate_login_keeps_best_position() {
        let cache = HashMap::from([
            ranking("canada", vec![user("nomad", 10)]),
            ranking("mexico", vec![user("Nomad", 90)]),
        ]);
        let index = GlobalIndex::build(&cache);
        assert_eq!(index.rank_of("nomad"), Some(1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_top_limits() {
        let cache = HashMap::from([ranking("peru", vec![user("a", 3), user("b", 2), user("c", 1)])]);
        let index = GlobalIndex::build(&cache);
        assert_eq!(index.top(2).len(), 2);
        assert_eq!(index.top(0).len(), 3);
        assert_eq!(index.top(99).len(), 3);
        assert!(GlobalIndex::default().top(5).is_empty());
    }
}
