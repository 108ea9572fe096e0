use ghstats_github::models::{LanguageStats, Repository};
use std::collections::{BTreeMap, HashMap};

pub const FALLBACK_COLOR: &str = "#8b8b8b";

/// Whether any repository declares a primary language, i.e. whether
/// [`language_breakdown`] would have anything to color.
pub fn has_languages(repositories: &[Repository]) -> bool {
    repositories.iter().any(|repo| repo.language.as_deref().is_some_and(|language| !language.is_empty()))
}

/// Share of repositories per primary language.
///
/// Percentages are truncated integers of `count * 100 / total`, where `total`
/// only counts repositories that declare a language, so they need not sum to
/// 100. Sorted by percentage descending, then by name.
pub fn language_breakdown(repositories: &[Repository], colors: &HashMap<String, String>) -> Vec<LanguageStats> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for language in repositories.iter().filter_map(|repo| repo.language.as_deref()).filter(|l| !l.is_empty()) {
        *counts.entry(language).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }
    let mut stats: Vec<LanguageStats> = counts
        .into_iter()
        .map(|(name, count)| LanguageStats {
            name: name.to_string(),
            percentage: count * 100 / total,
            color: colors.get(name).cloned().unwrap_or_else(|| FALLBACK_COLOR.to_string()),
        })
        .collect();
    // Stable sort over name-ordered input keeps equal percentages alphabetical.
    stats.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    stats
}
