use ghstats_github::models::Commit;
use std::collections::BTreeMap;
use time::{Date, OffsetDateTime, Weekday};

/// Weekdays in the order used for tie-breaks and array indexing.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

/// Commit counts bucketed along every axis the fun stats report on.
///
/// Hour and weekday are read in each commit's recorded offset. Keyed buckets
/// use ordered maps, so "first maximum" is always well defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histograms {
    pub total: usize,
    pub by_hour: [u32; 24],
    /// Monday first, see [`WEEKDAYS`].
    pub by_weekday: [u32; 7],
    pub by_month: BTreeMap<String, u32>,
    pub by_repo: BTreeMap<String, u32>,
    pub by_day: BTreeMap<String, u32>,
}

impl Histograms {
    pub fn from_commits<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Self {
        let mut histograms = Self::default();
        for commit in commits {
            histograms.total += 1;
            histograms.by_hour[usize::from(commit.date.hour())] += 1;
            histograms.by_weekday[usize::from(commit.date.weekday().number_days_from_monday())] += 1;
            *histograms.by_month.entry(month_key(commit.date)).or_default() += 1;
            *histograms.by_repo.entry(commit.repo.clone()).or_default() += 1;
            *histograms.by_day.entry(day_key(commit.date.date())).or_default() += 1;
        }
        histograms
    }

    /// The hour with the strictly highest count; the lowest hour wins ties.
    pub fn most_productive_hour(&self) -> Option<u8> {
        first_maximum(self.by_hour.iter().enumerate().map(|(hour, count)| (hour as u8, *count))).map(|(hour, _)| hour)
    }

    /// Ties resolve to the earliest weekday, counting from Monday.
    pub fn most_productive_weekday(&self) -> Option<Weekday> {
        first_maximum(WEEKDAYS.into_iter().zip(self.by_weekday)).map(|(day, _)| day)
    }

    /// Repository with the most commits; ties resolve to the lexicographically
    /// smallest name.
    pub fn most_active_repo(&self) -> Option<(&str, u32)> {
        first_maximum(self.by_repo.iter().map(|(repo, count)| (repo.as_str(), *count)))
    }

    pub fn active_days(&self) -> usize {
        self.by_day.len()
    }

    pub fn average_per_day(&self) -> f64 {
        match self.active_days() {
            0 => 0.0,
            days => self.total as f64 / days as f64,
        }
    }

    /// Non-empty hour buckets.
    pub fn hours(&self) -> BTreeMap<u8, u32> {
        self.by_hour.iter().enumerate().filter(|(_, count)| **count > 0).map(|(hour, count)| (hour as u8, *count)).collect()
    }

    /// Non-empty weekday buckets keyed by English weekday name.
    pub fn weekdays(&self) -> BTreeMap<String, u32> {
        WEEKDAYS
            .into_iter()
            .zip(self.by_weekday)
            .filter(|(_, count)| *count > 0)
            .map(|(day, count)| (day.to_string(), count))
            .collect()
    }
}

/// The first bucket holding the strict maximum; `None` when every bucket is
/// empty.
fn first_maximum<K>(buckets: impl IntoIterator<Item = (K, u32)>) -> Option<(K, u32)> {
    buckets.into_iter().fold(None, |best, (key, count)| match best {
        Some((_, top)) if count <= top => best,
        _ if count == 0 => best,
        _ => Some((key, count)),
    })
}

pub fn month_key(at: OffsetDateTime) -> String {
    format!("{:04}-{:02}", at.year(), u8::from(at.month()))
}

pub fn day_key(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

pub fn percentage(matching: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matching as f64 / total as f64 * 100.0
}
