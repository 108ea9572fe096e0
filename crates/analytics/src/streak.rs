use ghstats_github::models::{Commit, ContributionCalendar, StreakStats};
use std::collections::{BTreeMap, BTreeSet};
use time::Date;

/// Longest run of consecutive calendar days in `dates`.
///
/// Duplicates collapse to one day and order does not matter. An empty input
/// yields `0`, a single distinct day yields `1`.
pub fn longest_streak(dates: impl IntoIterator<Item = Date>) -> u32 {
    let dates: BTreeSet<Date> = dates.into_iter().collect();
    let mut longest = 0;
    let mut running = 0;
    let mut previous: Option<Date> = None;
    for date in dates {
        running = match previous.and_then(Date::next_day) {
            Some(expected) if expected == date => running + 1,
            _ => 1,
        };
        longest = longest.max(running);
        previous = Some(date);
    }
    longest
}

/// Longest coding streak over commit dates, each read in the commit's own
/// offset.
pub fn longest_commit_streak(commits: &[Commit]) -> u32 {
    longest_streak(commits.iter().map(|commit| commit.date.date()))
}

/// Current and longest streaks over a contribution calendar.
///
/// Days after `today` are ignored. The longest streak is the longest run of
/// consecutive days with a positive count. The current streak is the run of
/// positive days ending at `today`, or at yesterday when today has nothing
/// yet, so a streak is not lost before the day is over. Any older gap makes
/// it `0`, and a missing day anywhere in the run breaks it.
pub fn calendar_streak(calendar: &ContributionCalendar, today: Date) -> StreakStats {
    let days: BTreeMap<Date, u32> =
        calendar.days().filter(|day| day.date <= today).map(|day| (day.date, day.count)).collect();

    let mut longest = 0;
    let mut running = 0;
    let mut previous: Option<Date> = None;
    for (&date, &count) in &days {
        let contiguous = previous.and_then(Date::next_day) == Some(date);
        running = match (count, contiguous) {
            (0, _) => 0,
            (_, true) => running + 1,
            (_, false) => 1,
        };
        longest = longest.max(running);
        previous = Some(date);
    }

    let contributed = |date: Date| days.get(&date).is_some_and(|&count| count > 0);
    let anchor = if contributed(today) { Some(today) } else { today.previous_day() };
    let mut current = 0;
    let mut cursor = anchor;
    while let Some(date) = cursor {
        if !contributed(date) {
            break;
        }
        current += 1;
        cursor = date.previous_day();
    }

    StreakStats { current_streak: current, longest_streak: longest, total_contributions: calendar.total }
}
