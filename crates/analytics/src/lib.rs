//! Pure analytics over commit histories and contribution calendars.
//!
//! Nothing here holds state or performs I/O: every function maps its inputs
//! to a fresh value, so results are safe to compute on cached snapshots.

mod fun;
mod histogram;
mod language;
mod repo;
mod streak;

pub use crate::fun::{FunStats, fun_stats};
pub use crate::histogram::{Histograms, WEEKDAYS, day_key, month_key, percentage};
pub use crate::language::{FALLBACK_COLOR, has_languages, language_breakdown};
pub use crate::repo::{RepoStats, repo_stats};
pub use crate::streak::{calendar_streak, longest_commit_streak, longest_streak};
