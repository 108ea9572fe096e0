//! In-memory leaderboard source for testing.

use crate::error::{ErrorKind, Result};
use crate::models::CountryUser;
use crate::source::LeaderboardSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Serves leaderboards from a map and counts every fetch, so tests can
/// assert that cache hits never reach the source.
#[derive(Debug, Default)]
pub struct MockLeaderboard {
    countries: Mutex<HashMap<String, Vec<CountryUser>>>,
    listing: Option<Vec<String>>,
    failure: Mutex<Option<ErrorKind>>,
    fetches: AtomicUsize,
    listings: AtomicUsize,
}

impl MockLeaderboard {
    pub fn with_country(self, country: &str, users: Vec<CountryUser>) -> Self {
        self.set_country(country, users);
        self
    }

    /// Publish a directory listing. Without one, listing fails as not found.
    pub fn with_listing(mut self, countries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.listing = Some(countries.into_iter().map(Into::into).collect());
        self
    }

    /// Replace (or add) a country's users after construction.
    pub fn set_country(&self, country: &str, users: Vec<CountryUser>) {
        self.countries.lock().unwrap_or_else(PoisonError::into_inner).insert(country.to_string(), users);
    }

    /// Make every subsequent call fail with `failure`, or succeed again with
    /// `None`.
    pub fn fail_with(&self, failure: Option<ErrorKind>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            Some(kind) => Err(exn::Exn::from(kind)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LeaderboardSource for MockLeaderboard {
    async fn fetch_country(&self, country: &str) -> Result<Vec<CountryUser>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.countries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(country)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(country.to_string())))
    }

    async fn list_countries(&self) -> Result<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut countries = self.listing.clone().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound("countries".to_string())))?;
        countries.sort();
        Ok(countries)
    }
}
