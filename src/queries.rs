//! Read-only query helpers over stored tweets.

use crate::error::Result;
use crate::model::Tweet;
use crate::repository::Repository;
use crate::timestamp::Timestamp;

/// A deferred query for tweets created in `[start, end)`.
///
/// Nothing runs until [`fetch`](Self::fetch) or [`count`](Self::count) is
/// called, and each call re-runs the query against the current store.
#[derive(Debug)]
pub struct CreatedInRange<'a, R: ?Sized> {
    repo: &'a R,
    start: Timestamp,
    end: Timestamp,
}

impl<R: Repository + ?Sized> CreatedInRange<'_, R> {
    /// Run the query. Tweets come back oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn fetch(&self) -> Result<Vec<Tweet>> {
        if self.start >= self.end {
            return Ok(Vec::new());
        }
        self.repo.tweets_created_in_range(&self.start, &self.end)
    }

    /// Number of matching tweets.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count(&self) -> Result<usize> {
        Ok(self.fetch()?.len())
    }

    #[must_use]
    pub const fn start(&self) -> Timestamp {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> Timestamp {
        self.end
    }
}

/// All tweets with `start <= created_at < end`.
pub const fn created_in_range<R: Repository + ?Sized>(
    repo: &R,
    start: Timestamp,
    end: Timestamp,
) -> CreatedInRange<'_, R> {
    CreatedInRange { repo, start, end }
}

/// Earliest tweet creation time, or `None` on an empty store.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn earliest_created_at<R: Repository + ?Sized>(repo: &R) -> Result<Option<Timestamp>> {
    repo.earliest_tweet_created_at()
}

/// Latest tweet creation time, or `None` on an empty store.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn latest_created_at<R: Repository + ?Sized>(repo: &R) -> Result<Option<Timestamp>> {
    repo.latest_tweet_created_at()
}
