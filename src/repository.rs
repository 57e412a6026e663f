//! Persistence interface used by the normalizer and the query helpers.
//!
//! [`crate::storage::Storage`] is the `SQLite` implementation;
//! [`MemoryRepository`] keeps everything in vectors and backs the unit tests.

use crate::error::{Result, TweetStoreError};
use crate::model::{Tweet, TweetFields, User, UserFields};
use crate::timestamp::Timestamp;

/// Keyed storage for tweets and users.
///
/// Implementations enforce uniqueness of `tweet_id` and `user_id`: an insert
/// that collides with an existing key fails with
/// [`TweetStoreError::DuplicateKey`].
pub trait Repository {
    /// Look up a tweet by its external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_tweet(&self, tweet_id: i64) -> Result<Option<Tweet>>;

    /// Create a tweet from a full field set.
    ///
    /// # Errors
    ///
    /// Returns [`TweetStoreError::DuplicateKey`] if `fields.tweet_id` is taken.
    fn insert_tweet(&mut self, fields: &TweetFields, updated_at: Timestamp) -> Result<Tweet>;

    /// Replace every mapped field of the tweet with internal id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TweetStoreError::NotFound`] if no such row exists.
    fn update_tweet(&mut self, id: i64, fields: &TweetFields, updated_at: Timestamp)
    -> Result<Tweet>;

    /// Look up a user by external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Create a user from a full field set.
    ///
    /// # Errors
    ///
    /// Returns [`TweetStoreError::DuplicateKey`] if `fields.user_id` is taken.
    fn insert_user(&mut self, fields: &UserFields, updated_at: Timestamp) -> Result<User>;

    /// Replace every mapped field of the user with internal id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TweetStoreError::NotFound`] if no such row exists.
    fn update_user(&mut self, id: i64, fields: &UserFields, updated_at: Timestamp)
    -> Result<User>;

    /// Tweets with `start <= created_at < end`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn tweets_created_in_range(&self, start: &Timestamp, end: &Timestamp) -> Result<Vec<Tweet>>;

    /// Smallest `created_at` over all tweets.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn earliest_tweet_created_at(&self) -> Result<Option<Timestamp>>;

    /// Largest `created_at` over all tweets.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn latest_tweet_created_at(&self) -> Result<Option<Timestamp>>;

    /// Name of the stored author of `tweet`, if that author has been ingested.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn user_name_for(&self, tweet: &Tweet) -> Result<Option<String>> {
        Ok(self.find_user(tweet.fields.user_id)?.map(|u| u.fields.name))
    }
}

/// In-memory [`Repository`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tweets: Vec<Tweet>,
    users: Vec<User>,
    next_tweet_id: i64,
    next_user_id: i64,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored tweets in insertion order.
    #[must_use]
    pub fn tweets(&self) -> &[Tweet] {
        &self.tweets
    }

    /// All stored users in insertion order.
    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }
}

impl Repository for MemoryRepository {
    fn find_tweet(&self, tweet_id: i64) -> Result<Option<Tweet>> {
        Ok(self
            .tweets
            .iter()
            .find(|t| t.fields.tweet_id == tweet_id)
            .cloned())
    }

    fn insert_tweet(&mut self, fields: &TweetFields, updated_at: Timestamp) -> Result<Tweet> {
        if self.tweets.iter().any(|t| t.fields.tweet_id == fields.tweet_id) {
            return Err(TweetStoreError::DuplicateKey {
                entity: "tweet",
                key: fields.tweet_id,
            });
        }
        self.next_tweet_id += 1;
        let tweet = Tweet {
            id: self.next_tweet_id,
            fields: fields.clone(),
            updated_at,
        };
        self.tweets.push(tweet.clone());
        Ok(tweet)
    }

    fn update_tweet(
        &mut self,
        id: i64,
        fields: &TweetFields,
        updated_at: Timestamp,
    ) -> Result<Tweet> {
        if self
            .tweets
            .iter()
            .any(|t| t.id != id && t.fields.tweet_id == fields.tweet_id)
        {
            return Err(TweetStoreError::DuplicateKey {
                entity: "tweet",
                key: fields.tweet_id,
            });
        }
        let tweet = self
            .tweets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TweetStoreError::not_found("Tweet", id.to_string()))?;
        tweet.fields = fields.clone();
        tweet.updated_at = updated_at;
        Ok(tweet.clone())
    }

    fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.fields.user_id == user_id)
            .cloned())
    }

    fn insert_user(&mut self, fields: &UserFields, updated_at: Timestamp) -> Result<User> {
        if self.users.iter().any(|u| u.fields.user_id == fields.user_id) {
            return Err(TweetStoreError::DuplicateKey {
                entity: "user",
                key: fields.user_id,
            });
        }
        self.next_user_id += 1;
        let user = User {
            id: self.next_user_id,
            fields: fields.clone(),
            updated_at,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&mut self, id: i64, fields: &UserFields, updated_at: Timestamp) -> Result<User> {
        if self
            .users
            .iter()
            .any(|u| u.id != id && u.fields.user_id == fields.user_id)
        {
            return Err(TweetStoreError::DuplicateKey {
                entity: "user",
                key: fields.user_id,
            });
        }
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| TweetStoreError::not_found("User", id.to_string()))?;
        user.fields = fields.clone();
        user.updated_at = updated_at;
        Ok(user.clone())
    }

    fn tweets_created_in_range(&self, start: &Timestamp, end: &Timestamp) -> Result<Vec<Tweet>> {
        let mut tweets: Vec<Tweet> = self
            .tweets
            .iter()
            .filter(|t| {
                let at = t.fields.created_at.instant();
                at >= start.instant() && at < end.instant()
            })
            .cloned()
            .collect();
        tweets.sort_by_key(|t| (t.fields.created_at.instant(), t.id));
        Ok(tweets)
    }

    fn earliest_tweet_created_at(&self) -> Result<Option<Timestamp>> {
        Ok(self.tweets.iter().map(|t| t.fields.created_at).min())
    }

    fn latest_tweet_created_at(&self) -> Result<Option<Timestamp>> {
        Ok(self.tweets.iter().map(|t| t.fields.created_at).max())
    }
}
