//! Record normalizer: turns one raw status object into a stored tweet and a
//! stored author.
//!
//! Both field sets are extracted and validated before anything is written, so
//! a malformed record never leaves a half-ingested status behind. The two
//! upserts themselves are independent: a storage failure on the author write
//! does not undo the tweet write.

use crate::error::{Result, TweetStoreError};
use crate::model::{FilterLevel, Tweet, TweetFields, User, UserFields};
use crate::repository::Repository;
use crate::timestamp::{TimeMode, parse_feed_datetime};
use serde_json::Value;
use tracing::{debug, warn};

/// Maps raw status objects onto [`Tweet`] and [`User`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    mode: TimeMode,
}

impl Normalizer {
    #[must_use]
    pub const fn new(mode: TimeMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn time_mode(&self) -> TimeMode {
        self.mode
    }

    /// Ingest one parsed status object.
    ///
    /// Returns `Ok(None)` without touching the repository when the status is a
    /// retweet and `persist_retweets` is false. Otherwise creates or fully
    /// overwrites the tweet (keyed by `id`) and the author (keyed by
    /// `user.id`) and returns both.
    ///
    /// # Errors
    ///
    /// Returns an input error if a required key is missing or malformed, or a
    /// storage error if either upsert fails.
    pub fn ingest<R>(
        &self,
        repo: &mut R,
        raw: &Value,
        persist_retweets: bool,
    ) -> Result<Option<(Tweet, User)>>
    where
        R: Repository + ?Sized,
    {
        if !raw.is_object() {
            return Err(TweetStoreError::invalid_field("status", "object", raw));
        }
        let raw_user = required_object(raw, "", "user")?;
        let retweeted_status_id = retweeted_status_id(raw)?;

        if !persist_retweets && retweeted_status_id.is_some() {
            debug!(?retweeted_status_id, "Skipping retweet");
            return Ok(None);
        }

        let tweet_fields = self.tweet_fields(raw, raw_user, retweeted_status_id)?;
        let user_fields = self.user_fields(raw_user)?;

        let tweet = self.upsert_tweet(repo, &tweet_fields)?;
        let user = self.upsert_user(repo, &user_fields)?;
        Ok(Some((tweet, user)))
    }

    fn tweet_fields(
        &self,
        raw: &Value,
        raw_user: &Value,
        retweeted_status_id: Option<i64>,
    ) -> Result<TweetFields> {
        let created_at = required_str(raw, "", "created_at")?;

        Ok(TweetFields {
            tweet_id: required_i64(raw, "", "id")?,
            text: required_str(raw, "", "text")?.to_string(),
            truncated: required_bool(raw, "", "truncated")?,
            user_id: required_i64(raw_user, "user.", "id")?,
            created_at: parse_feed_datetime(created_at, self.mode, "created_at")?,
            filter_level: filter_level(raw)?,
            reply_count: count(raw, "", "reply_count")?,
            retweet_count: count(raw, "", "retweet_count")?,
            favorite_count: count(raw, "", "favorite_count")?,
            in_reply_to_status_id: optional_i64(raw, "", "in_reply_to_status_id")?,
            retweeted_status_id,
            entities: optional_json(raw, "entities"),
        })
    }

    fn user_fields(&self, raw_user: &Value) -> Result<UserFields> {
        const P: &str = "user.";
        let created_at = required_str(raw_user, P, "created_at")?;

        Ok(UserFields {
            user_id: required_i64(raw_user, P, "id")?,
            name: required_str(raw_user, P, "name")?.to_string(),
            screen_name: required_str(raw_user, P, "screen_name")?.to_string(),
            location: required_str(raw_user, P, "location")?.to_string(),
            url: nullable_str(raw_user, P, "url")?,
            description: required_str(raw_user, P, "description")?.to_string(),
            protected: nullable_bool(raw_user, P, "protected")?,
            verified: nullable_bool(raw_user, P, "verified")?,
            followers_count: count(raw_user, P, "followers_count")?,
            friends_count: count(raw_user, P, "friends_count")?,
            listed_count: count(raw_user, P, "listed_count")?,
            favourites_count: count(raw_user, P, "favourites_count")?,
            statuses_count: count(raw_user, P, "statuses_count")?,
            created_at: parse_feed_datetime(created_at, self.mode, "user.created_at")?,
            profile_banner_url: optional_str(raw_user, P, "profile_banner_url")?,
            profile_image_url_https: optional_str(raw_user, P, "profile_image_url_https")?,
            default_profile: optional_bool(raw_user, P, "default_profile")?,
            default_profile_image: optional_bool(raw_user, P, "default_profile_image")?,
            entities: optional_json(raw_user, "entities"),
        })
    }

    fn upsert_tweet<R>(&self, repo: &mut R, fields: &TweetFields) -> Result<Tweet>
    where
        R: Repository + ?Sized,
    {
        let updated_at = self.mode.now();
        let tweet_id = fields.tweet_id;

        if let Some(existing) = repo.find_tweet(tweet_id)? {
            debug!(tweet_id, id = existing.id, "Updating tweet");
            return repo.update_tweet(existing.id, fields, updated_at);
        }

        match repo.insert_tweet(fields, updated_at) {
            Err(TweetStoreError::DuplicateKey { entity, key }) => {
                warn!(tweet_id, "Tweet created concurrently, retrying as update");
                let existing = repo
                    .find_tweet(tweet_id)?
                    .ok_or(TweetStoreError::DuplicateKey { entity, key })?;
                repo.update_tweet(existing.id, fields, updated_at)
            }
            Ok(tweet) => {
                debug!(tweet_id, id = tweet.id, "Created tweet");
                Ok(tweet)
            }
            Err(e) => Err(e),
        }
    }

    fn upsert_user<R>(&self, repo: &mut R, fields: &UserFields) -> Result<User>
    where
        R: Repository + ?Sized,
    {
        let updated_at = self.mode.now();
        let user_id = fields.user_id;

        if let Some(existing) = repo.find_user(user_id)? {
            debug!(user_id, id = existing.id, "Updating user");
            return repo.update_user(existing.id, fields, updated_at);
        }

        match repo.insert_user(fields, updated_at) {
            Err(TweetStoreError::DuplicateKey { entity, key }) => {
                warn!(user_id, "User created concurrently, retrying as update");
                let existing = repo
                    .find_user(user_id)?
                    .ok_or(TweetStoreError::DuplicateKey { entity, key })?;
                repo.update_user(existing.id, fields, updated_at)
            }
            Ok(user) => {
                debug!(user_id, id = user.id, "Created user");
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Field extraction
// =============================================================================

/// `retweeted_status` absent or null means an original post; an object must
/// carry an integer `id`; anything else is malformed.
fn retweeted_status_id(raw: &Value) -> Result<Option<i64>> {
    match raw.get("retweeted_status") {
        None | Some(Value::Null) => Ok(None),
        Some(status @ Value::Object(_)) => {
            required_i64(status, "retweeted_status.", "id").map(Some)
        }
        Some(other) => Err(TweetStoreError::invalid_field(
            "retweeted_status",
            "object",
            other,
        )),
    }
}

fn filter_level(raw: &Value) -> Result<Option<FilterLevel>> {
    match raw.get("filter_level") {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| TweetStoreError::invalid_field("filter_level", "none|low|medium", value)),
        Some(other) => Err(TweetStoreError::invalid_field(
            "filter_level",
            "string",
            other,
        )),
    }
}

/// A key that must be present; its value may still be null.
fn field<'a>(obj: &'a Value, prefix: &str, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| TweetStoreError::missing_field(format!("{prefix}{key}")))
}

fn required_object<'a>(obj: &'a Value, prefix: &str, key: &str) -> Result<&'a Value> {
    let value = field(obj, prefix, key)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(TweetStoreError::invalid_field(
            format!("{prefix}{key}"),
            "object",
            value,
        ))
    }
}

fn required_i64(obj: &Value, prefix: &str, key: &str) -> Result<i64> {
    let value = field(obj, prefix, key)?;
    value
        .as_i64()
        .ok_or_else(|| TweetStoreError::invalid_field(format!("{prefix}{key}"), "integer", value))
}

fn required_str<'a>(obj: &'a Value, prefix: &str, key: &str) -> Result<&'a str> {
    let value = field(obj, prefix, key)?;
    value
        .as_str()
        .ok_or_else(|| TweetStoreError::invalid_field(format!("{prefix}{key}"), "string", value))
}

fn required_bool(obj: &Value, prefix: &str, key: &str) -> Result<bool> {
    let value = field(obj, prefix, key)?;
    value
        .as_bool()
        .ok_or_else(|| TweetStoreError::invalid_field(format!("{prefix}{key}"), "boolean", value))
}

fn nullable_str(obj: &Value, prefix: &str, key: &str) -> Result<Option<String>> {
    field(obj, prefix, key)?;
    optional_str(obj, prefix, key)
}

fn nullable_bool(obj: &Value, prefix: &str, key: &str) -> Result<Option<bool>> {
    field(obj, prefix, key)?;
    optional_bool(obj, prefix, key)
}

fn optional_i64(obj: &Value, prefix: &str, key: &str) -> Result<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            TweetStoreError::invalid_field(format!("{prefix}{key}"), "integer", value)
        }),
    }
}

fn optional_str(obj: &Value, prefix: &str, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(value) => Err(TweetStoreError::invalid_field(
            format!("{prefix}{key}"),
            "string",
            value,
        )),
    }
}

fn optional_bool(obj: &Value, prefix: &str, key: &str) -> Result<Option<bool>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(value) => Err(TweetStoreError::invalid_field(
            format!("{prefix}{key}"),
            "boolean",
            value,
        )),
    }
}

fn optional_json(obj: &Value, key: &str) -> Option<Value> {
    obj.get(key).filter(|v| !v.is_null()).cloned()
}

/// Engagement counter: negative values mean corrupt upstream data and are
/// stored as unknown.
fn count(obj: &Value, prefix: &str, key: &str) -> Result<Option<i64>> {
    Ok(optional_i64(obj, prefix, key)?.filter(|n| *n >= 0))
}
