//! `SQLite` storage for tweets and users.
//!
//! Each table has an autoincrement internal `id` and a `UNIQUE` external id
//! column, so the store itself rejects a second create for the same status or
//! author. Creation times are written twice: as text that round-trips the
//! [`Timestamp`] and as an indexed `(seconds, nanoseconds)` pair used for
//! ordering and ranges.

use crate::error::{Result, ResultExt, TweetStoreError};
use crate::model::{FilterLevel, StoreCounts, Tweet, TweetFields, User, UserFields};
use crate::repository::Repository;
use crate::timestamp::Timestamp;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

const TWEET_COLUMNS: &str = "id, tweet_id, text, truncated, user_id, created_at, filter_level, \
     reply_count, retweet_count, favorite_count, in_reply_to_status_id, retweeted_status_id, \
     entities_json, updated_at";

const USER_COLUMNS: &str = "id, user_id, name, screen_name, location, url, description, \
     protected, verified, followers_count, friends_count, listed_count, favourites_count, \
     statuses_count, created_at, profile_banner_url, profile_image_url_https, default_profile, \
     default_profile_image, entities_json, updated_at";

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open an existing database, failing if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TweetStoreError::DatabaseNotFound`] if there is no file at `db_path`.
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(TweetStoreError::database_not_found(path));
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Get a reference to the underlying database connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> Result<()> {
        let current_version = self.get_schema_version();

        if current_version > SCHEMA_VERSION {
            return Err(TweetStoreError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            });
        }

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn get_schema_version(&self) -> i32 {
        let result: std::result::Result<i32, _> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Treat missing schema table as version 0.
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Statuses. user_id is the author's external id, not a foreign key.
            CREATE TABLE IF NOT EXISTS tweets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tweet_id INTEGER NOT NULL UNIQUE,
                text TEXT NOT NULL,
                truncated INTEGER NOT NULL DEFAULT 0,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                created_at_ts INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL DEFAULT 0,
                filter_level TEXT,
                reply_count INTEGER CHECK (reply_count >= 0),
                retweet_count INTEGER CHECK (retweet_count >= 0),
                favorite_count INTEGER CHECK (favorite_count >= 0),
                in_reply_to_status_id INTEGER,
                retweeted_status_id INTEGER,
                entities_json TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_created_at ON tweets(created_at_ts, created_at_nanos);

            -- Authors
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                screen_name TEXT NOT NULL,
                location TEXT NOT NULL,
                url TEXT,
                description TEXT NOT NULL,
                protected INTEGER,
                verified INTEGER,
                followers_count INTEGER,
                friends_count INTEGER,
                listed_count INTEGER,
                favourites_count INTEGER,
                statuses_count INTEGER,
                created_at TEXT NOT NULL,
                created_at_ts INTEGER NOT NULL,
                profile_banner_url TEXT,
                profile_image_url_https TEXT,
                default_profile INTEGER,
                default_profile_image INTEGER,
                entities_json TEXT,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn get_tweet_by_rowid(&self, id: i64) -> Result<Tweet> {
        let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id = ?");
        self.conn
            .query_row(&sql, params![id], tweet_from_row)
            .optional()?
            .ok_or_else(|| TweetStoreError::not_found("Tweet", id.to_string()))
    }

    fn get_user_by_rowid(&self, id: i64) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        self.conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?
            .ok_or_else(|| TweetStoreError::not_found("User", id.to_string()))
    }

    /// Tweets whose text contains `query` (case-insensitive), newest row first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn search_tweets(&self, query: &str, limit: usize) -> Result<Vec<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets
             WHERE instr(lower(text), lower(?1)) > 0
             ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(params![query, limit_to_i64(limit)], tweet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tweets)
    }

    /// Users whose name or screen name contains `query` (case-insensitive),
    /// newest row first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn search_users(&self, query: &str, limit: usize) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE instr(lower(name), lower(?1)) > 0 OR instr(lower(screen_name), lower(?1)) > 0
             ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params![query, limit_to_i64(limit)], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Most recently created tweet rows first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tweets(&self, limit: usize) -> Result<Vec<Tweet>> {
        let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets ORDER BY id DESC LIMIT ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(params![limit_to_i64(limit)], tweet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tweets)
    }

    /// Most recently created user rows first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_users(&self, limit: usize) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id DESC LIMIT ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params![limit_to_i64(limit)], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Row counts for both tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM tweets), (SELECT COUNT(*) FROM users)",
            [],
            |row| {
                Ok(StoreCounts {
                    tweets: row.get(0)?,
                    users: row.get(1)?,
                })
            },
        )?)
    }

    fn created_at_bound(&self, order: &str) -> Result<Option<Timestamp>> {
        let sql = format!(
            "SELECT created_at FROM tweets
             ORDER BY created_at_ts {order}, created_at_nanos {order}, id LIMIT 1"
        );
        let value: Option<String> = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .optional()?;
        value.as_deref().map(Timestamp::from_db_string).transpose()
    }
}

impl Repository for Storage {
    fn find_tweet(&self, tweet_id: i64) -> Result<Option<Tweet>> {
        let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE tweet_id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![tweet_id], tweet_from_row)
            .optional()?)
    }

    fn insert_tweet(&mut self, fields: &TweetFields, updated_at: Timestamp) -> Result<Tweet> {
        self.conn
            .execute(
                r"
                INSERT INTO tweets
                (tweet_id, text, truncated, user_id, created_at, created_at_ts,
                 created_at_nanos, filter_level, reply_count, retweet_count, favorite_count,
                 in_reply_to_status_id, retweeted_status_id, entities_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ",
                params![
                    fields.tweet_id,
                    fields.text,
                    fields.truncated,
                    fields.user_id,
                    fields.created_at.to_db_string(),
                    fields.created_at.sort_key(),
                    fields.created_at.subsec_nanos(),
                    fields.filter_level.map(FilterLevel::as_str),
                    fields.reply_count,
                    fields.retweet_count,
                    fields.favorite_count,
                    fields.in_reply_to_status_id,
                    fields.retweeted_status_id,
                    entities_to_json(fields.entities.as_ref())?,
                    updated_at.to_db_string(),
                ],
            )
            .map_err(|e| unique_violation(e, "tweet", fields.tweet_id))?;

        let id = self.conn.last_insert_rowid();
        debug!(id, tweet_id = fields.tweet_id, "Inserted tweet row");
        self.get_tweet_by_rowid(id)
    }

    fn update_tweet(
        &mut self,
        id: i64,
        fields: &TweetFields,
        updated_at: Timestamp,
    ) -> Result<Tweet> {
        let changed = self
            .conn
            .execute(
                r"
                UPDATE tweets SET
                    tweet_id = ?1, text = ?2, truncated = ?3, user_id = ?4, created_at = ?5,
                    created_at_ts = ?6, created_at_nanos = ?7, filter_level = ?8,
                    reply_count = ?9, retweet_count = ?10, favorite_count = ?11,
                    in_reply_to_status_id = ?12, retweeted_status_id = ?13,
                    entities_json = ?14, updated_at = ?15
                WHERE id = ?16
                ",
                params![
                    fields.tweet_id,
                    fields.text,
                    fields.truncated,
                    fields.user_id,
                    fields.created_at.to_db_string(),
                    fields.created_at.sort_key(),
                    fields.created_at.subsec_nanos(),
                    fields.filter_level.map(FilterLevel::as_str),
                    fields.reply_count,
                    fields.retweet_count,
                    fields.favorite_count,
                    fields.in_reply_to_status_id,
                    fields.retweeted_status_id,
                    entities_to_json(fields.entities.as_ref())?,
                    updated_at.to_db_string(),
                    id,
                ],
            )
            .map_err(|e| unique_violation(e, "tweet", fields.tweet_id))?;

        if changed == 0 {
            return Err(TweetStoreError::not_found("Tweet", id.to_string()));
        }
        self.get_tweet_by_rowid(id)
    }

    fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![user_id], user_from_row)
            .optional()?)
    }

    fn insert_user(&mut self, fields: &UserFields, updated_at: Timestamp) -> Result<User> {
        self.conn
            .execute(
                r"
                INSERT INTO users
                (user_id, name, screen_name, location, url, description, protected, verified,
                 followers_count, friends_count, listed_count, favourites_count, statuses_count,
                 created_at, created_at_ts, profile_banner_url, profile_image_url_https,
                 default_profile, default_profile_image, entities_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                        ?17, ?18, ?19, ?20, ?21)
                ",
                params![
                    fields.user_id,
                    fields.name,
                    fields.screen_name,
                    fields.location,
                    fields.url,
                    fields.description,
                    fields.protected,
                    fields.verified,
                    fields.followers_count,
                    fields.friends_count,
                    fields.listed_count,
                    fields.favourites_count,
                    fields.statuses_count,
                    fields.created_at.to_db_string(),
                    fields.created_at.sort_key(),
                    fields.profile_banner_url,
                    fields.profile_image_url_https,
                    fields.default_profile,
                    fields.default_profile_image,
                    entities_to_json(fields.entities.as_ref())?,
                    updated_at.to_db_string(),
                ],
            )
            .map_err(|e| unique_violation(e, "user", fields.user_id))?;

        let id = self.conn.last_insert_rowid();
        debug!(id, user_id = fields.user_id, "Inserted user row");
        self.get_user_by_rowid(id)
    }

    fn update_user(&mut self, id: i64, fields: &UserFields, updated_at: Timestamp) -> Result<User> {
        let changed = self
            .conn
            .execute(
                r"
                UPDATE users SET
                    user_id = ?1, name = ?2, screen_name = ?3, location = ?4, url = ?5,
                    description = ?6, protected = ?7, verified = ?8, followers_count = ?9,
                    friends_count = ?10, listed_count = ?11, favourites_count = ?12,
                    statuses_count = ?13, created_at = ?14, created_at_ts = ?15,
                    profile_banner_url = ?16, profile_image_url_https = ?17,
                    default_profile = ?18, default_profile_image = ?19, entities_json = ?20,
                    updated_at = ?21
                WHERE id = ?22
                ",
                params![
                    fields.user_id,
                    fields.name,
                    fields.screen_name,
                    fields.location,
                    fields.url,
                    fields.description,
                    fields.protected,
                    fields.verified,
                    fields.followers_count,
                    fields.friends_count,
                    fields.listed_count,
                    fields.favourites_count,
                    fields.statuses_count,
                    fields.created_at.to_db_string(),
                    fields.created_at.sort_key(),
                    fields.profile_banner_url,
                    fields.profile_image_url_https,
                    fields.default_profile,
                    fields.default_profile_image,
                    entities_to_json(fields.entities.as_ref())?,
                    updated_at.to_db_string(),
                    id,
                ],
            )
            .map_err(|e| unique_violation(e, "user", fields.user_id))?;

        if changed == 0 {
            return Err(TweetStoreError::not_found("User", id.to_string()));
        }
        self.get_user_by_rowid(id)
    }

    fn tweets_created_in_range(&self, start: &Timestamp, end: &Timestamp) -> Result<Vec<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets
             WHERE (created_at_ts, created_at_nanos) >= (?1, ?2)
               AND (created_at_ts, created_at_nanos) < (?3, ?4)
             ORDER BY created_at_ts, created_at_nanos, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(
                params![
                    start.sort_key(),
                    start.subsec_nanos(),
                    end.sort_key(),
                    end.subsec_nanos()
                ],
                tweet_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tweets)
    }

    fn earliest_tweet_created_at(&self) -> Result<Option<Timestamp>> {
        self.created_at_bound("ASC")
    }

    fn latest_tweet_created_at(&self) -> Result<Option<Timestamp>> {
        self.created_at_bound("DESC")
    }
}

/// Map a `UNIQUE` constraint failure to [`TweetStoreError::DuplicateKey`].
fn unique_violation(err: rusqlite::Error, entity: &'static str, key: i64) -> TweetStoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            TweetStoreError::DuplicateKey { entity, key }
        }
        other => other.into(),
    }
}

fn entities_to_json(entities: Option<&serde_json::Value>) -> Result<Option<String>> {
    Ok(entities.map(serde_json::to_string).transpose()?)
}

fn conversion_error<E>(idx: usize, source: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(source))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let value: String = row.get(idx)?;
    Timestamp::from_db_string(&value).map_err(|e| conversion_error(idx, e))
}

fn entities_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn filter_level_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<FilterLevel>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            s.parse().map_err(|reason: String| {
                conversion_error(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, reason))
            })
        })
        .transpose()
}

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        id: row.get(0)?,
        fields: TweetFields {
            tweet_id: row.get(1)?,
            text: row.get(2)?,
            truncated: row.get(3)?,
            user_id: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
            filter_level: filter_level_column(row, 6)?,
            reply_count: row.get(7)?,
            retweet_count: row.get(8)?,
            favorite_count: row.get(9)?,
            in_reply_to_status_id: row.get(10)?,
            retweeted_status_id: row.get(11)?,
            entities: entities_column(row, 12)?,
        },
        updated_at: timestamp_column(row, 13)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        fields: UserFields {
            user_id: row.get(1)?,
            name: row.get(2)?,
            screen_name: row.get(3)?,
            location: row.get(4)?,
            url: row.get(5)?,
            description: row.get(6)?,
            protected: row.get(7)?,
            verified: row.get(8)?,
            followers_count: row.get(9)?,
            friends_count: row.get(10)?,
            listed_count: row.get(11)?,
            favourites_count: row.get(12)?,
            statuses_count: row.get(13)?,
            created_at: timestamp_column(row, 14)?,
            profile_banner_url: row.get(15)?,
            profile_image_url_https: row.get(16)?,
            default_profile: row.get(17)?,
            default_profile_image: row.get(18)?,
            entities: entities_column(row, 19)?,
        },
        updated_at: timestamp_column(row, 20)?,
    })
}

fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Normalizer;
    use crate::queries::{created_in_range, earliest_created_at, latest_created_at};
    use crate::timestamp::{TimeMode, parse_feed_datetime};
    use serde_json::json;

    fn status(id: i64, user_id: i64, text: &str, created_at: &str) -> serde_json::Value {
        json!({
            "id": id,
            "text": text,
            "truncated": false,
            "created_at": created_at,
            "filter_level": "low",
            "entities": {"hashtags": [{"text": "rust"}]},
            "user": {
                "id": user_id,
                "name": format!("User {user_id}"),
                "screen_name": format!("user{user_id}"),
                "location": "Somewhere",
                "url": "https://example.com",
                "description": "",
                "protected": null,
                "verified": true,
                "followers_count": 10,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018"
            }
        })
    }

    fn ts(value: &str) -> Timestamp {
        parse_feed_datetime(value, TimeMode::utc(), "test").unwrap()
    }

    #[test]
    fn test_create_database() {
        let storage = Storage::open_memory().unwrap();
        assert_eq!(storage.counts().unwrap(), StoreCounts::default());
    }

    #[test]
    fn test_schema_version() {
        let storage = Storage::open_memory().unwrap();
        assert_eq!(storage.get_schema_version(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let storage = Storage::open_memory().unwrap();
        storage.set_schema_version(SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(
            storage.migrate(),
            Err(TweetStoreError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_ingest_round_trips_all_fields() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());

        let (tweet, user) = normalizer
            .ingest(
                &mut storage,
                &status(100, 7, "hi", "Wed Oct 10 20:19:24 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();

        let stored_tweet = storage.find_tweet(100).unwrap().unwrap();
        let stored_user = storage.find_user(7).unwrap().unwrap();
        assert_eq!(stored_tweet, tweet);
        assert_eq!(stored_user, user);
        assert_eq!(stored_tweet.fields.filter_level, Some(FilterLevel::Low));
        assert_eq!(
            stored_tweet.fields.entities,
            Some(json!({"hashtags": [{"text": "rust"}]}))
        );
        assert_eq!(stored_user.fields.protected, None);
        assert_eq!(stored_user.fields.verified, Some(true));
        assert_eq!(stored_user.fields.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_tweet_upsert() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());
        let date = "Wed Oct 10 20:19:24 +0000 2018";

        let (first, _) = normalizer
            .ingest(&mut storage, &status(100, 7, "hi", date), false)
            .unwrap()
            .unwrap();
        let (second, _) = normalizer
            .ingest(&mut storage, &status(100, 7, "hi edited", date), false)
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(storage.counts().unwrap(), StoreCounts { tweets: 1, users: 1 });
        assert_eq!(storage.find_tweet(100).unwrap().unwrap().fields.text, "hi edited");
    }

    #[test]
    fn test_duplicate_insert_maps_to_duplicate_key() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());
        let (tweet, _) = normalizer
            .ingest(
                &mut storage,
                &status(100, 7, "hi", "Wed Oct 10 20:19:24 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();

        let err = storage
            .insert_tweet(&tweet.fields, tweet.updated_at)
            .unwrap_err();
        assert!(matches!(
            err,
            TweetStoreError::DuplicateKey {
                entity: "tweet",
                key: 100
            }
        ));
    }

    #[test]
    fn test_update_missing_row() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());
        let (tweet, _) = normalizer
            .ingest(
                &mut storage,
                &status(100, 7, "hi", "Wed Oct 10 20:19:24 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();

        let err = storage
            .update_tweet(tweet.id + 10, &tweet.fields, tweet.updated_at)
            .unwrap_err();
        assert!(matches!(err, TweetStoreError::NotFound { .. }));
    }

    #[test]
    fn test_range_and_bounds() {
        let mut storage = Storage::open_memory().unwrap();
        assert_eq!(earliest_created_at(&storage).unwrap(), None);
        assert_eq!(latest_created_at(&storage).unwrap(), None);

        let normalizer = Normalizer::new(TimeMode::utc());
        for (id, date) in [
            (1, "Wed Oct 10 20:00:00 +0000 2018"),
            (2, "Wed Oct 10 21:00:00 +0000 2018"),
            (3, "Wed Oct 10 22:00:00 +0000 2018"),
        ] {
            normalizer
                .ingest(&mut storage, &status(id, 7, "t", date), false)
                .unwrap();
        }

        let ids: Vec<i64> = created_in_range(
            &storage,
            ts("Wed Oct 10 20:00:00 +0000 2018"),
            ts("Wed Oct 10 22:00:00 +0000 2018"),
        )
        .fetch()
        .unwrap()
        .iter()
        .map(Tweet::tweet_id)
        .collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(
            earliest_created_at(&storage).unwrap(),
            Some(ts("Wed Oct 10 20:00:00 +0000 2018"))
        );
        assert_eq!(
            latest_created_at(&storage).unwrap(),
            Some(ts("Wed Oct 10 22:00:00 +0000 2018"))
        );
    }

    #[test]
    fn test_range_bounds_are_exact_below_one_second() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());
        let (tweet, _) = normalizer
            .ingest(
                &mut storage,
                &status(1, 7, "on the hour", "Wed Oct 10 20:00:00 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();

        let half_past = Timestamp::parse_bound("2018-10-10T20:00:00.500Z").unwrap();
        let later = Timestamp::parse_bound("2018-10-10T21:00:00Z").unwrap();
        let earlier = Timestamp::parse_bound("2018-10-10T19:00:00Z").unwrap();

        assert!(created_in_range(&storage, half_past, later).fetch().unwrap().is_empty());
        assert_eq!(created_in_range(&storage, earlier, half_past).count().unwrap(), 1);

        // A stored fractional time sorts after the whole second it falls in.
        let mut fields = tweet.fields.clone();
        fields.tweet_id = 2;
        fields.created_at = Timestamp::parse_bound("2018-10-10T20:00:00.250Z").unwrap();
        storage.insert_tweet(&fields, tweet.updated_at).unwrap();

        let ids: Vec<i64> = created_in_range(&storage, earlier, half_past)
            .fetch()
            .unwrap()
            .iter()
            .map(Tweet::tweet_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(
            latest_created_at(&storage).unwrap(),
            Some(fields.created_at)
        );
    }

    #[test]
    fn test_naive_mode_round_trip() {
        let mut storage = Storage::open_memory().unwrap();
        let (tweet, _) = Normalizer::new(TimeMode::Naive)
            .ingest(
                &mut storage,
                &status(1, 7, "t", "Wed Oct 10 20:00:00 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();

        assert!(matches!(tweet.fields.created_at, Timestamp::Naive(_)));
        assert_eq!(
            latest_created_at(&storage).unwrap(),
            Some(tweet.fields.created_at)
        );
    }

    #[test]
    fn test_search_and_listing_order() {
        let mut storage = Storage::open_memory().unwrap();
        let normalizer = Normalizer::new(TimeMode::utc());
        let date = "Wed Oct 10 20:00:00 +0000 2018";
        normalizer
            .ingest(&mut storage, &status(1, 7, "Learning Rust", date), false)
            .unwrap();
        normalizer
            .ingest(&mut storage, &status(2, 8, "rust is fun", date), false)
            .unwrap();
        normalizer
            .ingest(&mut storage, &status(3, 8, "coffee", date), false)
            .unwrap();

        let hits: Vec<i64> = storage
            .search_tweets("RUST", 10)
            .unwrap()
            .iter()
            .map(Tweet::tweet_id)
            .collect();
        assert_eq!(hits, vec![2, 1]);

        assert_eq!(storage.search_tweets("rust", 1).unwrap().len(), 1);
        assert_eq!(storage.list_tweets(10).unwrap()[0].tweet_id(), 3);

        let users = storage.search_users("user7", 10).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id(), 7);
        assert_eq!(storage.list_users(10).unwrap()[0].user_id(), 8);
    }

    #[test]
    fn test_user_name_for_tweet() {
        let mut storage = Storage::open_memory().unwrap();
        let (tweet, _) = Normalizer::new(TimeMode::utc())
            .ingest(
                &mut storage,
                &status(1, 7, "t", "Wed Oct 10 20:00:00 +0000 2018"),
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            storage.user_name_for(&tweet).unwrap().as_deref(),
            Some("User 7")
        );

        let mut orphan = tweet;
        orphan.fields.user_id = 999;
        assert_eq!(storage.user_name_for(&orphan).unwrap(), None);
    }
}
