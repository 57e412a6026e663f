//! Data models for stored statuses and authors.
//!
//! [`TweetFields`] and [`UserFields`] are the mapped field sets built from a
//! raw status. The same snapshot is used to create a record and to overwrite
//! an existing one, so both paths always write the same columns.

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform-assigned filter level on streamed statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLevel {
    None,
    Low,
    Medium,
}

impl FilterLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
        }
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            _ => Err(format!("Invalid filter level: {s}")),
        }
    }
}

/// Mapped fields of a status, as taken from one raw status object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetFields {
    pub tweet_id: i64,
    pub text: String,
    pub truncated: bool,
    /// Author's external id. Not a foreign key.
    pub user_id: i64,
    pub created_at: Timestamp,
    pub filter_level: Option<FilterLevel>,
    pub reply_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub in_reply_to_status_id: Option<i64>,
    pub retweeted_status_id: Option<i64>,
    pub entities: Option<serde_json::Value>,
}

/// Mapped fields of an author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFields {
    pub user_id: i64,
    pub name: String,
    pub screen_name: String,
    pub location: String,
    pub url: Option<String>,
    pub description: String,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub followers_count: Option<i64>,
    pub friends_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub favourites_count: Option<i64>,
    pub statuses_count: Option<i64>,
    pub created_at: Timestamp,
    pub profile_banner_url: Option<String>,
    pub profile_image_url_https: Option<String>,
    pub default_profile: Option<bool>,
    pub default_profile_image: Option<bool>,
    pub entities: Option<serde_json::Value>,
}

/// A stored status.
///
/// `id` is assigned by the store and never changes; `fields.tweet_id` is the
/// platform's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    #[serde(flatten)]
    pub fields: TweetFields,
    pub updated_at: Timestamp,
}

impl Tweet {
    #[must_use]
    pub const fn tweet_id(&self) -> i64 {
        self.fields.tweet_id
    }

    /// A status is a retweet when it carries the id of the status it re-shares.
    #[must_use]
    pub const fn is_retweet(&self) -> bool {
        self.fields.retweeted_status_id.is_some()
    }
}

impl fmt::Display for Tweet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.text)
    }
}

/// A stored author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(flatten)]
    pub fields: UserFields,
    pub updated_at: Timestamp,
}

impl User {
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.fields.user_id
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.name)
    }
}

/// Row counts for the two tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub tweets: i64,
    pub users: i64,
}
