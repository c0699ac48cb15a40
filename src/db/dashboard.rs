use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::timestamp;

/// How many of the newest documents each summary carries.
pub const LATEST_LIMIT: i64 = 2;

/// Width of the "recent" window in days.
pub const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Posts,
    Comments,
}

/// Display shape of a recently created document, one case per collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LatestEntry {
    User {
        id: String,
        username: String,
        avatar: Option<String>,
    },
    Post {
        id: String,
        image: String,
        title: String,
        content: String,
    },
    Comment {
        id: String,
        comment: String,
        likes: i64,
    },
}

impl Collection {
    fn table(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }

    fn latest_sql(self) -> &'static str {
        match self {
            Collection::Users => {
                "SELECT id, username, avatar_url FROM users
                 ORDER BY created_at DESC, id DESC LIMIT ?1"
            }
            Collection::Posts => {
                "SELECT id, image_url, title, content FROM posts
                 ORDER BY created_at DESC, id DESC LIMIT ?1"
            }
            Collection::Comments => {
                "SELECT c.id, c.comment,
                        (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id)
                 FROM comments c
                 ORDER BY c.created_at DESC, c.id DESC LIMIT ?1"
            }
        }
    }

    fn map_latest(self, row: &Row<'_>) -> rusqlite::Result<LatestEntry> {
        Ok(match self {
            Collection::Users => LatestEntry::User {
                id: row.get(0)?,
                username: row.get(1)?,
                avatar: row.get(2)?,
            },
            Collection::Posts => LatestEntry::Post {
                id: row.get(0)?,
                image: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
            },
            Collection::Comments => LatestEntry::Comment {
                id: row.get(0)?,
                comment: row.get(1)?,
                likes: row.get(2)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub total: i64,
    pub last30days: i64,
    pub latest: Vec<LatestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub users: CollectionSummary,
    pub posts: CollectionSummary,
    pub comments: CollectionSummary,
}

pub fn summarize(
    conn: &Connection,
    collection: Collection,
    now: DateTime<Utc>,
) -> rusqlite::Result<CollectionSummary> {
    let table = collection.table();
    let since = timestamp(now - Duration::days(RECENT_WINDOW_DAYS));

    let total: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    let last30days: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE created_at >= ?1", table),
        params![since],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(collection.latest_sql())?;
    let latest = stmt
        .query_map(params![LATEST_LIMIT], |row| collection.map_latest(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CollectionSummary {
        total,
        last30days,
        latest,
    })
}

/// Summaries of all three collections; any failing query fails the whole dashboard.
pub fn build(conn: &Connection, now: DateTime<Utc>) -> rusqlite::Result<Dashboard> {
    Ok(Dashboard {
        users: summarize(conn, Collection::Users, now)?,
        posts: summarize(conn, Collection::Posts, now)?,
        comments: summarize(conn, Collection::Comments, now)?,
    })
}
