use regex::{Regex, RegexBuilder};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Asset, Post, PostCard, PostListItem};
use super::{new_id, now};

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        content: row.get(3)?,
        image: Asset {
            public_id: row.get(4)?,
            url: row.get(5)?,
        },
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_card(row: &Row<'_>) -> rusqlite::Result<PostCard> {
    Ok(PostCard {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        image: row.get(4)?,
    })
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        "SELECT id, title, category, content, image_public_id, image_url, created_at, updated_at
         FROM posts WHERE id = ?1",
        params![id],
        map_post,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub content: &'a str,
    pub image: &'a Asset,
}

pub fn create(conn: &Connection, post: &NewPost<'_>) -> rusqlite::Result<String> {
    let id = new_id();
    let created_at = now();
    conn.execute(
        "INSERT INTO posts (id, title, category, content, image_public_id, image_url,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            post.title,
            post.category,
            post.content,
            post.image.public_id,
            post.image.url,
            created_at
        ],
    )?;
    Ok(id)
}

/// Writes every editable field of `post` back to its row.
pub fn save(conn: &Connection, post: &Post) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE posts SET title = ?1, category = ?2, content = ?3, image_public_id = ?4,
                          image_url = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            post.title,
            post.category,
            post.content,
            post.image.public_id,
            post.image.url,
            now(),
            post.id
        ],
    )?;
    Ok(())
}

/// Deletes the post and every comment on it in one transaction.
/// Returns the number of comments removed.
pub fn delete_with_comments(conn: &mut Connection, id: &str) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let comments = tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(comments)
}

/// All posts, newest first, without their bodies.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<PostListItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, category, image_public_id, image_url, updated_at
         FROM posts
         ORDER BY created_at DESC, id DESC",
    )?;

    let posts = stmt
        .query_map([], |row| {
            Ok(PostListItem {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                image: Asset {
                    public_id: row.get(3)?,
                    url: row.get(4)?,
                },
                updated_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(posts)
}

pub const RECENT_LIMIT: i64 = 5;

pub fn recent(conn: &Connection) -> rusqlite::Result<Vec<PostCard>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, category, image_url
         FROM posts
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;

    let posts = stmt
        .query_map(params![RECENT_LIMIT], map_card)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Term that matches every post.
pub const MATCH_ALL: &str = "@all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    /// `latest` sorts newest first; anything else sorts oldest first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("latest") => SortOrder::NewestFirst,
            _ => SortOrder::OldestFirst,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "ORDER BY created_at DESC, id DESC",
            SortOrder::OldestFirst => "ORDER BY created_at ASC, id ASC",
        }
    }
}

/// Case-insensitive matcher for search: a post matches when its title matches
/// the term or its category matches the category filter.
#[derive(Debug)]
pub struct SearchFilter {
    title: Option<Regex>,
    category: Option<Regex>,
}

impl SearchFilter {
    pub fn new(term: Option<&str>, category: Option<&str>) -> Result<Self, regex::Error> {
        let term = term.map(|t| if t == MATCH_ALL { "" } else { t });
        Ok(Self {
            title: term.map(pattern).transpose()?,
            category: category.map(pattern).transpose()?,
        })
    }

    pub fn matches(&self, title: &str, category: &str) -> bool {
        self.title.as_ref().is_some_and(|re| re.is_match(title))
            || self.category.as_ref().is_some_and(|re| re.is_match(category))
    }
}

/// Compiles user input as a regex; input that is not a valid regex is matched literally.
fn pattern(input: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(input)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(input))
                .case_insensitive(true)
                .build()
        })
}

pub fn search(
    conn: &Connection,
    filter: &SearchFilter,
    order: SortOrder,
) -> rusqlite::Result<Vec<PostCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, title, content, category, image_url FROM posts {}",
        order.sql()
    ))?;

    let posts = stmt
        .query_map([], map_card)?
        .filter(|r| match r {
            Ok(card) => filter.matches(&card.title, &card.category),
            Err(_) => true,
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
