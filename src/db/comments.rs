use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Comment, CommentAuthor, CommentListItem, LikeState, PostComment};
use super::{new_id, now};

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        "SELECT id, comment, user_id, post_id, created_at, updated_at FROM comments WHERE id = ?1",
        params![id],
        |row| {
            Ok(Comment {
                id: row.get(0)?,
                comment: row.get(1)?,
                user_id: row.get(2)?,
                post_id: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )
    .optional()
}

pub fn create(conn: &Connection, text: &str, user_id: &str, post_id: &str) -> rusqlite::Result<String> {
    let id = new_id();
    let created_at = now();
    conn.execute(
        "INSERT INTO comments (id, comment, user_id, post_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, text, user_id, post_id, created_at],
    )?;
    Ok(id)
}

/// All comments, newest first.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<CommentListItem>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.comment, c.user_id, c.post_id, c.updated_at,
                (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id)
         FROM comments c
         ORDER BY c.created_at DESC, c.id DESC",
    )?;

    let comments = stmt
        .query_map([], |row| {
            Ok(CommentListItem {
                id: row.get(0)?,
                comment: row.get(1)?,
                commented_by: row.get(2)?,
                commented_on: row.get(3)?,
                updated_at: row.get(4)?,
                likes: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

/// Comments on a post in reading order, each joined to its author.
/// `viewer_id` decides `is_commentator` and `has_liked`. Comments whose
/// author no longer exists are skipped.
pub fn for_post(
    conn: &Connection,
    post_id: &str,
    viewer_id: &str,
) -> rusqlite::Result<Vec<PostComment>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.comment, c.created_at, u.username, u.avatar_url,
                c.user_id = ?2,
                (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id),
                EXISTS (SELECT 1 FROM comment_likes l WHERE l.comment_id = c.id AND l.user_id = ?2)
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id, viewer_id], |row| {
            Ok(PostComment {
                id: row.get(0)?,
                comment: row.get(1)?,
                created_at: row.get(2)?,
                commented_by: CommentAuthor {
                    username: row.get(3)?,
                    avatar: row.get(4)?,
                },
                is_commentator: row.get(5)?,
                total_likes: row.get(6)?,
                has_liked: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

/// Flips `user_id`'s membership in the comment's likes: removes it if present,
/// adds it otherwise. Applying it twice restores the original set.
pub fn toggle_like(
    conn: &mut Connection,
    comment_id: &str,
    user_id: &str,
) -> rusqlite::Result<LikeState> {
    let tx = conn.transaction()?;

    let removed = tx.execute(
        "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
        params![comment_id, user_id],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![comment_id, user_id, now()],
        )?;
    }

    let total_likes: i64 = tx.query_row(
        "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
        params![comment_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    Ok(LikeState {
        has_liked: removed == 0,
        total_likes,
    })
}

pub fn likers(conn: &Connection, comment_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM comment_likes WHERE comment_id = ?1 ORDER BY created_at, user_id",
    )?;
    let ids = stmt
        .query_map(params![comment_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn update_text(conn: &Connection, id: &str, text: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE comments SET comment = ?1, updated_at = ?2 WHERE id = ?3",
        params![text, now(), id],
    )?;
    Ok(rows > 0)
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
