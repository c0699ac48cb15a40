use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Asset, Credentials, NewUser, User, UserSummary};
use super::{new_id, now};

const USER_COLUMNS: &str = "id, sub, username, email, password_hash, avatar_public_id, avatar_url, \
                            is_admin, is_google_id, refresh_token, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        sub: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        avatar_public_id: row.get(5)?,
        avatar_url: row.get(6)?,
        is_admin: row.get(7)?,
        is_google_id: row.get(8)?,
        refresh_token: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn find_one(conn: &Connection, filter: &str, value: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, filter),
        params![value],
        map_user,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    find_one(conn, "id", id)
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    find_one(conn, "email", email)
}

pub fn find_by_subject(conn: &Connection, subject: &str) -> rusqlite::Result<Option<User>> {
    find_one(conn, "sub", subject)
}

/// Looks up the account currently holding this refresh token.
pub fn find_by_refresh_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    find_one(conn, "refresh_token", token)
}

pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn create(conn: &Connection, user: &NewUser) -> rusqlite::Result<User> {
    let id = new_id();
    let created_at = now();

    let (sub, password_hash, is_google_id) = match &user.credentials {
        Credentials::Password(hash) => (None, Some(hash.as_str()), false),
        Credentials::Google { subject } => (Some(subject.as_str()), None, true),
    };

    conn.execute(
        "INSERT INTO users (id, sub, username, email, password_hash, avatar_url, is_admin,
                            is_google_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
        params![
            id,
            sub,
            user.username,
            user.email,
            password_hash,
            user.avatar_url,
            is_google_id,
            created_at
        ],
    )?;

    find_by_id(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Stores `token` as the account's only session. Any earlier refresh token
/// stops working: one active session per user.
pub fn replace_refresh_token(conn: &Connection, id: &str, token: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET refresh_token = ?1 WHERE id = ?2",
        params![token, id],
    )?;
    Ok(())
}

/// Ends the account's session; later refreshes fail.
pub fn clear_refresh_token(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET refresh_token = NULL WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, avatar_url, is_admin, is_google_id, created_at
         FROM users
         ORDER BY created_at DESC, id DESC",
    )?;

    let users = stmt
        .query_map([], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                avatar: row.get(3)?,
                is_admin: row.get(4)?,
                is_google_id: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

/// Profile fields to change; `None` leaves the column alone.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<Asset>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.avatar.is_none()
    }
}

pub fn update_profile(conn: &Connection, id: &str, changes: &ProfileChanges) -> rusqlite::Result<()> {
    let (avatar_public_id, avatar_url) = match &changes.avatar {
        Some(asset) => (Some(asset.public_id.as_str()), Some(asset.url.as_str())),
        None => (None, None),
    };

    conn.execute(
        "UPDATE users SET
            username = COALESCE(?1, username),
            email = COALESCE(?2, email),
            password_hash = COALESCE(?3, password_hash),
            avatar_public_id = COALESCE(?4, avatar_public_id),
            avatar_url = COALESCE(?5, avatar_url),
            updated_at = ?6
         WHERE id = ?7",
        params![
            changes.username,
            changes.email,
            changes.password_hash,
            avatar_public_id,
            avatar_url,
            now(),
            id
        ],
    )?;
    Ok(())
}

/// Writes back the profile columns of a previously loaded row.
pub fn restore_profile(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET
            username = ?1,
            email = ?2,
            password_hash = ?3,
            avatar_public_id = ?4,
            avatar_url = ?5,
            updated_at = ?6
         WHERE id = ?7",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.avatar_public_id,
            user.avatar_url,
            user.updated_at,
            user.id
        ],
    )?;
    Ok(())
}

/// Removes the account. Comments the user wrote are left in place.
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
