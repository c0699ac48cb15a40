use serde::{Deserialize, Serialize};

/// An image stored on the asset host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub public_id: String,
    pub url: String,
}

/// Full user row. Never serialized directly: see [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub sub: Option<String>,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub avatar_public_id: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_google_id: bool,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            avatar: self.avatar_url.clone(),
            is_admin: self.is_admin,
            is_google_id: self.is_google_id,
        }
    }
}

/// How a new account proves who it is. Exactly one applies per account.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Local account, bcrypt hash of the password.
    Password(String),
    /// Account backed by an external identity provider.
    Google { subject: String },
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub credentials: Credentials,
}

/// User as returned to the client after sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_google_id: bool,
}

/// Row of the admin user listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_google_id: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub image: Asset,
    pub created_at: String,
    pub updated_at: String,
}

/// Single post view with its full body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub image: String,
    pub updated_at: String,
}

impl From<Post> for PostDetail {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            category: post.category,
            content: post.content,
            image: post.image.url,
            updated_at: post.updated_at,
        }
    }
}

/// List view of a post; the body is left out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListItem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub image: Asset,
    pub updated_at: String,
}

/// Shape shared by the recent-posts and search results.
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub comment: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Entry of the global comment listing, likes reduced to a count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListItem {
    pub id: String,
    pub comment: String,
    pub commented_by: String,
    pub commented_on: String,
    pub updated_at: String,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentAuthor {
    pub username: String,
    pub avatar: Option<String>,
}

/// Comment under a post, with fields relative to the viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostComment {
    pub id: String,
    pub comment: String,
    pub created_at: String,
    pub commented_by: CommentAuthor,
    pub is_commentator: bool,
    pub total_likes: i64,
    pub has_liked: bool,
}

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub has_liked: bool,
    pub total_likes: i64,
}
