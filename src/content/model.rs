use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to a user. Admins may mutate any entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

// -- Stored entities --
//
// These are the document shapes persisted in the store, camelCase on the
// wire. The `password` field holds the bcrypt hash and never leaves through
// a public view.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub created_by: String,
    pub vote_count: i64,
    #[serde(default)]
    pub users_vote: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub description: String,
    pub post_id: String,
    pub created_by: String,
    pub vote_count: i64,
    #[serde(default)]
    pub users_vote: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entities that carry vote bookkeeping.
pub trait Votable {
    fn users_vote(&self) -> &[String];
}

impl Votable for Post {
    fn users_vote(&self) -> &[String] {
        &self.users_vote
    }
}

impl Votable for Comment {
    fn users_vote(&self) -> &[String] {
        &self.users_vote
    }
}

// -- Public views --
//
// What leaves the service layer: internal bookkeeping (`usersVote`,
// timestamps) and credentials are stripped. Views are what gets cached, so
// cached and fresh reads return the same shape.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub created_by: String,
    pub vote_count: i64,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            description: post.description,
            categories: post.categories,
            created_by: post.created_by,
            vote_count: post.vote_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub description: String,
    pub post_id: String,
    pub created_by: String,
    pub vote_count: i64,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            description: comment.description,
            post_id: comment.post_id,
            created_by: comment.created_by,
            vote_count: comment.vote_count,
        }
    }
}

// -- Request payloads --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub description: String,
}

// -- Patches --
//
// Explicit optional fields instead of an open map merged into storage:
// `createdBy`, `voteCount`, `usersVote` and role-like fields cannot be
// smuggled through an update.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub description: Option<String>,
}
