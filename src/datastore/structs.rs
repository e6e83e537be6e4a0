use crate::datastore::tables::{follows, posts, users};
use crate::passwords;
use crate::twoface::Fallible;
use chrono::{offset::Utc, DateTime};
use digest::Digest;
use md5::Md5;
use serde::Serialize;

/// A user of the website.
#[derive(Queryable, Identifiable, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl User {
    /// Replace the stored hash with a fresh salted hash of `password`.
    pub fn set_password(&mut self, password: &str) -> Fallible<()> {
        self.password_hash = passwords::hash_password(password)?;
        Ok(())
    }

    pub fn check_password(&self, password: &str) -> bool {
        passwords::verify_password(password, &self.password_hash)
    }

    /// Gravatar identicon for the user's email, `size` pixels square.
    pub fn avatar(&self, size: u32) -> String {
        avatar_url(&self.email, size)
    }
}

pub fn avatar_url(email: &str, size: u32) -> String {
    let digest = Md5::digest(email.to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?d=identicon&s={}",
        hex::encode(digest),
        size
    )
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Debug, Clone)]
#[table_name = "users"]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(username: String, email: String, password: &str) -> Fallible<Self> {
        Ok(Self {
            username,
            email,
            password_hash: passwords::hash_password(password)?,
        })
    }
}

/// The fields a user can change on the edit-profile page.
#[derive(AsChangeset, Debug, Clone)]
#[table_name = "users"]
#[changeset_options(treat_none_as_null = "true")]
pub struct ProfileChange {
    pub username: String,
    pub about_me: Option<String>,
}

/// A post from a user
#[derive(Queryable, Identifiable, Associations, Clone, Debug, PartialEq, Eq)]
#[belongs_to(User)]
pub struct Post {
    pub id: i32,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i32,
}

/// Parameters for the database statement which inserts new posts.
#[derive(Insertable, Debug, Clone)]
#[table_name = "posts"]
pub struct NewPost {
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i32,
}

impl NewPost {
    pub fn now(user_id: i32, body: String) -> Self {
        Self {
            body,
            timestamp: Utc::now(),
            user_id,
        }
    }
}

/// A post together with the user who wrote it, which is what every page listing posts needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthoredPost {
    pub post: Post,
    pub author: User,
}

/// A directed edge in the follow graph.
#[derive(Insertable, Queryable, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[table_name = "follows"]
pub struct Follow {
    pub follower_id: i32,
    pub followed_id: i32,
}

/// Sizes of both sides of a user's place in the follow graph.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub followed: i64,
}
