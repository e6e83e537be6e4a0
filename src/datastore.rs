#[cfg(test)]
pub mod mock;
pub mod postfilters;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::twoface::Fallible;
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};
use postfilters::{PageRequest, Paginated, PostFilters};
use structs::{AuthoredPost, FollowCounts, NewPost, NewUser, Post, ProfileChange, User};

#[async_trait]
/// The interface for storing users, posts and the follow graph.
pub trait Client: Send + Sync + 'static {
    /// Fails with `Cause::UserConflict` if the username or email is taken.
    async fn create_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>>;
    async fn find_user_by_username(&self, username: String) -> Fallible<Option<User>>;
    async fn find_user_by_email(&self, email: String) -> Fallible<Option<User>>;
    /// Fails with `Cause::UserConflict` if the new username is taken.
    async fn update_profile(&self, user_id: i32, change: ProfileChange) -> Fallible<User>;
    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()>;

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post>;
    /// Matching posts, newest first. Posts with equal timestamps are ordered by descending id.
    async fn list_posts(
        &self,
        filters: PostFilters,
        page: PageRequest,
    ) -> Fallible<Paginated<AuthoredPost>>;

    /// Returns true if a new edge was created, false if it already existed.
    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    /// Returns true if an edge was removed, false if there was none.
    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    /// Users that `user_id` follows, by username.
    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>>;
    /// Users following `user_id`, by username.
    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>>;
    async fn follow_counts(&self, user_id: i32) -> Fallible<FollowCounts>;
}
