use crate::datastore::{
    postfilters::{PageRequest, Paginated, PostFilters},
    structs::{AuthoredPost, Follow, FollowCounts, NewPost, NewUser, Post, ProfileChange, User},
};
use crate::twoface::{Cause, Fallible, TfError};
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default, Debug)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    follows: BTreeSet<Follow>,
}

impl Tables {
    fn user(&self, user_id: i32) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    fn follows(&self, follower_id: i32, followed_id: i32) -> bool {
        self.follows.contains(&Follow {
            follower_id,
            followed_id,
        })
    }

    fn users_sorted(&self, ids: impl Iterator<Item = i32>) -> Vec<User> {
        let mut users: Vec<User> = ids.filter_map(|id| self.user(id).cloned()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

/// An in-memory implementation of datastore::Client
#[derive(Clone, Default, Debug)]
pub struct Client {
    tables: Arc<Mutex<Tables>>,
}

impl Client {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Insert a user directly, skipping password hashing.
    pub fn add_user(&self, username: &str) -> User {
        let mut tables = self.tables();
        let user = User {
            id: tables.users.len() as i32 + 1,
            username: username.to_owned(),
            email: format!("{}@example.com", username),
            password_hash: String::new(),
            about_me: None,
            last_seen: Utc::now(),
        };
        tables.users.push(user.clone());
        user
    }

    /// Insert a post with an explicit timestamp.
    pub fn add_post(&self, author: &User, body: &str, timestamp: DateTime<Utc>) -> Post {
        let mut tables = self.tables();
        let post = Post {
            id: tables.posts.len() as i32 + 1,
            body: body.to_owned(),
            timestamp,
            user_id: author.id,
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn user(&self, user_id: i32) -> Option<User> {
        self.tables().user(user_id).cloned()
    }
}

#[async_trait]
impl super::Client for Client {
    async fn create_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut tables = self.tables();
        let taken = tables
            .users
            .iter()
            .any(|u| u.username == new_user.username || u.email == new_user.email);
        if taken {
            return Err(TfError::new(
                Cause::UserConflict,
                "That username or email is already taken",
            ));
        }
        let user = User {
            id: tables.users.len() as i32 + 1,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            about_me: None,
            last_seen: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        Ok(self.user(user_id))
    }

    async fn find_user_by_username(&self, username: String) -> Fallible<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: String) -> Fallible<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, user_id: i32, change: ProfileChange) -> Fallible<User> {
        let mut tables = self.tables();
        let taken = tables
            .users
            .iter()
            .any(|u| u.id != user_id && u.username == change.username);
        if taken {
            return Err(TfError::new(
                Cause::UserConflict,
                "That username is already taken",
            ));
        }
        let user = tables.users.iter_mut().find(|u| u.id == user_id);
        guard!(let Some(user) = user else {
            return Err(TfError::not_found("User not found"))
        });
        user.username = change.username;
        user.about_me = change.about_me;
        Ok(user.clone())
    }

    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()> {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == user_id) {
            user.last_seen = at;
        }
        Ok(())
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let mut tables = self.tables();
        let post = Post {
            id: tables.posts.len() as i32 + 1,
            body: new_post.body,
            timestamp: new_post.timestamp,
            user_id: new_post.user_id,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn list_posts(
        &self,
        filters: PostFilters,
        page: PageRequest,
    ) -> Fallible<Paginated<AuthoredPost>> {
        let tables = self.tables();
        let mut matching: Vec<&Post> = tables
            .posts
            .iter()
            .filter(|p| filters.matches(p, |a, b| tables.follows(a, b)))
            .collect();
        matching.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .filter_map(|post| {
                tables.user(post.user_id).map(|author| AuthoredPost {
                    post: post.clone(),
                    author: author.clone(),
                })
            })
            .collect();
        Ok(Paginated::new(items, page, total))
    }

    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        Ok(self.tables().follows.insert(Follow {
            follower_id,
            followed_id,
        }))
    }

    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        Ok(self.tables().follows.remove(&Follow {
            follower_id,
            followed_id,
        }))
    }

    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        Ok(self.tables().follows(follower_id, followed_id))
    }

    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>> {
        let tables = self.tables();
        let ids = tables
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.followed_id);
        Ok(tables.users_sorted(ids))
    }

    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>> {
        let tables = self.tables();
        let ids = tables
            .follows
            .iter()
            .filter(|f| f.followed_id == user_id)
            .map(|f| f.follower_id);
        Ok(tables.users_sorted(ids))
    }

    async fn follow_counts(&self, user_id: i32) -> Fallible<FollowCounts> {
        let tables = self.tables();
        Ok(FollowCounts {
            followers: tables
                .follows
                .iter()
                .filter(|f| f.followed_id == user_id)
                .count() as i64,
            followed: tables
                .follows
                .iter()
                .filter(|f| f.follower_id == user_id)
                .count() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::datastore::{
        postfilters::{PageRequest, PostFilters},
        structs::{NewUser, Post, ProfileChange},
        Client as _,
    };
    use crate::twoface::Cause;
    use chrono::{offset::Utc, Duration};

    async fn feed(ds: &Client, user_id: i32) -> Vec<Post> {
        ds.list_posts(PostFilters::feed_of(user_id), PageRequest::new(1, 100))
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|p| p.post)
            .collect()
    }

    #[actix_rt::test]
    async fn test_follows() {
        let ds = Client::default();
        let user1 = ds.add_user("user1");
        let user2 = ds.add_user("user2");

        assert!(ds.followed(user1.id).await.unwrap().is_empty());
        assert!(ds.followers(user1.id).await.unwrap().is_empty());
        assert!(!ds.is_following(user1.id, user2.id).await.unwrap());

        assert!(ds.follow(user1.id, user2.id).await.unwrap());
        assert!(ds.is_following(user1.id, user2.id).await.unwrap());
        let followed = ds.followed(user1.id).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].username, "user2");
        let followers = ds.followers(user2.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "user1");
        // Following is directed.
        assert!(!ds.is_following(user2.id, user1.id).await.unwrap());

        assert!(ds.unfollow(user1.id, user2.id).await.unwrap());
        assert!(!ds.is_following(user1.id, user2.id).await.unwrap());
        assert_eq!(ds.follow_counts(user1.id).await.unwrap().followed, 0);
        assert_eq!(ds.follow_counts(user2.id).await.unwrap().followers, 0);
    }

    #[actix_rt::test]
    async fn test_follow_and_unfollow_are_idempotent() {
        let ds = Client::default();
        let a = ds.add_user("a");
        let b = ds.add_user("b");

        assert!(ds.follow(a.id, b.id).await.unwrap());
        assert!(!ds.follow(a.id, b.id).await.unwrap());
        assert_eq!(ds.follow_counts(a.id).await.unwrap().followed, 1);

        assert!(ds.unfollow(a.id, b.id).await.unwrap());
        assert!(!ds.unfollow(a.id, b.id).await.unwrap());
        assert_eq!(ds.follow_counts(a.id).await.unwrap().followed, 0);
    }

    #[actix_rt::test]
    async fn test_followed_posts() {
        let ds = Client::default();
        let user1 = ds.add_user("user1");
        let user2 = ds.add_user("user2");
        let user3 = ds.add_user("user3");
        let user4 = ds.add_user("user4");

        let now = Utc::now();
        let post1 = ds.add_post(&user1, "Post from user1", now + Duration::seconds(1));
        let post2 = ds.add_post(&user2, "Post from user2", now + Duration::seconds(6));
        let post3 = ds.add_post(&user3, "Post from user3", now + Duration::seconds(4));
        let post4 = ds.add_post(&user4, "Post from user4", now + Duration::seconds(9));

        ds.follow(user1.id, user2.id).await.unwrap();
        ds.follow(user1.id, user3.id).await.unwrap();
        ds.follow(user2.id, user3.id).await.unwrap();
        ds.follow(user3.id, user4.id).await.unwrap();

        assert_eq!(
            feed(&ds, user1.id).await,
            vec![post2.clone(), post3.clone(), post1]
        );
        assert_eq!(feed(&ds, user2.id).await, vec![post2, post3.clone()]);
        assert_eq!(feed(&ds, user3.id).await, vec![post4.clone(), post3]);
        assert_eq!(feed(&ds, user4.id).await, vec![post4]);
    }

    #[actix_rt::test]
    async fn test_self_follow_does_not_duplicate_feed() {
        let ds = Client::default();
        let narcissus = ds.add_user("narcissus");
        let post = ds.add_post(&narcissus, "me", Utc::now());
        ds.follow(narcissus.id, narcissus.id).await.unwrap();
        assert_eq!(feed(&ds, narcissus.id).await, vec![post]);
    }

    #[actix_rt::test]
    async fn test_equal_timestamps_order_by_id() {
        let ds = Client::default();
        let user = ds.add_user("user");
        let at = Utc::now();
        let first = ds.add_post(&user, "first", at);
        let second = ds.add_post(&user, "second", at);
        assert_eq!(feed(&ds, user.id).await, vec![second, first]);
    }

    #[actix_rt::test]
    async fn test_pagination_degrades_gracefully() {
        let ds = Client::default();
        let user = ds.add_user("user");
        let start = Utc::now();
        for i in 0..5 {
            ds.add_post(&user, &format!("post {}", i), start + Duration::seconds(i));
        }

        let page2 = ds
            .list_posts(PostFilters::by_author(user.id), PageRequest::new(2, 2))
            .await
            .unwrap();
        let bodies: Vec<_> = page2.items.iter().map(|p| p.post.body.as_str()).collect();
        assert_eq!(bodies, vec!["post 2", "post 1"]);
        assert_eq!(page2.total, 5);
        assert!(page2.has_prev() && page2.has_next());

        let page9 = ds
            .list_posts(PostFilters::by_author(user.id), PageRequest::new(9, 2))
            .await
            .unwrap();
        assert!(page9.items.is_empty());
        assert!(!page9.has_next());
    }

    #[actix_rt::test]
    async fn test_duplicates_are_conflicts() {
        let ds = Client::default();
        ds.create_user(NewUser {
            username: "susan".to_owned(),
            email: "susan@example.com".to_owned(),
            password_hash: String::new(),
        })
        .await
        .unwrap();
        let err = ds
            .create_user(NewUser {
                username: "susan2".to_owned(),
                email: "susan@example.com".to_owned(),
                password_hash: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.cause(), Cause::UserConflict);

        let other = ds.add_user("john");
        let err = ds
            .update_profile(
                other.id,
                ProfileChange {
                    username: "susan".to_owned(),
                    about_me: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.cause(), Cause::UserConflict);
    }
}
