use crate::datastore::{
    postfilters::{PageRequest, Paginated, PostFilters},
    postgres::{
        errors::{BlockingResp, DbPoolResult},
        PostgresStore,
    },
    structs::{AuthoredPost, Follow, FollowCounts, NewPost, NewUser, Post, ProfileChange, User},
    tables::{follows, posts, users},
    Client,
};
use crate::twoface::{unique_violation, Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};
use diesel::{
    dsl::exists,
    query_dsl::{QueryDsl, RunQueryDsl},
    Connection, ExpressionMethods, JoinOnDsl, OptionalExtension,
};
use std::collections::HashMap;

#[async_trait]
impl Client for PostgresStore {
    async fn create_user(&self, new_user: NewUser) -> Fallible<User> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&conn)
                .map_err(|e| unique_violation(e, "That username or email is already taken"))
        })
        .await
        .to_resp()
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            users::table
                .find(user_id)
                .get_result::<User>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn find_user_by_username(&self, username: String) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            users::table
                .filter(users::username.eq(username))
                .first::<User>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn find_user_by_email(&self, email: String) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            users::table
                .filter(users::email.eq(email))
                .first::<User>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn update_profile(&self, user_id: i32, change: ProfileChange) -> Fallible<User> {
        let conn = self.pool.get()?;
        block(move || {
            let updated = diesel::update(users::table.find(user_id))
                .set(&change)
                .get_result::<User>(&conn)
                .optional()
                .map_err(|e| unique_violation(e, "That username is already taken"))?;
            guard!(let Some(user) = updated else {
                return Err(TfError::not_found("User not found"))
            });
            Ok(user)
        })
        .await
        .to_resp()
    }

    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::update(users::table.find(user_id))
                .set(users::last_seen.eq(at))
                .execute(&conn)
        })
        .await;
        query_result.to_resp()?;
        Ok(())
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::insert_into(posts::table)
                .values(&new_post)
                .get_result::<Post>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn list_posts(
        &self,
        filters: PostFilters,
        page: PageRequest,
    ) -> Fallible<Paginated<AuthoredPost>> {
        let conn = self.pool.get()?;
        block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let mut count = posts::table.into_boxed();
                for filter in filters.as_sql_where() {
                    count = count.filter(filter);
                }
                let total: i64 = count.count().get_result(&conn)?;

                let mut query = posts::table.into_boxed();
                for filter in filters.as_sql_where() {
                    query = query.filter(filter);
                }
                let posts: Vec<Post> = query
                    .order_by((posts::timestamp.desc(), posts::id.desc()))
                    .limit(page.per_page)
                    .offset(page.offset())
                    .load(&conn)?;

                let author_ids: Vec<i32> = posts.iter().map(|p| p.user_id).collect();
                let authors: HashMap<i32, User> = users::table
                    .filter(users::id.eq_any(author_ids))
                    .load::<User>(&conn)?
                    .into_iter()
                    .map(|u| (u.id, u))
                    .collect();

                let items = posts
                    .into_iter()
                    .filter_map(|post| {
                        authors.get(&post.user_id).map(|author| AuthoredPost {
                            author: author.clone(),
                            post,
                        })
                    })
                    .collect();
                Ok(Paginated::new(items, page, total))
            })
        })
        .await
        .to_resp()
    }

    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            conn.transaction(|| {
                let edge = follows::table.find((follower_id, followed_id));
                if diesel::select(exists(edge)).get_result::<bool>(&conn)? {
                    return Ok(false);
                }
                diesel::insert_into(follows::table)
                    .values(&Follow {
                        follower_id,
                        followed_id,
                    })
                    .execute(&conn)?;
                Ok(true)
            })
        })
        .await;
        query_result.to_resp()
    }

    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let deleted =
                diesel::delete(follows::table.find((follower_id, followed_id))).execute(&conn)?;
            Ok(deleted > 0)
        })
        .await;
        query_result.to_resp()
    }

    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::select(exists(follows::table.find((follower_id, followed_id))))
                .get_result::<bool>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            follows::table
                .filter(follows::follower_id.eq(user_id))
                .inner_join(users::table.on(users::id.eq(follows::followed_id)))
                .select(users::all_columns)
                .order_by(users::username)
                .load::<User>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            follows::table
                .filter(follows::followed_id.eq(user_id))
                .inner_join(users::table.on(users::id.eq(follows::follower_id)))
                .select(users::all_columns)
                .order_by(users::username)
                .load::<User>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn follow_counts(&self, user_id: i32) -> Fallible<FollowCounts> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let followers = follows::table
                .filter(follows::followed_id.eq(user_id))
                .count()
                .get_result(&conn)?;
            let followed = follows::table
                .filter(follows::follower_id.eq(user_id))
                .count()
                .get_result(&conn)?;
            Ok(FollowCounts {
                followers,
                followed,
            })
        })
        .await;
        query_result.to_resp()
    }
}
