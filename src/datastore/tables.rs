table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        about_me -> Nullable<Varchar>,
        last_seen -> Timestamptz,
    }
}

table! {
    posts (id) {
        id -> Int4,
        body -> Varchar,
        timestamp -> Timestamptz,
        user_id -> Int4,
    }
}

table! {
    follows (follower_id, followed_id) {
        follower_id -> Int4,
        followed_id -> Int4,
    }
}

joinable!(posts -> users (user_id));
allow_tables_to_appear_in_same_query!(posts, users);

// follows references users twice, so joins against it always spell out the ON clause.
allow_tables_to_appear_in_same_query!(follows, users);
allow_tables_to_appear_in_same_query!(follows, posts);
