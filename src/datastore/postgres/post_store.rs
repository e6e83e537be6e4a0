use crate::datastore::{
    postfilters::PostFilters,
    tables::{follows, posts},
};
use diesel::{
    expression::BoxableExpression, expression_methods::BoolExpressionMethods, pg::Pg,
    query_dsl::QueryDsl, sql_types::Bool, ExpressionMethods,
};

type PostPredicate = Box<dyn BoxableExpression<posts::table, Pg, SqlType = Bool>>;

impl PostFilters {
    pub fn as_sql_where(&self) -> Vec<PostPredicate> {
        let mut wheres: Vec<PostPredicate> = Vec::new();
        if let Some(author_id) = self.author_id {
            wheres.push(Box::new(posts::user_id.eq(author_id)))
        }
        if let Some(reader) = self.feed_of {
            // Own posts UNION posts by followed users. Expressed as one predicate, each post
            // matches at most once, so the union needs no separate de-duplication.
            let followed = follows::table
                .filter(follows::follower_id.eq(reader))
                .select(follows::followed_id);
            wheres.push(Box::new(
                posts::user_id
                    .eq(reader)
                    .or(posts::user_id.eq_any(followed)),
            ))
        }
        wheres
    }
}
