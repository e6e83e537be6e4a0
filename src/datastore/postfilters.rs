//! Ways to filter posts. Filter semantics work just like SQL:
//! If a field is unset, its filter won't be applied.
//! If set, filter out posts that don't match the filter.
use crate::datastore::structs::Post;

/// Filters that can be applied to post listings.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct PostFilters {
    /// Only posts written by this user.
    pub author_id: Option<i32>,
    /// Only posts written by this user or by someone they follow.
    pub feed_of: Option<i32>,
}

impl PostFilters {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_author(user_id: i32) -> Self {
        Self {
            author_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn feed_of(user_id: i32) -> Self {
        Self {
            feed_of: Some(user_id),
            ..Default::default()
        }
    }

    /// Does this post match all specified filters? `follows(a, b)` answers "does a follow b".
    /// Postgres does this in SQL; see `post_store::as_sql_where`.
    #[cfg(test)]
    pub fn matches(&self, post: &Post, follows: impl Fn(i32, i32) -> bool) -> bool {
        if let Some(author_id) = self.author_id {
            if post.user_id != author_id {
                return false;
            }
        }
        if let Some(reader) = self.feed_of {
            if post.user_id != reader && !follows(reader, post.user_id) {
                return false;
            }
        }
        true
    }
}

/// Which slice of an ordered listing to return. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Out-of-range values are clamped rather than rejected.
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results plus enough bookkeeping to link to its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    /// Number of items across all pages.
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    pub fn pages(&self) -> i64 {
        (self.total + self.per_page - 1) / self.per_page
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn prev_num(&self) -> Option<i64> {
        if self.has_prev() {
            Some(self.page - 1)
        } else {
            None
        }
    }

    pub fn next_num(&self) -> Option<i64> {
        if self.has_next() {
            Some(self.page + 1)
        } else {
            None
        }
    }
}
