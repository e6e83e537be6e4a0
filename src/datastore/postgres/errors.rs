use crate::twoface::{Fallible, TfError};
use actix_web::error::BlockingError;
use anyhow::anyhow;
use diesel::result::Error as DieselError;
use std::fmt::Debug;

/// What `web::block` returns when the closure only runs Diesel queries.
pub type DbPoolResult<T> = Result<T, BlockingError<DieselError>>;

/// Flattens the result of a `web::block` call into the closure's own error, or a server error
/// if the threadpool dropped the task.
pub trait BlockingResp<T> {
    fn to_resp(self) -> Fallible<T>;
}

impl<T, E> BlockingResp<T> for Result<T, BlockingError<E>>
where
    E: Debug + Into<TfError>,
{
    fn to_resp(self) -> Fallible<T> {
        self.map_err(|e| match e {
            BlockingError::Error(e) => e.into(),
            BlockingError::Canceled => TfError::from(anyhow!("blocking DB task was cancelled")),
        })
    }
}
