//! `TfError` pairs an internal error with a description that is safe to show in a rendered page.
//! Database and library errors stay in the logs; the browser only ever sees the external half.

pub mod externalerror;
mod integrations;

pub use externalerror::{Cause, ExternalError};
pub use integrations::unique_violation;
use std::fmt;
use std::fmt::{Display, Formatter};

/// An error with a private, internal half and a public, user-facing half.
#[derive(Debug)]
pub struct TfError {
    /// The underlying error. May contain SQL, file paths or other details users shouldn't see.
    pub internal: anyhow::Error,
    /// What the user is told.
    pub external: ExternalError,
}

impl TfError {
    /// Shorthand for errors which have no underlying library error, e.g. a missing user.
    pub fn new(cause: Cause, text: &'static str) -> Self {
        Self {
            internal: anyhow::anyhow!(text),
            external: ExternalError { cause, text },
        }
    }

    pub fn not_found(text: &'static str) -> Self {
        Self::new(Cause::NotFound, text)
    }

    pub fn cause(&self) -> Cause {
        self.external.cause
    }
}

/// Displaying a TfError only shows the external half.
impl Display for TfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), fmt::Error> {
        write!(f, "{}", self.external)
    }
}

/// Return type of anything that can fail on its way to an HTTP response.
pub type Fallible<T> = Result<T, TfError>;

/// Attach a user-facing description to any library error.
pub trait Describe {
    fn describe(self, external: ExternalError) -> TfError;
}

impl<E: Into<anyhow::Error>> Describe for E {
    fn describe(self, external: ExternalError) -> TfError {
        TfError {
            internal: self.into(),
            external,
        }
    }
}

/// `?` on a library error shows the generic server error page.
impl<E: Into<anyhow::Error>> From<E> for TfError {
    fn from(internal: E) -> TfError {
        internal.describe(ExternalError::default())
    }
}

pub trait DescribeErr<T> {
    /// Like `describe`, for the error side of a `Result`.
    fn describe_err(self, external: ExternalError) -> Fallible<T>;
}

impl<T, E: Into<anyhow::Error>> DescribeErr<T> for Result<T, E> {
    fn describe_err(self, external: ExternalError) -> Fallible<T> {
        self.map_err(|e| e.describe(external))
    }
}
