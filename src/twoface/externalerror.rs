use actix_web::http::StatusCode;
use std::fmt;

/// What the visitor is told when a request fails.
#[derive(Debug)]
pub struct ExternalError {
    pub cause: Cause,
    /// Shown on the error page as-is, so it must never contain internal detail.
    pub text: &'static str,
}

/// Why a request failed, in terms a visitor can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Our fault. Database down, template broken, etc.
    ServerError,
    /// A username or email address someone else already has.
    UserConflict,
    /// No such page or user.
    NotFound,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl From<Cause> for StatusCode {
    fn from(cause: Cause) -> StatusCode {
        match cause {
            Cause::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Cause::UserConflict => StatusCode::CONFLICT,
            Cause::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.cause, self.text)
    }
}

impl Default for ExternalError {
    fn default() -> Self {
        Self {
            cause: Cause::ServerError,
            text: "An unexpected error has occurred",
        }
    }
}
