//! Integrate twoface with Actix-web and Diesel.

use crate::twoface::{Cause, ExternalError, TfError};
use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{error, warn};

const NOT_FOUND_PAGE: &str = include_str!("../../templates/404.html");
const ERROR_PAGE: &str = include_str!("../../templates/500.html");

// Twoface errors can be used as Actix-web errors.
// If a handler returns a Twoface error, the external portion is rendered into an error page.
// The internal portion is only logged.
impl actix_web::ResponseError for TfError {
    fn status_code(&self) -> StatusCode {
        self.external.cause.into()
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self.external.cause {
            Cause::NotFound => {
                warn!("{}", self.internal);
                NOT_FOUND_PAGE.to_owned()
            }
            _ => {
                // Anything still inside a diesel transaction has been rolled back by now.
                error!("{:#}", self.internal);
                ERROR_PAGE.replace("{{message}}", self.external.text)
            }
        };
        HttpResponse::build(self.status_code())
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(body)
    }
}

/// Map a Diesel unique-constraint violation onto a user-facing conflict, leaving every other error
/// as a server error.
pub fn unique_violation(err: DieselError, text: &'static str) -> TfError {
    let cause = match &err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Cause::UserConflict,
        _ => Cause::ServerError,
    };
    let external = match cause {
        Cause::UserConflict => ExternalError { cause, text },
        _ => ExternalError::default(),
    };
    TfError {
        internal: err.into(),
        external,
    }
}
