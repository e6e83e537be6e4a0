use crate::datastore::{postfilters::PageRequest, structs::User, Client};
use crate::metrics;
use crate::session::Session;
use crate::twoface::{Fallible, TfError};
use crate::views::{self, Templates};
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use url::Position;

/// An app over the given mock datastore, wired up the way `main` wires the real one.
#[cfg(test)]
macro_rules! test_app {
    ($ds:expr) => {{
        use actix_service::Service;
        use futures::future::FutureExt;
        let config = crate::config::Config::from_toml(crate::api::testing::CONFIG).unwrap();
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap_fn(|request, srv| srv.call(request).map(crate::session::write_cookie))
                .data(crate::session::Sessions::new(&config))
                .data(crate::api::testing::state($ds))
                .configure(crate::api::configure::<crate::datastore::mock::Client>)
                .default_service(
                    actix_web::web::route()
                        .to(crate::api::not_found::<crate::datastore::mock::Client>),
                ),
        )
        .await
    }};
}

pub mod auth;
pub mod follows;
pub mod posts;
pub mod profiles;

/// Everything a handler needs, built once in `main`.
pub struct State<DS> {
    pub ds: Arc<DS>,
    pub templates: Arc<Templates>,
    pub posts_per_page: i64,
}

impl<DS> Clone for State<DS> {
    fn clone(&self) -> Self {
        Self {
            ds: Arc::clone(&self.ds),
            templates: Arc::clone(&self.templates),
            posts_per_page: self.posts_per_page,
        }
    }
}

impl<DS> State<DS> {
    pub fn page(&self, query: &PageQuery) -> PageRequest {
        PageRequest::new(query.number(), self.posts_per_page)
    }
}

pub fn configure<DS: Client>(cfg: &mut web::ServiceConfig) {
    auth::configure::<DS>(cfg);
    posts::configure::<DS>(cfg);
    profiles::configure::<DS>(cfg);
    follows::configure::<DS>(cfg);
}

/// Catch-all for paths no route matches.
pub async fn not_found<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
) -> Fallible<HttpResponse> {
    current_user(&state, &session).await?;
    Err(TfError::not_found("No route matches this path"))
}

/// `?page=N`. Anything that isn't an integer means the first page.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }
}

/// The logged-in user, if any. Also records that they were seen just now, so every handler
/// calls this first, even ones that don't need the user.
/// A session pointing at a user who no longer exists is logged out.
pub async fn current_user<DS: Client>(
    state: &State<DS>,
    session: &Session,
) -> Fallible<Option<User>> {
    guard!(let Some(user_id) = session.user_id() else {
        return Ok(None)
    });
    guard!(let Some(mut user) = state.ds.get_user(user_id).await? else {
        warn!(user_id, "session refers to a missing user");
        session.logout();
        return Ok(None)
    });
    let now = Utc::now();
    state.ds.touch_last_seen(user.id, now).await?;
    user.last_seen = now;
    Ok(Some(user))
}

/// Where anonymous visitors to a login-only page are sent.
pub fn login_redirect(session: &Session, req: &HttpRequest) -> HttpResponse {
    session.flash("Please log in to access this page.");
    let next = match req.uri().query() {
        Some(query) => format!("{}?{}", req.path(), query),
        None => req.path().to_owned(),
    };
    redirect(&views::login_path(&next))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .header(header::LOCATION, location)
        .finish()
}

/// The `next` target after logging in, as long as it stays on this site.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(target) if is_local_path(target) => target.to_owned(),
        _ => "/index".to_owned(),
    }
}

fn is_local_path(target: &str) -> bool {
    // Browsers drop tabs and newlines from URLs, so "/\t/host" would become "//host".
    let blanks = target
        .chars()
        .any(|c| c.is_ascii_control() || c.is_whitespace());
    if blanks || !target.starts_with('/') {
        return false;
    }
    guard!(let Ok(resolved) = views::ORIGIN.join(target) else {
        return false
    });
    resolved.scheme() == views::ORIGIN.scheme()
        && resolved.host() == views::ORIGIN.host()
        && resolved.port() == views::ORIGIN.port()
        && &resolved[Position::BeforePath..] == target
}

/// Execute the closure, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<F, Fut, R>(name: &'static str, f: F) -> Fallible<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f().await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}
