//! Cookie-backed sessions. The whole session (who is logged in, the CSRF token and any pending
//! flash messages) lives in a signed JWT inside one HTTP-only cookie, so the server keeps no
//! session state of its own.
use crate::config::Config;
use crate::twoface::{Fallible, TfError};
use actix_web::{
    cookie::{Cookie, SameSite},
    dev::{Payload, ServiceResponse},
    web, FromRequest, HttpMessage, HttpRequest,
};
use chrono::{Duration, Utc};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "microblog_session";

/// Everything the browser carries between requests.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Option<i32>,
    pub remember: bool,
    pub csrf: String,
    #[serde(default)]
    pub flashes: Vec<String>,
    /// Unix seconds. Overwritten every time the cookie is written.
    pub exp: i64,
}

impl SessionData {
    pub fn fresh() -> Self {
        Self {
            user_id: None,
            remember: false,
            csrf: new_csrf_token(),
            flashes: Vec::new(),
            exp: 0,
        }
    }
}

fn new_csrf_token() -> String {
    Uuid::new_v4().to_simple().to_string()
}

/// Signs and verifies session cookies.
pub struct Sessions {
    secret: Vec<u8>,
    session_ttl: Duration,
    remember_ttl: Duration,
    secure: bool,
}

impl Sessions {
    pub fn new(config: &Config) -> Self {
        Self {
            secret: config.secret_key.as_bytes().to_vec(),
            session_ttl: Duration::hours(config.session_hours),
            remember_ttl: Duration::days(config.remember_days),
            secure: config.secure_cookies,
        }
    }

    /// Returns None for anything that wasn't signed by us or has expired.
    pub fn decode(&self, token: &str) -> Option<SessionData> {
        match decode::<SessionData>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        ) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "discarding session cookie");
                None
            }
        }
    }

    /// Sign the session, valid until its lifetime (which depends on "remember me") runs out.
    pub fn encode(&self, data: &SessionData) -> Fallible<String> {
        let ttl = if data.remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        self.sign(data, (Utc::now() + ttl).timestamp())
    }

    fn sign(&self, data: &SessionData, exp: i64) -> Fallible<String> {
        let claims = SessionData {
            exp,
            ..data.clone()
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token)
    }

    pub fn cookie(&self, data: &SessionData) -> Fallible<Cookie<'static>> {
        let mut builder = Cookie::build(COOKIE_NAME, self.encode(data)?)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure);
        // Without "remember me" the cookie dies with the browser.
        if data.remember {
            builder = builder.permanent();
        }
        Ok(builder.finish())
    }
}

/// The current request's session. Cheap to clone; all clones share state, and whatever state
/// is left at the end of the request is written back by `write_cookie`.
#[derive(Clone, Debug)]
pub struct Session(Rc<RefCell<SessionData>>);

impl Session {
    pub(crate) fn new(data: SessionData) -> Self {
        Session(Rc::new(RefCell::new(data)))
    }

    fn from_request_sync(req: &HttpRequest) -> Fallible<Self> {
        if let Some(session) = req.extensions().get::<Session>() {
            return Ok(session.clone());
        }
        guard!(let Some(sessions) = req.app_data::<web::Data<Sessions>>() else {
            return Err(TfError::from(anyhow::anyhow!("session codec missing from app data")))
        });
        let data = req
            .cookie(COOKIE_NAME)
            .and_then(|cookie| sessions.decode(cookie.value()))
            .unwrap_or_else(SessionData::fresh);
        let session = Session::new(data);
        req.extensions_mut().insert(session.clone());
        Ok(session)
    }

    pub fn user_id(&self) -> Option<i32> {
        self.0.borrow().user_id
    }

    pub fn login(&self, user_id: i32, remember: bool) {
        let mut data = self.0.borrow_mut();
        data.user_id = Some(user_id);
        data.remember = remember;
        data.csrf = new_csrf_token();
    }

    pub fn logout(&self) {
        let mut data = self.0.borrow_mut();
        data.user_id = None;
        data.remember = false;
        data.csrf = new_csrf_token();
    }

    /// Queue a message for the next page that gets rendered.
    pub fn flash(&self, message: impl Into<String>) {
        self.0.borrow_mut().flashes.push(message.into())
    }

    pub fn take_flashes(&self) -> Vec<String> {
        std::mem::take(&mut self.0.borrow_mut().flashes)
    }

    pub fn csrf_token(&self) -> String {
        self.0.borrow().csrf.clone()
    }

    pub fn csrf_matches(&self, submitted: &str) -> bool {
        !submitted.is_empty() && self.0.borrow().csrf == submitted
    }

    pub fn data(&self) -> SessionData {
        self.0.borrow().clone()
    }
}

impl FromRequest for Session {
    type Error = TfError;
    type Future = Ready<Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Session::from_request_sync(req))
    }
}

/// Middleware step: if the handler touched the session, send it back to the browser.
pub fn write_cookie<B, E>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    let mut response = response?;
    let session = response.request().extensions().get::<Session>().cloned();
    let sessions = response
        .request()
        .app_data::<web::Data<Sessions>>()
        .cloned();
    if let (Some(session), Some(sessions)) = (session, sessions) {
        match sessions.cookie(&session.data()) {
            Ok(cookie) => {
                if let Err(e) = response.response_mut().add_cookie(&cookie) {
                    error!(error = %e, "couldn't set session cookie");
                }
            }
            Err(e) => error!(error = %e.internal, "couldn't sign session"),
        }
    }
    Ok(response)
}
