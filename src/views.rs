//! Server-rendered pages. Handlers build one of the `*Page` structs and hand it to `Templates`.
use crate::datastore::{
    postfilters::Paginated,
    structs::{AuthoredPost, FollowCounts, User},
};
use crate::forms::FormErrors;
use crate::session::Session;
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use actix_web::{http::header, HttpResponse};
use handlebars::Handlebars;
use serde::Serialize;
use url::{form_urlencoded, Url};

const AVATAR_POST_SIZE: u32 = 36;
const AVATAR_PROFILE_SIZE: u32 = 128;

lazy_static! {
    /// Stand-in origin for building and resolving site-relative paths.
    pub(crate) static ref ORIGIN: Url =
        Url::parse("http://localhost/").expect("couldn't parse placeholder origin");
}

/// Templates compiled into the binary, parsed once at startup.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, anyhow::Error> {
        let mut registry = Handlebars::new();
        registry.register_partial("base", include_str!("../templates/base.hbs"))?;
        registry.register_partial("post", include_str!("../templates/_post.hbs"))?;
        registry.register_partial("pager", include_str!("../templates/_pager.hbs"))?;
        registry.register_partial("errors", include_str!("../templates/_errors.hbs"))?;
        registry.register_template_string("index", include_str!("../templates/index.hbs"))?;
        registry.register_template_string("login", include_str!("../templates/login.hbs"))?;
        registry.register_template_string("register", include_str!("../templates/register.hbs"))?;
        registry.register_template_string(
            "edit_profile",
            include_str!("../templates/edit_profile.hbs"),
        )?;
        registry.register_template_string("user", include_str!("../templates/user.hbs"))?;
        Ok(Self { registry })
    }

    /// Render a page into a 200 OK response.
    pub fn render<T: Serialize>(&self, name: &str, page: &T) -> Fallible<HttpResponse> {
        let body = self
            .registry
            .render(name, page)
            .describe_err(ExternalError {
                cause: Cause::ServerError,
                text: "Could not render the page",
            })?;
        Ok(HttpResponse::Ok()
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(body))
    }
}

/// Path of a user's profile page, with the username percent-encoded.
pub fn user_path(username: &str) -> String {
    path_of(&["user", username])
}

pub fn follow_path(username: &str) -> String {
    path_of(&["follow", username, ""])
}

pub fn unfollow_path(username: &str) -> String {
    path_of(&["unfollow", username, ""])
}

fn path_of(segments: &[&str]) -> String {
    let mut url = ORIGIN.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().to_owned()
}

/// `path` with a `page` query parameter.
pub fn page_path(path: &str, page: i64) -> String {
    format!(
        "{}?{}",
        path,
        form_urlencoded::Serializer::new(String::new())
            .append_pair("page", &page.to_string())
            .finish()
    )
}

/// `/login`, remembering where to go afterwards.
pub fn login_path(next: &str) -> String {
    format!(
        "/login?{}",
        form_urlencoded::Serializer::new(String::new())
            .append_pair("next", next)
            .finish()
    )
}

/// Chrome shared by every page: who's logged in, pending flashes, the CSRF token for forms.
#[derive(Serialize, Debug)]
pub struct Layout {
    pub title: Option<String>,
    pub current_user: Option<UserLink>,
    pub flashes: Vec<String>,
    pub csrf_token: String,
}

impl Layout {
    /// Consumes the session's flash messages.
    pub fn new(title: &str, session: &Session, current_user: Option<&User>) -> Self {
        Self {
            title: Some(title.to_owned()),
            current_user: current_user.map(UserLink::from),
            flashes: session.take_flashes(),
            csrf_token: session.csrf_token(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UserLink {
    pub username: String,
    pub url: String,
}

impl From<&User> for UserLink {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            url: user_path(&user.username),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct PostView {
    pub author: String,
    pub author_url: String,
    pub avatar: String,
    pub body: String,
    pub timestamp: String,
}

impl From<&AuthoredPost> for PostView {
    fn from(p: &AuthoredPost) -> Self {
        Self {
            author: p.author.username.clone(),
            author_url: user_path(&p.author.username),
            avatar: p.author.avatar(AVATAR_POST_SIZE),
            body: p.post.body.clone(),
            timestamp: p.post.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

/// Links to the neighbouring pages of a listing, if there are any.
#[derive(Serialize, Debug, Default)]
pub struct Pager {
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Pager {
    pub fn new<T>(path: &str, page: &Paginated<T>) -> Self {
        Self {
            prev_url: page.prev_num().map(|n| page_path(path, n)),
            next_url: page.next_num().map(|n| page_path(path, n)),
        }
    }
}

pub fn post_views(page: &Paginated<AuthoredPost>) -> Vec<PostView> {
    page.items.iter().map(PostView::from).collect()
}

/// The post composer on the home page.
#[derive(Serialize, Debug, Default)]
pub struct Composer {
    pub post: String,
    pub errors: FormErrors,
}

/// Home feed and explore page. Explore has no composer.
#[derive(Serialize, Debug)]
pub struct IndexPage {
    pub layout: Layout,
    pub composer: Option<Composer>,
    pub posts: Vec<PostView>,
    pub pager: Pager,
}

#[derive(Serialize, Debug)]
pub struct LoginPage {
    pub layout: Layout,
    pub username: String,
    pub remember: bool,
    pub errors: FormErrors,
}

#[derive(Serialize, Debug)]
pub struct RegisterPage {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Serialize, Debug)]
pub struct EditProfilePage {
    pub layout: Layout,
    pub username: String,
    pub about_me: String,
    pub errors: FormErrors,
}

#[derive(Serialize, Debug)]
pub struct ProfileView {
    pub username: String,
    pub avatar: String,
    pub about_me: Option<String>,
    pub last_seen: String,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            avatar: user.avatar(AVATAR_PROFILE_SIZE),
            about_me: user.about_me.clone(),
            last_seen: user.last_seen.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UserPage {
    pub layout: Layout,
    pub user: ProfileView,
    pub counts: FollowCounts,
    pub is_self: bool,
    pub is_following: bool,
    pub follow_url: String,
    pub unfollow_url: String,
    pub followers: Vec<UserLink>,
    pub followed: Vec<UserLink>,
    pub posts: Vec<PostView>,
    pub pager: Pager,
}
