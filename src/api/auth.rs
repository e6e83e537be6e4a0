//! Registration, login and logout.
use crate::api::{current_user, observe, redirect, safe_next, State};
use crate::datastore::{structs::NewUser, Client};
use crate::forms::{self, FormErrors, LoginForm, RegistrationForm};
use crate::session::Session;
use crate::twoface::{Cause, Fallible};
use crate::views::{Layout, LoginPage, RegisterPage};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

pub fn configure<DS: Client>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/login")
            .route(web::get().to(login_form::<DS>))
            .route(web::post().to(login::<DS>)),
    )
    .service(
        web::resource("/register")
            .route(web::get().to(register_form::<DS>))
            .route(web::post().to(register::<DS>)),
    )
    .route("/logout", web::get().to(logout::<DS>));
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct NextQuery {
    next: Option<String>,
}

fn login_page<DS>(
    state: &State<DS>,
    session: &Session,
    form: &LoginForm,
    errors: FormErrors,
) -> Fallible<HttpResponse> {
    let page = LoginPage {
        layout: Layout::new("Sign In", session, None),
        username: form.username.clone(),
        remember: form.remember(),
        errors,
    };
    state.templates.render("login", &page)
}

async fn login_form<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
) -> Fallible<HttpResponse> {
    observe("login_form", || async move {
        if current_user(&state, &session).await?.is_some() {
            return Ok(redirect("/index"));
        }
        login_page(&state, &session, &LoginForm::default(), FormErrors::default())
    })
    .await
}

async fn login<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    query: web::Query<NextQuery>,
    form: web::Form<LoginForm>,
) -> Fallible<HttpResponse> {
    observe("login", || async move {
        if current_user(&state, &session).await?.is_some() {
            return Ok(redirect("/index"));
        }
        let mut form = form.into_inner();
        let errors = forms::check(&mut form, &session);
        if !errors.is_empty() {
            return login_page(&state, &session, &form, errors);
        }

        let user = state.ds.find_user_by_username(form.username.clone()).await?;
        guard!(let Some(user) = user.filter(|u| u.check_password(&form.password)) else {
            warn!(username = %form.username, "failed login");
            session.flash("Invalid username or password");
            return Ok(redirect("/login"))
        });
        session.login(user.id, form.remember());
        info!(user_id = user.id, remember = form.remember(), "user logged in");
        Ok(redirect(&safe_next(query.next.as_deref())))
    })
    .await
}

async fn logout<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
) -> Fallible<HttpResponse> {
    observe("logout", || async move {
        if let Some(user) = current_user(&state, &session).await? {
            info!(user_id = user.id, "user logged out");
        }
        session.logout();
        Ok(redirect("/index"))
    })
    .await
}

fn register_page<DS>(
    state: &State<DS>,
    session: &Session,
    form: &RegistrationForm,
    errors: FormErrors,
) -> Fallible<HttpResponse> {
    let page = RegisterPage {
        layout: Layout::new("Register", session, None),
        username: form.username.clone(),
        email: form.email.clone(),
        errors,
    };
    state.templates.render("register", &page)
}

async fn register_form<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
) -> Fallible<HttpResponse> {
    observe("register_form", || async move {
        if current_user(&state, &session).await?.is_some() {
            return Ok(redirect("/index"));
        }
        register_page(
            &state,
            &session,
            &RegistrationForm::default(),
            FormErrors::default(),
        )
    })
    .await
}

async fn register<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    form: web::Form<RegistrationForm>,
) -> Fallible<HttpResponse> {
    observe("register", || async move {
        if current_user(&state, &session).await?.is_some() {
            return Ok(redirect("/index"));
        }
        let mut form = form.into_inner();
        let mut errors = forms::check(&mut form, &session);
        if errors.get("username").is_empty()
            && state
                .ds
                .find_user_by_username(form.username.clone())
                .await?
                .is_some()
        {
            errors.add("username", "Please provide a different username");
        }
        if errors.get("email").is_empty()
            && state
                .ds
                .find_user_by_email(form.email.clone())
                .await?
                .is_some()
        {
            errors.add("email", "Please provide a different email address");
        }
        if !errors.is_empty() {
            return register_page(&state, &session, &form, errors);
        }

        let new_user = NewUser::new(form.username.clone(), form.email.clone(), &form.password)?;
        match state.ds.create_user(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "new user registered");
                session.flash("Congratulations, you have successfully registered");
                Ok(redirect("/login"))
            }
            // Someone else took the name between the check above and the insert.
            Err(e) if e.cause() == Cause::UserConflict => {
                warn!(error = %e.internal, "registration lost a uniqueness race");
                errors.add("username", "Please provide a different username or email address");
                register_page(&state, &session, &form, errors)
            }
            Err(e) => Err(e),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use crate::config::Config;
    use crate::datastore::{mock, Client};
    use crate::session::Sessions;
    use actix_web::http::StatusCode;
    use chrono::Utc;

    #[actix_rt::test]
    async fn test_register_then_log_in() {
        let ds = mock::Client::default();
        let mut app = test_app!(&ds);

        let (cookie, csrf) = open_form(&mut app, "/register", None).await;
        let form = [
            ("username", " susan "),
            ("email", "susan@example.com"),
            ("password", "cat"),
            ("password2", "cat"),
            ("csrf_token", csrf.as_str()),
        ];
        let resp = post_form(&mut app, "/register", &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/login");
        let cookie = session_cookie(&resp);

        let susan = ds
            .find_user_by_username("susan".to_owned())
            .await
            .unwrap()
            .unwrap();
        assert!(susan.check_password("cat"));
        assert!(!susan.check_password("dog"));

        let resp = get(&mut app, "/login", Some(&cookie)).await;
        assert!(body(resp)
            .await
            .contains("Congratulations, you have successfully registered"));

        let cookie = log_in(&mut app, "susan", "cat").await;
        let resp = get(&mut app, "/index", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body(resp).await.contains("Hi, susan!"));
    }

    #[actix_rt::test]
    async fn test_duplicate_registration_is_a_form_error() {
        let ds = mock::Client::default();
        ds.add_user("susan");
        let mut app = test_app!(&ds);

        let (cookie, csrf) = open_form(&mut app, "/register", None).await;
        let form = [
            ("username", "susan"),
            ("email", "susan@example.com"),
            ("password", "cat"),
            ("password2", "cat"),
            ("csrf_token", csrf.as_str()),
        ];
        let resp = post_form(&mut app, "/register", &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body(resp).await;
        assert!(html.contains("Please provide a different username"));
        assert!(html.contains("Please provide a different email address"));
        assert!(ds
            .find_user_by_username("susan".to_owned())
            .await
            .unwrap()
            .unwrap()
            .password_hash
            .is_empty());
    }

    #[actix_rt::test]
    async fn test_register_without_csrf_token() {
        let ds = mock::Client::default();
        let mut app = test_app!(&ds);

        let (cookie, _) = open_form(&mut app, "/register", None).await;
        let form = [
            ("username", "susan"),
            ("email", "susan@example.com"),
            ("password", "cat"),
            ("password2", "cat"),
        ];
        let resp = post_form(&mut app, "/register", &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body(resp)
            .await
            .contains("The CSRF token is missing or invalid."));
        assert_eq!(
            ds.find_user_by_username("susan".to_owned()).await.unwrap(),
            None
        );
    }

    #[actix_rt::test]
    async fn test_bad_password() {
        let ds = mock::Client::default();
        signed_up(&ds, "susan", "cat").await;
        let mut app = test_app!(&ds);

        for (username, password) in &[("susan", "dog"), ("john", "cat")] {
            let (cookie, csrf) = open_form(&mut app, "/login", None).await;
            let form = [
                ("username", *username),
                ("password", *password),
                ("csrf_token", csrf.as_str()),
            ];
            let resp = post_form(&mut app, "/login", &cookie, &form).await;
            assert_eq!(resp.status(), StatusCode::FOUND);
            assert_eq!(location(&resp), "/login");

            let cookie = session_cookie(&resp);
            let resp = get(&mut app, "/index", Some(&cookie)).await;
            assert_eq!(location(&resp), "/login?next=%2Findex");
            let resp = get(&mut app, "/login", Some(&cookie)).await;
            assert!(body(resp).await.contains("Invalid username or password"));
        }
    }

    #[actix_rt::test]
    async fn test_login_follows_only_local_next() {
        let ds = mock::Client::default();
        signed_up(&ds, "susan", "cat").await;
        let mut app = test_app!(&ds);

        let cases = &[
            ("%2Fuser%2Fsusan", "/user/susan"),
            ("http%3A%2F%2Fevil.example.com%2F", "/index"),
            ("%2F%2Fevil.example.com", "/index"),
            ("%2F%09%2Fevil.example.com", "/index"),
            ("%2F%0A%2Fevil.example.com", "/index"),
        ];
        for (next, expected) in cases {
            let uri = format!("/login?next={}", next);
            let (cookie, csrf) = open_form(&mut app, &uri, None).await;
            let form = [
                ("username", "susan"),
                ("password", "cat"),
                ("remember_me", "y"),
                ("csrf_token", csrf.as_str()),
            ];
            let resp = post_form(&mut app, &uri, &cookie, &form).await;
            assert_eq!(resp.status(), StatusCode::FOUND);
            assert_eq!(&location(&resp), expected);
        }
    }

    #[actix_rt::test]
    async fn test_logged_in_users_skip_auth_pages() {
        let ds = mock::Client::default();
        signed_up(&ds, "susan", "cat").await;
        let mut app = test_app!(&ds);
        let cookie = log_in(&mut app, "susan", "cat").await;

        for path in &["/login", "/register"] {
            let resp = get(&mut app, path, Some(&cookie)).await;
            assert_eq!(resp.status(), StatusCode::FOUND);
            assert_eq!(location(&resp), "/index");
        }

        let resp = get(&mut app, "/logout", Some(&cookie)).await;
        assert_eq!(location(&resp), "/index");
        let cookie = session_cookie(&resp);
        let resp = get(&mut app, "/index", Some(&cookie)).await;
        assert_eq!(location(&resp), "/login?next=%2Findex");
    }

    #[actix_rt::test]
    async fn test_remember_me_outlives_the_browser() {
        let ds = mock::Client::default();
        signed_up(&ds, "susan", "cat").await;
        let mut app = test_app!(&ds);
        let config = Config::from_toml(CONFIG).unwrap();
        let sessions = Sessions::new(&config);

        let mut lifetimes = Vec::new();
        for remember in &[false, true] {
            let (cookie, csrf) = open_form(&mut app, "/login", None).await;
            let mut form = vec![
                ("username", "susan"),
                ("password", "cat"),
                ("csrf_token", csrf.as_str()),
            ];
            if *remember {
                form.push(("remember_me", "y"));
            }
            let resp = post_form(&mut app, "/login", &cookie, &form).await;
            assert_eq!(location(&resp), "/index");

            let cookie = session_cookie(&resp);
            assert_eq!(cookie.max_age().is_some(), *remember);
            assert_eq!(cookie.expires().is_some(), *remember);
            let data = sessions.decode(cookie.value()).unwrap();
            assert_eq!(data.remember, *remember);
            lifetimes.push(data.exp - Utc::now().timestamp());
        }

        let hour = 60 * 60;
        assert!(lifetimes[0] <= config.session_hours * hour);
        assert!(lifetimes[0] > config.session_hours * hour - 60);
        assert!(lifetimes[1] > config.remember_days * 24 * hour - 60);
    }
}
