use crate::api::{current_user, login_redirect, observe, redirect, State};
use crate::datastore::Client;
use crate::forms::{self, EmptyForm};
use crate::session::Session;
use crate::twoface::Fallible;
use crate::views::user_path;
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

pub fn configure<DS: Client>(cfg: &mut web::ServiceConfig) {
    cfg.route("/follow/{username}/", web::post().to(follow::<DS>))
        .route("/unfollow/{username}/", web::post().to(unfollow::<DS>));
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Follow,
    Unfollow,
}

async fn follow<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    username: web::Path<String>,
    form: web::Form<EmptyForm>,
) -> Fallible<HttpResponse> {
    observe("follow", || async move {
        let username = username.into_inner();
        change_edge(&state, &session, &req, username, form.into_inner(), Edge::Follow).await
    })
    .await
}

async fn unfollow<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    username: web::Path<String>,
    form: web::Form<EmptyForm>,
) -> Fallible<HttpResponse> {
    observe("unfollow", || async move {
        let username = username.into_inner();
        change_edge(&state, &session, &req, username, form.into_inner(), Edge::Unfollow).await
    })
    .await
}

async fn change_edge<DS: Client>(
    state: &State<DS>,
    session: &Session,
    req: &HttpRequest,
    username: String,
    mut form: EmptyForm,
    edge: Edge,
) -> Fallible<HttpResponse> {
    guard!(let Some(me) = current_user(state, session).await? else {
        return Ok(login_redirect(session, req))
    });
    // A button with a stale or missing token just goes home.
    if !forms::check(&mut form, session).is_empty() {
        return Ok(redirect("/index"));
    }
    guard!(let Some(user) = state.ds.find_user_by_username(username.clone()).await? else {
        session.flash(format!("User {} not found", username));
        return Ok(redirect("/index"))
    });
    let profile = user_path(&user.username);
    if user.id == me.id {
        session.flash(match edge {
            Edge::Follow => "You can not follow you",
            Edge::Unfollow => "You can not unfollow you",
        });
        return Ok(redirect(&profile));
    }

    let changed = match edge {
        Edge::Follow => state.ds.follow(me.id, user.id).await?,
        Edge::Unfollow => state.ds.unfollow(me.id, user.id).await?,
    };
    info!(follower = me.id, followed = user.id, ?edge, changed, "follow graph");
    session.flash(match edge {
        Edge::Follow => format!("You now follow {}", user.username),
        Edge::Unfollow => format!("You just unfollowed {}", user.username),
    });
    Ok(redirect(&profile))
}
