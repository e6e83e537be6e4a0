//! User profile pages and editing your own profile.
use crate::api::{current_user, login_redirect, observe, redirect, PageQuery, State};
use crate::datastore::{
    postfilters::PostFilters,
    structs::{ProfileChange, User},
    Client,
};
use crate::forms::{self, EditProfileForm, FormErrors};
use crate::session::Session;
use crate::twoface::{Cause, Fallible, TfError};
use crate::views::{
    follow_path, post_views, unfollow_path, user_path, EditProfilePage, Layout, Pager,
    ProfileView, UserLink, UserPage,
};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{info, warn};

pub fn configure<DS: Client>(cfg: &mut web::ServiceConfig) {
    cfg.route("/user/{username}", web::get().to(profile::<DS>))
        .service(
            web::resource("/edit_profile")
                .route(web::get().to(edit_profile_form::<DS>))
                .route(web::post().to(edit_profile::<DS>)),
        );
}

async fn profile<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Fallible<HttpResponse> {
    observe("profile", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let username = username.into_inner();
        guard!(let Some(user) = state.ds.find_user_by_username(username).await? else {
            return Err(TfError::not_found("User not found"))
        });

        let posts = state
            .ds
            .list_posts(PostFilters::by_author(user.id), state.page(&query))
            .await?;
        let counts = state.ds.follow_counts(user.id).await?;
        let is_self = me.id == user.id;
        let is_following = !is_self && state.ds.is_following(me.id, user.id).await?;
        let followers = state.ds.followers(user.id).await?;
        let followed = state.ds.followed(user.id).await?;

        let page = UserPage {
            layout: Layout::new(&user.username, &session, Some(&me)),
            user: ProfileView::from(&user),
            counts,
            is_self,
            is_following,
            follow_url: follow_path(&user.username),
            unfollow_url: unfollow_path(&user.username),
            followers: followers.iter().map(UserLink::from).collect(),
            followed: followed.iter().map(UserLink::from).collect(),
            posts: post_views(&posts),
            pager: Pager::new(&user_path(&user.username), &posts),
        };
        state.templates.render("user", &page)
    })
    .await
}

fn edit_profile_page<DS>(
    state: &State<DS>,
    session: &Session,
    me: &User,
    form: &EditProfileForm,
    errors: FormErrors,
) -> Fallible<HttpResponse> {
    let page = EditProfilePage {
        layout: Layout::new("Edit Profile", session, Some(me)),
        username: form.username.clone(),
        about_me: form.about_me.clone(),
        errors,
    };
    state.templates.render("edit_profile", &page)
}

async fn edit_profile_form<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
) -> Fallible<HttpResponse> {
    observe("edit_profile_form", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let form = EditProfileForm {
            username: me.username.clone(),
            about_me: me.about_me.clone().unwrap_or_default(),
            csrf_token: String::new(),
        };
        edit_profile_page(&state, &session, &me, &form, FormErrors::default())
    })
    .await
}

async fn edit_profile<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    form: web::Form<EditProfileForm>,
) -> Fallible<HttpResponse> {
    observe("edit_profile", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let mut form = form.into_inner();
        let mut errors = forms::check(&mut form, &session);
        if errors.get("username").is_empty()
            && form.username != me.username
            && state
                .ds
                .find_user_by_username(form.username.clone())
                .await?
                .is_some()
        {
            errors.add("username", "Please use a different username.");
        }
        if !errors.is_empty() {
            return edit_profile_page(&state, &session, &me, &form, errors);
        }

        let change = ProfileChange {
            username: form.username.clone(),
            about_me: form.about_me(),
        };
        match state.ds.update_profile(me.id, change).await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "profile edited");
                session.flash("Your profile has been successfully edited");
                Ok(redirect("/edit_profile"))
            }
            Err(e) if e.cause() == Cause::UserConflict => {
                warn!(error = %e.internal, "profile edit lost a uniqueness race");
                errors.add("username", "Please use a different username.");
                edit_profile_page(&state, &session, &me, &form, errors)
            }
            Err(e) => Err(e),
        }
    })
    .await
}
