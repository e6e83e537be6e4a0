//! The home feed, where posts are written, and the explore page.
use crate::api::{current_user, login_redirect, observe, redirect, PageQuery, State};
use crate::datastore::{
    postfilters::{PageRequest, PostFilters},
    structs::{NewPost, User},
    Client,
};
use crate::forms::{self, PostForm};
use crate::session::Session;
use crate::twoface::Fallible;
use crate::views::{post_views, Composer, IndexPage, Layout, Pager};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

pub fn configure<DS: Client>(cfg: &mut web::ServiceConfig) {
    for path in &["/", "/index"] {
        cfg.service(
            web::resource(*path)
                .route(web::get().to(index::<DS>))
                .route(web::post().to(write_post::<DS>)),
        );
    }
    cfg.route("/explore", web::get().to(explore::<DS>));
}

/// Own posts and posts from followed users, newest first, with the composer on top.
async fn render_index<DS: Client>(
    state: &State<DS>,
    session: &Session,
    me: &User,
    page: PageRequest,
    composer: Composer,
) -> Fallible<HttpResponse> {
    let posts = state
        .ds
        .list_posts(PostFilters::feed_of(me.id), page)
        .await?;
    let page = IndexPage {
        layout: Layout::new("Home Page", session, Some(me)),
        composer: Some(composer),
        posts: post_views(&posts),
        pager: Pager::new("/index", &posts),
    };
    state.templates.render("index", &page)
}

async fn index<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Fallible<HttpResponse> {
    observe("index", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let page = state.page(&query);
        render_index(&state, &session, &me, page, Composer::default()).await
    })
    .await
}

async fn write_post<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    query: web::Query<PageQuery>,
    form: web::Form<PostForm>,
) -> Fallible<HttpResponse> {
    observe("write_post", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let mut form = form.into_inner();
        let errors = forms::check(&mut form, &session);
        if !errors.is_empty() {
            let composer = Composer {
                post: form.post,
                errors,
            };
            let page = state.page(&query);
            return render_index(&state, &session, &me, page, composer).await;
        }

        let post = state.ds.new_post(NewPost::now(me.id, form.post)).await?;
        info!(user_id = me.id, post_id = post.id, "new post");
        session.flash("You have just created a new post!");
        Ok(redirect("/index"))
    })
    .await
}

async fn explore<DS: Client>(
    state: web::Data<State<DS>>,
    session: Session,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Fallible<HttpResponse> {
    observe("explore", || async move {
        guard!(let Some(me) = current_user(&state, &session).await? else {
            return Ok(login_redirect(&session, &req))
        });
        let posts = state
            .ds
            .list_posts(PostFilters::all(), state.page(&query))
            .await?;
        let page = IndexPage {
            layout: Layout::new("Explore", &session, Some(&me)),
            composer: None,
            posts: post_views(&posts),
            pager: Pager::new("/explore", &posts),
        };
        state.templates.render("index", &page)
    })
    .await
}
