use axum::{
    extract::{Path, State},
    http::Uri,
    response::Response,
};
use tracing::info;

use inkwell_db::UserRow;

use crate::error::AppResult;
use crate::flash::Level;
use crate::guard::WebSession;
use crate::state::AppState;
use crate::views::{self, ProfileView};

const USER_NOT_FOUND: &str = "User not found, perhaps a mistype?";

/// Unknown names flash and bounce home rather than 404, unlike entry slugs.
fn user_not_found(session: WebSession) -> Response {
    session.flash(Level::Danger, USER_NOT_FOUND).redirect("/")
}

async fn find_user(state: &AppState, name: String) -> AppResult<Option<UserRow>> {
    state.db(move |db| db.get_user_by_username(&name)).await
}

async fn render_profile(state: &AppState, session: WebSession, user: UserRow) -> AppResult<Response> {
    let is_owner = session.owns(&user.username);
    let can_follow = session.user().is_some() && !is_owner;

    let user_id = user.id;
    let (entries, followers, following) = state
        .db(move |db| {
            Ok((
                db.entries_by_author(user_id, is_owner)?,
                db.followers(user_id)?,
                db.following(user_id)?,
            ))
        })
        .await?;

    let body = views::profile(&ProfileView {
        user: &user,
        entries: &entries,
        followers: followers.len(),
        following: following.len(),
        can_follow,
    });
    Ok(session.render(&user.username, body))
}

pub async fn profile(
    State(state): State<AppState>,
    session: WebSession,
    Path(name): Path<String>,
) -> AppResult<Response> {
    match find_user(&state, name).await? {
        Some(user) => render_profile(&state, session, user).await,
        None => Ok(user_not_found(session)),
    }
}

pub async fn own_profile(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
) -> AppResult<Response> {
    let Some(viewer) = session.user().cloned() else {
        return Ok(session.login_redirect(uri.path()));
    };

    match state.db(move |db| db.get_user_by_id(viewer.id)).await? {
        Some(user) => render_profile(&state, session, user).await,
        None => Ok(user_not_found(session)),
    }
}

pub async fn followers(
    State(state): State<AppState>,
    session: WebSession,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let Some(user) = find_user(&state, name).await? else {
        return Ok(user_not_found(session));
    };

    let user_id = user.id;
    let followers = state.db(move |db| db.followers(user_id)).await?;
    let editable = session.owns(&user.username);
    let body = views::follow_list("followers", &user, &followers, editable);
    Ok(session.render("Followers", body))
}

pub async fn following(
    State(state): State<AppState>,
    session: WebSession,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let Some(user) = find_user(&state, name).await? else {
        return Ok(user_not_found(session));
    };

    let user_id = user.id;
    let following = state.db(move |db| db.following(user_id)).await?;
    let editable = session.owns(&user.username);
    let body = views::follow_list("following", &user, &following, editable);
    Ok(session.render("Following", body))
}

pub async fn follow(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let Some(viewer) = session.user().cloned() else {
        return Ok(session.login_redirect(uri.path()));
    };
    let Some(target) = find_user(&state, name).await? else {
        return Ok(user_not_found(session));
    };

    let profile_url = format!("/profile/{}", urlencoding::encode(&target.username));
    if target.id == viewer.id {
        return Ok(session
            .flash(Level::Danger, "You cannot follow yourself.")
            .redirect(&profile_url));
    }

    let target_id = target.id;
    state.db(move |db| db.follow(viewer.id, target_id)).await?;
    info!("'{}' now follows '{}'", viewer.username, target.username);

    Ok(session
        .flash(Level::Success, &format!("You are now following {}.", target.username))
        .redirect(&profile_url))
}
