use axum::{
    Form,
    extract::{Path, Query, State},
    http::Uri,
    response::Response,
};
use maud::Markup;
use tracing::info;

use inkwell_db::{EntryError, EntryRow, EntryScope, NewEntry};
use inkwell_types::api::{EntryForm, IndexQuery, PageQuery, ReplyForm};

use crate::error::AppResult;
use crate::flash::Level;
use crate::guard::WebSession;
use crate::state::AppState;
use crate::views;

pub async fn index(
    State(state): State<AppState>,
    session: WebSession,
    Query(query): Query<IndexQuery>,
) -> AppResult<Response> {
    if let Some(q) = query.q.filter(|q| !q.is_empty()) {
        let term = q.clone();
        let (entries, users) = state
            .db(move |db| Ok((db.search_entries(&term)?, db.search_users(&term)?)))
            .await?;
        let body = views::search_results(&q, &entries.entries(), &users);
        return Ok(session.render("Search", body));
    }

    let page = query.page.unwrap_or(1);
    let per_page = state.settings.page_size;
    let listing = state.db(move |db| db.public_entries(page, per_page)).await?;
    Ok(session.render("Entries", views::index(&listing)))
}

pub async fn drafts(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let Some(user) = session.user().cloned() else {
        return Ok(session.login_redirect(uri.path()));
    };

    let page = query.page.unwrap_or(1);
    let per_page = state.settings.page_size;
    let listing = state.db(move |db| db.drafts(user.id, page, per_page)).await?;
    Ok(session.render("Drafts", views::drafts(&listing)))
}

pub async fn create_page(session: WebSession, uri: Uri) -> Response {
    if session.user().is_none() {
        return session.login_redirect(uri.path());
    }
    session.render("New entry", views::entry_form("New entry", "/create/", "", "", false))
}

pub async fn create(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
    Form(form): Form<EntryForm>,
) -> AppResult<Response> {
    let Some(user) = session.user().cloned() else {
        return Ok(session.login_redirect(uri.path()));
    };

    let rerender = |session: WebSession, message: &str| {
        session.flash(Level::Danger, message).render(
            "New entry",
            views::entry_form(
                "New entry",
                "/create/",
                form.title.as_deref().unwrap_or_default(),
                form.content.as_deref().unwrap_or_default(),
                form.is_published(),
            ),
        )
    };

    let Some((title, content)) = form.title_and_content() else {
        return Ok(rerender(session, "Title and Content are required!"));
    };

    let (title_owned, content_owned) = (title.to_string(), content.to_string());
    let published = form.is_published();
    let saved = state
        .db(move |db| {
            match db.create_entry(&NewEntry {
                title: &title_owned,
                slug: None,
                content: &content_owned,
                published,
                author_id: user.id,
            }) {
                Ok(entry) => Ok(Ok(entry)),
                Err(e) => match e.downcast::<EntryError>() {
                    Ok(rejected) => Ok(Err(rejected)),
                    Err(e) => Err(e),
                },
            }
        })
        .await?;

    let entry = match saved {
        Ok(entry) => entry,
        Err(EntryError::SlugTaken(_)) => {
            return Ok(rerender(session, "An entry with that title already exists!"));
        }
        Err(EntryError::EmptySlug) => {
            return Ok(rerender(session, "The title needs at least one letter or digit."));
        }
        Err(EntryError::ReservedSlug(_)) => {
            return Ok(rerender(session, "That title is reserved, please choose another."));
        }
    };
    info!("Entry '{}' created by '{}'", entry.slug, entry.author_username);

    let session = session.flash(Level::Success, "Entry created successfully!");
    if entry.published {
        Ok(session.redirect(&format!("/{}/", entry.slug)))
    } else {
        Ok(session.redirect(&format!("/{}/edit/", entry.slug)))
    }
}

/// Anonymous viewers resolve against published entries only; a logged-in
/// viewer also reaches their own drafts.
fn detail_scope(session: &WebSession) -> EntryScope {
    match session.user() {
        Some(user) => EntryScope::VisibleTo(user.id),
        None => EntryScope::Published,
    }
}

async fn find_entry(state: &AppState, slug: String, scope: EntryScope) -> AppResult<Option<EntryRow>> {
    state.db(move |db| db.get_entry_by_slug(&slug, scope)).await
}

async fn render_detail(state: &AppState, session: WebSession, entry: EntryRow) -> AppResult<Response> {
    let entry_id = entry.id;
    let replies = state.db(move |db| db.replies_for_entry(entry_id)).await?;
    let editable = session.owns(&entry.author_username);
    let can_reply = session.user().is_some();
    let body = views::detail(&entry, &replies, editable, can_reply);
    Ok(session.render(&entry.title, body))
}

pub async fn detail(
    State(state): State<AppState>,
    session: WebSession,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let Some(entry) = find_entry(&state, slug, detail_scope(&session)).await? else {
        return Ok(session.not_found());
    };
    render_detail(&state, session, entry).await
}

pub async fn reply(
    State(state): State<AppState>,
    session: WebSession,
    Path(slug): Path<String>,
    Form(form): Form<ReplyForm>,
) -> AppResult<Response> {
    let Some(entry) = find_entry(&state, slug, detail_scope(&session)).await? else {
        return Ok(session.not_found());
    };

    let viewer = session.user().cloned();
    let (Some(user), Some(content)) = (viewer, form.content()) else {
        return render_detail(&state, session, entry).await;
    };

    let (entry_id, content) = (entry.id, content.to_string());
    state
        .db(move |db| db.create_reply(entry_id, user.id, &content))
        .await?;
    Ok(session.redirect(&format!("/{}/", entry.slug)))
}

pub async fn edit_page(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    if session.user().is_none() {
        return Ok(session.login_redirect(uri.path()));
    }
    let Some(entry) = find_entry(&state, slug, EntryScope::All).await? else {
        return Ok(session.not_found());
    };

    if !session.owns(&entry.author_username) {
        return Ok(session.redirect(&format!("/{}/", entry.slug)));
    }
    let form = edit_form(&entry, &entry.title, &entry.content, entry.published);
    Ok(session.render("Edit entry", form))
}

pub async fn edit(
    State(state): State<AppState>,
    session: WebSession,
    uri: Uri,
    Path(slug): Path<String>,
    Form(form): Form<EntryForm>,
) -> AppResult<Response> {
    if session.user().is_none() {
        return Ok(session.login_redirect(uri.path()));
    }
    let Some(entry) = find_entry(&state, slug, EntryScope::All).await? else {
        return Ok(session.not_found());
    };

    if !session.owns(&entry.author_username) {
        return Ok(session.redirect(&format!("/{}/", entry.slug)));
    }

    let Some((title, content)) = form.title_and_content() else {
        let body = edit_form(
            &entry,
            form.title.as_deref().unwrap_or_default(),
            form.content.as_deref().unwrap_or_default(),
            form.is_published(),
        );
        return Ok(session
            .flash(Level::Danger, "Title and Content are required!")
            .render("Edit entry", body));
    };

    let (id, title, content, published) =
        (entry.id, title.to_string(), content.to_string(), form.is_published());
    let saved = state
        .db(move |db| db.update_entry(id, &title, &content, published))
        .await?;
    info!("Entry '{}' saved (published: {})", saved.slug, saved.published);

    let session = session.flash(Level::Success, "Entry saved successfully!");
    if saved.published {
        Ok(session.redirect(&format!("/{}/", saved.slug)))
    } else {
        Ok(session.redirect(&format!("/{}/edit/", saved.slug)))
    }
}

fn edit_form(entry: &EntryRow, title: &str, content: &str, published: bool) -> Markup {
    views::entry_form(
        "Edit entry",
        &format!("/{}/edit/", entry.slug),
        title,
        content,
        published,
    )
}
