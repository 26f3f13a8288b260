//! HTML pages, rendered with maud. Interpolated values are escaped by the
//! templates; markdown output is the only pre-escaped content, and it never
//! carries raw HTML from the source text.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

use inkwell_db::{EntryRow, Page, ReplyRow, UserRow};
use inkwell_types::SessionUser;

use crate::flash::Flash;

pub fn layout(title: &str, viewer: Option<&SessionUser>, flashes: &[Flash], body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (title) " | Inkwell" }
            }
            body {
                nav {
                    a href="/" { "Inkwell" } " "
                    @if let Some(user) = viewer {
                        a href="/create/" { "New entry" } " "
                        a href="/drafts/" { "Drafts" } " "
                        a href="/profile/" { (user.username) } " "
                        a href="/logout/" { "Log out" }
                    } @else {
                        a href="/login/" { "Log in" } " "
                        a href="/create_user/" { "Sign up" }
                    }
                }
                form action="/" method="get" {
                    input name="q" placeholder="Search";
                }
                @for flash in flashes {
                    div class={ "flash " (flash.level.as_str()) } { (flash.message) }
                }
                main { (body) }
            }
        }
    }
}

// -- Listings --

fn profile_href(username: &str) -> String {
    format!("/profile/{}", urlencoding::encode(username))
}

pub fn entry_list(entries: &[&EntryRow]) -> Markup {
    html! {
        @if entries.is_empty() {
            p { "No entries found." }
        } @else {
            ul.entries {
                @for entry in entries {
                    li {
                        a href={ "/" (entry.slug) "/" } { (entry.title) }
                        " by "
                        a href=(profile_href(&entry.author_username)) { (entry.author_username) }
                        " "
                        time { (entry.created_at) }
                        @if !entry.published {
                            " " em { "(draft)" }
                        }
                    }
                }
            }
        }
    }
}

fn user_list(users: &[UserRow]) -> Markup {
    html! {
        @if users.is_empty() {
            p { "No users found." }
        } @else {
            ul.users {
                @for user in users {
                    li { a href=(profile_href(&user.username)) { (user.username) } }
                }
            }
        }
    }
}

fn pagination(page: &Page<EntryRow>, base: &str) -> Markup {
    html! {
        nav.pages {
            @if page.has_prev() {
                a href=(format!("{}?page={}", base, page.number - 1)) { "Newer" } " "
            }
            @if page.has_next {
                a href=(format!("{}?page={}", base, page.number + 1)) { "Older" }
            }
        }
    }
}

fn listing(heading: &str, page: &Page<EntryRow>, base: &str) -> Markup {
    let entries: Vec<&EntryRow> = page.items.iter().collect();
    html! {
        h1 { (heading) }
        (entry_list(&entries))
        (pagination(page, base))
    }
}

pub fn index(page: &Page<EntryRow>) -> Markup {
    listing("Entries", page, "/")
}

pub fn drafts(page: &Page<EntryRow>) -> Markup {
    listing("Drafts", page, "/drafts/")
}

pub fn search_results(query: &str, entries: &[&EntryRow], users: &[UserRow]) -> Markup {
    html! {
        h1 { "Search results for \"" (query) "\"" }
        h2 { "Entries" }
        (entry_list(entries))
        h2 { "Users" }
        (user_list(users))
    }
}

// -- Entries --

pub fn detail(entry: &EntryRow, replies: &[ReplyRow], editable: bool, can_reply: bool) -> Markup {
    html! {
        article {
            h1 { (entry.title) }
            p.byline {
                "by "
                a href=(profile_href(&entry.author_username)) { (entry.author_username) }
                " "
                time { (entry.created_at) }
            }
            div.content { (markdown(&entry.content)) }
        }
        @if editable {
            p { a href={ "/" (entry.slug) "/edit/" } { "Edit entry" } }
        }
        section.replies {
            h2 { "Replies" }
            @for reply in replies {
                div.reply {
                    p.byline { (reply.author_username) " " time { (reply.created_at) } }
                    (markdown(&reply.content))
                }
            }
            @if can_reply {
                form action={ "/" (entry.slug) "/" } method="post" {
                    textarea name="content" {}
                    button type="submit" { "Reply" }
                }
            }
        }
    }
}

/// Create/edit form. `action` is the form target.
pub fn entry_form(heading: &str, action: &str, title: &str, content: &str, published: bool) -> Markup {
    html! {
        h1 { (heading) }
        form action=(action) method="post" {
            input name="title" value=(title) placeholder="Title";
            textarea name="content" placeholder="Content" { (content) }
            label {
                input type="checkbox" name="published" checked[published];
                " Published"
            }
            button type="submit" { "Save" }
        }
    }
}

// -- Accounts --

fn credentials_form(heading: &str, action: &str, button: &str, next: Option<&str>) -> Markup {
    html! {
        h1 { (heading) }
        form action=(action) method="post" {
            @if let Some(next) = next {
                input type="hidden" name="next" value=(next);
            }
            input name="username" placeholder="Username";
            input type="password" name="password" placeholder="Password";
            button type="submit" { (button) }
        }
    }
}

pub fn login(next: Option<&str>) -> Markup {
    credentials_form("Log in", "/login/", "Log in", next)
}

pub fn create_user(next: Option<&str>) -> Markup {
    credentials_form("Create account", "/create_user/", "Sign up", next)
}

pub fn logout() -> Markup {
    html! {
        h1 { "Log out" }
        form action="/logout/" method="post" {
            button type="submit" { "Log out" }
        }
    }
}

// -- Profiles --

pub struct ProfileView<'a> {
    pub user: &'a UserRow,
    pub entries: &'a [EntryRow],
    pub followers: usize,
    pub following: usize,
    pub can_follow: bool,
}

pub fn profile(view: &ProfileView<'_>) -> Markup {
    let name = urlencoding::encode(&view.user.username).into_owned();
    let entries: Vec<&EntryRow> = view.entries.iter().collect();

    html! {
        h1 { (view.user.username) }
        p.role { (view.user.role().as_str()) }
        p {
            a href={ "/" (name) "/followers" } { (view.followers) " followers" }
            " "
            a href={ "/" (name) "/following" } { (view.following) " following" }
        }
        @if view.can_follow {
            form action={ "/" (name) "/follow" } method="post" {
                button type="submit" { "Follow" }
            }
        }
        h2 { "Entries" }
        (entry_list(&entries))
    }
}

pub fn follow_list(heading: &str, user: &UserRow, users: &[UserRow], editable: bool) -> Markup {
    html! {
        h1 { (user.username) " " (heading) }
        @if editable {
            p.own { "This is your list." }
        }
        (user_list(users))
    }
}

// -- Markdown --

/// Render markdown. Raw HTML in the source is shown as text and
/// `javascript:` link targets are dropped.
pub fn markdown(source: &str) -> Markup {
    let parser = Parser::new_ext(source, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link { link_type, dest_url, title, id }) if is_script_url(&dest_url) => {
                Event::Start(Tag::Link {
                    link_type,
                    dest_url: CowStr::Borrowed("#"),
                    title,
                    id,
                })
            }
            Event::Start(Tag::Image { link_type, dest_url, title, id }) if is_script_url(&dest_url) => {
                Event::Start(Tag::Image {
                    link_type,
                    dest_url: CowStr::Borrowed("#"),
                    title,
                    id,
                })
            }
            _ => event,
        });

    let mut out = String::new();
    pulldown_cmark::html::push_html(&mut out, parser);
    PreEscaped(out)
}

fn is_script_url(url: &str) -> bool {
    let scheme: String = url
        .trim_start()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .take(11)
        .collect();
    scheme.to_ascii_lowercase().starts_with("javascript:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolated_text_is_escaped() {
        let page = entry_form("New entry", "/create/", r#"<b>"bold"</b>"#, "</textarea>", false).into_string();
        assert!(page.contains("&lt;b&gt;&quot;bold&quot;&lt;/b&gt;"));
        assert!(page.contains("&lt;/textarea&gt;"));
        assert!(!page.contains("<b>"));
    }

    #[test]
    fn markdown_renders_emphasis() {
        assert_eq!(markdown("*hi*").into_string().trim(), "<p><em>hi</em></p>");
    }

    #[test]
    fn markdown_shows_raw_html_as_text() {
        let block = markdown("<script>alert(1)</script>").into_string();
        assert!(!block.contains("<script>"));
        assert!(block.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));

        let inline = markdown("hi <img src=x onerror=alert(1)> there").into_string();
        assert!(!inline.contains("<img"));
        assert!(inline.contains("&lt;img"));
    }

    #[test]
    fn markdown_drops_script_links() {
        let html = markdown("[click](javascript:alert(1)) [ok](https://example.com)").into_string();
        assert!(!html.contains("javascript:"));
        assert!(html.contains(r##"href="#""##));
        assert!(html.contains(r#"href="https://example.com""#));
    }
}
