use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use inkwell_api::{AppState, MemorySessionStore, Settings};
use inkwell_db::Database;

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

/// Drives the router like a browser: remembers cookies between requests.
struct TestClient {
    router: Router,
    sessions: Arc<MemorySessionStore>,
    cookies: HashMap<String, String>,
}

impl TestClient {
    fn new() -> Self {
        let sessions = Arc::new(MemorySessionStore::new());
        let state = AppState::new(
            Database::open_in_memory().unwrap(),
            sessions.clone(),
            Settings::default(),
        );
        Self {
            router: inkwell_api::router(state),
            sessions,
            cookies: HashMap::new(),
        }
    }

    /// Second browser against the same server, with no cookies.
    fn stranger(&self) -> Self {
        Self {
            router: self.router.clone(),
            sessions: self.sessions.clone(),
            cookies: HashMap::new(),
        }
    }

    fn is_logged_in(&self) -> bool {
        self.cookies.contains_key("token")
    }

    async fn get(&mut self, path: &str) -> TestResponse {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        self.send(req).await
    }

    async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let res = self.router.clone().oneshot(req).await.unwrap();

        for set in res.headers().get_all(header::SET_COOKIE) {
            let set = set.to_str().unwrap();
            let pair = set.split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            let removed = set.split(';').any(|attr| attr.trim().eq_ignore_ascii_case("Max-Age=0"));
            if removed {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }

        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn sign_up(&mut self, username: &str, password: &str) -> TestResponse {
        self.post("/create_user/", &[("username", username), ("password", password)])
            .await
    }

    async fn log_in(&mut self, username: &str, password: &str) -> TestResponse {
        self.post("/login/", &[("username", username), ("password", password)])
            .await
    }

    async fn register_and_log_in(&mut self, username: &str, password: &str) {
        self.sign_up(username, password).await;
        let res = self.log_in(username, password).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
    }

    async fn create_entry(&mut self, title: &str, content: &str, published: bool) -> TestResponse {
        let mut fields = vec![("title", title), ("content", content)];
        if published {
            fields.push(("published", "on"));
        }
        self.post("/create/", &fields).await
    }
}

#[tokio::test]
async fn draft_is_hidden_until_published() {
    let mut alice = TestClient::new();

    let res = alice.sign_up("alice", "pw1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("User created!"));

    let res = alice.log_in("alice", "pw1").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/"));

    let res = alice.create_entry("Hello World!", "Some *markdown*", false).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/hello-world/edit/"));

    let drafts = alice.get("/drafts/").await;
    assert_eq!(drafts.status, StatusCode::OK);
    assert!(drafts.body.contains("/hello-world/"));

    let listing = alice.get("/").await;
    assert!(!listing.body.contains("/hello-world/"));

    // The author can open their own draft.
    assert_eq!(alice.get("/hello-world/").await.status, StatusCode::OK);

    let mut visitor = alice.stranger();
    let res = visitor.get("/hello-world/").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.body.contains("<h3>Not Found</h3>"));

    let res = alice
        .post(
            "/hello-world/edit/",
            &[("title", "Hello World!"), ("content", "Some *markdown*"), ("published", "on")],
        )
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/hello-world/"));

    let res = visitor.get("/hello-world/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Hello World!"));
    assert!(res.body.contains("<em>markdown</em>"));
    assert!(visitor.get("/").await.body.contains("/hello-world/"));
}

#[tokio::test]
async fn login_and_logout_track_the_session_store() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;
    assert_eq!(alice.sessions.len(), 1);
    assert!(alice.is_logged_in());

    let res = alice.post("/logout/", &[]).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/login/"));
    assert!(alice.sessions.is_empty());
    assert!(!alice.is_logged_in());

    // Logging out again with nothing to forget still lands on the login page.
    let res = alice.post("/logout/", &[]).await;
    assert_eq!(res.location.as_deref(), Some("/login/"));
}

#[tokio::test]
async fn stale_cookie_is_treated_as_logged_out() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;

    // A restart empties the in-memory store but the browser keeps its cookies.
    alice.sessions.clear();

    let res = alice.get("/drafts/").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/login/?next=%2Fdrafts%2F"));
    assert!(!alice.is_logged_in());
}

#[tokio::test]
async fn each_login_gets_its_own_token() {
    let mut first = TestClient::new();
    first.register_and_log_in("alice", "pw1").await;

    let mut second = first.stranger();
    assert_eq!(second.log_in("alice", "pw1").await.status, StatusCode::SEE_OTHER);

    assert_eq!(first.sessions.len(), 2);
    assert_ne!(first.cookies.get("token"), second.cookies.get("token"));

    second.post("/logout/", &[]).await;
    assert_eq!(first.sessions.len(), 1);
    assert_eq!(first.get("/drafts/").await.status, StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials_get_one_generic_message() {
    let mut client = TestClient::new();
    client.sign_up("alice", "pw1").await;

    for (user, pass) in [("alice", "wrong"), ("nobody", "pw1"), ("Alice", "pw1")] {
        let res = client.log_in(user, pass).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Incorrect login details!"));
    }
    assert!(client.sessions.is_empty());
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn signup_rejects_duplicates_and_blanks() {
    let mut client = TestClient::new();
    client.sign_up("alice", "pw1").await;

    let res = client.sign_up("alice", "other").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("A user with that name already exists!"));

    let res = client.sign_up("bob", "").await;
    assert!(res.body.contains("You must enter a username and a password"));

    // The first password still works.
    assert_eq!(client.log_in("alice", "pw1").await.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn admin_login_has_no_session_entry() {
    let mut admin = TestClient::new();

    let res = admin.log_in("admin", "secret").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/"));
    assert!(admin.is_logged_in());
    assert!(admin.sessions.is_empty());

    // Without a store entry the next request reconciles the login away.
    let res = admin.get("/drafts/").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert!(!admin.is_logged_in());
}

#[tokio::test]
async fn protected_pages_redirect_with_next() {
    let mut client = TestClient::new();

    for path in ["/drafts/", "/create/", "/profile/"] {
        let res = client.get(path).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        let expected = format!("/login/?next={}", urlencoding::encode(path));
        assert_eq!(res.location.as_deref(), Some(expected.as_str()));
    }

    client.sign_up("alice", "pw1").await;
    let res = client
        .post(
            "/login/?next=%2Fdrafts%2F",
            &[("username", "alice"), ("password", "pw1")],
        )
        .await;
    assert_eq!(res.location.as_deref(), Some("/drafts/"));
}

#[tokio::test]
async fn only_the_author_can_edit() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;
    alice.create_entry("Shared", "original text", true).await;
    alice.create_entry("Alice Draft", "private", false).await;

    let own = alice.get("/shared/").await;
    assert!(own.body.contains("/shared/edit/"));

    let mut bob = alice.stranger();
    bob.register_and_log_in("bob", "pw2").await;

    let page = bob.get("/shared/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("/shared/edit/"));

    let res = bob.get("/shared/edit/").await;
    assert_eq!(res.location.as_deref(), Some("/shared/"));

    let res = bob
        .post("/shared/edit/", &[("title", "Hacked"), ("content", "defaced"), ("published", "on")])
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/shared/"));

    let page = bob.get("/shared/").await;
    assert!(page.body.contains("original text"));
    assert!(!page.body.contains("defaced"));

    // Someone else's draft is not found, even when logged in.
    assert_eq!(bob.get("/alice-draft/").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn entry_form_validation() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;

    let res = alice.create_entry("", "body", true).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Title and Content are required!"));

    assert_eq!(alice.create_entry("Twice", "body", true).await.status, StatusCode::SEE_OTHER);
    let res = alice.create_entry("twice!", "body", true).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("An entry with that title already exists!"));

    let res = alice.create_entry("???", "body", true).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("at least one letter or digit"));

    let res = alice.post("/twice/edit/", &[("title", "Twice"), ("content", "")]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Title and Content are required!"));
}

#[tokio::test]
async fn replies_need_a_login() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;
    alice.create_entry("Open Thread", "say hi", true).await;

    let res = alice.post("/open-thread/", &[("content", "first reply")]).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/open-thread/"));

    let mut visitor = alice.stranger();
    let res = visitor.post("/open-thread/", &[("content", "anonymous reply")]).await;
    assert_eq!(res.status, StatusCode::OK);

    let page = visitor.get("/open-thread/").await;
    assert!(page.body.contains("first reply"));
    assert!(!page.body.contains("anonymous reply"));
}

#[tokio::test]
async fn reply_markup_is_shown_as_text() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;
    alice.create_entry("Open Thread", "say hi", true).await;

    let mut mallory = alice.stranger();
    mallory.register_and_log_in("mallory", "pw2").await;
    let res = mallory
        .post("/open-thread/", &[("content", "<script>alert(1)</script>")])
        .await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);

    let page = alice.stranger().get("/open-thread/").await;
    assert!(!page.body.contains("<script>"));
    assert!(page.body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
}

#[tokio::test]
async fn titles_naming_fixed_routes_are_refused() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;

    for title in ["Drafts", "Login!", "profile"] {
        let res = alice.create_entry(title, "body", true).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("That title is reserved, please choose another."));
    }
    assert!(alice.get("/").await.body.contains("No entries found."));
}

#[tokio::test]
async fn search_pages() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;
    alice.create_entry("Alice on Rust", "ownership", true).await;

    let mut bob = alice.stranger();
    bob.register_and_log_in("bob", "pw2").await;
    bob.create_entry("Thoughts", "alice alice alice", true).await;

    let mut visitor = alice.stranger();

    let res = visitor.get("/?q=%20%20%20").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("No entries found."));
    assert!(res.body.contains("No users found."));

    // An exact author match hides full-text hits from other authors.
    let res = visitor.get("/?q=alice").await;
    assert!(res.body.contains("/alice-on-rust/"));
    assert!(!res.body.contains("/thoughts/"));
    assert!(res.body.contains("/profile/alice"));

    // The author path returns drafts too, marked as such.
    bob.create_entry("Bob Draft", "unfinished", false).await;
    let res = visitor.get("/?q=bob").await;
    assert!(res.body.contains("/thoughts/"));
    assert!(res.body.contains("/bob-draft/"));
    assert!(res.body.contains("(draft)"));

    let res = visitor.get("/?q=ownership").await;
    assert!(res.body.contains("/alice-on-rust/"));
    assert!(res.body.contains("No users found."));
}

#[tokio::test]
async fn unknown_users_flash_and_go_home() {
    let mut client = TestClient::new();

    for path in ["/profile/ghost", "/ghost/followers", "/ghost/following"] {
        let res = client.get(path).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/"));

        let home = client.get("/").await;
        assert!(home.body.contains("User not found, perhaps a mistype?"));
    }
}

#[tokio::test]
async fn following_an_author() {
    let mut alice = TestClient::new();
    alice.register_and_log_in("alice", "pw1").await;

    let mut bob = alice.stranger();
    bob.register_and_log_in("bob", "pw2").await;

    let profile = bob.get("/profile/alice").await;
    assert!(profile.body.contains("/alice/follow"));

    let res = bob.post("/alice/follow", &[]).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/profile/alice"));

    let followers = bob.get("/alice/followers").await;
    assert!(followers.body.contains("/profile/bob"));

    let following = bob.get("/bob/following").await;
    assert!(following.body.contains("/profile/alice"));
    assert!(following.body.contains("This is your list."));

    let res = alice.post("/alice/follow", &[]).await;
    assert_eq!(res.location.as_deref(), Some("/profile/alice"));
    assert!(alice.get("/profile/alice").await.body.contains("You cannot follow yourself."));

    let mut visitor = alice.stranger();
    let res = visitor.post("/alice/follow", &[]).await;
    assert_eq!(res.location.as_deref(), Some("/login/?next=%2Falice%2Ffollow"));
}

#[tokio::test]
async fn unmatched_paths_get_the_plain_404() {
    let mut client = TestClient::new();
    let res = client.get("/no/such/page").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, "<h3>Not Found</h3>");
}
