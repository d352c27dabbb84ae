//! Application router.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::pages;

/// Builds the application router.
///
/// Every route, the fallback included, runs behind the guard middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Auth routes
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .route("/api/auth/session", get(auth::session))
        // Pages
        .route("/login", get(pages::login))
        .route("/error", get(pages::error_page))
        .route("/", get(pages::home))
        .route("/siswa", get(pages::students))
        .route("/tambah", get(pages::create_course))
        .route("/tugas/nilai", get(pages::grading))
        .route("/api/assignments", post(pages::create_assignment))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::guard_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oidc::{AuthState, IdentityProvider};
    use crate::config::SessionConfig;
    use crate::error::OidcError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use rootcause::prelude::Report;
    use serde_json::Value;
    use tkj_learning_core::UserId;
    use tkj_learning_platform_access::{
        GOOGLE_PROVIDER, LinkedAccount, MemoryUserStore, Role, SessionToken, TokenCodec, User,
        UserStore, VerifiedIdentity,
    };
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret-with-enough-length";

    struct FakeGoogle {
        identity: VerifiedIdentity,
    }

    #[async_trait]
    impl IdentityProvider for FakeGoogle {
        fn provider(&self) -> &str {
            GOOGLE_PROVIDER
        }

        fn authorization_url(&self) -> (String, AuthState) {
            (
                "https://accounts.google.test/o/oauth2/auth?state=csrf-1".to_string(),
                AuthState {
                    csrf_token: "csrf-1".to_string(),
                    pkce_verifier: "verifier".to_string(),
                    nonce: "nonce".to_string(),
                },
            )
        }

        async fn exchange_code(
            &self,
            code: &str,
            state: &AuthState,
        ) -> Result<VerifiedIdentity, Report<OidcError>> {
            if code != "good-code" || state.pkce_verifier != "verifier" {
                return Err(OidcError::TokenExchange("invalid_grant".to_string()).into());
            }
            Ok(self.identity.clone())
        }
    }

    fn google_identity(email: Option<&str>) -> VerifiedIdentity {
        VerifiedIdentity::new(GOOGLE_PROVIDER, "110248495921238986420")
            .with_email(email.map(str::to_string), true)
            .with_name(Some("Siti Rahma".to_string()))
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            secure_cookies: false,
            ..SessionConfig::new(SECRET.to_string())
        }
    }

    fn app(store: Arc<MemoryUserStore>, identity: VerifiedIdentity) -> Router {
        let state = AppState::new(
            store,
            Arc::new(FakeGoogle { identity }),
            session_config(),
            true,
        );
        router(Arc::new(state))
    }

    fn stored_user(email: &str, role: Role) -> User {
        let now = chrono::Utc::now();
        User::with_all_fields(
            UserId::new(),
            email.to_string(),
            None,
            None,
            Some(role),
            Some(now),
            now,
            now,
        )
    }

    fn get(uri: &str, cookies: &[&str]) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if !cookies.is_empty() {
            builder = builder.header(header::COOKIE, cookies.join("; "));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Returns `name=value` of the cookie the response sets, if any.
    fn set_cookie(response: &Response, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| v.starts_with(&prefix))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
            .last()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Runs login and callback; returns the session cookie and the redirect target.
    async fn sign_in(app: &Router, callback_url: &str) -> (String, String) {
        let login = app
            .clone()
            .oneshot(get(
                &format!("/auth/login?callbackUrl={}", urlencoding::encode(callback_url)),
                &[],
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::SEE_OTHER);
        assert!(location(&login).starts_with("https://accounts.google.test/"));
        let auth_state = set_cookie(&login, "auth_state").expect("auth_state cookie");

        let callback = app
            .clone()
            .oneshot(get(
                "/auth/callback?code=good-code&state=csrf-1",
                &[&auth_state],
            ))
            .await
            .unwrap();
        assert_eq!(callback.status(), StatusCode::SEE_OTHER);
        let session = set_cookie(&callback, "session").expect("session cookie");
        (session, location(&callback).to_string())
    }

    #[tokio::test]
    async fn unauthenticated_page_redirects_with_callback_url() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));

        let response = app.oneshot(get("/tugas/nilai?id=3", &[])).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "/login?callbackUrl=%2Ftugas%2Fnilai%3Fid%3D3"
        );
    }

    #[tokio::test]
    async fn first_sign_in_is_visitor_and_forbidden_from_instructor_pages() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(store.clone(), google_identity(Some("a@b.com")));

        let (session, target) = sign_in(&app, "/siswa").await;
        assert_eq!(target, "/siswa");

        let stored = store.find_user_by_email("a@b.com").await.unwrap();
        assert_eq!(stored.and_then(|u| u.role()), Some(Role::Visitor));

        let me = app
            .clone()
            .oneshot(get("/api/auth/session", &[&session]))
            .await
            .unwrap();
        let body = json_body(me).await;
        assert_eq!(body["email"], "a@b.com");
        assert_eq!(body["role"], "VISITOR");

        let forbidden = app.oneshot(get("/tambah", &[&session])).await.unwrap();
        assert_eq!(forbidden.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&forbidden), "/?toast=unauthorized_access");
    }

    #[tokio::test]
    async fn stored_instructor_signs_in_without_role_write() {
        let store = Arc::new(MemoryUserStore::with_users([stored_user(
            "x@y.com",
            Role::Instructor,
        )]));
        let app = app(store.clone(), google_identity(Some("x@y.com")));

        let (session, _) = sign_in(&app, "/").await;
        let response = app.oneshot(get("/tambah", &[&session])).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.role_writes(), 0);
        let body = json_body(response).await;
        assert_eq!(body["viewer"]["role"], "INSTRUCTOR");
    }

    #[tokio::test]
    async fn role_change_applies_on_next_request() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(store.clone(), google_identity(Some("guru@y.com")));
        let (session, _) = sign_in(&app, "/").await;

        store
            .set_user_role("guru@y.com", Role::Instructor)
            .await
            .unwrap();

        let response = app.oneshot(get("/tugas/nilai", &[&session])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response, "session").is_some());
    }

    #[tokio::test]
    async fn api_denials_are_json() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(store, google_identity(Some("a@b.com")));

        let anonymous = app
            .clone()
            .oneshot(
                Request::post("/api/assignments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"Subnetting"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            location(&anonymous),
            "/login?callbackUrl=%2Fapi%2Fassignments"
        );
        let body = json_body(anonymous).await;
        assert_eq!(body["error"], "unauthenticated");
        assert_eq!(body["sign_in_url"], "/login?callbackUrl=%2Fapi%2Fassignments");

        let (session, _) = sign_in(&app, "/").await;
        let visitor = app
            .oneshot(
                Request::post("/api/assignments")
                    .header(header::COOKIE, session)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"Subnetting"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(visitor.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(visitor).await["error"], "forbidden");
    }

    #[tokio::test]
    async fn instructor_can_create_assignment() {
        let store = Arc::new(MemoryUserStore::with_users([stored_user(
            "x@y.com",
            Role::Instructor,
        )]));
        let app = app(store, google_identity(Some("x@y.com")));
        let (session, _) = sign_in(&app, "/").await;

        let response = app
            .oneshot(
                Request::post("/api/assignments")
                    .header(header::COOKIE, session)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"Subnetting"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["assignment"]["title"], "Subnetting");
    }

    #[tokio::test]
    async fn signed_in_user_is_sent_home_from_login() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));
        let (session, _) = sign_in(&app, "/").await;

        let response = app.oneshot(get("/login", &[&session])).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn home_reports_and_clears_forbidden_notice() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));
        let (session, _) = sign_in(&app, "/").await;

        let response = app
            .oneshot(get("/?toast=unauthorized_access", &[&session]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["notice"]["title"], "Akses Ditolak!");
        assert_eq!(body["notice"]["dismiss_url"], "/");
    }

    #[tokio::test]
    async fn sign_in_without_email_is_denied() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(store.clone(), google_identity(None));

        let login = app.clone().oneshot(get("/auth/login", &[])).await.unwrap();
        let auth_state = set_cookie(&login, "auth_state").unwrap();
        let callback = app
            .oneshot(get(
                "/auth/callback?code=good-code&state=csrf-1",
                &[&auth_state],
            ))
            .await
            .unwrap();

        assert_eq!(location(&callback), "/login?error=AccessDenied");
        assert!(set_cookie(&callback, "session").is_none());
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn csrf_mismatch_is_rejected() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));

        let login = app.clone().oneshot(get("/auth/login", &[])).await.unwrap();
        let auth_state = set_cookie(&login, "auth_state").unwrap();
        let callback = app
            .oneshot(get(
                "/auth/callback?code=good-code&state=forged",
                &[&auth_state],
            ))
            .await
            .unwrap();

        assert_eq!(location(&callback), "/login?error=Callback");
    }

    #[tokio::test]
    async fn foreign_callback_url_falls_back_to_home() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));

        let (_, target) = sign_in(&app, "https://evil.example/steal").await;

        assert_eq!(target, "/");
    }

    #[tokio::test]
    async fn tampered_cookie_is_discarded() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));

        let response = app
            .oneshot(get("/siswa", &["session=not.a.token"]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?callbackUrl=%2Fsiswa");
        assert_eq!(set_cookie(&response, "session").as_deref(), Some("session="));
    }

    #[tokio::test]
    async fn storage_outage_fails_closed() {
        let app = app(
            Arc::new(MemoryUserStore::unavailable()),
            google_identity(Some("a@b.com")),
        );
        let codec = TokenCodec::new(SECRET, chrono::Duration::days(30));
        let raw = codec
            .encode(&SessionToken::new(Some("a@b.com".to_string())))
            .unwrap();

        let response = app
            .oneshot(get("/siswa", &[&format!("session={raw}")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));
        let (session, _) = sign_in(&app, "/").await;

        let response = app
            .clone()
            .oneshot(get("/auth/logout", &[&session]))
            .await
            .unwrap();

        assert_eq!(location(&response), "/login");
        assert_eq!(set_cookie(&response, "session").as_deref(), Some("session="));

        let me = app.oneshot(get("/api/auth/session", &[])).await.unwrap();
        assert_eq!(json_body(me).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn unknown_paths_need_a_session() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));

        let anonymous = app.clone().oneshot(get("/kursus/7", &[])).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);

        let (session, _) = sign_in(&app, "/").await;
        let signed_in = app.oneshot(get("/kursus/7", &[&session])).await.unwrap();
        assert_eq!(signed_in.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stale_cookie_does_not_cancel_fresh_sign_in() {
        let app = app(Arc::new(MemoryUserStore::new()), google_identity(Some("a@b.com")));
        let rotated = TokenCodec::new(
            "secret-from-before-the-rotation-1234",
            chrono::Duration::days(30),
        )
        .encode(&SessionToken::new(Some("a@b.com".to_string())))
        .unwrap();
        let stale = format!("session={rotated}");

        let login = app.clone().oneshot(get("/auth/login", &[])).await.unwrap();
        let auth_state = set_cookie(&login, "auth_state").unwrap();
        let callback = app
            .clone()
            .oneshot(get(
                "/auth/callback?code=good-code&state=csrf-1",
                &[&auth_state, &stale],
            ))
            .await
            .unwrap();

        assert_eq!(location(&callback), "/");
        let session = set_cookie(&callback, "session").expect("session cookie");
        assert_ne!(session, "session=");

        let me = app
            .oneshot(get("/api/auth/session", &[&session]))
            .await
            .unwrap();
        assert_eq!(json_body(me).await["email"], "a@b.com");
    }

    #[tokio::test]
    async fn failed_role_write_issues_no_session() {
        let now = chrono::Utc::now();
        let user = User::with_all_fields(
            UserId::new(),
            "lama@y.com".to_string(),
            None,
            None,
            None,
            Some(now),
            now,
            now,
        );
        let identity = google_identity(Some("lama@y.com"));
        let store = MemoryUserStore::with_users([user.clone()]);
        store
            .link_account(&LinkedAccount::for_identity(&identity, user.id()))
            .await
            .unwrap();
        let app = app(Arc::new(store.read_only()), identity);

        let login = app.clone().oneshot(get("/auth/login", &[])).await.unwrap();
        let auth_state = set_cookie(&login, "auth_state").unwrap();
        let callback = app
            .oneshot(get(
                "/auth/callback?code=good-code&state=csrf-1",
                &[&auth_state],
            ))
            .await
            .unwrap();

        assert_eq!(location(&callback), "/login?error=Callback");
        assert!(set_cookie(&callback, "session").is_none());
    }

    #[tokio::test]
    async fn logout_works_during_storage_outage() {
        let app = app(
            Arc::new(MemoryUserStore::unavailable()),
            google_identity(Some("a@b.com")),
        );
        let raw = TokenCodec::new(SECRET, chrono::Duration::days(30))
            .encode(&SessionToken::new(Some("a@b.com".to_string())))
            .unwrap();

        let response = app
            .oneshot(get("/auth/logout", &[&format!("session={raw}")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        assert_eq!(set_cookie(&response, "session").as_deref(), Some("session="));
    }
}
