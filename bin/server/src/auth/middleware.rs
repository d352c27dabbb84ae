//! Guard middleware and session extractors for Axum.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tkj_learning_platform_access::{
    GuardDecision, Notice, SessionToken, SessionView, materialize, sign_in_location,
};
use tracing::{debug, error, warn};

use super::AppState;
use crate::config::SessionConfig;

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session";

/// The materialized session of the current request.
///
/// Inserted into request extensions by [`guard_requests`].
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<SessionView>);

/// Builds the session cookie for a signed token.
pub(crate) fn session_cookie(raw: String, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, raw))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(config.max_age().num_seconds()))
        .build()
}

/// Builds a cookie that removes `name`.
pub(crate) fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

fn path_and_query(request_uri: &axum::http::Uri) -> String {
    request_uri
        .path_and_query()
        .map_or_else(|| request_uri.path().to_string(), |pq| pq.as_str().to_string())
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|value| value.to_str().is_ok_and(|v| v.starts_with(&prefix)))
}

/// Runs the access chain for every request.
///
/// Decodes the session cookie, enriches the token from the user store,
/// materializes the session and asks the route guard. Allowed requests see
/// the session through [`CurrentSession`] and get the cookie re-signed with
/// a fresh expiry.
pub async fn guard_requests(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let target = path_and_query(request.uri());

    let (token, discard_cookie) = match jar.get(SESSION_COOKIE) {
        None => (None, false),
        Some(cookie) => match state.codec.decode(cookie.value()) {
            Ok(token) => (Some(token), false),
            Err(report) => {
                debug!(error = %report, "Discarding session cookie");
                (None, true)
            }
        },
    };
    let jar = if discard_cookie {
        jar.add(removal_cookie(SESSION_COOKIE))
    } else {
        jar
    };

    let token: Option<SessionToken> = match token {
        Some(token) => match state.enricher.enrich(token.clone(), None).await {
            Ok(enriched) => Some(enriched),
            // Public routes grant nothing, so they keep working on the
            // claims from the previous cycle.
            Err(report) if state.guard.is_public(&target) => {
                warn!(error = %report, path = %target, "Session refresh failed on public route");
                Some(token)
            }
            Err(report) => {
                error!(error = %report, path = %target, "Session refresh failed; denying request");
                return AuthRejection::Unavailable.into_response();
            }
        },
        None => None,
    };

    let session = token.as_ref().map(materialize);
    let api = is_api(&target);

    let rejection = match state.guard.check(&target, session.as_ref()) {
        GuardDecision::Allow => None,
        GuardDecision::RedirectToSignIn { location } => {
            Some(AuthRejection::NotAuthenticated { location, api })
        }
        GuardDecision::Forbidden { location, error } => {
            warn!(path = %target, %error, "Access denied");
            Some(AuthRejection::Forbidden { location, api })
        }
        GuardDecision::AlreadySignedIn { location } => {
            Some(AuthRejection::AlreadySignedIn { location })
        }
    };
    if let Some(rejection) = rejection {
        return (jar, rejection).into_response();
    }

    request.extensions_mut().insert(CurrentSession(session));
    let response = next.run(request).await;

    // The handler issued or cleared the session itself; its cookie wins.
    if sets_session_cookie(&response) {
        return response;
    }
    let Some(token) = token else {
        return (jar, response).into_response();
    };
    match state.codec.encode(&token) {
        Ok(raw) => (
            jar.add(session_cookie(raw, &state.session_config)),
            response,
        )
            .into_response(),
        Err(report) => {
            error!(error = %report, "Failed to re-sign session token");
            (jar, response).into_response()
        }
    }
}

fn is_api(path_and_query: &str) -> bool {
    path_and_query.starts_with("/api/")
}

fn current_session(parts: &Parts) -> Option<SessionView> {
    parts
        .extensions
        .get::<CurrentSession>()
        .and_then(|current| current.0.clone())
}

/// Extractor for requiring a signed-in user.
///
/// If there is no session, the user is redirected to the sign-in page.
pub struct RequireSession(pub SessionView);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_session(parts).map(RequireSession).ok_or_else(|| {
            let target = path_and_query(&parts.uri);
            AuthRejection::NotAuthenticated {
                location: sign_in_location(&target),
                api: is_api(&target),
            }
        })
    }
}

/// Extractor for optionally getting the session.
///
/// Returns None if the user is not signed in.
pub struct OptionalSession(pub Option<SessionView>);

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSession(current_session(parts)))
    }
}

/// Extractor for requiring an instructor.
pub struct RequireInstructor(pub SessionView);

impl<S> FromRequestParts<S> for RequireInstructor
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireSession(session) = RequireSession::from_request_parts(parts, state).await?;

        if !session.effective_role().is_instructor() {
            warn!(
                path = %parts.uri.path(),
                role = %session.effective_role(),
                "Instructor access required"
            );
            return Err(AuthRejection::Forbidden {
                location: Notice::UnauthorizedAccess.location("/"),
                api: is_api(parts.uri.path()),
            });
        }

        Ok(RequireInstructor(session))
    }
}

/// Rejection type for the guard and the session extractors.
///
/// Pages are answered with redirects, `/api/` endpoints with JSON. An
/// unauthenticated API call still names the sign-in URL, `callbackUrl`
/// included, in its `Location` header and body.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated { location: String, api: bool },
    Forbidden { location: String, api: bool },
    AlreadySignedIn { location: String },
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated {
                location,
                api: true,
            } => (
                StatusCode::UNAUTHORIZED,
                [(header::LOCATION, location.clone())],
                Json(json!({
                    "error": "unauthenticated",
                    "message": "Sign in to continue",
                    "sign_in_url": location,
                })),
            )
                .into_response(),
            Self::Forbidden { api: true, .. } => {
                let notice = Notice::UnauthorizedAccess;
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": "forbidden",
                        "message": notice.message(),
                    })),
                )
                    .into_response()
            }
            Self::NotAuthenticated { location, .. }
            | Self::Forbidden { location, .. }
            | Self::AlreadySignedIn { location } => Redirect::to(&location).into_response(),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            )
                .into_response(),
        }
    }
}
