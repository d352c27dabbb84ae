//! Authentication routes for login, callback, logout and the session endpoint.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rootcause::prelude::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;
use tkj_learning_platform_access::{
    AuthenticationError, SessionToken, SessionView, sanitize_callback,
};
use tracing::{error, info, warn};

use super::{
    AppState,
    middleware::{OptionalSession, SESSION_COOKIE, removal_cookie, session_cookie},
    oidc::AuthState,
};

/// Auth state cookie name (for CSRF protection during the OIDC flow).
const AUTH_STATE_COOKIE: &str = "auth_state";

/// Query parameters for the login route.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Serializable auth state for cookie storage.
#[derive(Debug, Serialize, Deserialize)]
struct AuthStateData {
    csrf_token: String,
    pkce_verifier: String,
    nonce: String,
    callback_url: String,
}

fn sign_in_error(code: &str) -> Redirect {
    Redirect::to(&format!("/login?error={code}"))
}

/// Starts the sign-in flow by redirecting to the identity provider.
///
/// The requested `callbackUrl` travels in the auth-state cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    let (auth_url, auth_state) = state.identity_provider.authorization_url();

    let data = AuthStateData {
        csrf_token: auth_state.csrf_token,
        pkce_verifier: auth_state.pkce_verifier,
        nonce: auth_state.nonce,
        callback_url: sanitize_callback(query.callback_url.as_deref()),
    };
    let auth_state_json = match serde_json::to_string(&data) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to serialize auth state");
            return sign_in_error("Callback").into_response();
        }
    };

    let cookie = Cookie::build((AUTH_STATE_COOKIE, auth_state_json))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10));

    (jar.add(cookie), Redirect::to(&auth_url)).into_response()
}

/// Handles the callback after the user authenticates with Google.
///
/// Links the account, issues the session cookie and returns the user to
/// the page they asked for. Any failure sends them back to the sign-in page
/// with an error code.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let auth_state = jar.get(AUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(removal_cookie(AUTH_STATE_COOKIE));

    match complete_sign_in(&state, query, auth_state.as_deref()).await {
        Ok((raw_token, target)) => (
            jar.add(session_cookie(raw_token, &state.session_config)),
            Redirect::to(&target),
        )
            .into_response(),
        Err(report) => {
            warn!(error = %report, "Sign-in failed");
            (jar, sign_in_error(report.current_context().sign_in_code())).into_response()
        }
    }
}

async fn complete_sign_in(
    state: &AppState,
    query: CallbackQuery,
    auth_state: Option<&str>,
) -> Result<(String, String), Report<AuthenticationError>> {
    let provider = state.identity_provider.provider().to_string();
    let rejected = |reason: String| AuthenticationError::ProviderError {
        provider: provider.clone(),
        reason,
    };

    if let Some(error) = query.error {
        return Err(rejected(format!("provider returned '{error}'")).into());
    }
    let data: AuthStateData = auth_state
        .and_then(|raw| serde_json::from_str(raw).ok())
        .ok_or_else(|| rejected("missing or invalid auth state".to_string()))?;
    let (Some(code), Some(csrf_token)) = (query.code, query.state) else {
        return Err(rejected("callback without code or state".to_string()).into());
    };
    if csrf_token != data.csrf_token {
        return Err(rejected("CSRF token mismatch".to_string()).into());
    }

    let auth_state = AuthState {
        csrf_token: data.csrf_token,
        pkce_verifier: data.pkce_verifier,
        nonce: data.nonce,
    };
    let identity = state
        .identity_provider
        .exchange_code(&code, &auth_state)
        .await
        .context(rejected("code exchange failed".to_string()))?;

    let outcome = state.linker.link(&identity).await?;

    let token = state
        .enricher
        .enrich(SessionToken::for_identity(&identity), Some(&outcome.user))
        .await
        .context(AuthenticationError::StorageFailed)?;
    let raw_token = state
        .codec
        .encode(&token)
        .context(AuthenticationError::SessionNotIssued)?;

    info!(
        user_id = %outcome.user.id(),
        is_new_user = outcome.is_new_user,
        account_linked = outcome.account_linked,
        "User signed in"
    );

    Ok((raw_token, sanitize_callback(Some(&data.callback_url))))
}

/// Signs the user out by clearing the session cookie.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.add(removal_cookie(SESSION_COOKIE)), Redirect::to("/login"))
}

/// Returns the current session, or `{}` when signed out.
pub async fn session(OptionalSession(session): OptionalSession) -> Json<SessionView> {
    Json(session.unwrap_or_default())
}
