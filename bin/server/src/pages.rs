//! Page handlers.
//!
//! Rendering lives in the front end; these handlers answer JSON describing
//! the viewer so the access rules can be exercised end to end.

use axum::{
    Json,
    extract::Query,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tkj_learning_platform_access::pending_notice;

use crate::auth::{RequireInstructor, RequireSession};

/// Query parameters of the sign-in page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    error: Option<String>,
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

/// Message shown for a sign-in error code.
fn sign_in_message(code: &str) -> &'static str {
    match code {
        "AccessDenied" => "Akun Google tidak memiliki email yang terverifikasi.",
        "OAuthAccountNotLinked" => "Email ini sudah terdaftar dengan akun lain.",
        _ => "Terjadi kesalahan saat masuk. Silakan coba lagi.",
    }
}

/// The sign-in page.
pub async fn login(Query(query): Query<LoginQuery>) -> Json<Value> {
    let callback = query.callback_url.as_deref().unwrap_or("/");
    let message = query.error.as_deref().map(sign_in_message);
    Json(json!({
        "page": "login",
        "sign_in_url": format!("/auth/login?callbackUrl={}", urlencoding::encode(callback)),
        "error": query.error,
        "message": message,
    }))
}

/// Query parameters of the error page.
#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    error: Option<String>,
}

/// The sign-in error page.
pub async fn error_page(Query(query): Query<ErrorQuery>) -> Json<Value> {
    let message = sign_in_message(query.error.as_deref().unwrap_or_default());
    Json(json!({
        "page": "error",
        "error": query.error,
        "message": message,
    }))
}

/// Course overview, with any pending notice.
pub async fn home(RequireSession(viewer): RequireSession, uri: Uri) -> Json<Value> {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    Json(json!({
        "page": "home",
        "viewer": viewer,
        "notice": pending_notice(target),
    }))
}

/// Student area.
pub async fn students(RequireSession(viewer): RequireSession) -> Json<Value> {
    let class = viewer.effective_role().class_name();
    Json(json!({
        "page": "siswa",
        "class": class,
        "viewer": viewer,
    }))
}

/// Course and assignment creation.
pub async fn create_course(RequireInstructor(viewer): RequireInstructor) -> Json<Value> {
    Json(json!({
        "page": "tambah",
        "viewer": viewer,
    }))
}

/// Grading of submitted assignments.
pub async fn grading(RequireInstructor(viewer): RequireInstructor) -> Json<Value> {
    Json(json!({
        "page": "tugas/nilai",
        "viewer": viewer,
    }))
}

/// Creates an assignment.
pub async fn create_assignment(
    RequireInstructor(viewer): RequireInstructor,
    Json(assignment): Json<Value>,
) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "assignment": assignment,
            "created_by": viewer.id(),
        })),
    )
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" })))
}
