//! Per-route access checks.
//!
//! Every request path is matched against a static route table to find its
//! requirement, and the materialized session is evaluated against it. The
//! guard holds no state between requests.

use crate::error::AuthorizationError;
use crate::notice::Notice;
use crate::role::RoleSet;
use crate::session::SessionView;
use tracing::debug;

/// Path of the sign-in page.
pub const SIGN_IN_PATH: &str = "/login";

/// Query parameter carrying the post-sign-in destination.
pub const CALLBACK_PARAM: &str = "callbackUrl";

/// Requirement a route places on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, signed in or not.
    Public,
    /// Any signed-in user, whatever the role.
    Authenticated,
    /// A signed-in user whose role is in the set.
    Roles(RoleSet),
}

impl Access {
    /// Evaluates the session against this requirement.
    ///
    /// A session without a role is evaluated as a visitor.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when a session is required and absent, `Forbidden`
    /// when the session's role is outside the required set.
    pub fn evaluate(&self, session: Option<&SessionView>) -> Result<(), AuthorizationError> {
        match (self, session) {
            (Self::Public, _) => Ok(()),
            (_, None) => Err(AuthorizationError::NotAuthenticated),
            (Self::Authenticated, Some(_)) => Ok(()),
            (Self::Roles(required), Some(session)) => {
                let role = session.effective_role();
                if required.contains(role) {
                    Ok(())
                } else {
                    Err(AuthorizationError::Forbidden {
                        role,
                        required: required.clone(),
                    })
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Exact,
    Prefix,
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    path: String,
    kind: Match,
    access: Access,
}

impl RouteRule {
    /// A rule for exactly this path.
    #[must_use]
    pub fn exact(path: impl Into<String>, access: Access) -> Self {
        Self {
            path: path.into(),
            kind: Match::Exact,
            access,
        }
    }

    /// A rule for this path and everything below it.
    ///
    /// `/auth` covers `/auth` and `/auth/callback`, not `/authors`.
    #[must_use]
    pub fn prefix(path: impl Into<String>, access: Access) -> Self {
        Self {
            path: path.into().trim_end_matches('/').to_string(),
            kind: Match::Prefix,
            access,
        }
    }

    #[must_use]
    pub fn access(&self) -> &Access {
        &self.access
    }

    fn matches(&self, path: &str) -> bool {
        match self.kind {
            Match::Exact => path == self.path,
            Match::Prefix => {
                self.path.is_empty()
                    || path == self.path
                    || path
                        .strip_prefix(self.path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }

    /// Longer paths are more specific; exact beats prefix on equal length.
    fn specificity(&self) -> (usize, bool) {
        (self.path.len(), self.kind == Match::Exact)
    }
}

/// Static table of route requirements.
///
/// The most specific matching rule wins. Paths no rule matches require a
/// signed-in user.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn with(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The routes of the learning system.
    #[must_use]
    pub fn learning_system() -> Self {
        Self::new()
            .with(RouteRule::exact(SIGN_IN_PATH, Access::Public))
            .with(RouteRule::exact("/error", Access::Public))
            .with(RouteRule::prefix("/auth", Access::Public))
            .with(RouteRule::prefix("/api/auth", Access::Public))
            .with(RouteRule::exact("/", Access::Authenticated))
            .with(RouteRule::prefix("/siswa", Access::Authenticated))
            .with(RouteRule::prefix(
                "/tambah",
                Access::Roles(RoleSet::instructors()),
            ))
            .with(RouteRule::prefix(
                "/tugas/nilai",
                Access::Roles(RoleSet::instructors()),
            ))
            .with(RouteRule::prefix(
                "/api/assignments",
                Access::Roles(RoleSet::instructors()),
            ))
    }

    /// Returns the requirement for a path (without query string).
    #[must_use]
    pub fn access_for(&self, path: &str) -> &Access {
        const FALLBACK: &Access = &Access::Authenticated;

        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .max_by_key(|rule| rule.specificity())
            .map_or(FALLBACK, RouteRule::access)
    }
}

/// What the caller should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Serve the request.
    Allow,
    /// No session; send the user to sign in, then back.
    RedirectToSignIn { location: String },
    /// Signed in with an insufficient role.
    Forbidden {
        location: String,
        error: AuthorizationError,
    },
    /// Signed-in user opened the sign-in page.
    AlreadySignedIn { location: String },
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Route guard over a route table.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    table: RouteTable,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(RouteTable::learning_system())
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Whether `path_and_query` is served without a session.
    #[must_use]
    pub fn is_public(&self, path_and_query: &str) -> bool {
        matches!(
            self.table.access_for(path_only(path_and_query)),
            Access::Public
        )
    }

    /// Decides how to answer a request for `path_and_query`.
    #[must_use]
    pub fn check(&self, path_and_query: &str, session: Option<&SessionView>) -> GuardDecision {
        let path = path_only(path_and_query);

        if path == SIGN_IN_PATH && session.is_some() {
            return GuardDecision::AlreadySignedIn {
                location: "/".to_string(),
            };
        }

        match self.table.access_for(path).evaluate(session) {
            Ok(()) => GuardDecision::Allow,
            Err(AuthorizationError::NotAuthenticated) => {
                debug!(path, "Unauthenticated request redirected to sign-in");
                GuardDecision::RedirectToSignIn {
                    location: sign_in_location(path_and_query),
                }
            }
            Err(error) => {
                debug!(path, %error, "Request forbidden for role");
                GuardDecision::Forbidden {
                    location: Notice::UnauthorizedAccess.location("/"),
                    error,
                }
            }
        }
    }
}

fn path_only(path_and_query: &str) -> &str {
    path_and_query
        .split_once('?')
        .map_or(path_and_query, |(path, _)| path)
}

/// Builds the sign-in URL that returns to `path_and_query` afterwards.
#[must_use]
pub fn sign_in_location(path_and_query: &str) -> String {
    format!(
        "{SIGN_IN_PATH}?{CALLBACK_PARAM}={}",
        urlencoding::encode(path_and_query)
    )
}

/// Returns a safe post-sign-in destination.
///
/// Only same-origin relative paths are honoured. Absolute URLs,
/// protocol-relative `//host` forms and backslash tricks fall back to `/`.
#[must_use]
pub fn sanitize_callback(target: Option<&str>) -> String {
    const HOME: &str = "/";

    let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
        return HOME.to_string();
    };
    let unsafe_target = !target.starts_with('/')
        || target.starts_with("//")
        || target.contains('\\')
        || target.chars().any(char::is_control);

    if unsafe_target {
        debug!(callback = target, "Rejected callback target");
        return HOME.to_string();
    }
    target.to_string()
}
