//! One-shot notices carried in the query string.
//!
//! The guard reports a forbidden page by redirecting with a `toast`
//! parameter. The receiving page shows the notice and offers a dismiss link
//! without the parameter, so a reload does not show it again.

use serde::Serialize;
use std::borrow::Cow;

/// Query parameter naming the notice to show.
pub const NOTICE_PARAM: &str = "toast";

/// Notices the access layer can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// A signed-in user opened an instructor-only page.
    UnauthorizedAccess,
}

impl Notice {
    /// Value of the `toast` parameter.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => "unauthorized_access",
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => "Akses Ditolak!",
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => {
                "hanya guru yang diizinkan untuk mengakses halaman tersebut."
            }
        }
    }

    /// Parses a `toast` parameter value.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "unauthorized_access" => Some(Self::UnauthorizedAccess),
            _ => None,
        }
    }

    /// URL of `path` with this notice attached.
    #[must_use]
    pub fn location(&self, path: &str) -> String {
        format!("{path}?{NOTICE_PARAM}={}", self.code())
    }
}

/// A notice found on a request, with the URL that dismisses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingNotice {
    pub notice: Notice,
    pub title: &'static str,
    pub message: &'static str,
    pub dismiss_url: String,
}

fn decode_component(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Looks for a notice on the request URL.
///
/// Keys and values are percent-decoded before matching. Unknown `toast`
/// values are ignored.
#[must_use]
pub fn pending_notice(path_and_query: &str) -> Option<PendingNotice> {
    let (path, query) = path_and_query.split_once('?')?;

    let mut notice = None;
    let mut kept = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if decode_component(key) == NOTICE_PARAM {
            notice = notice.or_else(|| Notice::from_code(&decode_component(value)));
        } else {
            kept.push(pair);
        }
    }

    let notice = notice?;
    let dismiss_url = if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    };

    Some(PendingNotice {
        notice,
        title: notice.title(),
        message: notice.message(),
        dismiss_url,
    })
}
