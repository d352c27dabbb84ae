//! Sign-in linking, session tokens and route guards for the TKJ Learning System.
//!
//! This crate provides the access-control chain run for every user:
//! - Account linking on sign-in (`AccountLinker`)
//! - Session token enrichment on every refresh (`TokenEnricher`, `TokenCodec`)
//! - The request-visible session (`SessionView`, `materialize`)
//! - Per-route checks (`RouteGuard`, `RouteTable`)
//!
//! # Access Control Model
//!
//! Every user holds one role: `VISITOR` until placed in a class, one of
//! `TKJ1`/`TKJ2`/`TKJ3`, or `INSTRUCTOR`. Routes are public, open to any
//! signed-in user, or restricted to a set of roles.
//!
//! # Example
//!
//! ```
//! use tkj_learning_platform_access::{
//!     GuardDecision, Role, RouteGuard, SessionToken, User, materialize,
//! };
//!
//! let mut user = User::new("guru@smkn1.sch.id".to_string());
//! user.set_role(Role::Instructor);
//!
//! let token = SessionToken::new(Some(user.email().to_string()));
//! let guard = RouteGuard::default();
//!
//! // A token that has not been enriched carries no role: visitor access only.
//! let session = materialize(&token);
//! assert!(!guard.check("/tambah", Some(&session)).is_allowed());
//! assert!(matches!(
//!     guard.check("/tambah", None),
//!     GuardDecision::RedirectToSignIn { .. }
//! ));
//! ```

pub mod enricher;
pub mod error;
pub mod guard;
pub mod identity;
pub mod linker;
pub mod notice;
pub mod oidc;
pub mod role;
pub mod session;
pub mod store;
pub mod token;
pub mod user;

// Re-export main types at crate root
pub use enricher::{RoleRefresh, TokenEnricher};
pub use error::{AuthenticationError, AuthorizationError, StorageError, TokenError};
pub use guard::{
    Access, GuardDecision, RouteGuard, RouteRule, RouteTable, sanitize_callback, sign_in_location,
};
pub use identity::{GOOGLE_PROVIDER, LinkedAccount, VerifiedIdentity};
pub use linker::{AccountLinker, LinkOutcome};
pub use notice::{Notice, PendingNotice, pending_notice};
pub use oidc::{GoogleConfig, GoogleConfigBuilder};
pub use role::{Role, RoleSet, UnknownRole};
pub use session::{SessionView, materialize};
pub use store::{MemoryUserStore, UserStore};
pub use token::{DEFAULT_MAX_AGE_DAYS, MAX_AGE_DAYS_RANGE, SessionToken, TokenCodec};
pub use user::User;
