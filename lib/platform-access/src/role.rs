//! Role types for access control.
//!
//! Every signed-in user holds exactly one role from a closed set: the
//! unprivileged visitor role assigned on first sign-in, one of the three
//! TKJ class groups, or instructor. Role assignment itself happens outside
//! this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level of a user.
///
/// The serialized names match the values stored in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Signed in but not yet placed in a class. The default role.
    #[serde(rename = "VISITOR")]
    Visitor,
    /// Student of class XII TKJ 1.
    #[serde(rename = "TKJ1")]
    Tkj1,
    /// Student of class XII TKJ 2.
    #[serde(rename = "TKJ2")]
    Tkj2,
    /// Student of class XII TKJ 3.
    #[serde(rename = "TKJ3")]
    Tkj3,
    /// Teacher; may create courses and assignments and grade submissions.
    #[serde(rename = "INSTRUCTOR")]
    Instructor,
}

impl Role {
    /// Every role, in ascending order of privilege.
    pub const ALL: [Role; 5] = [
        Role::Visitor,
        Role::Tkj1,
        Role::Tkj2,
        Role::Tkj3,
        Role::Instructor,
    ];

    /// The role given to users who do not have one yet.
    pub const DEFAULT: Role = Role::Visitor;

    /// Returns the stored name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visitor => "VISITOR",
            Self::Tkj1 => "TKJ1",
            Self::Tkj2 => "TKJ2",
            Self::Tkj3 => "TKJ3",
            Self::Instructor => "INSTRUCTOR",
        }
    }

    /// Returns true for the instructor role.
    #[must_use]
    pub fn is_instructor(&self) -> bool {
        matches!(self, Self::Instructor)
    }

    /// Returns true for the three class-group roles.
    #[must_use]
    pub fn is_student(&self) -> bool {
        matches!(self, Self::Tkj1 | Self::Tkj2 | Self::Tkj3)
    }

    /// Returns the class this role belongs to, for student roles.
    #[must_use]
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::Tkj1 => Some("XII TKJ 1"),
            Self::Tkj2 => Some("XII TKJ 2"),
            Self::Tkj3 => Some("XII TKJ 3"),
            Self::Visitor | Self::Instructor => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A set of roles, used to state which roles a route admits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    /// Creates a set from the given roles, ignoring duplicates.
    #[must_use]
    pub fn of(roles: &[Role]) -> Self {
        let mut set = Self { roles: Vec::new() };
        for role in roles {
            if !set.roles.contains(role) {
                set.roles.push(*role);
            }
        }
        set
    }

    /// The set holding only the instructor role.
    #[must_use]
    pub fn instructors() -> Self {
        Self::of(&[Role::Instructor])
    }

    /// The set of the three class-group roles.
    #[must_use]
    pub fn students() -> Self {
        Self::of(&[Role::Tkj1, Role::Tkj2, Role::Tkj3])
    }

    /// Returns true if the role is in the set.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns the roles as a slice.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns true if no role is admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, role) in self.roles.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(role.as_str())?;
        }
        Ok(())
    }
}
