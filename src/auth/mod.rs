//! Authentication core for the portal client.
//!
//! # Architecture
//!
//! - [`store`] - Pluggable key-value credential persistence (file, keyring, memory)
//! - [`credentials`] - Slot layout and record helpers on top of a store
//! - [`resolver`] - Picks the single active identity by explicit priority
//! - [`coordinator`] - Single-flight token refresh with a FIFO waiter queue
//! - [`refresh`] - Per-class refresh endpoint client
//! - [`session`] - Session invalidation, notices and login navigation events
//! - [`jwt`] - Unverified claim peek for expiry reporting

pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod refresh;
pub mod resolver;
pub mod session;
pub mod store;

pub use coordinator::{BearerToken, RefreshCoordinator};
pub use credentials::CredentialRecord;
pub use error::{AuthError, RefreshError};
pub use refresh::{HttpRefresher, RefreshedTokens, Refresher};
pub use resolver::{AuthResolver, IdentityPriority};
pub use session::{InvalidationScope, LoginReason, Notice, NoticeKind, SessionEvent, SessionInvalidator};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

#[cfg(feature = "system-keyring")]
pub use store::KeyringCredentialStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three mutually exclusive principal kinds sharing one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityClass {
    Admin,
    Student,
    Teacher,
}

impl IdentityClass {
    /// All classes in default resolution priority.
    pub const ALL: [IdentityClass; 3] = [Self::Admin, Self::Student, Self::Teacher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }

    /// Store slot holding this class's access token.
    pub fn access_key(&self) -> &'static str {
        match self {
            Self::Admin => "accessToken",
            Self::Student => "studentAccessToken",
            Self::Teacher => "teacherAccessToken",
        }
    }

    /// Store slot holding this class's refresh token.
    pub fn refresh_key(&self) -> &'static str {
        match self {
            Self::Admin => "refreshToken",
            Self::Student => "studentRefreshToken",
            Self::Teacher => "teacherRefreshToken",
        }
    }

    /// Path (relative to the API base) of the class's login endpoint.
    pub fn login_path(&self) -> String {
        format!("{}/login/", self.as_str())
    }

    /// Path (relative to the API base) of the class's token refresh endpoint.
    pub fn refresh_path(&self) -> String {
        format!("{}/token/refresh/", self.as_str())
    }

    /// Name of the identifier field the class's login endpoint expects.
    pub fn login_field(&self) -> &'static str {
        match self {
            Self::Admin => "admin_username",
            Self::Student => "stu_no",
            Self::Teacher => "teacher_no",
        }
    }
}

impl fmt::Display for IdentityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityClass {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            _ => Err(format!("Unknown identity class: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys_are_distinct() {
        let mut keys: Vec<&str> = IdentityClass::ALL
            .iter()
            .flat_map(|c| [c.access_key(), c.refresh_key()])
            .collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(IdentityClass::Student.refresh_path(), "student/token/refresh/");
        assert_eq!(IdentityClass::Teacher.login_path(), "teacher/login/");
    }

    #[test]
    fn test_parse_class() {
        assert_eq!("Teacher".parse::<IdentityClass>(), Ok(IdentityClass::Teacher));
        assert!("parent".parse::<IdentityClass>().is_err());
    }
}
