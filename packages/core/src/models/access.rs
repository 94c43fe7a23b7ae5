//! Session Access Policy
//!
//! Edit rights are derived once per authenticated session from the user's
//! profile under `users/{uid}` and then passed explicitly to the services that
//! need them. Presence in `users/` is the whitelist; `userLevel` of
//! `"Administrator"` marks an administrator.

use serde::{Deserialize, Serialize};

/// `user_level` value that grants administrator rights
pub const ADMINISTRATOR_LEVEL: &str = "Administrator";

/// Profile stored under `users/{uid}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: String,
    #[serde(alias = "user_level")]
    pub user_level: String,
}

/// What the current session is allowed to do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    user_id: Option<String>,
    whitelisted: bool,
    admin: bool,
}

impl AccessPolicy {
    /// Read-only policy for visitors
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build the policy for `user_id` from its profile (`None` = not whitelisted)
    pub fn from_profile(user_id: impl Into<String>, profile: Option<&UserProfile>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            whitelisted: profile.is_some(),
            admin: profile.is_some_and(|p| p.user_level == ADMINISTRATOR_LEVEL),
        }
    }

    /// Whitelisted editor without administrator rights
    pub fn editor(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            whitelisted: true,
            admin: false,
        }
    }

    pub fn administrator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            whitelisted: true,
            admin: true,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Whether the session may create drafts and mutate blocks
    pub fn can_edit(&self) -> bool {
        self.whitelisted
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_read_only() {
        let policy = AccessPolicy::anonymous();
        assert!(!policy.can_edit());
        assert!(!policy.is_admin());
        assert_eq!(policy.user_id(), None);
    }

    #[test]
    fn test_unknown_user_is_not_whitelisted() {
        let policy = AccessPolicy::from_profile("uid-1", None);
        assert_eq!(policy.user_id(), Some("uid-1"));
        assert!(!policy.can_edit());
    }

    #[test]
    fn test_profile_levels() {
        let faculty = UserProfile {
            name: "Dana".to_string(),
            user_level: "Faculty".to_string(),
        };
        let admin = UserProfile {
            name: "Sam".to_string(),
            user_level: ADMINISTRATOR_LEVEL.to_string(),
        };

        let policy = AccessPolicy::from_profile("uid-1", Some(&faculty));
        assert!(policy.can_edit());
        assert!(!policy.is_admin());

        let policy = AccessPolicy::from_profile("uid-2", Some(&admin));
        assert!(policy.can_edit());
        assert!(policy.is_admin());
    }

    #[test]
    fn test_profile_accepts_snake_case_level() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "name": "Sam",
            "user_level": "Administrator"
        }))
        .unwrap();
        assert_eq!(profile.user_level, ADMINISTRATOR_LEVEL);
    }
}
