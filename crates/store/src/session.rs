use serde::Serialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use time::OffsetDateTime;

/// A signed-in user.
///
/// The upstream access token is never serialized and never shown in `Debug`
/// output, so sessions are safe to log or hand to a frontend as-is.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Expiry is exclusive: a session is still valid at exactly `expires_at`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("avatar_url", &self.avatar_url)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn session() -> Session {
        Session {
            id: "abc".to_string(),
            username: "octocat".to_string(),
            access_token: "gho_supersecret".to_string(),
            avatar_url: "https://avatars.example/octocat".to_string(),
            created_at: datetime!(2025-01-01 00:00 UTC),
            expires_at: datetime!(2025-01-02 00:00 UTC),
        }
    }

    #[test]
    fn test_credential_is_redacted() {
        let session = session();
        assert!(!format!("{session:?}").contains("supersecret"));
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("supersecret"));
        assert!(json.contains("\"avatarUrl\""));
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let session = session();
        assert!(!session.is_expired(session.expires_at));
        assert!(session.is_expired(session.expires_at + time::Duration::nanoseconds(1)));
    }
}
