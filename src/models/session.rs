//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Locally persisted login session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    /// Associated user ID
    pub user_id: String,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id` lasting `lifetime` from `now`.
    pub fn start(user_id: impl Into<String>, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.into(),
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    /// A session whose expiry is at or before `now` is no session at all.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let session = Session::start("u1", now, Duration::days(7));
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::days(7)));
        assert!(session.is_expired_at(now + Duration::days(8)));
    }
}
