use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated user, resolved from the backend with a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default, alias = "is_admin")]
    pub is_admin: bool,
    #[serde(default = "default_active", alias = "is_active")]
    pub is_active: bool,
    #[serde(default, alias = "created_at", deserialize_with = "deserialize_timestamp")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    /// Sum of mailbox storage across the user's accounts, when the backend reports it.
    #[serde(default, alias = "mailbox_usage_bytes")]
    pub storage_used_bytes: Option<u64>,
}

fn default_active() -> bool {
    true
}

/// Timestamps come from a timezone-less database column, so most payloads
/// carry no offset. Naive values are read as UTC; RFC 3339 values keep theirs.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

impl Identity {
    /// Short label for status bars, e.g. `alice (admin)`.
    pub fn display_label(&self) -> String {
        if self.is_admin {
            format!("{} (admin)", self.username)
        } else {
            self.username.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_backend_payload() {
        let json = r#"{
            "id": 7,
            "username": "alice",
            "is_admin": true,
            "is_active": true,
            "created_at": "2024-03-01T10:00:00Z",
            "mailbox_usage_bytes": 2048,
            "deleted_at": null
        }"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, 7);
        assert_eq!(identity.username, "alice");
        assert!(identity.is_admin);
        assert_eq!(identity.storage_used_bytes, Some(2048));
        assert!(identity.created_at.is_some());
    }

    #[test]
    fn test_identity_with_naive_timestamp() {
        let json = r#"{"id":1,"username":"admin","is_active":true,"is_admin":true,"created_at":"2024-03-01T10:00:00"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        let created = identity.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let json = r#"{"id":1,"username":"admin","createdAt":"2024-03-01 10:00:00.123456"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert!(identity.created_at.is_some());
    }

    #[test]
    fn test_identity_with_offset_timestamp_converts_to_utc() {
        let json = r#"{"id":1,"username":"admin","created_at":"2024-03-01T12:00:00+02:00"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(
            identity.created_at.unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_identity_with_null_or_garbage_timestamp() {
        let identity: Identity =
            serde_json::from_str(r#"{"id":1,"username":"a","created_at":null}"#).unwrap();
        assert_eq!(identity.created_at, None);
        assert!(serde_json::from_str::<Identity>(
            r#"{"id":1,"username":"a","created_at":"yesterday"}"#
        )
        .is_err());
    }

    #[test]
    fn test_identity_defaults_for_missing_fields() {
        let identity: Identity = serde_json::from_str(r#"{"id": 1, "username": "bob"}"#).unwrap();
        assert!(!identity.is_admin);
        assert!(identity.is_active);
        assert_eq!(identity.created_at, None);
        assert_eq!(identity.storage_used_bytes, None);
    }

    #[test]
    fn test_display_label() {
        let mut identity: Identity =
            serde_json::from_str(r#"{"id": 1, "username": "bob"}"#).unwrap();
        assert_eq!(identity.display_label(), "bob");
        identity.is_admin = true;
        assert_eq!(identity.display_label(), "bob (admin)");
    }
}
