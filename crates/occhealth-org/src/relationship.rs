//! Provider-to-client relationships
//!
//! A relationship is a directed link from a service-provider organization to
//! a client organization it manages. Relationships are normally switched off
//! with `is_active = false` rather than deleted, so the history survives.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Link from a service provider to one of its clients.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use occhealth_org::Relationship;
///
/// let mut rel = Relationship::new(Uuid::now_v7(), Uuid::now_v7());
/// assert!(rel.is_active);
///
/// rel.set_active(false);
/// assert!(!rel.is_active);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    /// Unique relationship ID
    pub id: Uuid,

    /// The managing organization
    pub service_provider_id: Uuid,

    /// The managed organization
    pub client_id: Uuid,

    /// Inactive relationships stay on record but are hidden from switching
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_active: bool,

    /// First day of the engagement
    #[serde(default)]
    pub relationship_start_date: Option<NaiveDate>,

    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Per-relationship settings blob
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Relationship {
    /// Creates an active relationship starting today.
    pub fn new(service_provider_id: Uuid, client_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            service_provider_id,
            client_id,
            is_active: true,
            relationship_start_date: Some(now.date_naive()),
            created_at: Some(now),
            updated_at: Some(now),
            settings: None,
        }
    }

    /// Activate or deactivate the relationship.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_creation() {
        let provider = Uuid::now_v7();
        let client = Uuid::now_v7();
        let rel = Relationship::new(provider, client);

        assert_eq!(rel.service_provider_id, provider);
        assert_eq!(rel.client_id, client);
        assert!(rel.is_active);
        assert_eq!(rel.relationship_start_date, Some(Utc::now().date_naive()));
    }

    #[test]
    fn test_null_is_active_reads_as_inactive() {
        let rel: Relationship = serde_json::from_value(serde_json::json!({
            "id": Uuid::now_v7(),
            "service_provider_id": Uuid::now_v7(),
            "client_id": Uuid::now_v7(),
            "is_active": null
        }))
        .unwrap();

        assert!(!rel.is_active);
    }

    #[test]
    fn test_toggle_updates_timestamp() {
        let mut rel = Relationship::new(Uuid::now_v7(), Uuid::now_v7());
        let before = rel.updated_at;

        rel.set_active(false);
        assert!(!rel.is_active);
        assert!(rel.updated_at >= before);
    }
}
