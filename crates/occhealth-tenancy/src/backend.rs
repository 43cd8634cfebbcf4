//! Backend collaborator interface
//!
//! The tenant context reads organization data through
//! [`OrganizationBackend`]. Rows come back as untyped JSON, the shape the
//! hosted database returns them in, and are validated by the loaders before
//! anything else sees them.
//!
//! [`MemoryBackend`] is an in-process implementation of both the read side
//! and the [`OrganizationDirectory`] write side, with failure and latency
//! injection for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use occhealth_org::{Membership, Organization, OrganizationRole, Relationship};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::admin::OrganizationDirectory;
use crate::error::{TenancyError, TenancyResult};

/// Read-side queries the tenant context depends on.
#[async_trait]
pub trait OrganizationBackend: Send + Sync {
    /// Membership rows for a user.
    ///
    /// Each row looks like
    /// `{ "organization_id": .., "role": "admin", "organizations": { ..organization.. } }`.
    async fn fetch_memberships(&self, user_id: Uuid) -> TenancyResult<Vec<Value>>;

    /// Active relationship rows owned by a service provider.
    async fn fetch_active_relationships(&self, provider_id: Uuid) -> TenancyResult<Vec<Value>>;

    /// Organization rows for the given IDs. Unknown IDs are skipped.
    async fn fetch_organizations(&self, ids: &[Uuid]) -> TenancyResult<Vec<Value>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    organizations: HashMap<Uuid, Organization>,
    memberships: Vec<(Uuid, Uuid, OrganizationRole)>,
    relationships: Vec<Relationship>,
    raw_membership_rows: HashMap<Uuid, Vec<Value>>,
    relationship_delays: HashMap<Uuid, Duration>,
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    failing: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an organization.
    pub async fn add_organization(&self, organization: Organization) {
        self.state
            .write()
            .await
            .organizations
            .insert(organization.id, organization);
    }

    /// Store an organization and make `user_id` a member of it.
    pub async fn add_membership(&self, user_id: Uuid, organization: Organization, role: OrganizationRole) {
        let mut state = self.state.write().await;
        state.memberships.push((user_id, organization.id, role));
        state.organizations.insert(organization.id, organization);
    }

    /// Store a client organization and an active relationship to it.
    pub async fn add_client(&self, provider_id: Uuid, client: Organization) -> Relationship {
        let relationship = Relationship::new(provider_id, client.id);
        let mut state = self.state.write().await;
        state.organizations.insert(client.id, client);
        state.relationships.push(relationship.clone());
        relationship
    }

    /// Append a raw membership row for `user_id`, bypassing validation.
    pub async fn push_raw_membership_row(&self, user_id: Uuid, row: Value) {
        self.state
            .write()
            .await
            .raw_membership_rows
            .entry(user_id)
            .or_default()
            .push(row);
    }

    /// Delay relationship queries for one provider.
    pub async fn delay_relationships(&self, provider_id: Uuid, delay: Duration) {
        self.state
            .write()
            .await
            .relationship_delays
            .insert(provider_id, delay);
    }

    /// Number of stored organizations.
    pub async fn organization_count(&self) -> usize {
        self.state.read().await.organizations.len()
    }

    /// Make every query fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> TenancyResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TenancyError::Backend("service unavailable".to_string()));
        }
        Ok(())
    }
}

fn to_row<T: serde::Serialize>(value: &T) -> TenancyResult<Value> {
    serde_json::to_value(value).map_err(|e| TenancyError::Backend(e.to_string()))
}

#[async_trait]
impl OrganizationBackend for MemoryBackend {
    async fn fetch_memberships(&self, user_id: Uuid) -> TenancyResult<Vec<Value>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut rows = Vec::new();
        for (member, org_id, role) in &state.memberships {
            if *member != user_id {
                continue;
            }
            let organization = match state.organizations.get(org_id) {
                Some(org) => to_row(org)?,
                None => Value::Null,
            };
            rows.push(json!({
                "organization_id": org_id,
                "role": role.as_str(),
                "organizations": organization,
            }));
        }
        if let Some(raw) = state.raw_membership_rows.get(&user_id) {
            rows.extend(raw.iter().cloned());
        }
        Ok(rows)
    }

    async fn fetch_active_relationships(&self, provider_id: Uuid) -> TenancyResult<Vec<Value>> {
        self.check_available()?;
        let delay = self
            .state
            .read()
            .await
            .relationship_delays
            .get(&provider_id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        state
            .relationships
            .iter()
            .filter(|r| r.service_provider_id == provider_id && r.is_active)
            .map(to_row)
            .collect()
    }

    async fn fetch_organizations(&self, ids: &[Uuid]) -> TenancyResult<Vec<Value>> {
        self.check_available()?;
        let state = self.state.read().await;
        ids.iter()
            .filter_map(|id| state.organizations.get(id))
            .map(to_row)
            .collect()
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryBackend {
    async fn organization(&self, id: Uuid) -> TenancyResult<Organization> {
        self.check_available()?;
        self.state
            .read()
            .await
            .organizations
            .get(&id)
            .cloned()
            .ok_or(TenancyError::OrganizationNotFound(id))
    }

    async fn insert_organization(&self, organization: Organization) -> TenancyResult<Organization> {
        self.check_available()?;
        self.add_organization(organization.clone()).await;
        Ok(organization)
    }

    async fn insert_membership(&self, membership: Membership) -> TenancyResult<Membership> {
        self.check_available()?;
        self.add_membership(
            membership.user_id,
            membership.organization.clone(),
            membership.role,
        )
        .await;
        Ok(membership)
    }

    async fn delete_organization(&self, id: Uuid) -> TenancyResult<()> {
        self.check_available()?;
        self.state.write().await.organizations.remove(&id);
        Ok(())
    }

    async fn insert_relationship(&self, relationship: Relationship) -> TenancyResult<Relationship> {
        self.check_available()?;
        self.state
            .write()
            .await
            .relationships
            .push(relationship.clone());
        Ok(relationship)
    }

    async fn relationships_for_provider(&self, provider_id: Uuid) -> TenancyResult<Vec<Relationship>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .relationships
            .iter()
            .filter(|r| r.service_provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn set_relationship_active(&self, id: Uuid, active: bool) -> TenancyResult<Relationship> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let relationship = state
            .relationships
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(TenancyError::RelationshipNotFound(id))?;
        relationship.set_active(active);
        Ok(relationship.clone())
    }

    async fn delete_relationship(&self, id: Uuid) -> TenancyResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.relationships.len();
        state.relationships.retain(|r| r.id != id);
        if state.relationships.len() == before {
            return Err(TenancyError::RelationshipNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_rows_nest_organization() {
        let backend = MemoryBackend::new();
        let user = Uuid::now_v7();
        let org = Organization::client("Mining Co");
        backend.add_membership(user, org.clone(), OrganizationRole::Admin).await;

        let rows = backend.fetch_memberships(user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["role"], "admin");
        assert_eq!(rows[0]["organizations"]["name"], "Mining Co");

        assert!(backend.fetch_memberships(Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inactive_relationships_are_not_returned() {
        let backend = MemoryBackend::new();
        let provider = Organization::service_provider("Provider");
        let active = backend.add_client(provider.id, Organization::client("A")).await;
        let inactive = backend.add_client(provider.id, Organization::client("B")).await;
        backend.set_relationship_active(inactive.id, false).await.unwrap();

        let rows = backend.fetch_active_relationships(provider.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["client_id"], json!(active.client_id));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        let err = backend.fetch_memberships(Uuid::now_v7()).await.unwrap_err();
        assert!(err.is_retryable());

        backend.set_failing(false);
        assert!(backend.fetch_memberships(Uuid::now_v7()).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_unknown_relationship() {
        let backend = MemoryBackend::new();
        let err = backend.delete_relationship(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.error_code(), "RELATIONSHIP_NOT_FOUND");
    }
}
