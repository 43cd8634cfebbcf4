//! Membership and relationship loaders
//!
//! Loaders are the trust boundary between backend rows and the tenant
//! context. Every row is parsed into a strict model here; a row that fails
//! to parse is dropped with a warning instead of travelling further.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use occhealth_org::{Membership, Organization, OrganizationRole};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::backend::OrganizationBackend;
use crate::error::{TenancyError, TenancyResult};

/// Run a backend call under the load timeout.
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = TenancyResult<T>>,
) -> TenancyResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| TenancyError::Timeout(timeout))?
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    organizations: Option<Value>,
}

fn parse_membership(user_id: Uuid, row: Value) -> Option<Membership> {
    let row: MembershipRow = match serde_json::from_value(row) {
        Ok(row) => row,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Skipping malformed membership row");
            return None;
        }
    };
    let Some(nested) = row.organizations.filter(|v| !v.is_null()) else {
        warn!(user_id = %user_id, "Skipping membership row without organization");
        return None;
    };
    let organization: Organization = match serde_json::from_value(nested) {
        Ok(org) => org,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Skipping membership with malformed organization");
            return None;
        }
    };

    let role = row
        .role
        .as_deref()
        .map(OrganizationRole::parse_or_least)
        .unwrap_or(OrganizationRole::Viewer);

    Some(Membership {
        user_id,
        organization,
        role,
        joined_at: None,
    })
}

#[derive(Debug, Deserialize)]
struct RelationshipRow {
    client_id: Uuid,
    #[serde(default)]
    service_provider_id: Option<Uuid>,
    // Absent when the backend already filtered on it; explicit null is inactive.
    #[serde(default = "filtered_by_backend")]
    is_active: Option<bool>,
}

fn filtered_by_backend() -> Option<bool> {
    Some(true)
}

impl RelationshipRow {
    fn is_active_for(&self, provider_id: Uuid) -> bool {
        self.is_active == Some(true)
            && self.service_provider_id.map_or(true, |id| id == provider_id)
    }
}

/// Resolves the organizations a user can act as.
#[derive(Clone)]
pub struct MembershipLoader {
    backend: Arc<dyn OrganizationBackend>,
    timeout: Duration,
}

impl std::fmt::Debug for MembershipLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipLoader")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MembershipLoader {
    /// Create a loader over `backend`.
    pub fn new(backend: Arc<dyn OrganizationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Load the user's memberships in backend order.
    ///
    /// An empty list is a valid result. Malformed rows are skipped, and a
    /// second membership for an organization already seen is ignored.
    ///
    /// # Errors
    ///
    /// - [`TenancyError::InvalidInput`] for the nil user ID
    /// - [`TenancyError::Backend`] / [`TenancyError::Timeout`] when the
    ///   query fails; both are retryable
    pub async fn load(&self, user_id: Uuid) -> TenancyResult<Vec<Membership>> {
        if user_id.is_nil() {
            return Err(TenancyError::InvalidInput("user id must not be nil".to_string()));
        }

        let rows = bounded(self.timeout, self.backend.fetch_memberships(user_id)).await?;
        let total = rows.len();

        let mut seen = HashSet::new();
        let memberships: Vec<Membership> = rows
            .into_iter()
            .filter_map(|row| parse_membership(user_id, row))
            .filter(|m| seen.insert(m.organization.id))
            .collect();

        debug!(
            user_id = %user_id,
            rows = total,
            memberships = memberships.len(),
            "Loaded memberships"
        );
        Ok(memberships)
    }
}

/// Result of a relationship load.
///
/// Failures are reported through `error` rather than returned, so a
/// provider with an unreachable client list still has a usable context.
#[derive(Debug, Default)]
pub struct RelationshipLoad {
    /// Active client organizations, in relationship order
    pub clients: Vec<Organization>,

    /// Set when the load failed; `clients` is then empty
    pub error: Option<TenancyError>,
}

impl RelationshipLoad {
    fn failed(error: TenancyError) -> Self {
        Self {
            clients: Vec::new(),
            error: Some(error),
        }
    }
}

/// Resolves a service provider's active clients.
#[derive(Clone)]
pub struct RelationshipLoader {
    backend: Arc<dyn OrganizationBackend>,
    timeout: Duration,
}

impl std::fmt::Debug for RelationshipLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipLoader")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RelationshipLoader {
    /// Create a loader over `backend`.
    pub fn new(backend: Arc<dyn OrganizationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Load the active clients of `provider_id`.
    ///
    /// The caller guarantees `provider_id` is a service provider. Inactive
    /// relationships are filtered out even if the backend returns them.
    pub async fn load(&self, provider_id: Uuid) -> RelationshipLoad {
        match self.try_load(provider_id).await {
            Ok(clients) => RelationshipLoad {
                clients,
                error: None,
            },
            Err(e) => {
                error!(provider_id = %provider_id, error = %e, "Failed to load client organizations");
                RelationshipLoad::failed(e)
            }
        }
    }

    async fn try_load(&self, provider_id: Uuid) -> TenancyResult<Vec<Organization>> {
        let rows = bounded(self.timeout, self.backend.fetch_active_relationships(provider_id)).await?;

        let mut seen = HashSet::new();
        let client_ids: Vec<Uuid> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<RelationshipRow>(row) {
                Ok(rel) => Some(rel),
                Err(e) => {
                    warn!(provider_id = %provider_id, error = %e, "Skipping malformed relationship row");
                    None
                }
            })
            .filter(|rel| rel.is_active_for(provider_id))
            .map(|rel| rel.client_id)
            .filter(|id| seen.insert(*id))
            .collect();

        if client_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = bounded(self.timeout, self.backend.fetch_organizations(&client_ids)).await?;
        let mut organizations: Vec<Organization> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Organization>(row) {
                Ok(org) => Some(org),
                Err(e) => {
                    warn!(provider_id = %provider_id, error = %e, "Skipping malformed client organization");
                    None
                }
            })
            .filter(|org| client_ids.contains(&org.id))
            .collect();

        organizations.sort_by_key(|org| client_ids.iter().position(|id| *id == org.id));
        organizations.dedup_by_key(|org| org.id);
        Ok(organizations)
    }
}
