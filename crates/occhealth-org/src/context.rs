//! Tenant selection for organization and client switching
//!
//! This module provides [`TenantSelection`], the pure state behind the
//! tenant context: which organization the user is acting as and, for a
//! service provider, which client (if any) is in focus. Every data query is
//! scoped to the selection's effective organization ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::organization::Organization;

/// The active organization/client pair.
///
/// # Invariants
///
/// - The client is cleared whenever the organization changes.
/// - A client can only be selected while the organization is a service
///   provider.
///
/// # Examples
///
/// ```
/// use occhealth_org::{Organization, TenantSelection};
///
/// let provider = Organization::service_provider("Acme OH");
/// let client = Organization::client("Mining Co");
///
/// let mut selection = TenantSelection::default();
/// selection.select_organization(provider.clone());
/// assert_eq!(selection.effective_organization_id(), Some(provider.id));
///
/// assert!(selection.select_client(Some(client.clone())));
/// assert_eq!(selection.effective_organization_id(), Some(client.id));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TenantSelection {
    current_organization: Option<Organization>,
    current_client: Option<Organization>,

    /// Last change timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl TenantSelection {
    /// Currently selected organization.
    pub fn current_organization(&self) -> Option<&Organization> {
        self.current_organization.as_ref()
    }

    /// Currently selected client, `None` meaning "all clients".
    pub fn current_client(&self) -> Option<&Organization> {
        self.current_client.as_ref()
    }

    /// Switch to a different organization.
    ///
    /// The client selection is always cleared, even when switching to the
    /// organization that is already selected.
    pub fn select_organization(&mut self, organization: Organization) {
        self.current_organization = Some(organization);
        self.current_client = None;
        self.updated_at = Some(Utc::now());
    }

    /// Select a client, or `None` for all clients.
    ///
    /// # Returns
    ///
    /// `false` (and no change) when a client is given but the current
    /// organization is not a service provider.
    pub fn select_client(&mut self, client: Option<Organization>) -> bool {
        if client.is_some() && !self.is_service_provider() {
            return false;
        }
        self.current_client = client;
        self.updated_at = Some(Utc::now());
        true
    }

    /// Clear organization and client.
    pub fn clear(&mut self) {
        self.current_organization = None;
        self.current_client = None;
        self.updated_at = Some(Utc::now());
    }

    /// Check if the current organization is a service provider.
    pub fn is_service_provider(&self) -> bool {
        self.current_organization
            .as_ref()
            .is_some_and(Organization::is_service_provider)
    }

    /// The tenant ID all scoped queries should use.
    ///
    /// The selected client's ID when the organization is a service provider
    /// and a client is selected, otherwise the organization's ID.
    pub fn effective_organization_id(&self) -> Option<Uuid> {
        match (&self.current_organization, &self.current_client) {
            (Some(org), Some(client)) if org.is_service_provider() => Some(client.id),
            (Some(org), _) => Some(org.id),
            (None, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection() {
        let selection = TenantSelection::default();

        assert!(selection.current_organization().is_none());
        assert!(selection.current_client().is_none());
        assert!(!selection.is_service_provider());
        assert_eq!(selection.effective_organization_id(), None);
    }

    #[test]
    fn test_switching_organization_clears_client() {
        let provider = Organization::service_provider("Provider");
        let other = Organization::service_provider("Other Provider");
        let client = Organization::client("Client");

        let mut selection = TenantSelection::default();
        selection.select_organization(provider.clone());
        assert!(selection.select_client(Some(client)));

        selection.select_organization(other.clone());
        assert!(selection.current_client().is_none());
        assert_eq!(selection.effective_organization_id(), Some(other.id));

        // Re-selecting the same organization also clears the client.
        assert!(selection.select_client(Some(Organization::client("C2"))));
        selection.select_organization(other);
        assert!(selection.current_client().is_none());
    }

    #[test]
    fn test_client_requires_service_provider() {
        let mut selection = TenantSelection::default();
        assert!(!selection.select_client(Some(Organization::client("Orphan"))));

        let standalone = Organization::client("Standalone");
        selection.select_organization(standalone.clone());
        assert!(!selection.select_client(Some(Organization::client("Nested"))));
        assert!(selection.select_client(None));
        assert_eq!(selection.effective_organization_id(), Some(standalone.id));
    }

    #[test]
    fn test_all_clients_uses_provider_id() {
        let provider = Organization::service_provider("Provider");
        let mut selection = TenantSelection::default();
        selection.select_organization(provider.clone());
        assert!(selection.select_client(Some(Organization::client("C"))));
        assert!(selection.select_client(None));

        assert_eq!(selection.effective_organization_id(), Some(provider.id));
    }

    #[test]
    fn test_clear() {
        let mut selection = TenantSelection::default();
        selection.select_organization(Organization::client("C"));
        selection.clear();

        assert_eq!(selection.effective_organization_id(), None);
        assert!(selection.updated_at.is_some());
    }
}
