//! Organization and client-relationship administration
//!
//! Write-side operations used by onboarding and the client management
//! screens. Persistence goes through [`OrganizationDirectory`]; the
//! [`OrganizationAdmin`] service validates requests before they reach it.
//!
//! After changing a provider's relationships, call
//! [`TenantContextStore::reload_clients`](crate::store::TenantContextStore::reload_clients)
//! so the active context picks up the new client list.

use std::sync::Arc;

use async_trait::async_trait;
use occhealth_org::{
    with_upgraded_tier, Membership, Organization, OrganizationRole, OrganizationType,
    OrganizationUpdate, PackageTier, Relationship,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{TenancyError, TenancyResult};

/// Write-side persistence for organizations, memberships and relationships.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Fetch one organization.
    async fn organization(&self, id: Uuid) -> TenancyResult<Organization>;

    /// Insert or replace an organization.
    async fn insert_organization(&self, organization: Organization) -> TenancyResult<Organization>;

    /// Record a membership.
    async fn insert_membership(&self, membership: Membership) -> TenancyResult<Membership>;

    /// Remove an organization. Unknown IDs are not an error.
    async fn delete_organization(&self, id: Uuid) -> TenancyResult<()>;

    /// Record a provider-client relationship.
    async fn insert_relationship(&self, relationship: Relationship) -> TenancyResult<Relationship>;

    /// All relationships of a provider, active or not.
    async fn relationships_for_provider(&self, provider_id: Uuid) -> TenancyResult<Vec<Relationship>>;

    /// Flip a relationship's active flag.
    async fn set_relationship_active(&self, id: Uuid, active: bool) -> TenancyResult<Relationship>;

    /// Remove a relationship permanently.
    async fn delete_relationship(&self, id: Uuid) -> TenancyResult<()>;
}

/// Details for a new client organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    /// Display name
    pub name: String,

    /// Contact email
    #[serde(default)]
    pub contact_email: Option<String>,

    /// Contact phone
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl NewClient {
    /// Client with a name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> TenancyResult<()> {
        if self.name.trim().is_empty() {
            return Err(TenancyError::InvalidInput("client name is required".to_string()));
        }
        if let Some(email) = &self.contact_email {
            if !email.contains('@') {
                return Err(TenancyError::InvalidInput(format!(
                    "invalid contact email: {email}"
                )));
            }
        }
        Ok(())
    }
}

/// A newly created client and the relationship that links it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedClient {
    /// The client organization
    pub organization: Organization,

    /// Its relationship to the provider
    pub relationship: Relationship,
}

/// Organization administration service.
#[derive(Clone)]
pub struct OrganizationAdmin {
    directory: Arc<dyn OrganizationDirectory>,
}

impl std::fmt::Debug for OrganizationAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationAdmin").finish_non_exhaustive()
    }
}

impl OrganizationAdmin {
    /// Create a service over `directory`.
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self { directory }
    }

    /// Create an organization and make `user_id` its admin.
    ///
    /// This is the onboarding path for a user with no memberships.
    ///
    /// # Errors
    ///
    /// [`TenancyError::InvalidInput`] for a blank name or nil user.
    pub async fn create_organization(
        &self,
        user_id: Uuid,
        name: &str,
        organization_type: OrganizationType,
    ) -> TenancyResult<Membership> {
        if user_id.is_nil() {
            return Err(TenancyError::InvalidInput("user id must not be nil".to_string()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(TenancyError::InvalidInput("organization name is required".to_string()));
        }

        let organization = self
            .directory
            .insert_organization(Organization::new(name, organization_type))
            .await?;
        let membership = self
            .directory
            .insert_membership(Membership::new(user_id, organization, OrganizationRole::Admin))
            .await?;

        info!(
            user_id = %user_id,
            organization_id = %membership.organization_id(),
            organization_type = organization_type.as_str(),
            "Organization created"
        );
        Ok(membership)
    }

    /// Apply an edit to an organization. The type cannot be changed.
    ///
    /// # Errors
    ///
    /// [`TenancyError::OrganizationNotFound`] for an unknown ID, and
    /// [`TenancyError::InvalidInput`] when the edit blanks the name.
    pub async fn update_organization(
        &self,
        id: Uuid,
        update: OrganizationUpdate,
    ) -> TenancyResult<Organization> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TenancyError::InvalidInput("organization name is required".to_string()));
        }
        let mut organization = self.directory.organization(id).await?;
        organization.apply_update(update);
        self.directory.insert_organization(organization).await
    }

    /// Move an organization's subscription to `tier`.
    ///
    /// # Errors
    ///
    /// [`TenancyError::OrganizationNotFound`] for an unknown ID.
    pub async fn upgrade_package(&self, id: Uuid, tier: PackageTier) -> TenancyResult<Organization> {
        let mut organization = self.directory.organization(id).await?;
        let previous = organization.subscription().package_tier;
        organization.settings = Some(with_upgraded_tier(organization.settings.as_ref(), tier));
        let organization = self.directory.insert_organization(organization).await?;

        info!(
            organization_id = %id,
            from = previous.as_str(),
            to = tier.as_str(),
            "Package changed"
        );
        Ok(organization)
    }

    /// Create a client organization under `provider_id`.
    ///
    /// The relationship starts active, dated today. If the relationship
    /// cannot be recorded the new organization is deleted again, so a
    /// failed call leaves no unlinked client behind unless that cleanup
    /// fails too (logged at `error`).
    ///
    /// # Errors
    ///
    /// - [`TenancyError::InvalidInput`] for a blank name or malformed email
    /// - [`TenancyError::OrganizationNotFound`] for an unknown provider
    /// - [`TenancyError::NotServiceProvider`] when `provider_id` is a client
    pub async fn create_client(
        &self,
        provider_id: Uuid,
        client: NewClient,
    ) -> TenancyResult<CreatedClient> {
        client.validate()?;
        self.require_provider(provider_id).await?;

        let mut organization = Organization::client(client.name.trim());
        organization.contact_email = client.contact_email;
        organization.contact_phone = client.contact_phone;

        let organization = self.directory.insert_organization(organization).await?;
        let relationship = match self
            .directory
            .insert_relationship(Relationship::new(provider_id, organization.id))
            .await
        {
            Ok(relationship) => relationship,
            Err(e) => {
                if let Err(cleanup) = self.directory.delete_organization(organization.id).await {
                    error!(
                        client_id = %organization.id,
                        error = %cleanup,
                        "Failed to remove unlinked client organization"
                    );
                }
                return Err(e);
            }
        };

        info!(
            provider_id = %provider_id,
            client_id = %organization.id,
            relationship_id = %relationship.id,
            "Client created"
        );
        Ok(CreatedClient {
            organization,
            relationship,
        })
    }

    /// Activate or deactivate a relationship.
    ///
    /// Deactivated clients disappear from the provider's client list but
    /// keep their data.
    ///
    /// # Errors
    ///
    /// [`TenancyError::RelationshipNotFound`] for an unknown ID.
    pub async fn set_relationship_active(&self, id: Uuid, active: bool) -> TenancyResult<Relationship> {
        let relationship = self.directory.set_relationship_active(id, active).await?;
        info!(relationship_id = %id, active, "Relationship status changed");
        Ok(relationship)
    }

    /// Delete a relationship permanently.
    ///
    /// Unlike deactivation this erases the link; the client organization
    /// itself is left in place.
    ///
    /// # Errors
    ///
    /// [`TenancyError::RelationshipNotFound`] for an unknown ID.
    pub async fn delete_relationship(&self, id: Uuid) -> TenancyResult<()> {
        self.directory.delete_relationship(id).await?;
        warn!(relationship_id = %id, "Relationship deleted");
        Ok(())
    }

    /// All relationships of a provider, newest first.
    ///
    /// # Errors
    ///
    /// [`TenancyError::NotServiceProvider`] when `provider_id` is a client.
    pub async fn relationships(&self, provider_id: Uuid) -> TenancyResult<Vec<Relationship>> {
        self.require_provider(provider_id).await?;
        let mut relationships = self.directory.relationships_for_provider(provider_id).await?;
        relationships.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(relationships)
    }

    async fn require_provider(&self, provider_id: Uuid) -> TenancyResult<Organization> {
        let provider = self.directory.organization(provider_id).await?;
        if !provider.is_service_provider() {
            return Err(TenancyError::NotServiceProvider(provider_id));
        }
        Ok(provider)
    }
}
