//! # Occupational Health Organization Models
//!
//! This crate provides the multi-tenant organization models for the
//! occupational-health platform.
//!
//! ## Overview
//!
//! The occhealth-org crate handles:
//! - **Organizations**: Tenant entities, either service providers or clients
//! - **Memberships**: User-organization links carrying a role
//! - **Relationships**: Provider-to-client links that can be deactivated
//! - **Roles**: Ordered membership roles
//! - **Tiers**: Subscription packages and feature gating
//! - **Context**: The organization/client selection and its effective ID
//!
//! ## Architecture
//!
//! ```text
//! User
//!   ├─ Membership ─→ Organization (service_provider)
//!   │                   └─ Relationship (is_active) ─→ Organization (client)
//!   ├─ Membership ─→ Organization (client)
//!   └─ TenantSelection (current org, current client)
//!         └─ effective_organization_id()
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use occhealth_org::{Organization, Relationship, TenantSelection};
//!
//! let provider = Organization::service_provider("Acme Occupational Health");
//! let client = Organization::client("Mining Co");
//! let _link = Relationship::new(provider.id, client.id);
//!
//! let mut selection = TenantSelection::default();
//! selection.select_organization(provider);
//! selection.select_client(Some(client.clone()));
//! assert_eq!(selection.effective_organization_id(), Some(client.id));
//! ```

pub mod context;
pub mod membership;
pub mod organization;
pub mod relationship;
pub mod roles;
pub mod tiers;

// Re-export main types for convenience
pub use context::TenantSelection;
pub use membership::Membership;
pub use organization::{Organization, OrganizationType, OrganizationUpdate};
pub use relationship::Relationship;
pub use roles::OrganizationRole;
pub use tiers::{
    feature_gate, with_upgraded_tier, ColorConfig, FeatureGate, FeatureKey, LanguageConfig,
    MetricConfig, PackageConfiguration, PackageTier, Subscription, SubscriptionStatus,
};
