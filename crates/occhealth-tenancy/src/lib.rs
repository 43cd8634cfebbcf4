//! # Occupational Health Tenancy
//!
//! This crate resolves the tenant context for the occupational-health
//! platform: which organization a signed-in user is acting as and, for a
//! service provider, which client organization is in focus.
//!
//! ## Overview
//!
//! The occhealth-tenancy crate handles:
//! - **Loaders**: Membership and client-relationship loading from the backend
//! - **Store**: The tenant context state machine and its effective organization ID
//! - **Session**: The authenticated-identity source and its events
//! - **Storage**: Durable persistence of the last selection
//! - **Administration**: Organization onboarding and client relationships
//! - **Guard**: Route decisions based on the tenant context
//!
//! ## Flow
//!
//! ```text
//! SessionProvider ─→ MembershipLoader ─→ TenantContextStore ─→ effective_organization_id()
//!                                              │
//!                         (service provider) RelationshipLoader
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use occhealth_tenancy::{
//!     MemoryBackend, MemorySessionProvider, SessionUser, TenancyConfig, TenantContextStore,
//! };
//! use uuid::Uuid;
//!
//! async fn example() {
//!     let session = Arc::new(MemorySessionProvider::signed_in(SessionUser::new(Uuid::now_v7())));
//!     let backend = Arc::new(MemoryBackend::new());
//!     let store = Arc::new(
//!         TenantContextStore::from_config(session, backend, TenancyConfig::from_env().unwrap())
//!             .unwrap(),
//!     );
//!
//!     // Follow sign-in and sign-out for the lifetime of the app
//!     let _driver = store.spawn();
//!
//!     // Scope every query to the effective organization
//!     if let Some(tenant_id) = store.effective_organization_id() {
//!         println!("querying as {tenant_id}");
//!     }
//! }
//! ```

pub mod admin;
pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod loader;
pub mod session;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use admin::{CreatedClient, NewClient, OrganizationAdmin, OrganizationDirectory};
pub use backend::{MemoryBackend, OrganizationBackend};
pub use config::{ConfigError, TenancyConfig};
pub use error::{TenancyError, TenancyResult};
pub use guard::{guard, is_public_route, RouteDecision, PUBLIC_ROUTES};
pub use loader::{MembershipLoader, RelationshipLoad, RelationshipLoader};
pub use session::{
    MemorySessionProvider, SessionError, SessionEvent, SessionProvider, SessionSubscription,
    SessionUser,
};
pub use storage::{FileStorage, MemoryStorage, SelectionStorage, StorageError};
pub use store::{
    parse_client_selection, LoadError, TenantContextStore, TenantSnapshot, TenantState,
    ALL_CLIENTS,
};
