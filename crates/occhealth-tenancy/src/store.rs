//! Tenant context store
//!
//! The single owner of "which organization, and which client, is the user
//! acting as". It reacts to session changes, loads memberships and client
//! relationships, restores the persisted selection, and publishes every
//! state change as a [`TenantSnapshot`] on a `watch` channel.
//!
//! ## State machine
//!
//! ```text
//! Uninitialized ──sign-in──→ Loading ──memberships > 0──→ Ready
//!                               │
//!                               └────memberships = 0──→ Empty
//! any ──sign-out──→ SignedOut ──sign-in──→ Loading
//! ```
//!
//! While `Ready`, switching organization or reloading clients sets
//! `pending` until the client list arrives. Every load is stamped with a
//! sequence number; a response whose stamp is no longer current is
//! discarded, so a slow reply for an organization the user already left
//! never overwrites newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use occhealth_org::{
    FeatureKey, Membership, Organization, OrganizationRole, PackageTier, TenantSelection,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::OrganizationBackend;
use crate::config::TenancyConfig;
use crate::error::{TenancyError, TenancyResult};
use crate::loader::{MembershipLoader, RelationshipLoader};
use crate::session::{SessionError, SessionEvent, SessionProvider, SessionUser};
use crate::storage::SelectionStorage;

/// Client selection value meaning "all clients".
pub const ALL_CLIENTS: &str = "all_clients";

/// Lifecycle state of the tenant context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantState {
    /// Nothing resolved yet
    #[default]
    Uninitialized,
    /// Memberships are being loaded
    Loading,
    /// An organization is selected
    Ready,
    /// The user has no organizations, or they could not be loaded
    Empty,
    /// No authenticated user
    SignedOut,
}

/// A failed load, as shown to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    /// Stable error code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Whether a retry may succeed
    pub retryable: bool,
}

impl From<&TenancyError> for LoadError {
    fn from(err: &TenancyError) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Immutable view of the tenant context at one point in time.
#[derive(Debug, Clone, Default)]
pub struct TenantSnapshot {
    /// Lifecycle state
    pub state: TenantState,

    /// Signed-in user, if any
    pub user: Option<SessionUser>,

    /// Selected organization and client
    pub selection: TenantSelection,

    /// The user's memberships, in backend order
    pub memberships: Vec<Membership>,

    /// Active clients of the current organization (service providers only)
    pub client_organizations: Vec<Organization>,

    /// A switch or reload is in flight
    pub pending: bool,

    /// The most recent load failure, cleared by the next successful load
    pub last_error: Option<LoadError>,
}

impl TenantSnapshot {
    fn signed_out() -> Self {
        Self {
            state: TenantState::SignedOut,
            ..Self::default()
        }
    }

    /// Currently selected organization.
    pub fn current_organization(&self) -> Option<&Organization> {
        self.selection.current_organization()
    }

    /// Currently selected client, `None` meaning "all clients".
    pub fn current_client(&self) -> Option<&Organization> {
        self.selection.current_client()
    }

    /// Organizations the user can switch to.
    pub fn user_organizations(&self) -> impl Iterator<Item = &Organization> {
        self.memberships.iter().map(|m| &m.organization)
    }

    /// The tenant ID every scoped query must use. `None` unless ready.
    pub fn effective_organization_id(&self) -> Option<Uuid> {
        if self.state != TenantState::Ready {
            return None;
        }
        self.selection.effective_organization_id()
    }

    /// Check if the current organization is a service provider.
    pub fn is_service_provider(&self) -> bool {
        self.selection.is_service_provider()
    }

    /// Check if anything is still loading.
    pub fn loading(&self) -> bool {
        self.state == TenantState::Loading || self.pending
    }

    /// The user's role in the current organization.
    pub fn current_role(&self) -> Option<OrganizationRole> {
        let current = self.current_organization()?;
        self.memberships
            .iter()
            .find(|m| m.organization.id == current.id)
            .map(|m| m.role)
    }

    /// Package tier of the current organization, basic when none.
    pub fn package_tier(&self) -> PackageTier {
        self.current_organization()
            .map(|org| org.subscription().package_tier)
            .unwrap_or_default()
    }

    /// Check if the current organization's package includes `feature`.
    pub fn has_feature(&self, feature: FeatureKey) -> bool {
        self.package_tier().has_feature(feature)
    }
}

/// Parse a client selection value.
///
/// An empty string and [`ALL_CLIENTS`] both mean "all clients".
///
/// # Errors
///
/// [`TenancyError::InvalidInput`] when the value is neither of those nor a
/// UUID.
pub fn parse_client_selection(raw: &str) -> TenancyResult<Option<Uuid>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == ALL_CLIENTS {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| TenancyError::InvalidInput(format!("invalid client id: {raw:?}")))
}

/// The tenant context store.
pub struct TenantContextStore {
    session: Arc<dyn SessionProvider>,
    memberships: MembershipLoader,
    relationships: RelationshipLoader,
    storage: Arc<dyn SelectionStorage>,
    config: TenancyConfig,
    state: watch::Sender<TenantSnapshot>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for TenantContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.state.borrow();
        f.debug_struct("TenantContextStore")
            .field("state", &snapshot.state)
            .field("effective_organization_id", &snapshot.effective_organization_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TenantContextStore {
    /// Create an uninitialized store.
    pub fn new(
        session: Arc<dyn SessionProvider>,
        backend: Arc<dyn OrganizationBackend>,
        storage: Arc<dyn SelectionStorage>,
        config: TenancyConfig,
    ) -> Self {
        let timeout = config.load_timeout();
        let (state, _) = watch::channel(TenantSnapshot::default());
        Self {
            session,
            memberships: MembershipLoader::new(backend.clone(), timeout),
            relationships: RelationshipLoader::new(backend, timeout),
            storage,
            config,
            state,
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a store with the storage `config` describes.
    ///
    /// # Errors
    ///
    /// [`TenancyError::Config`] when the configuration is invalid.
    pub fn from_config(
        session: Arc<dyn SessionProvider>,
        backend: Arc<dyn OrganizationBackend>,
        config: TenancyConfig,
    ) -> TenancyResult<Self> {
        config.validate()?;
        let storage = config.open_storage();
        Ok(Self::new(session, backend, storage, config))
    }

    /// The active configuration.
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Resolve the context for the current session.
    pub async fn initialize(&self) {
        self.resolve().await;
    }

    /// Retry resolution, e.g. after a failed load.
    ///
    /// A ready context stays ready (and keeps its selection) while the
    /// reload is in flight and if it fails.
    pub async fn reload(&self) {
        self.resolve().await;
    }

    async fn resolve(&self) {
        let seq = self.next_sequence();
        self.resolve_as(seq).await;
    }

    async fn resolve_as(&self, seq: u64) {
        let user = self.session.current_user().await;
        if !self.is_current(seq) {
            return;
        }
        let Some(user) = user else {
            self.state.send_replace(TenantSnapshot::signed_out());
            return;
        };

        self.state.send_modify(|s| {
            if s.state == TenantState::Ready && s.user.as_ref() == Some(&user) {
                s.pending = true;
            } else {
                *s = TenantSnapshot {
                    state: TenantState::Loading,
                    user: Some(user.clone()),
                    ..TenantSnapshot::default()
                };
            }
        });

        let result = self.memberships.load(user.id).await;
        if !self.is_current(seq) {
            debug!(user_id = %user.id, "Discarding superseded membership load");
            return;
        }

        let memberships = match result {
            Ok(memberships) => memberships,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Failed to load organization data");
                let load_error = LoadError::from(&e);
                self.state.send_modify(|s| {
                    s.pending = false;
                    s.last_error = Some(load_error);
                    if s.state != TenantState::Ready {
                        s.state = TenantState::Empty;
                    }
                });
                return;
            }
        };

        let Some(organization) = self.pick_organization(&memberships) else {
            info!(user_id = %user.id, "User has no organizations");
            self.state.send_replace(TenantSnapshot {
                state: TenantState::Empty,
                user: Some(user),
                ..TenantSnapshot::default()
            });
            return;
        };
        self.persist(&self.config.organization_key, Some(organization.id));

        let (clients, client, last_error) = if organization.is_service_provider() {
            let load = self.relationships.load(organization.id).await;
            if !self.is_current(seq) {
                debug!(organization_id = %organization.id, "Discarding superseded client load");
                return;
            }
            match load.error {
                Some(e) => {
                    let (clients, client) = self.current_clients_of(&user, organization.id);
                    (clients, client, Some(LoadError::from(&e)))
                }
                None => {
                    let client = self.restore_client(&load.clients);
                    (load.clients, client, None)
                }
            }
        } else {
            self.persist(&self.config.client_key, None);
            (Vec::new(), None, None)
        };

        debug!(
            user_id = %user.id,
            organization_id = %organization.id,
            client_id = ?client.as_ref().map(|c| c.id),
            "Tenant context ready"
        );
        self.state.send_modify(|s| {
            let mut selection = TenantSelection::default();
            selection.select_organization(organization);
            selection.select_client(client);

            s.state = TenantState::Ready;
            s.user = Some(user);
            s.selection = selection;
            s.memberships = memberships;
            s.client_organizations = clients;
            s.pending = false;
            s.last_error = last_error;
        });
    }

    /// The persisted organization when it is still a membership, otherwise
    /// the first membership.
    fn pick_organization(&self, memberships: &[Membership]) -> Option<Organization> {
        let persisted = self
            .storage
            .get(&self.config.organization_key)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

        if let Some(id) = persisted {
            if let Some(m) = memberships.iter().find(|m| m.organization.id == id) {
                return Some(m.organization.clone());
            }
            debug!(organization_id = %id, "Persisted organization is no longer available");
        }
        memberships.first().map(|m| m.organization.clone())
    }

    /// Client list and client already shown for `user` in `organization_id`.
    ///
    /// Used when a client reload fails: the last good selection stays, and
    /// the persisted client is left for the next successful load to check.
    fn current_clients_of(
        &self,
        user: &SessionUser,
        organization_id: Uuid,
    ) -> (Vec<Organization>, Option<Organization>) {
        let snapshot = self.state.borrow();
        let same_context = snapshot.state == TenantState::Ready
            && snapshot.user.as_ref() == Some(user)
            && snapshot.current_organization().map(|o| o.id) == Some(organization_id);
        if !same_context {
            return (Vec::new(), None);
        }
        (
            snapshot.client_organizations.clone(),
            snapshot.current_client().cloned(),
        )
    }

    /// The persisted client when it is still active. A stale value is
    /// removed from storage. Only call with a successfully loaded list.
    fn restore_client(&self, clients: &[Organization]) -> Option<Organization> {
        let raw = self.storage.get(&self.config.client_key)?;
        let restored = parse_client_selection(&raw)
            .ok()
            .flatten()
            .and_then(|id| clients.iter().find(|c| c.id == id).cloned());

        if restored.is_none() && raw.trim() != ALL_CLIENTS {
            debug!(client_id = %raw, "Discarding stale client selection");
            self.persist(&self.config.client_key, None);
        }
        restored
    }

    /// Switch to another of the user's organizations.
    ///
    /// The client selection is cleared before the new client list is
    /// requested, so no observer ever sees the new organization paired
    /// with a client of the old one.
    ///
    /// # Returns
    ///
    /// `false` (and no change) when the store is not ready or the user is
    /// not a member of `organization_id`.
    pub async fn switch_organization(&self, organization_id: Uuid) -> bool {
        let organization = {
            let snapshot = self.state.borrow();
            if snapshot.state != TenantState::Ready {
                warn!(organization_id = %organization_id, state = ?snapshot.state, "Ignoring organization switch before context is ready");
                return false;
            }
            snapshot
                .memberships
                .iter()
                .find(|m| m.organization.id == organization_id)
                .map(|m| m.organization.clone())
        };
        let Some(organization) = organization else {
            warn!(organization_id = %organization_id, "Ignoring switch to organization the user is not a member of");
            return false;
        };

        let seq = self.next_sequence();
        let is_provider = organization.is_service_provider();
        self.state.send_modify(|s| {
            s.selection.select_organization(organization);
            s.client_organizations.clear();
            s.pending = is_provider;
        });
        self.persist(&self.config.organization_key, Some(organization_id));
        self.persist(&self.config.client_key, None);
        info!(organization_id = %organization_id, "Switched organization");

        if is_provider {
            let load = self.relationships.load(organization_id).await;
            if !self.is_current(seq) {
                debug!(organization_id = %organization_id, "Discarding client list for superseded switch");
                return true;
            }
            self.state.send_modify(|s| {
                s.client_organizations = load.clients;
                s.pending = false;
                s.last_error = load.error.as_ref().map(LoadError::from);
            });
        }
        true
    }

    /// Select a client of the current service provider, or `None` for all
    /// clients.
    ///
    /// # Returns
    ///
    /// `false` (and no change) when the store is not ready, the current
    /// organization is not a service provider, or `client_id` is not one
    /// of its active clients.
    pub fn switch_client(&self, client_id: Option<Uuid>) -> bool {
        let client = {
            let snapshot = self.state.borrow();
            if snapshot.state != TenantState::Ready {
                warn!(client_id = ?client_id, "Ignoring client switch before context is ready");
                return false;
            }
            match client_id {
                None => None,
                Some(id) if !snapshot.is_service_provider() => {
                    warn!(client_id = %id, "Ignoring client switch for non-provider organization");
                    return false;
                }
                Some(id) => match snapshot.client_organizations.iter().find(|c| c.id == id) {
                    Some(client) => Some(client.clone()),
                    None => {
                        warn!(client_id = %id, "Ignoring switch to unknown client");
                        return false;
                    }
                },
            }
        };
        self.apply_client(client)
    }

    fn apply_client(&self, client: Option<Organization>) -> bool {
        let client_id = client.as_ref().map(|c| c.id);
        let mut applied = false;
        self.state.send_if_modified(|s| {
            applied = s.selection.select_client(client);
            applied
        });
        if applied {
            self.persist(&self.config.client_key, client_id);
            debug!(client_id = ?client_id, "Switched client");
        }
        applied
    }

    /// Refresh the current provider's client list.
    ///
    /// The selected client is kept when it is still active and cleared
    /// otherwise. A failed load changes nothing but `last_error`.
    ///
    /// # Returns
    ///
    /// `false` when there is no service provider to refresh.
    pub async fn reload_clients(&self) -> bool {
        let provider_id = {
            let snapshot = self.state.borrow();
            match snapshot.current_organization() {
                Some(org) if snapshot.state == TenantState::Ready && org.is_service_provider() => org.id,
                _ => return false,
            }
        };

        let seq = self.next_sequence();
        self.state.send_modify(|s| s.pending = true);

        let load = self.relationships.load(provider_id).await;
        if !self.is_current(seq) {
            debug!(organization_id = %provider_id, "Discarding superseded client reload");
            return true;
        }

        if let Some(e) = load.error {
            let load_error = LoadError::from(&e);
            self.state.send_modify(|s| {
                s.pending = false;
                s.last_error = Some(load_error);
            });
            return true;
        }

        let mut client_dropped = false;
        self.state.send_modify(|s| {
            let kept = s
                .current_client()
                .and_then(|current| load.clients.iter().find(|c| c.id == current.id))
                .cloned();
            client_dropped = s.current_client().is_some() && kept.is_none();
            s.selection.select_client(kept);
            s.client_organizations = load.clients;
            s.pending = false;
            s.last_error = None;
        });
        if client_dropped {
            info!(organization_id = %provider_id, "Selected client is no longer active");
            self.persist(&self.config.client_key, None);
        }
        true
    }

    /// Clear the in-memory context.
    ///
    /// Persisted selections are kept; they are revalidated against the
    /// memberships of whoever signs in next.
    pub fn sign_out(&self) {
        self.next_sequence();
        self.state.send_replace(TenantSnapshot::signed_out());
        debug!("Tenant context cleared");
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> TenantSnapshot {
        self.state.borrow().clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<TenantSnapshot> {
        self.state.subscribe()
    }

    /// Lifecycle state.
    pub fn state(&self) -> TenantState {
        self.state.borrow().state
    }

    /// The tenant ID every scoped query must use.
    pub fn effective_organization_id(&self) -> Option<Uuid> {
        self.state.borrow().effective_organization_id()
    }

    /// Currently selected organization.
    pub fn current_organization(&self) -> Option<Organization> {
        self.state.borrow().current_organization().cloned()
    }

    /// Currently selected client.
    pub fn current_client(&self) -> Option<Organization> {
        self.state.borrow().current_client().cloned()
    }

    /// Organizations the user can switch to.
    pub fn user_organizations(&self) -> Vec<Organization> {
        self.state.borrow().user_organizations().cloned().collect()
    }

    /// Active clients of the current service provider.
    pub fn client_organizations(&self) -> Vec<Organization> {
        self.state.borrow().client_organizations.clone()
    }

    /// Check if the current organization is a service provider.
    pub fn is_service_provider(&self) -> bool {
        self.state.borrow().is_service_provider()
    }

    /// Check if anything is still loading.
    pub fn loading(&self) -> bool {
        self.state.borrow().loading()
    }

    /// The most recent load failure.
    pub fn last_error(&self) -> Option<LoadError> {
        self.state.borrow().last_error.clone()
    }

    /// Drive the store from session events until the session provider
    /// goes away.
    ///
    /// Subscribes before the initial resolution so no event is missed.
    /// Resolutions run as their own tasks so the next event, a sign-out in
    /// particular, is applied at once; a resolution overtaken by a later
    /// event is discarded by its sequence stamp.
    pub async fn run(self: Arc<Self>) {
        let mut events = self.session.subscribe();
        self.spawn_resolve();

        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn(user)) => {
                    debug!(user_id = %user.id, "Session signed in");
                    self.spawn_resolve();
                }
                Ok(SessionEvent::TokenRefreshed(user)) => {
                    if self.needs_resolve_for(&user) {
                        self.spawn_resolve();
                    }
                }
                Ok(SessionEvent::SignedOut) => self.sign_out(),
                Err(SessionError::Lagged(skipped)) => {
                    warn!(skipped, "Missed session events, resynchronizing");
                    self.spawn_resolve();
                }
                Err(SessionError::ChannelClosed) => {
                    debug!("Session provider closed");
                    break;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    fn spawn_resolve(self: &Arc<Self>) {
        // Stamped here, not in the task, so a later event always supersedes it.
        let seq = self.next_sequence();
        let store = Arc::clone(self);
        tokio::spawn(async move { store.resolve_as(seq).await });
    }

    fn needs_resolve_for(&self, user: &SessionUser) -> bool {
        let snapshot = self.state.borrow();
        snapshot.state != TenantState::Ready || snapshot.user.as_ref() != Some(user)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, seq: u64) -> bool {
        self.sequence.load(Ordering::SeqCst) == seq
    }

    /// Write or clear a persisted selection.
    ///
    /// A failure is logged and otherwise ignored: the in-memory context is
    /// authoritative and storage only seeds the next start.
    fn persist(&self, key: &str, id: Option<Uuid>) {
        let result = match id {
            Some(id) => self.storage.set(key, &id.to_string()),
            None => self.storage.remove(key),
        };
        if let Err(e) = result.map_err(TenancyError::from) {
            warn!(key, code = e.error_code(), error = %e, "Failed to persist tenant selection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::session::MemorySessionProvider;
    use crate::storage::MemoryStorage;
    use tracing_test::traced_test;

    struct Fixture {
        backend: Arc<MemoryBackend>,
        storage: Arc<MemoryStorage>,
        store: TenantContextStore,
        user: SessionUser,
    }

    fn fixture() -> Fixture {
        let user = SessionUser::new(Uuid::now_v7());
        let backend = Arc::new(MemoryBackend::new());
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemorySessionProvider::signed_in(user.clone()));
        let store = TenantContextStore::new(
            session,
            backend.clone(),
            storage.clone(),
            TenancyConfig::default(),
        );
        Fixture {
            backend,
            storage,
            store,
            user,
        }
    }

    #[test]
    fn test_parse_client_selection() {
        let id = Uuid::now_v7();
        assert_eq!(parse_client_selection(&id.to_string()).unwrap(), Some(id));
        assert_eq!(parse_client_selection(ALL_CLIENTS).unwrap(), None);
        assert_eq!(parse_client_selection("").unwrap(), None);
        assert!(parse_client_selection("client-7").is_err());
    }

    #[test]
    fn test_snapshot_hides_id_unless_ready() {
        let org = Organization::client("C");
        let mut snapshot = TenantSnapshot::default();
        snapshot.selection.select_organization(org.clone());
        assert_eq!(snapshot.effective_organization_id(), None);

        snapshot.state = TenantState::Ready;
        assert_eq!(snapshot.effective_organization_id(), Some(org.id));
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let f = fixture();
        assert_eq!(f.store.state(), TenantState::Uninitialized);
        assert_eq!(f.store.effective_organization_id(), None);
        assert!(!f.store.loading());
    }

    #[tokio::test]
    async fn test_first_membership_is_default() {
        let f = fixture();
        let first = Organization::client("First");
        f.backend.add_membership(f.user.id, first.clone(), OrganizationRole::Staff).await;
        f.backend
            .add_membership(f.user.id, Organization::client("Second"), OrganizationRole::Admin)
            .await;

        f.store.initialize().await;

        assert_eq!(f.store.state(), TenantState::Ready);
        assert_eq!(f.store.effective_organization_id(), Some(first.id));
        assert_eq!(f.store.snapshot().current_role(), Some(OrganizationRole::Staff));
        assert_eq!(
            f.storage.get("currentOrganizationId"),
            Some(first.id.to_string())
        );
    }

    #[tokio::test]
    async fn test_signed_out_session() {
        let backend = Arc::new(MemoryBackend::new());
        let store = TenantContextStore::new(
            Arc::new(MemorySessionProvider::new()),
            backend,
            Arc::new(MemoryStorage::new()),
            TenancyConfig::default(),
        );

        store.initialize().await;
        assert_eq!(store.state(), TenantState::SignedOut);
        assert_eq!(store.effective_organization_id(), None);
    }

    #[tokio::test]
    async fn test_failed_first_load_is_empty_with_error() {
        let f = fixture();
        f.backend.set_failing(true);

        f.store.initialize().await;

        assert_eq!(f.store.state(), TenantState::Empty);
        let err = f.store.last_error().unwrap();
        assert_eq!(err.code, "BACKEND_ERROR");
        assert!(err.retryable);

        f.backend.set_failing(false);
        f.backend
            .add_membership(f.user.id, Organization::client("C"), OrganizationRole::Staff)
            .await;
        f.store.reload().await;
        assert_eq!(f.store.state(), TenantState::Ready);
        assert!(f.store.last_error().is_none());
    }

    #[tokio::test]
    async fn test_all_clients_persisted_value() {
        let f = fixture();
        let provider = Organization::service_provider("Provider");
        f.backend.add_membership(f.user.id, provider.clone(), OrganizationRole::Admin).await;
        f.backend.add_client(provider.id, Organization::client("C")).await;
        f.storage.set("currentClientId", ALL_CLIENTS).unwrap();

        f.store.initialize().await;

        assert!(f.store.current_client().is_none());
        assert_eq!(f.store.effective_organization_id(), Some(provider.id));
        assert_eq!(f.storage.get("currentClientId").as_deref(), Some(ALL_CLIENTS));
    }

    #[tokio::test]
    async fn test_switch_client_persists() {
        let f = fixture();
        let provider = Organization::service_provider("Provider");
        let client = Organization::client("Client");
        f.backend.add_membership(f.user.id, provider.clone(), OrganizationRole::Admin).await;
        f.backend.add_client(provider.id, client.clone()).await;
        f.store.initialize().await;

        assert!(f.store.switch_client(Some(client.id)));
        assert_eq!(f.store.effective_organization_id(), Some(client.id));
        assert_eq!(f.storage.get("currentClientId"), Some(client.id.to_string()));

        assert!(f.store.switch_client(None));
        assert_eq!(f.store.effective_organization_id(), Some(provider.id));
        assert!(f.storage.get("currentClientId").is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_client_switch_misuse_is_logged_noop() {
        let f = fixture();
        let standalone = Organization::client("Standalone");
        f.backend.add_membership(f.user.id, standalone.clone(), OrganizationRole::Admin).await;
        f.store.initialize().await;

        assert!(!f.store.switch_client(Some(Uuid::now_v7())));
        assert_eq!(f.store.effective_organization_id(), Some(standalone.id));
        assert!(logs_contain("Ignoring client switch for non-provider organization"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_switch_before_ready_is_ignored() {
        let f = fixture();
        assert!(!f.store.switch_organization(Uuid::now_v7()).await);
        assert!(!f.store.switch_client(None));
        assert_eq!(f.store.state(), TenantState::Uninitialized);
        assert!(logs_contain("before context is ready"));
    }

    #[tokio::test]
    async fn test_reload_clients_keeps_active_selection() {
        let f = fixture();
        let provider = Organization::service_provider("Provider");
        let kept = Organization::client("Kept");
        let dropped = Organization::client("Dropped");
        f.backend.add_membership(f.user.id, provider.clone(), OrganizationRole::Admin).await;
        f.backend.add_client(provider.id, kept.clone()).await;
        let rel = f.backend.add_client(provider.id, dropped.clone()).await;
        f.store.initialize().await;

        assert!(f.store.switch_client(Some(dropped.id)));
        crate::admin::OrganizationDirectory::set_relationship_active(&*f.backend, rel.id, false)
            .await
            .unwrap();

        assert!(f.store.reload_clients().await);
        assert!(f.store.current_client().is_none());
        assert_eq!(f.store.client_organizations(), vec![kept.clone()]);
        assert!(f.storage.get("currentClientId").is_none());

        assert!(f.store.switch_client(Some(kept.id)));
        assert!(f.store.reload_clients().await);
        assert_eq!(f.store.current_client().map(|c| c.id), Some(kept.id));
    }

    #[tokio::test]
    async fn test_relationship_failure_keeps_selected_client() {
        let f = fixture();
        let provider = Organization::service_provider("Provider");
        let client = Organization::client("C");
        f.backend.add_membership(f.user.id, provider.clone(), OrganizationRole::Admin).await;
        f.backend.add_client(provider.id, client.clone()).await;
        f.store.initialize().await;
        assert!(f.store.switch_client(Some(client.id)));

        f.backend.set_failing(true);
        assert!(f.store.reload_clients().await);

        assert_eq!(f.store.state(), TenantState::Ready);
        assert_eq!(f.store.client_organizations(), vec![client.clone()]);
        assert_eq!(f.store.effective_organization_id(), Some(client.id));
        assert_eq!(f.store.last_error().map(|e| e.code), Some("BACKEND_ERROR"));
        assert_eq!(f.storage.get("currentClientId"), Some(client.id.to_string()));

        f.backend.set_failing(false);
        assert!(f.store.reload_clients().await);
        assert!(f.store.last_error().is_none());
        assert_eq!(f.store.effective_organization_id(), Some(client.id));
    }

    /// Storage that rejects every write.
    struct ReadOnlyStorage;

    impl SelectionStorage for ReadOnlyStorage {
        fn get(&self, _: &str) -> Option<String> {
            None
        }

        fn set(&self, _: &str, _: &str) -> Result<(), crate::storage::StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _: &str) -> Result<(), crate::storage::StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_storage_failure_does_not_block_switching() {
        let user = SessionUser::new(Uuid::now_v7());
        let backend = Arc::new(MemoryBackend::new());
        let first = Organization::client("First");
        let second = Organization::client("Second");
        backend.add_membership(user.id, first.clone(), OrganizationRole::Staff).await;
        backend.add_membership(user.id, second.clone(), OrganizationRole::Staff).await;
        let store = TenantContextStore::new(
            Arc::new(MemorySessionProvider::signed_in(user)),
            backend,
            Arc::new(ReadOnlyStorage),
            TenancyConfig::default(),
        );

        store.initialize().await;
        assert!(store.switch_organization(second.id).await);

        assert_eq!(store.effective_organization_id(), Some(second.id));
        assert!(logs_contain("STORAGE_ERROR"));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let f = fixture();
        let org = Organization::client("C");
        f.backend.add_membership(f.user.id, org.clone(), OrganizationRole::Viewer).await;
        let mut rx = f.store.subscribe();

        f.store.initialize().await;

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.effective_organization_id(), Some(org.id));
    }

    #[tokio::test]
    async fn test_package_tier_follows_current_organization() {
        let f = fixture();
        let premium = Organization::client("Premium Co")
            .with_settings(serde_json::json!({ "subscription": { "package_tier": "premium" } }));
        f.backend.add_membership(f.user.id, premium, OrganizationRole::Staff).await;

        assert_eq!(f.store.snapshot().package_tier(), PackageTier::Basic);
        f.store.initialize().await;

        let snapshot = f.store.snapshot();
        assert_eq!(snapshot.package_tier(), PackageTier::Premium);
        let premium_only = PackageTier::Premium
            .features()
            .iter()
            .copied()
            .find(|feature| !PackageTier::Basic.has_feature(*feature))
            .unwrap();
        assert!(snapshot.has_feature(premium_only));
    }
}
