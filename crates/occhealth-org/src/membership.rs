//! Membership domain models
//!
//! A membership links a user to an organization the user may act as, and
//! carries the user's role there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::organization::Organization;
use crate::roles::OrganizationRole;

/// A user's membership in an organization.
///
/// Memberships are created when a user accepts an invitation or creates an
/// organization. Only the role is mutable afterwards, and only by an admin.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use occhealth_org::{Membership, Organization, OrganizationRole};
///
/// let org = Organization::client("Mining Co");
/// let membership = Membership::new(Uuid::now_v7(), org.clone(), OrganizationRole::Clinician);
/// assert_eq!(membership.organization_id(), org.id);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    /// User ID
    pub user_id: Uuid,

    /// The organization the user can act as
    pub organization: Organization,

    /// Role within the organization
    pub role: OrganizationRole,

    /// When the user joined, if known
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Creates a new membership joined now.
    pub fn new(user_id: Uuid, organization: Organization, role: OrganizationRole) -> Self {
        Self {
            user_id,
            organization,
            role,
            joined_at: Some(Utc::now()),
        }
    }

    /// ID of the organization this membership grants.
    pub fn organization_id(&self) -> Uuid {
        self.organization.id
    }

    /// Change the member's role on behalf of `actor`.
    ///
    /// Only admins may change roles, and nobody may grant a role above their
    /// own.
    ///
    /// # Returns
    ///
    /// `true` if the role was changed
    ///
    /// # Examples
    ///
    /// ```
    /// use uuid::Uuid;
    /// use occhealth_org::{Membership, Organization, OrganizationRole};
    ///
    /// let mut m = Membership::new(Uuid::now_v7(), Organization::client("C"), OrganizationRole::Staff);
    /// assert!(!m.change_role(OrganizationRole::Clinician, OrganizationRole::Admin));
    /// assert!(m.change_role(OrganizationRole::Admin, OrganizationRole::Clinician));
    /// assert_eq!(m.role, OrganizationRole::Clinician);
    /// ```
    pub fn change_role(&mut self, actor: OrganizationRole, role: OrganizationRole) -> bool {
        if !actor.can_manage_members() || role > actor {
            return false;
        }
        self.role = role;
        true
    }
}
