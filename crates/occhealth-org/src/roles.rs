//! Membership roles
//!
//! This module defines the role a user holds inside an organization.

use serde::{Deserialize, Serialize};

/// User role within an organization.
///
/// Roles are ordered by privilege:
/// Viewer < Staff < Clinician < Admin < Superadmin
///
/// # Permission Model
///
/// - **Viewer**: Read-only access to organization data (also client portal users)
/// - **Staff**: Day-to-day capture of patients and documents
/// - **Clinician**: Staff rights plus clinical sign-off (certificates of fitness)
/// - **Admin**: Manages members, client organizations and settings
/// - **Superadmin**: Platform-level administration
///
/// # Examples
///
/// ```
/// use occhealth_org::OrganizationRole;
///
/// let role = OrganizationRole::Clinician;
/// assert!(role.can_sign_certificates());
/// assert!(!role.can_manage_members());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    /// Read-only access
    Viewer = 0,

    /// Operational staff
    Staff = 1,

    /// Clinical staff
    Clinician = 2,

    /// Organization administrator
    Admin = 3,

    /// Platform administrator
    Superadmin = 4,
}

impl OrganizationRole {
    /// `true` for Admin and Superadmin.
    pub fn is_admin(&self) -> bool {
        *self >= Self::Admin
    }

    /// `true` for every role except Viewer.
    pub fn can_edit(&self) -> bool {
        *self >= Self::Staff
    }

    /// Check if this role can sign off certificates of fitness.
    pub fn can_sign_certificates(&self) -> bool {
        *self >= Self::Clinician
    }

    /// Check if this role can invite, remove and re-role members.
    pub fn can_manage_members(&self) -> bool {
        self.is_admin()
    }

    /// Check if this role can create and (de)activate client relationships.
    pub fn can_manage_clients(&self) -> bool {
        self.is_admin()
    }

    /// Parse role from string representation (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use occhealth_org::OrganizationRole;
    ///
    /// assert_eq!(OrganizationRole::parse("ADMIN"), Some(OrganizationRole::Admin));
    /// assert_eq!(OrganizationRole::parse("owner"), None);
    /// ```
    ///
    /// `client` is the role given to a client organization's own portal
    /// users; they read their organization's records and capture nothing,
    /// so it parses as [`OrganizationRole::Viewer`].
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" | "client" => Some(Self::Viewer),
            "staff" => Some(Self::Staff),
            "clinician" => Some(Self::Clinician),
            "admin" => Some(Self::Admin),
            "superadmin" => Some(Self::Superadmin),
            _ => None,
        }
    }

    /// Parse a role, degrading unknown strings to [`OrganizationRole::Viewer`].
    ///
    /// Known aliases (`client`) are mapped by [`OrganizationRole::parse`];
    /// only strings it rejects take the fallback.
    pub fn parse_or_least(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Viewer)
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Staff => "staff",
            Self::Clinician => "clinician",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Staff => "Staff",
            Self::Clinician => "Clinician",
            Self::Admin => "Administrator",
            Self::Superadmin => "Super Administrator",
        }
    }
}

impl Default for OrganizationRole {
    fn default() -> Self {
        Self::Staff
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(OrganizationRole::Superadmin > OrganizationRole::Admin);
        assert!(OrganizationRole::Admin > OrganizationRole::Clinician);
        assert!(OrganizationRole::Clinician > OrganizationRole::Staff);
        assert!(OrganizationRole::Staff > OrganizationRole::Viewer);
    }

    #[test]
    fn test_role_permissions() {
        assert!(!OrganizationRole::Viewer.can_edit());
        assert!(OrganizationRole::Staff.can_edit());
        assert!(!OrganizationRole::Staff.can_sign_certificates());
        assert!(OrganizationRole::Clinician.can_sign_certificates());
        assert!(!OrganizationRole::Clinician.can_manage_clients());
        assert!(OrganizationRole::Admin.can_manage_clients());
        assert!(OrganizationRole::Superadmin.can_manage_members());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(OrganizationRole::parse(" clinician "), Some(OrganizationRole::Clinician));
        assert_eq!(OrganizationRole::parse("Staff"), Some(OrganizationRole::Staff));
        assert_eq!(OrganizationRole::parse("root"), None);
        assert_eq!(OrganizationRole::parse_or_least("root"), OrganizationRole::Viewer);
    }

    #[test]
    fn test_client_role_is_read_only() {
        let role = OrganizationRole::parse("client").unwrap();
        assert_eq!(role, OrganizationRole::Viewer);
        assert!(!role.can_edit());
        assert_eq!(OrganizationRole::parse_or_least("Client"), OrganizationRole::Viewer);
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&OrganizationRole::Superadmin).unwrap();
        assert_eq!(json, "\"superadmin\"");
    }
}
