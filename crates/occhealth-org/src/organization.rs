//! Organization domain models
//!
//! Organizations are the tenant entities of the platform. A service provider
//! manages client organizations through relationships; a client organization
//! is either managed by a provider or operates standalone.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tiers::Subscription;

/// Kind of tenant an organization is.
///
/// The type is fixed when the organization is created. [`OrganizationUpdate`]
/// carries no type field, so an update can never change it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    /// Manages other (client) organizations
    ServiceProvider,

    /// Managed by a provider, or standalone
    Client,
}

impl OrganizationType {
    /// Parse an organization type from its wire representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use occhealth_org::OrganizationType;
    ///
    /// assert_eq!(
    ///     OrganizationType::parse("service_provider"),
    ///     Some(OrganizationType::ServiceProvider)
    /// );
    /// assert_eq!(OrganizationType::parse("clinic"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "service_provider" => Some(Self::ServiceProvider),
            "client" => Some(Self::Client),
            _ => None,
        }
    }

    /// Get string representation of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceProvider => "service_provider",
            Self::Client => "client",
        }
    }
}

impl std::fmt::Display for OrganizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant organization.
///
/// # Examples
///
/// ```
/// use occhealth_org::{Organization, OrganizationType};
///
/// let provider = Organization::service_provider("Acme Occupational Health");
/// assert!(provider.is_service_provider());
///
/// let client = Organization::client("Mining Co").with_contact_email("hr@mining.example");
/// assert_eq!(client.organization_type(), OrganizationType::Client);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    organization_type: OrganizationType,

    /// Logo URL for branding
    #[serde(default)]
    pub logo_url: Option<String>,

    /// Contact email
    #[serde(default)]
    pub contact_email: Option<String>,

    /// Contact phone
    #[serde(default)]
    pub contact_phone: Option<String>,

    /// Whether the organization is active
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Free-form settings blob (subscription, branding, ...)
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

fn default_active() -> bool {
    true
}

impl Organization {
    /// Creates a new active organization of the given type.
    pub fn new(name: impl Into<String>, organization_type: OrganizationType) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            organization_type,
            logo_url: None,
            contact_email: None,
            contact_phone: None,
            is_active: true,
            settings: None,
        }
    }

    /// Creates a new service-provider organization.
    pub fn service_provider(name: impl Into<String>) -> Self {
        Self::new(name, OrganizationType::ServiceProvider)
    }

    /// Creates a new client organization.
    pub fn client(name: impl Into<String>) -> Self {
        Self::new(name, OrganizationType::Client)
    }

    /// Set the contact email.
    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }

    /// Set the contact phone.
    pub fn with_contact_phone(mut self, phone: impl Into<String>) -> Self {
        self.contact_phone = Some(phone.into());
        self
    }

    /// Set the logo URL.
    pub fn with_logo_url(mut self, url: impl Into<String>) -> Self {
        self.logo_url = Some(url.into());
        self
    }

    /// Set the settings blob.
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = Some(settings);
        self
    }

    /// The organization's type. There is no setter.
    pub fn organization_type(&self) -> OrganizationType {
        self.organization_type
    }

    /// Check if this organization manages client organizations.
    pub fn is_service_provider(&self) -> bool {
        self.organization_type == OrganizationType::ServiceProvider
    }

    /// Subscription recorded in the settings blob, basic when absent.
    pub fn subscription(&self) -> Subscription {
        Subscription::from_settings(self.settings.as_ref())
    }

    /// Apply an edit. Fields left as `None` in the patch are unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use occhealth_org::{Organization, OrganizationUpdate};
    ///
    /// let mut org = Organization::client("Old Name");
    /// org.apply_update(OrganizationUpdate {
    ///     name: Some("New Name".into()),
    ///     ..Default::default()
    /// });
    /// assert_eq!(org.name, "New Name");
    /// ```
    pub fn apply_update(&mut self, update: OrganizationUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.logo_url.is_some() {
            self.logo_url = update.logo_url;
        }
        if update.contact_email.is_some() {
            self.contact_email = update.contact_email;
        }
        if update.contact_phone.is_some() {
            self.contact_phone = update.contact_phone;
        }
        if update.settings.is_some() {
            self.settings = update.settings;
        }
    }
}

/// Editable organization fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationUpdate {
    /// New display name
    pub name: Option<String>,
    /// New logo URL
    pub logo_url: Option<String>,
    /// New contact email
    pub contact_email: Option<String>,
    /// New contact phone
    pub contact_phone: Option<String>,
    /// Replacement settings blob
    pub settings: Option<serde_json::Value>,
}
