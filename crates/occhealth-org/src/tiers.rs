//! Subscription tiers and feature gating
//!
//! This module defines the subscription packages available on the platform,
//! the features each one unlocks and the presentation configuration shown
//! for it.
//!
//! Feature sets are strictly nested: every feature of a tier is also a
//! feature of every higher tier (enterprise ⊇ premium ⊇ basic).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription package tier.
///
/// Tiers are ordered `Basic < Premium < Enterprise`.
///
/// # Examples
///
/// ```
/// use occhealth_org::{FeatureKey, PackageTier};
///
/// let tier = PackageTier::Premium;
/// assert!(tier.has_feature(FeatureKey::TrendAnalysis));
/// assert!(!tier.has_feature(FeatureKey::ApiAccess));
/// assert_eq!(tier.upgrade_target(), Some(PackageTier::Enterprise));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackageTier {
    /// Essential health management
    Basic,

    /// Intelligent health analytics
    Premium,

    /// Strategic health command center
    Enterprise,
}

impl PackageTier {
    /// All tiers, lowest first.
    pub const ALL: [PackageTier; 3] = [Self::Basic, Self::Premium, Self::Enterprise];

    /// Parse tier from string representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "premium" => Some(Self::Premium),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Parse tier, failing closed to [`PackageTier::Basic`].
    ///
    /// # Examples
    ///
    /// ```
    /// use occhealth_org::PackageTier;
    ///
    /// assert_eq!(PackageTier::parse_or_basic("ENTERPRISE"), PackageTier::Enterprise);
    /// assert_eq!(PackageTier::parse_or_basic("platinum"), PackageTier::Basic);
    /// ```
    pub fn parse_or_basic(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Basic)
    }

    /// Get string representation of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    /// Features unlocked by this tier.
    pub fn features(&self) -> &'static [FeatureKey] {
        match self {
            Self::Basic => BASIC_FEATURES,
            Self::Premium => PREMIUM_FEATURES,
            Self::Enterprise => ENTERPRISE_FEATURES,
        }
    }

    /// Check if this tier unlocks `feature`.
    pub fn has_feature(&self, feature: FeatureKey) -> bool {
        self.features().contains(&feature)
    }

    /// Check if this tier is at or above `required`.
    pub fn can_access(&self, required: PackageTier) -> bool {
        *self >= required
    }

    /// Next tier up, if any.
    pub fn upgrade_target(&self) -> Option<Self> {
        match self {
            Self::Basic => Some(Self::Premium),
            Self::Premium => Some(Self::Enterprise),
            Self::Enterprise => None,
        }
    }

    /// Lowest tier that unlocks `feature`.
    pub fn minimum_for(feature: FeatureKey) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.has_feature(feature))
    }

    /// Full presentation and limits configuration for this tier.
    pub fn configuration(&self) -> PackageConfiguration {
        match self {
            Self::Basic => PackageConfiguration {
                tier: *self,
                display_name: "Essential Health Management",
                metrics: BASIC_METRICS.to_vec(),
                language: LanguageConfig {
                    dashboard_title: "Health Overview",
                    executive_summary_title: "Current Health Status",
                    executive_summary_description:
                        "Essential insights into your workforce health and compliance status.",
                    upgrade_prompt_title: "Unlock Advanced Features",
                    upgrade_prompt_description:
                        "Upgrade to Premium for AI-powered insights and predictive analytics.",
                    features_title: "Essential Features",
                },
                colors: ColorConfig::palette("blue"),
                max_users: Some(5),
                max_clients: Some(10),
                features: BASIC_FEATURES,
                upgrade_target: self.upgrade_target(),
            },
            Self::Premium => PackageConfiguration {
                tier: *self,
                display_name: "Intelligent Health Analytics",
                metrics: [BASIC_METRICS.as_slice(), PREMIUM_METRICS.as_slice()].concat(),
                language: LanguageConfig {
                    dashboard_title: "Executive Health Intelligence",
                    executive_summary_title: "AI-Powered Health Intelligence",
                    executive_summary_description: "Advanced insights with trend analysis, risk intelligence, and predictive analytics.",
                    upgrade_prompt_title: "Unlock Enterprise Features",
                    upgrade_prompt_description:
                        "Upgrade to Enterprise for competitive benchmarking and strategic insights.",
                    features_title: "Premium Intelligence Features",
                },
                colors: ColorConfig::palette("yellow"),
                max_users: Some(25),
                max_clients: Some(50),
                features: PREMIUM_FEATURES,
                upgrade_target: self.upgrade_target(),
            },
            Self::Enterprise => PackageConfiguration {
                tier: *self,
                display_name: "Strategic Health Command Center",
                metrics: [
                    BASIC_METRICS.as_slice(),
                    PREMIUM_METRICS.as_slice(),
                    ENTERPRISE_METRICS.as_slice(),
                ]
                .concat(),
                language: LanguageConfig {
                    dashboard_title: "Strategic Health Command Center",
                    executive_summary_title: "Executive Strategic Intelligence",
                    executive_summary_description: "Comprehensive strategic insights with competitive benchmarking and board-ready analytics.",
                    upgrade_prompt_title: "Full Platform Access",
                    upgrade_prompt_description:
                        "You have access to all enterprise features and capabilities.",
                    features_title: "Enterprise Strategic Features",
                },
                colors: ColorConfig::palette("purple"),
                max_users: None,
                max_clients: None,
                features: ENTERPRISE_FEATURES,
                upgrade_target: None,
            },
        }
    }
}

impl Default for PackageTier {
    fn default() -> Self {
        Self::Basic
    }
}

impl std::fmt::Display for PackageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gated product feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    EmployeeStatusOverview,
    ComplianceTracking,
    BasicReporting,
    CertificateAlerts,
    SimpleCharts,
    TrendAnalysis,
    RiskIntelligence,
    AdvancedReporting,
    DepartmentBreakdowns,
    CustomBranding,
    AutomatedScheduling,
    PredictiveAnalytics,
    CompetitiveBenchmarking,
    ApiAccess,
    CustomIntegrations,
    WhiteLabelReports,
    DedicatedSupport,
}

const BASIC_FEATURES: &[FeatureKey] = &[
    FeatureKey::EmployeeStatusOverview,
    FeatureKey::ComplianceTracking,
    FeatureKey::BasicReporting,
    FeatureKey::CertificateAlerts,
    FeatureKey::SimpleCharts,
];

const PREMIUM_FEATURES: &[FeatureKey] = &[
    FeatureKey::EmployeeStatusOverview,
    FeatureKey::ComplianceTracking,
    FeatureKey::BasicReporting,
    FeatureKey::CertificateAlerts,
    FeatureKey::SimpleCharts,
    FeatureKey::TrendAnalysis,
    FeatureKey::RiskIntelligence,
    FeatureKey::AdvancedReporting,
    FeatureKey::DepartmentBreakdowns,
    FeatureKey::CustomBranding,
    FeatureKey::AutomatedScheduling,
];

const ENTERPRISE_FEATURES: &[FeatureKey] = &[
    FeatureKey::EmployeeStatusOverview,
    FeatureKey::ComplianceTracking,
    FeatureKey::BasicReporting,
    FeatureKey::CertificateAlerts,
    FeatureKey::SimpleCharts,
    FeatureKey::TrendAnalysis,
    FeatureKey::RiskIntelligence,
    FeatureKey::AdvancedReporting,
    FeatureKey::DepartmentBreakdowns,
    FeatureKey::CustomBranding,
    FeatureKey::AutomatedScheduling,
    FeatureKey::PredictiveAnalytics,
    FeatureKey::CompetitiveBenchmarking,
    FeatureKey::ApiAccess,
    FeatureKey::CustomIntegrations,
    FeatureKey::WhiteLabelReports,
    FeatureKey::DedicatedSupport,
];

/// A dashboard metric tile.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricConfig {
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    pub is_premium: bool,
    pub is_enterprise: bool,
}

impl MetricConfig {
    const fn basic(
        id: &'static str,
        title: &'static str,
        icon: &'static str,
        color: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            title,
            icon,
            color,
            description,
            is_premium: false,
            is_enterprise: false,
        }
    }

    const fn premium(self) -> Self {
        Self {
            is_premium: true,
            ..self
        }
    }

    const fn enterprise(self) -> Self {
        Self {
            is_enterprise: true,
            ..self
        }
    }
}

const BASIC_METRICS: [MetricConfig; 4] = [
    MetricConfig::basic("active_employees", "Active Employees", "Users", "text-blue-600", "Total active workforce"),
    MetricConfig::basic("compliance_rate", "Compliance Rate", "CheckCircle", "text-green-600", "Overall compliance percentage"),
    MetricConfig::basic("expiring_certificates", "Expiring Soon", "Clock", "text-yellow-600", "Certificates expiring in 30 days"),
    MetricConfig::basic("monthly_tests", "Monthly Tests", "FileText", "text-gray-600", "Tests completed this month"),
];

const PREMIUM_METRICS: [MetricConfig; 4] = [
    MetricConfig::basic("health_intelligence_score", "Health Intelligence Score", "Target", "text-purple-600", "AI-powered health scoring").premium(),
    MetricConfig::basic("risk_predictions", "Risk Predictions", "AlertTriangle", "text-red-600", "ML-powered risk detection").premium(),
    MetricConfig::basic("department_analytics", "Department Analytics", "Building2", "text-blue-600", "Granular department insights").premium(),
    MetricConfig::basic("trend_accuracy", "Trend Accuracy", "BarChart3", "text-green-600", "Predictive model accuracy").premium(),
];

const ENTERPRISE_METRICS: [MetricConfig; 4] = [
    MetricConfig::basic("competitive_benchmarking", "Market Benchmarking", "TrendingUp", "text-purple-600", "Industry performance comparison").enterprise(),
    MetricConfig::basic("roi_health_investments", "Health ROI", "DollarSign", "text-green-600", "Return on health investments").enterprise(),
    MetricConfig::basic("regulatory_risk_score", "Regulatory Risk", "Shield", "text-red-600", "Compliance risk assessment").enterprise(),
    MetricConfig::basic("custom_business_kpis", "Custom KPIs", "Settings", "text-gray-600", "Tailored business metrics").enterprise(),
];

/// Copy shown on a tier's dashboard.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LanguageConfig {
    pub dashboard_title: &'static str,
    pub executive_summary_title: &'static str,
    pub executive_summary_description: &'static str,
    pub upgrade_prompt_title: &'static str,
    pub upgrade_prompt_description: &'static str,
    pub features_title: &'static str,
}

/// Style classes for a tier.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColorConfig {
    pub primary: String,
    pub accent: String,
    pub background: String,
    pub border: String,
    pub text: String,
}

impl ColorConfig {
    fn palette(hue: &str) -> Self {
        Self {
            primary: format!("bg-{hue}-600"),
            accent: format!("text-{hue}-600"),
            background: format!("bg-{hue}-50"),
            border: format!("border-{hue}-200"),
            text: format!("text-{hue}-800"),
        }
    }
}

/// Everything a tier configures.
///
/// `max_users`/`max_clients` of `None` mean unlimited.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PackageConfiguration {
    pub tier: PackageTier,
    pub display_name: &'static str,
    pub metrics: Vec<MetricConfig>,
    pub language: LanguageConfig,
    pub colors: ColorConfig,
    pub max_users: Option<u32>,
    pub max_clients: Option<u32>,
    pub features: &'static [FeatureKey],
    pub upgrade_target: Option<PackageTier>,
}

/// Outcome of checking a feature against the current tier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGate {
    /// Whether the current tier unlocks the feature
    pub has_access: bool,

    /// Lowest tier that unlocks the feature
    pub required_tier: PackageTier,

    /// Configuration of `required_tier`, present only when access is denied
    pub upgrade_config: Option<PackageConfiguration>,
}

/// Check `feature` against `current`.
///
/// Returns `None` if no tier unlocks the feature.
///
/// # Examples
///
/// ```
/// use occhealth_org::{feature_gate, FeatureKey, PackageTier};
///
/// let gate = feature_gate(PackageTier::Basic, FeatureKey::RiskIntelligence).unwrap();
/// assert!(!gate.has_access);
/// assert_eq!(gate.required_tier, PackageTier::Premium);
/// assert!(gate.upgrade_config.is_some());
/// ```
pub fn feature_gate(current: PackageTier, feature: FeatureKey) -> Option<FeatureGate> {
    let required_tier = PackageTier::minimum_for(feature)?;
    let has_access = current.has_feature(feature);
    Some(FeatureGate {
        has_access,
        required_tier,
        upgrade_config: (!has_access).then(|| required_tier.configuration()),
    })
}

/// Billing status of a subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Trial,
    PastDue,
    Cancelled,
}

impl SubscriptionStatus {
    /// Parse status from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "trial" => Some(Self::Trial),
            "past_due" => Some(Self::PastDue),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
        }
    }
}

/// An organization's subscription, as recorded under `settings.subscription`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Subscription {
    pub package_tier: PackageTier,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Read the subscription from an organization settings blob.
    ///
    /// Missing or malformed fields fall back to an active basic
    /// subscription; an unknown tier reads as basic.
    ///
    /// # Examples
    ///
    /// ```
    /// use occhealth_org::{PackageTier, Subscription};
    /// use serde_json::json;
    ///
    /// let settings = json!({ "subscription": { "package_tier": "premium" } });
    /// assert_eq!(Subscription::from_settings(Some(&settings)).package_tier, PackageTier::Premium);
    /// assert_eq!(Subscription::from_settings(None).package_tier, PackageTier::Basic);
    /// ```
    pub fn from_settings(settings: Option<&serde_json::Value>) -> Self {
        let Some(sub) = settings.and_then(|s| s.get("subscription")) else {
            return Self::default();
        };
        let text = |key: &str| sub.get(key).and_then(serde_json::Value::as_str);
        let timestamp = |key: &str| {
            text(key)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc))
        };

        Self {
            package_tier: text("package_tier")
                .map(PackageTier::parse_or_basic)
                .unwrap_or_default(),
            status: text("status")
                .and_then(SubscriptionStatus::parse)
                .unwrap_or_default(),
            current_period_end: timestamp("current_period_end"),
            trial_end: timestamp("trial_end"),
        }
    }
}

/// Settings blob with the subscription moved to `tier` and marked active.
///
/// Other settings and other subscription fields are preserved. A non-object
/// input is replaced by a fresh object.
pub fn with_upgraded_tier(
    settings: Option<&serde_json::Value>,
    tier: PackageTier,
) -> serde_json::Value {
    let mut root = match settings {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let mut sub = match root.remove("subscription") {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    sub.insert("package_tier".into(), tier.as_str().into());
    sub.insert("status".into(), SubscriptionStatus::Active.as_str().into());
    root.insert("subscription".into(), serde_json::Value::Object(sub));
    serde_json::Value::Object(root)
}
