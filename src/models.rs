use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Dpvat,
    LifeInsurance,
    PropertyInsurance,
    Labor,
    SocialSecurity,
    Civil,
    Other,
}

impl ProtocolKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dpvat => "dpvat",
            Self::LifeInsurance => "life_insurance",
            Self::PropertyInsurance => "property_insurance",
            Self::Labor => "labor",
            Self::SocialSecurity => "social_security",
            Self::Civil => "civil",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dpvat" => Ok(Self::Dpvat),
            "life_insurance" => Ok(Self::LifeInsurance),
            "property_insurance" => Ok(Self::PropertyInsurance),
            "labor" => Ok(Self::Labor),
            "social_security" => Ok(Self::SocialSecurity),
            "civil" => Ok(Self::Civil),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown protocol kind: {other}")),
        }
    }
}

/// Case-handling state. Owned by the CRUD layer, only read by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStatus {
    Open,
    InProgress,
    AwaitingDocuments,
    AwaitingExpertExam,
    Concluded,
    Archived,
}

impl ProtocolStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::AwaitingDocuments => "awaiting_documents",
            Self::AwaitingExpertExam => "awaiting_expert_exam",
            Self::Concluded => "concluded",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "awaiting_documents" => Ok(Self::AwaitingDocuments),
            "awaiting_expert_exam" => Ok(Self::AwaitingExpertExam),
            "concluded" => Ok(Self::Concluded),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown protocol status: {other}")),
        }
    }
}

/// Reference to a client or employee as carried on a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: String,
    pub display_name: String,
}

impl PartyRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Financial {
    #[serde(default)]
    pub estimated_value: f64,
    #[serde(default)]
    pub received_value: f64,
    #[serde(default)]
    pub recorded_loss: f64,
}

/// Non-finite values are read as 0.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl Financial {
    pub fn estimated(&self) -> f64 {
        finite_or_zero(self.estimated_value)
    }

    pub fn received(&self) -> f64 {
        finite_or_zero(self.received_value)
    }

    pub fn loss(&self) -> f64 {
        finite_or_zero(self.recorded_loss)
    }

    /// Estimated minus received. Negative when over-received.
    pub fn pending(&self) -> f64 {
        self.estimated() - self.received()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: String,
    pub kind: ProtocolKind,
    pub status: ProtocolStatus,
    pub client: PartyRef,
    #[serde(default)]
    pub owner: Option<PartyRef>,
    #[serde(default)]
    pub last_movement_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sla_days: Option<u32>,
    #[serde(default)]
    pub financial: Option<Financial>,
}

impl Protocol {
    /// Whole days since the last movement, never negative.
    /// A protocol that never moved counts as 0.
    pub fn days_stalled(&self, now: DateTime<Utc>) -> i64 {
        self.last_movement_at
            .map(|moved| (now - moved).num_days().max(0))
            .unwrap_or(0)
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.id.as_str())
    }

    pub fn estimated_value(&self) -> f64 {
        self.financial.map(|f| f.estimated()).unwrap_or(0.0)
    }

    pub fn recorded_loss(&self) -> f64 {
        self.financial.map(|f| f.loss()).unwrap_or(0.0)
    }

    pub fn pending_value(&self) -> f64 {
        self.financial.map(|f| f.pending()).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertTier {
    Warning,
    Critical,
    CriticalMax,
}

impl fmt::Display for AlertTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::CriticalMax => write!(f, "CRITICAL_MAX"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeAlert {
    pub protocol_id: String,
    pub tier: AlertTier,
    pub days_stalled: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskKind {
    Unassigned,
    SlaBreach,
}

impl RiskKind {
    pub const fn suggested_action(&self) -> &'static str {
        match self {
            Self::Unassigned => "assign an owner immediately",
            Self::SlaBreach => "review urgently and update status",
        }
    }
}

impl fmt::Display for RiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "Unassigned"),
            Self::SlaBreach => write!(f, "SlaBreach"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAlert {
    pub protocol_id: String,
    pub kind: RiskKind,
    pub magnitude: i64,
    pub suggested_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialAlert {
    pub protocol_id: String,
    pub estimated_value: f64,
    pub pending_value: f64,
    pub has_recorded_loss: bool,
}

/// Grouping key for responsibility aggregates. Named owners sort by id,
/// the unassigned sentinel sorts last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerKey {
    Owner(String),
    Unassigned,
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner(id) => f.write_str(id),
            Self::Unassigned => f.write_str("unassigned"),
        }
    }
}

/// Serialized as the bare owner id, or `"unassigned"` for the sentinel.
impl Serialize for OwnerKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Owner(id) => serializer.serialize_str(id),
            Self::Unassigned => serializer.serialize_str("unassigned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerAggregate {
    pub owner: OwnerKey,
    pub display_name: String,
    pub critical_count: usize,
    pub types_involved: BTreeSet<ProtocolKind>,
    pub running_average_stall_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Analyst,
    Viewer,
}

impl Role {
    pub const fn can_resolve_alerts(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Manager => write!(f, "manager"),
            Self::Analyst => write!(f, "analyst"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Resolved,
}

/// Alert row owned by the external store. Read for display only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedAlert {
    pub id: Uuid,
    pub protocol_id: String,
    pub title: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn protocol(last_movement_at: Option<DateTime<Utc>>) -> Protocol {
        Protocol {
            id: "PRT-1".to_string(),
            kind: ProtocolKind::Dpvat,
            status: ProtocolStatus::Open,
            client: PartyRef::new("c-1", "Marina Souza"),
            owner: None,
            last_movement_at,
            sla_days: None,
            financial: None,
        }
    }

    #[test]
    fn days_stalled_counts_whole_days() {
        let now = Utc::now();
        let p = protocol(Some(now - Duration::days(12) - Duration::hours(5)));
        assert_eq!(p.days_stalled(now), 12);
    }

    #[test]
    fn days_stalled_is_zero_without_movement() {
        assert_eq!(protocol(None).days_stalled(Utc::now()), 0);
    }

    #[test]
    fn days_stalled_never_negative() {
        let now = Utc::now();
        let p = protocol(Some(now + Duration::days(3)));
        assert_eq!(p.days_stalled(now), 0);
    }

    #[test]
    fn missing_financial_reads_as_zero() {
        let p = protocol(None);
        assert_eq!(p.estimated_value(), 0.0);
        assert_eq!(p.recorded_loss(), 0.0);
        assert_eq!(p.pending_value(), 0.0);
    }

    #[test]
    fn non_finite_amounts_read_as_zero() {
        let f = Financial {
            estimated_value: f64::NAN,
            received_value: f64::INFINITY,
            recorded_loss: 10.0,
        };
        assert_eq!(f.estimated(), 0.0);
        assert_eq!(f.received(), 0.0);
        assert_eq!(f.loss(), 10.0);
    }

    #[test]
    fn pending_value_is_not_clamped() {
        let f = Financial {
            estimated_value: 1_000.0,
            received_value: 1_500.0,
            recorded_loss: 0.0,
        };
        assert_eq!(f.pending(), -500.0);
    }

    #[test]
    fn only_admin_and_manager_resolve() {
        assert!(Role::Admin.can_resolve_alerts());
        assert!(Role::Manager.can_resolve_alerts());
        assert!(!Role::Analyst.can_resolve_alerts());
        assert!(!Role::Viewer.can_resolve_alerts());
    }

    #[test]
    fn kind_parses_cli_spelling() {
        assert_eq!("life-insurance".parse::<ProtocolKind>(), Ok(ProtocolKind::LifeInsurance));
        assert!("parking".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn owner_key_puts_unassigned_last() {
        assert!(OwnerKey::Owner("zz".to_string()) < OwnerKey::Unassigned);
    }

    #[test]
    fn owner_key_serializes_as_plain_string() {
        let named = serde_json::to_value(OwnerKey::Owner("emp-7".to_string())).expect("serialize");
        let sentinel = serde_json::to_value(OwnerKey::Unassigned).expect("serialize");
        assert_eq!(named, serde_json::json!("emp-7"));
        assert_eq!(sentinel, serde_json::json!("unassigned"));
    }
}
