use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlanType {
    Basic,
    Standard,
    Pro,
    Enterprise,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Phone,
    Slack,
    VideoCall,
}

impl Channel {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Slack => "Slack",
            Self::VideoCall => "Video Call",
        }
    }
}

/// One account row as delivered by the ingestion collaborator. All
/// thirteen fields must be present; serde rejects anything missing at
/// the boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub account_name: String,
    pub plan_type: PlanType,
    pub active_users: u32,
    pub usage_growth_qoq: f64,
    pub automation_adoption_pct: f64,
    pub tickets_last_quarter: u32,
    pub avg_response_time_hours: f64,
    pub nps_score: u8,
    pub preferred_channel: Channel,
    pub scat_score: u8,
    pub risk_engine_score: f64,
    pub crm_notes: String,
    pub feedback_summary: String,
}

/// tickets_last_quarter / active_users, with an explicit sentinel when
/// active_users is zero. Undefined is its own bucket downstream and is
/// never coerced to zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketRatio {
    PerUser(f64),
    Undefined,
}

impl TicketRatio {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::PerUser(ratio) => Some(*ratio),
            Self::Undefined => None,
        }
    }
}

/// A customer record with every percentage-like field coerced to the
/// [0,1] convention, plus the derived ticket ratio. Immutable once
/// produced by the normalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub account_name: String,
    pub plan_type: PlanType,
    pub active_users: u32,
    pub usage_growth_qoq: f64,
    pub automation_adoption_pct: f64,
    pub tickets_last_quarter: u32,
    pub avg_response_time_hours: f64,
    pub nps_score: u8,
    pub preferred_channel: Channel,
    pub scat_score: u8,
    pub risk_engine_score: f64,
    pub crm_notes: String,
    pub feedback_summary: String,
    pub ticket_per_user_ratio: TicketRatio,
}

impl NormalizedRecord {
    /// Field names a generated metric citation may reference.
    pub const SOURCE_FIELDS: [&'static str; 12] = [
        "account_name",
        "plan_type",
        "active_users",
        "usage_growth_qoq",
        "automation_adoption_pct",
        "tickets_last_quarter",
        "avg_response_time_hours",
        "nps_score",
        "preferred_channel",
        "scat_score",
        "risk_engine_score",
        "ticket_per_user_ratio",
    ];

    pub fn is_source_field(name: &str) -> bool {
        Self::SOURCE_FIELDS.contains(&name)
    }
}
