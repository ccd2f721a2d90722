use serde::{Deserialize, Serialize};

use crate::domain::validation::Issue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryType {
    Growth,
    Turnaround,
    Stable,
    AtRisk,
}

impl StoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Growth => "growth",
            Self::Turnaround => "turnaround",
            Self::Stable => "stable",
            Self::AtRisk => "at_risk",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub label: String,
    pub value: String,
    /// Must name a field of the normalized record; the judge rejects
    /// citations that do not trace back to source data.
    pub source_field: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub description: String,
    pub severity: Severity,
    pub evidence: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub rationale: String,
    pub evidence: String,
}

/// The structured narrative produced by the generator. Replaced across
/// retry rounds; only the final accepted (or final-attempt) version
/// survives the invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QbrOutput {
    pub account_name: String,
    pub executive_summary: String,
    pub story_type: StoryType,
    pub key_metrics: Vec<KeyMetric>,
    pub risks: Vec<RiskItem>,
    pub recommendations: Vec<Recommendation>,
    pub next_steps: Vec<String>,
    pub confidence_score: f64,
    pub raw_markdown: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    Degraded,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Degraded => "degraded",
        }
    }
}

/// What the pipeline hands to presentation and export collaborators.
/// Degraded outcomes carry the unresolved judge issues so callers can
/// surface them next to the draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QbrOutcome {
    pub output: QbrOutput,
    pub disposition: Disposition,
    pub unresolved_issues: Vec<Issue>,
    pub generator_attempts: u32,
}

impl QbrOutcome {
    pub fn is_degraded(&self) -> bool {
        self.disposition == Disposition::Degraded
    }
}
