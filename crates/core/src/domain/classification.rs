use serde::{Deserialize, Serialize};

use crate::domain::report::StoryType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Deterministic pre-classification of an account. Produced once per
/// record and treated as ground truth by the prompt assembler and the
/// judge; the generative step must conform to it, never override it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub risk_tier: RiskTier,
    pub story_type: StoryType,
}
