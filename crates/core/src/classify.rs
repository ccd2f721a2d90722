use crate::config::ClassifierThresholds;
use crate::domain::classification::{Classification, RiskTier};
use crate::domain::record::{NormalizedRecord, TicketRatio};
use crate::domain::report::StoryType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatioBucket {
    Low,
    Medium,
    High,
}

/// Bucket the ticket-per-user ratio. An undefined ratio (zero active
/// users) maps to Medium as a conservative default rather than being
/// treated as zero load.
pub fn ticket_ratio_bucket(ratio: TicketRatio, thresholds: &ClassifierThresholds) -> RatioBucket {
    match ratio {
        TicketRatio::Undefined => RatioBucket::Medium,
        TicketRatio::PerUser(value) if value <= thresholds.ratio_low_max => RatioBucket::Low,
        TicketRatio::PerUser(value) if value <= thresholds.ratio_high_min => RatioBucket::Medium,
        TicketRatio::PerUser(_) => RatioBucket::High,
    }
}

/// Rule-based story classification. Pure and deterministic, with no
/// generative call: this is the ground truth the narrative must
/// conform to. Rules are evaluated in fixed order (at_risk >
/// turnaround > growth > stable) so ties resolve the same way on
/// every run.
pub fn classify(record: &NormalizedRecord, thresholds: &ClassifierThresholds) -> Classification {
    let bucket = ticket_ratio_bucket(record.ticket_per_user_ratio, thresholds);

    let story_type = if record.risk_engine_score >= thresholds.at_risk_risk_score
        || (record.usage_growth_qoq < 0.0 && record.nps_score <= thresholds.at_risk_max_nps)
    {
        StoryType::AtRisk
    } else if bucket == RatioBucket::High
        || (record.scat_score < thresholds.turnaround_max_scat && record.usage_growth_qoq >= 0.0)
    {
        StoryType::Turnaround
    } else if record.usage_growth_qoq >= thresholds.growth_min_growth
        && record.nps_score >= thresholds.growth_min_nps
    {
        StoryType::Growth
    } else {
        StoryType::Stable
    };

    let risk_tier = if record.risk_engine_score >= thresholds.at_risk_risk_score {
        RiskTier::High
    } else if record.risk_engine_score >= thresholds.at_risk_risk_score / 2.0
        || bucket == RatioBucket::High
        || record.ticket_per_user_ratio == TicketRatio::Undefined
    {
        RiskTier::Medium
    } else {
        RiskTier::Low
    };

    Classification { risk_tier, story_type }
}
