pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;

pub use classify::{classify, ticket_ratio_bucket, RatioBucket};
pub use config::{AppConfig, ClassifierThresholds, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::classification::{Classification, RiskTier};
pub use domain::record::{Channel, CustomerRecord, NormalizedRecord, PlanType, TicketRatio};
pub use domain::report::{
    Disposition, KeyMetric, QbrOutcome, QbrOutput, Recommendation, RiskItem, Severity, StoryType,
};
pub use domain::validation::{Issue, IssueCategory, ValidationReport};
pub use errors::PipelineError;
pub use normalize::normalize;
