use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    CriticalSignal,
    FeedbackCoverage,
    DataGrounding,
    FormatCompliance,
    ToneCompliance,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalSignal => "critical_signal",
            Self::FeedbackCoverage => "feedback_coverage",
            Self::DataGrounding => "data_grounding",
            Self::FormatCompliance => "format_compliance",
            Self::ToneCompliance => "tone_compliance",
        }
    }

    /// Grounding and risk-surfacing failures are never tolerated;
    /// the remaining categories are advisory up to a small tolerance.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::DataGrounding | Self::CriticalSignal)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub detail: String,
}

impl Issue {
    pub fn new(category: IssueCategory, detail: impl Into<String>) -> Self {
        Self { category, detail: detail.into() }
    }
}

/// One judge verdict over one generator attempt. Consumed only by the
/// retry controller and discarded with the invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Recompute the verdict from the issue list: no blocking issue,
    /// and fewer advisory issues than the tolerance.
    pub fn from_issues(issues: Vec<Issue>, advisory_tolerance: usize) -> Self {
        let blocking = issues.iter().any(|issue| issue.category.is_blocking());
        let advisory = issues.iter().filter(|issue| !issue.category.is_blocking()).count();
        Self { passed: !blocking && advisory < advisory_tolerance, issues }
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|issue| issue.category.is_blocking())
    }
}

#[cfg(test)]
mod tests {
    use super::{Issue, IssueCategory, ValidationReport};

    #[test]
    fn blocking_categories_always_fail_the_verdict() {
        let report = ValidationReport::from_issues(
            vec![Issue::new(IssueCategory::DataGrounding, "NPS cited as 9.5, source is 7")],
            3,
        );
        assert!(!report.passed);
        assert_eq!(report.blocking_issues().count(), 1);
    }

    #[test]
    fn advisory_issues_pass_below_tolerance() {
        let report = ValidationReport::from_issues(
            vec![
                Issue::new(IssueCategory::FormatCompliance, "next_steps has one entry"),
                Issue::new(IssueCategory::ToneCompliance, "summary reads clinical"),
            ],
            3,
        );
        assert!(report.passed);
    }

    #[test]
    fn advisory_issues_fail_at_tolerance() {
        let issues = vec![
            Issue::new(IssueCategory::FormatCompliance, "a"),
            Issue::new(IssueCategory::ToneCompliance, "b"),
            Issue::new(IssueCategory::FeedbackCoverage, "c"),
        ];
        let report = ValidationReport::from_issues(issues, 3);
        assert!(!report.passed);
    }

    #[test]
    fn empty_issue_list_passes() {
        let report = ValidationReport::from_issues(Vec::new(), 3);
        assert!(report.passed);
        assert!(report.issues.is_empty());
    }
}
