use std::sync::Arc;

use serde::Deserialize;

use qbrgen_core::domain::classification::Classification;
use qbrgen_core::domain::record::{NormalizedRecord, TicketRatio};
use qbrgen_core::domain::report::{QbrOutput, StoryType};
use qbrgen_core::domain::validation::{Issue, IssueCategory, ValidationReport};
use qbrgen_core::errors::{CallStage, PipelineError};

use crate::llm::{complete_with_retry, ChatModel};

/// Phrases in CRM notes or feedback that must surface in the review.
pub const RISK_KEYWORDS: [&str; 8] = [
    "competitor",
    "trial",
    "alternative",
    "switching",
    "cancel",
    "unhappy",
    "frustrated",
    "escalation",
];

const JUDGE_SYSTEM_PROMPT: &str = "You are a QA reviewer for Customer Success QBR documents. \
You receive the original customer data and a generated QBR. Check the QBR against the data and \
report every issue you find. Respond with ONLY a JSON object of the form \
{\"issues\": [{\"category\": \"critical_signal\"|\"feedback_coverage\"|\"data_grounding\"|\"format_compliance\"|\"tone_compliance\", \"detail\": string}]}. \
An empty issues array means the document is clean. No prose, no code fences.";

/// Reviews a generated document with an independent model pass, merges
/// in deterministic local checks, and recomputes the verdict locally.
/// The model lists issues; it never gets the final say on pass/fail.
pub struct Judge {
    model: Arc<dyn ChatModel>,
    advisory_tolerance: usize,
}

impl Judge {
    pub fn new(model: Arc<dyn ChatModel>, advisory_tolerance: usize) -> Self {
        Self { model, advisory_tolerance }
    }

    pub async fn review(
        &self,
        output: &QbrOutput,
        record: &NormalizedRecord,
        classification: &Classification,
    ) -> Result<ValidationReport, PipelineError> {
        let user = review_prompt(output, record);
        let text = complete_with_retry(
            self.model.as_ref(),
            CallStage::Judge,
            JUDGE_SYSTEM_PROMPT,
            &user,
        )
        .await?;

        let mut issues = match parse_judge_issues(&text) {
            Ok(issues) => issues,
            Err(reason) => {
                // An unreadable verdict is a failed round, not a hard
                // failure: the retry controller gets another shot.
                tracing::warn!(
                    event_name = "qbr.judge_unparseable",
                    account = %record.account_name,
                    reason = %reason,
                    "judge response rejected, treating round as failed"
                );
                vec![Issue::new(
                    IssueCategory::DataGrounding,
                    format!("reviewer verdict unreadable, grounding unverified: {reason}"),
                )]
            }
        };

        issues.extend(local_checks(output, record, classification));
        Ok(ValidationReport::from_issues(issues, self.advisory_tolerance))
    }
}

fn review_prompt(output: &QbrOutput, record: &NormalizedRecord) -> String {
    let ratio = match record.ticket_per_user_ratio {
        TicketRatio::PerUser(value) => format!("{value:.2}"),
        TicketRatio::Undefined => "undefined".to_string(),
    };

    format!(
        "Validate the QBR below against the original customer data.\n\n\
         ## ORIGINAL CUSTOMER DATA\n\
         - Account Name: {account}\n\
         - Plan Type: {plan}\n\
         - Active Users: {users}\n\
         - Usage Growth (QoQ): {growth:.1}%\n\
         - Automation Adoption: {automation:.1}%\n\
         - Support Tickets: {tickets}\n\
         - Tickets Per User: {ratio}\n\
         - Avg Response Time: {response:.1}h\n\
         - NPS Score: {nps}/10\n\
         - Health Score (SCAT): {scat}/100\n\
         - Churn Risk: {risk:.2}\n\
         CRM Notes: {notes}\n\
         Customer Feedback: {feedback}\n\n\
         ## GENERATED QBR\n\
         {markdown}\n\n\
         ## CHECKLIST\n\
         1. critical_signal: if the notes or feedback contain any of \
         {keywords:?}, the QBR must address it prominently (first paragraph or \
         first recommendation).\n\
         2. feedback_coverage: every distinct point in the CRM notes and the \
         customer feedback must be addressed somewhere in the QBR.\n\
         3. data_grounding: every metric cited must come from the data above; \
         invented events, meetings, or numbers are violations.\n\
         4. format_compliance: the QBR needs Executive Summary, Key Metrics & \
         Wins, Challenges & Risks, Strategic Recommendations, and Next Steps \
         sections.\n\
         5. tone_compliance: no exposed internal formulas, no comparison \
         operators in explanations, no talk of thresholds or triggers.",
        account = record.account_name,
        plan = record.plan_type.as_str(),
        users = record.active_users,
        growth = record.usage_growth_qoq * 100.0,
        automation = record.automation_adoption_pct * 100.0,
        tickets = record.tickets_last_quarter,
        ratio = ratio,
        response = record.avg_response_time_hours,
        nps = record.nps_score,
        scat = record.scat_score,
        risk = record.risk_engine_score,
        notes = record.crm_notes,
        feedback = record.feedback_summary,
        markdown = output.raw_markdown,
        keywords = RISK_KEYWORDS,
    )
}

#[derive(Deserialize)]
struct JudgeResponse {
    issues: Vec<Issue>,
}

fn parse_judge_issues(text: &str) -> Result<Vec<Issue>, String> {
    let start = text.find('{').ok_or("no JSON object in verdict")?;
    let end = text.rfind('}').ok_or("no JSON object in verdict")?;
    if end <= start {
        return Err("no JSON object in verdict".to_string());
    }

    serde_json::from_str::<JudgeResponse>(&text[start..=end])
        .map(|response| response.issues)
        .map_err(|err| err.to_string())
}

/// Deterministic checks that do not need a model: citation fields,
/// unsurfaced risk keywords, section presence, exposed rule language.
fn local_checks(
    output: &QbrOutput,
    record: &NormalizedRecord,
    classification: &Classification,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    for metric in &output.key_metrics {
        if !NormalizedRecord::is_source_field(&metric.source_field) {
            issues.push(Issue::new(
                IssueCategory::DataGrounding,
                format!(
                    "metric `{}` cites `{}`, which is not a source data field",
                    metric.label, metric.source_field
                ),
            ));
        }
    }

    let qualitative =
        format!("{} {}", record.crm_notes, record.feedback_summary).to_lowercase();
    let markdown = output.raw_markdown.to_lowercase();
    for keyword in RISK_KEYWORDS {
        if qualitative.contains(keyword) && !markdown.contains(keyword) {
            issues.push(Issue::new(
                IssueCategory::CriticalSignal,
                format!("the source data mentions \"{keyword}\" but the review never does"),
            ));
        }
    }

    if classification.story_type == StoryType::AtRisk && output.risks.is_empty() {
        issues.push(Issue::new(
            IssueCategory::CriticalSignal,
            "an at-risk account review lists no risks",
        ));
    }

    if output.executive_summary.trim().is_empty() {
        issues.push(Issue::new(IssueCategory::FormatCompliance, "executive summary is empty"));
    }
    if output.key_metrics.is_empty() {
        issues.push(Issue::new(IssueCategory::FormatCompliance, "no key metrics are cited"));
    }
    if output.next_steps.len() < 2 {
        issues.push(Issue::new(
            IssueCategory::FormatCompliance,
            "next steps need at least two concrete actions",
        ));
    }

    let narrative = output
        .recommendations
        .iter()
        .map(|recommendation| recommendation.rationale.as_str())
        .chain(std::iter::once(output.executive_summary.as_str()));
    for text in narrative {
        if let Some(fragment) = exposed_rule_language(text) {
            issues.push(Issue::new(
                IssueCategory::ToneCompliance,
                format!("internal rule language exposed: \"{fragment}\""),
            ));
        }
    }

    issues
}

fn exposed_rule_language(text: &str) -> Option<&'static str> {
    const FRAGMENTS: [&str; 6] = [" > ", " < ", " >= ", " <= ", "threshold", "triggers"];
    let lowered = text.to_lowercase();
    FRAGMENTS.into_iter().find(|fragment| lowered.contains(fragment))
}
