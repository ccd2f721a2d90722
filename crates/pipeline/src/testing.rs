//! Shared scripted fakes and fixtures for pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use qbrgen_core::domain::record::{Channel, CustomerRecord, NormalizedRecord, PlanType, TicketRatio};
use qbrgen_core::domain::report::{KeyMetric, QbrOutput, Recommendation, StoryType};

use crate::llm::{ChatModel, TransportFailure};

/// Replays a fixed script of responses, one per call, and counts the
/// calls. An exhausted script fails the call loudly so a test that
/// over-calls the model cannot pass by accident.
pub(crate) struct ScriptedChatModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedChatModel {
    pub(crate) fn new(script: Vec<Result<&str, &str>>) -> Self {
        let responses = script
            .into_iter()
            .map(|entry| match entry {
                Ok(text) => Ok(text.to_string()),
                Err(message) => Err(message.to_string()),
            })
            .collect();
        Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().expect("script lock").pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(TransportFailure::new(message)),
            None => Err(TransportFailure::new("scripted responses exhausted")),
        }
    }
}

/// A healthy, unremarkable account that classifies as a stable story.
pub(crate) fn record_fixture() -> CustomerRecord {
    CustomerRecord {
        account_name: "Initech".to_string(),
        plan_type: PlanType::Standard,
        active_users: 100,
        usage_growth_qoq: 0.05,
        automation_adoption_pct: 0.4,
        tickets_last_quarter: 8,
        avg_response_time_hours: 6.0,
        nps_score: 7,
        preferred_channel: Channel::Slack,
        scat_score: 70,
        risk_engine_score: 0.1,
        crm_notes: "Asked about onboarding resources for the ops team.".to_string(),
        feedback_summary: "Happy with the dashboards overall.".to_string(),
    }
}

pub(crate) fn normalized_fixture() -> NormalizedRecord {
    let record = record_fixture();
    NormalizedRecord {
        account_name: record.account_name,
        plan_type: record.plan_type,
        active_users: record.active_users,
        usage_growth_qoq: record.usage_growth_qoq,
        automation_adoption_pct: record.automation_adoption_pct,
        tickets_last_quarter: record.tickets_last_quarter,
        avg_response_time_hours: record.avg_response_time_hours,
        nps_score: record.nps_score,
        preferred_channel: record.preferred_channel,
        scat_score: record.scat_score,
        risk_engine_score: record.risk_engine_score,
        crm_notes: record.crm_notes,
        feedback_summary: record.feedback_summary,
        ticket_per_user_ratio: TicketRatio::PerUser(0.08),
    }
}

/// A well-formed generator answer for the fixture account: stable
/// story, clean citations, no rule language, all sections present.
pub(crate) fn stable_output() -> QbrOutput {
    QbrOutput {
        account_name: "Initech".to_string(),
        executive_summary: "Initech had a steady quarter with healthy usage and a solid NPS of 7. \
                            The relationship is in a good place to build on."
            .to_string(),
        story_type: StoryType::Stable,
        key_metrics: vec![
            KeyMetric {
                label: "NPS".to_string(),
                value: "7/10".to_string(),
                source_field: "nps_score".to_string(),
            },
            KeyMetric {
                label: "Usage Growth".to_string(),
                value: "5.0%".to_string(),
                source_field: "usage_growth_qoq".to_string(),
            },
        ],
        risks: Vec::new(),
        recommendations: vec![Recommendation {
            action: "Schedule a walkthrough of the automation center for the ops team".to_string(),
            rationale: "The team asked about onboarding resources, and 40% automation adoption \
                        leaves meaningful manual work on the table."
                .to_string(),
            evidence: "automation_adoption_pct, crm_notes".to_string(),
        }],
        next_steps: vec![
            "Book the automation walkthrough within two weeks (CSM & Client)".to_string(),
            "Share the onboarding resource pack (CSM)".to_string(),
        ],
        confidence_score: 0.82,
        raw_markdown: "## Executive Summary\nInitech had a steady quarter with healthy usage and \
                       a solid NPS of 7.\n\n## Key Metrics & Wins\n- NPS: 7/10\n- Usage growth: \
                       5.0%\n\n## Challenges & Risks\nNothing pressing this quarter; onboarding \
                       questions from the ops team are worth following up.\n\n## Strategic \
                       Recommendations\nSchedule a walkthrough of the automation center for the \
                       ops team.\n\n## Next Steps\n- Book the automation walkthrough within two \
                       weeks (CSM & Client)\n- Share the onboarding resource pack (CSM)"
            .to_string(),
    }
}

pub(crate) fn stable_output_json() -> String {
    serde_json::to_string(&stable_output()).expect("fixture serializes")
}
