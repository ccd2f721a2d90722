use std::fmt::Write as _;

use qbrgen_core::domain::classification::Classification;
use qbrgen_core::domain::record::{NormalizedRecord, TicketRatio};
use qbrgen_core::domain::validation::Issue;

/// A fully assembled pair of chat messages for one generator call.
/// Immutable; retry variants are produced by `with_feedback` and
/// `with_repair_hint` without touching the original.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
}

impl GenerationRequest {
    /// Augment the request with the judge's unresolved issues for a
    /// regeneration round. Always derived from the base request so
    /// hints never stack across rounds.
    pub fn with_feedback(&self, issues: &[Issue]) -> Self {
        let mut user = self.user.clone();
        user.push_str("\n\n## REVISION REQUIRED\n");
        user.push_str(
            "A reviewer rejected the previous draft. Fix every issue below and \
             regenerate the complete JSON document:\n",
        );
        for issue in issues {
            let _ = writeln!(user, "- [{}] {}", issue.category.as_str(), issue.detail);
        }
        Self { system: self.system.clone(), user }
    }

    /// Augment the request after a response that did not parse as the
    /// required document.
    pub fn with_repair_hint(&self, reason: &str) -> Self {
        let mut user = self.user.clone();
        let _ = write!(
            user,
            "\n\n## FORMAT REPAIR\nThe previous response could not be used: {reason}. \
             Respond with ONLY the JSON object described in the instructions, with \
             every field present. No prose, no code fences."
        );
        Self { system: self.system.clone(), user }
    }
}

/// Build the generation request for one account. Pure: same record and
/// classification always produce the same messages. The story type is
/// pinned by the deterministic classifier; the model narrates it but
/// never picks it.
pub fn assemble(record: &NormalizedRecord, classification: &Classification) -> GenerationRequest {
    GenerationRequest {
        system: system_prompt(classification),
        user: user_prompt(record),
    }
}

fn system_prompt(classification: &Classification) -> String {
    let story = classification.story_type.as_str();
    format!(
        "# Identity\n\
         You are an expert Customer Success Manager with 10+ years of experience in \
         SaaS retention and expansion. You write quarterly business reviews that are \
         data-driven, warm, and actionable.\n\n\
         # Core Constraints\n\
         1. ONLY reference data explicitly provided. Never invent metrics, events, \
         meetings, or conversations.\n\
         2. Mention actual values from the data and explain why they matter in plain \
         business language.\n\
         3. Prefer action verbs: \"Activate\", \"Enable\", \"Schedule\" rather than \
         \"consider\" or \"explore\".\n\n\
         # Language Rules\n\
         - NEVER expose internal formulas or decision rules.\n\
         - NEVER use comparison operators (>, <, =) when explaining recommendations.\n\
         - NEVER say \"threshold\", \"triggers\", or \"criteria\".\n\n\
         # Story Directive\n\
         This account has already been classified. Frame the entire review as a \
         \"{story}\" story and set the story_type field to exactly \"{story}\". Do \
         not choose a different story type.\n\n\
         # Output Format\n\
         Respond with ONLY a JSON object, no prose and no code fences, matching:\n\
         {{\n\
           \"account_name\": string (must equal the provided account name),\n\
           \"executive_summary\": string (2-3 sentences),\n\
           \"story_type\": \"{story}\",\n\
           \"key_metrics\": [{{\"label\": string, \"value\": string, \"source_field\": string}}],\n\
           \"risks\": [{{\"description\": string, \"severity\": \"low\"|\"medium\"|\"high\", \"evidence\": string}}],\n\
           \"recommendations\": [{{\"action\": string, \"rationale\": string, \"evidence\": string}}],\n\
           \"next_steps\": [string, at least two entries],\n\
           \"confidence_score\": number between 0 and 1,\n\
           \"raw_markdown\": string (the full QBR as Markdown with sections: \
         Executive Summary, Key Metrics & Wins, Challenges & Risks, Strategic \
         Recommendations, Next Steps)\n\
         }}\n\n\
         Every source_field must be one of: {fields}.",
        story = story,
        fields = NormalizedRecord::SOURCE_FIELDS.join(", "),
    )
}

fn user_prompt(record: &NormalizedRecord) -> String {
    let ratio = match record.ticket_per_user_ratio {
        TicketRatio::PerUser(value) => format!("{value:.2}"),
        TicketRatio::Undefined => "undefined (no active users)".to_string(),
    };

    format!(
        "Generate the quarterly business review for the customer below.\n\n\
         ## ACCOUNT SNAPSHOT\n\
         - Account Name: {account}\n\
         - Plan Type: {plan}\n\
         - Active Users: {users}\n\
         - Usage Growth (QoQ): {growth:.1}%\n\
         - Automation Adoption: {automation:.1}%\n\
         - Support Tickets (Last Quarter): {tickets}\n\
         - Tickets Per User: {ratio}\n\
         - Average Response Time: {response:.1} hours\n\
         - NPS Score: {nps}/10\n\
         - Preferred Channel: {channel}\n\
         - Health Score (SCAT): {scat}/100\n\
         - Churn Risk Score: {risk:.2}\n\n\
         ## QUALITATIVE CONTEXT\n\
         CRM Notes: {notes}\n\
         Customer Feedback: {feedback}",
        account = record.account_name,
        plan = record.plan_type.as_str(),
        users = record.active_users,
        growth = record.usage_growth_qoq * 100.0,
        automation = record.automation_adoption_pct * 100.0,
        tickets = record.tickets_last_quarter,
        ratio = ratio,
        response = record.avg_response_time_hours,
        nps = record.nps_score,
        channel = record.preferred_channel.display_name(),
        scat = record.scat_score,
        risk = record.risk_engine_score,
        notes = record.crm_notes,
        feedback = record.feedback_summary,
    )
}
