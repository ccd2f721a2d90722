use crate::domain::record::{CustomerRecord, NormalizedRecord, TicketRatio};
use crate::errors::PipelineError;

/// Coerce one percentage-like value to the [0,1] convention. A
/// magnitude above 1 is assumed to already be on a 0-100 scale.
/// Applied per-field, not per-record: a dataset may mix both
/// representations within a single row.
fn coerce_fraction(value: f64) -> f64 {
    if value.abs() > 1.0 {
        value / 100.0
    } else {
        value
    }
}

/// Canonicalize a raw record's numeric fields and derive the ticket
/// ratio. Fails with an input-validation error naming every offending
/// field; a failed record is skipped in batch mode, never retried.
pub fn normalize(record: &CustomerRecord) -> Result<NormalizedRecord, PipelineError> {
    let mut reasons = Vec::new();

    for (name, value) in [
        ("usage_growth_qoq", record.usage_growth_qoq),
        ("automation_adoption_pct", record.automation_adoption_pct),
        ("avg_response_time_hours", record.avg_response_time_hours),
        ("risk_engine_score", record.risk_engine_score),
    ] {
        if !value.is_finite() {
            reasons.push(format!("{name} is not a finite number"));
        }
    }

    if record.automation_adoption_pct.is_finite() && record.automation_adoption_pct < 0.0 {
        reasons.push("automation_adoption_pct must be non-negative".to_string());
    }
    if record.avg_response_time_hours.is_finite() && record.avg_response_time_hours < 0.0 {
        reasons.push("avg_response_time_hours must be non-negative".to_string());
    }
    if record.risk_engine_score.is_finite() && record.risk_engine_score < 0.0 {
        reasons.push("risk_engine_score must be non-negative".to_string());
    }
    if record.nps_score > 10 {
        reasons.push(format!("nps_score {} exceeds the 0-10 scale", record.nps_score));
    }
    if record.scat_score > 100 {
        reasons.push(format!("scat_score {} exceeds the 0-100 scale", record.scat_score));
    }
    if record.account_name.trim().is_empty() {
        reasons.push("account_name is empty".to_string());
    }

    let automation_adoption_pct = coerce_fraction(record.automation_adoption_pct);
    let risk_engine_score = coerce_fraction(record.risk_engine_score);
    let usage_growth_qoq = coerce_fraction(record.usage_growth_qoq);

    if reasons.is_empty() && !(0.0..=1.0).contains(&automation_adoption_pct) {
        reasons.push(format!(
            "automation_adoption_pct {} is outside both accepted scales",
            record.automation_adoption_pct
        ));
    }
    if reasons.is_empty() && !(0.0..=1.0).contains(&risk_engine_score) {
        reasons.push(format!(
            "risk_engine_score {} is outside both accepted scales",
            record.risk_engine_score
        ));
    }

    if !reasons.is_empty() {
        return Err(PipelineError::input(record.account_name.clone(), reasons));
    }

    let ticket_per_user_ratio = if record.active_users == 0 {
        TicketRatio::Undefined
    } else {
        TicketRatio::PerUser(f64::from(record.tickets_last_quarter) / f64::from(record.active_users))
    };

    Ok(NormalizedRecord {
        account_name: record.account_name.clone(),
        plan_type: record.plan_type,
        active_users: record.active_users,
        usage_growth_qoq,
        automation_adoption_pct,
        tickets_last_quarter: record.tickets_last_quarter,
        avg_response_time_hours: record.avg_response_time_hours,
        nps_score: record.nps_score,
        preferred_channel: record.preferred_channel,
        scat_score: record.scat_score,
        risk_engine_score,
        crm_notes: record.crm_notes.clone(),
        feedback_summary: record.feedback_summary.clone(),
        ticket_per_user_ratio,
    })
}
