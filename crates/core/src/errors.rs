use thiserror::Error;

/// Which external call a transport failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallStage {
    Generator,
    Judge,
}

impl CallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Judge => "judge",
        }
    }
}

/// Hard-failure taxonomy for one account's pipeline invocation.
///
/// Judge rejections are deliberately absent: a failed validation is
/// absorbed into the degraded outcome and never surfaces as an error.
/// Payloads are strings so errors stay cloneable across batch results.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid input for account `{account}`: {}", reasons.join("; "))]
    InputValidation { account: String, reasons: Vec<String> },
    #[error("{} call failed after transport retry: {message}", stage.as_str())]
    Transport { stage: CallStage, message: String },
    #[error("model response did not fit the report schema after repair retry: {message}")]
    SchemaParse { message: String },
}

impl PipelineError {
    pub fn input(account: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::InputValidation { account: account.into(), reasons }
    }

    pub fn transport(stage: CallStage, message: impl Into<String>) -> Self {
        Self::Transport { stage, message: message.into() }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaParse { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallStage, PipelineError};

    #[test]
    fn input_validation_lists_every_reason() {
        let error = PipelineError::input(
            "Globex",
            vec!["nps_score out of range".to_string(), "risk_engine_score is NaN".to_string()],
        );
        let message = error.to_string();
        assert!(message.contains("Globex"));
        assert!(message.contains("nps_score out of range; risk_engine_score is NaN"));
    }

    #[test]
    fn transport_error_names_the_stage() {
        let error = PipelineError::transport(CallStage::Judge, "request timed out");
        assert!(error.to_string().contains("judge"));
    }
}
