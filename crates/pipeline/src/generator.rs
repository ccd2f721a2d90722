use std::sync::Arc;

use qbrgen_core::domain::classification::Classification;
use qbrgen_core::domain::report::QbrOutput;
use qbrgen_core::errors::{CallStage, PipelineError};

use crate::llm::{complete_with_retry, ChatModel};
use crate::prompt::GenerationRequest;

/// Drives one generator call, including the single schema-repair
/// retry. Transport retries live below this layer in
/// `complete_with_retry`; judge-driven regeneration lives above it in
/// the retry controller.
pub struct Generator {
    model: Arc<dyn ChatModel>,
}

impl Generator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        classification: &Classification,
    ) -> Result<QbrOutput, PipelineError> {
        let text = complete_with_retry(
            self.model.as_ref(),
            CallStage::Generator,
            &request.system,
            &request.user,
        )
        .await?;

        let reason = match parse_output(&text, classification) {
            Ok(output) => return Ok(output),
            Err(reason) => reason,
        };

        tracing::warn!(
            event_name = "qbr.schema_repair",
            reason = %reason,
            "generator response rejected, repairing once"
        );

        let repaired = request.with_repair_hint(&reason);
        let text = complete_with_retry(
            self.model.as_ref(),
            CallStage::Generator,
            &repaired.system,
            &repaired.user,
        )
        .await?;

        parse_output(&text, classification).map_err(PipelineError::schema)
    }
}

/// Parse and shape-check one model response. Models often wrap JSON in
/// prose or code fences, so the slice between the first `{` and the
/// last `}` is taken before parsing.
fn parse_output(text: &str, classification: &Classification) -> Result<QbrOutput, String> {
    let json = extract_json(text).ok_or_else(|| "response contains no JSON object".to_string())?;

    let output: QbrOutput =
        serde_json::from_str(json).map_err(|err| format!("document does not parse: {err}"))?;

    if output.story_type != classification.story_type {
        return Err(format!(
            "story_type `{}` does not match the assigned `{}`",
            output.story_type.as_str(),
            classification.story_type.as_str()
        ));
    }

    if !output.confidence_score.is_finite() || !(0.0..=1.0).contains(&output.confidence_score) {
        return Err(format!(
            "confidence_score {} is outside [0, 1]",
            output.confidence_score
        ));
    }

    Ok(output)
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
