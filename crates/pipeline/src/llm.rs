use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use qbrgen_core::config::{JudgeConfig, LlmConfig};
use qbrgen_core::errors::{CallStage, PipelineError};

/// A failed round trip to a chat model. Carries no stage: the caller
/// decides how the failure maps into the pipeline taxonomy.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TransportFailure>;
}

/// One transport-level retry, then a hard failure. This retry is
/// distinct from the judge-driven regeneration budget: it covers the
/// single call only and never re-enters validation.
pub async fn complete_with_retry(
    model: &dyn ChatModel,
    stage: CallStage,
    system: &str,
    user: &str,
) -> Result<String, PipelineError> {
    match model.complete(system, user).await {
        Ok(text) => Ok(text),
        Err(first) => {
            tracing::warn!(
                event_name = "llm.transport_retry",
                stage = stage.as_str(),
                error = %first,
                "model call failed, retrying once"
            );
            model
                .complete(system, user)
                .await
                .map_err(|second| PipelineError::transport(stage, second.message))
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint. One
/// instance per role (generator, judge) so model name, temperature,
/// and timeout stay per-role.
#[derive(Clone, Debug)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f64,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportFailure::new(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature,
        })
    }

    pub fn for_generator(llm: &LlmConfig) -> Result<Self, TransportFailure> {
        let api_key = llm
            .api_key
            .clone()
            .ok_or_else(|| TransportFailure::new("llm.api_key is not configured"))?;
        Self::new(
            llm.base_url.clone(),
            api_key,
            llm.model.clone(),
            llm.temperature,
            Duration::from_secs(llm.timeout_secs),
        )
    }

    /// The judge runs at temperature zero so repeated verdicts over the
    /// same draft agree.
    pub fn for_judge(llm: &LlmConfig, judge: &JudgeConfig) -> Result<Self, TransportFailure> {
        let api_key = llm
            .api_key
            .clone()
            .ok_or_else(|| TransportFailure::new("llm.api_key is not configured"))?;
        Self::new(
            llm.base_url.clone(),
            api_key,
            judge.model.clone(),
            0.0,
            Duration::from_secs(judge.timeout_secs),
        )
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TransportFailure> {
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportFailure::new(format!("chat completion request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportFailure::new(format!(
                "chat completion returned status {status}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| TransportFailure::new(format!("chat completion body unreadable: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TransportFailure::new("chat completion carried no choices"))
    }
}

#[cfg(test)]
mod tests {
    use qbrgen_core::errors::{CallStage, PipelineError};

    use super::complete_with_retry;
    use crate::testing::ScriptedChatModel;

    #[tokio::test]
    async fn transient_failure_is_retried_once_and_recovers() {
        let model =
            ScriptedChatModel::new(vec![Err("connection reset"), Ok("second attempt answer")]);

        let text = complete_with_retry(&model, CallStage::Generator, "sys", "user")
            .await
            .expect("retry should recover");

        assert_eq!(text, "second attempt answer");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn two_consecutive_failures_become_a_transport_error() {
        let model = ScriptedChatModel::new(vec![Err("timeout"), Err("timeout again")]);

        let error = complete_with_retry(&model, CallStage::Judge, "sys", "user")
            .await
            .expect_err("second failure must be terminal");

        assert_eq!(model.calls(), 2);
        let PipelineError::Transport { stage, message } = error else {
            panic!("expected transport error");
        };
        assert_eq!(stage, CallStage::Judge);
        assert!(message.contains("timeout again"));
    }
}
