use thiserror::Error;

use qbrgen_core::classify::classify;
use qbrgen_core::config::ClassifierThresholds;
use qbrgen_core::domain::record::CustomerRecord;
use qbrgen_core::domain::report::{Disposition, QbrOutcome};
use qbrgen_core::errors::PipelineError;
use qbrgen_core::normalize::normalize;

use crate::generator::Generator;
use crate::judge::Judge;
use crate::prompt::assemble;

/// How many judge-driven regeneration rounds follow the initial
/// attempt. A budget of 2 means at most 3 generator invocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget: u32,
}

/// Controller states for one account invocation. `attempt` is
/// 1-based and counts generator rounds, not transport retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Generating { attempt: u32 },
    Validating { attempt: u32 },
    Retrying { next_attempt: u32 },
    Accepted,
    Degraded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEvent {
    Generated,
    VerdictPassed,
    VerdictFailed,
    RetryStarted,
    HardFailure,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: RunState,
    pub to: RunState,
    pub event: RunEvent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RunState, event: RunEvent },
}

/// Pure transition function. Termination is structural: every
/// VerdictFailed either increments the attempt toward the budget or
/// lands in Degraded, and Accepted/Degraded/Failed have no outgoing
/// edges.
pub fn transition(
    current: &RunState,
    event: &RunEvent,
    policy: &RetryPolicy,
) -> Result<TransitionOutcome, TransitionError> {
    use RunEvent::{Generated, HardFailure, RetryStarted, VerdictFailed, VerdictPassed};
    use RunState::{Accepted, Degraded, Failed, Generating, Retrying, Validating};

    let to = match (current, event) {
        (Generating { attempt }, Generated) => Validating { attempt: *attempt },
        (Validating { .. }, VerdictPassed) => Accepted,
        (Validating { attempt }, VerdictFailed) => {
            if *attempt <= policy.budget {
                Retrying { next_attempt: attempt + 1 }
            } else {
                Degraded
            }
        }
        (Retrying { next_attempt }, RetryStarted) => Generating { attempt: *next_attempt },
        (Generating { .. }, HardFailure) | (Validating { .. }, HardFailure) => Failed,
        _ => {
            return Err(TransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone() })
}

/// One account's full generate-validate-retry invocation. Owns no
/// mutable state between runs; concurrent invocations share nothing
/// but the underlying HTTP clients.
pub struct Pipeline {
    generator: Generator,
    judge: Judge,
    policy: RetryPolicy,
    thresholds: ClassifierThresholds,
}

impl Pipeline {
    pub fn new(
        generator: Generator,
        judge: Judge,
        policy: RetryPolicy,
        thresholds: ClassifierThresholds,
    ) -> Self {
        Self { generator, judge, policy, thresholds }
    }

    pub async fn run(&self, record: &CustomerRecord) -> Result<QbrOutcome, PipelineError> {
        let normalized = normalize(record)?;
        let classification = classify(&normalized, &self.thresholds);

        tracing::info!(
            event_name = "qbr.invocation_started",
            account = %normalized.account_name,
            story_type = classification.story_type.as_str(),
            risk_tier = classification.risk_tier.as_str(),
            "classified, entering generation"
        );

        let base = assemble(&normalized, &classification);
        let mut state = RunState::Generating { attempt: 1 };
        let mut request = base.clone();
        let mut attempt = 1u32;

        loop {
            tracing::debug!(
                event_name = "qbr.generation_attempt",
                account = %normalized.account_name,
                attempt,
                "calling generator"
            );

            let output = match self.generator.generate(&request, &classification).await {
                Ok(output) => output,
                Err(error) => {
                    self.advance(&mut state, RunEvent::HardFailure);
                    tracing::error!(
                        event_name = "qbr.invocation_failed",
                        account = %normalized.account_name,
                        attempt,
                        error = %error,
                        "generation failed hard"
                    );
                    return Err(error);
                }
            };
            self.advance(&mut state, RunEvent::Generated);

            let report = match self.judge.review(&output, &normalized, &classification).await {
                Ok(report) => report,
                Err(error) => {
                    self.advance(&mut state, RunEvent::HardFailure);
                    tracing::error!(
                        event_name = "qbr.invocation_failed",
                        account = %normalized.account_name,
                        attempt,
                        error = %error,
                        "judge call failed hard"
                    );
                    return Err(error);
                }
            };

            if report.passed {
                self.advance(&mut state, RunEvent::VerdictPassed);
                tracing::info!(
                    event_name = "qbr.invocation_accepted",
                    account = %normalized.account_name,
                    attempts = attempt,
                    "review passed"
                );
                return Ok(QbrOutcome {
                    output,
                    disposition: Disposition::Accepted,
                    unresolved_issues: Vec::new(),
                    generator_attempts: attempt,
                });
            }

            self.advance(&mut state, RunEvent::VerdictFailed);
            match &state {
                RunState::Retrying { next_attempt } => {
                    let next_attempt = *next_attempt;
                    tracing::info!(
                        event_name = "qbr.retry_scheduled",
                        account = %normalized.account_name,
                        attempt,
                        issues = report.issues.len(),
                        "verdict failed, regenerating with feedback"
                    );
                    request = base.with_feedback(&report.issues);
                    attempt = next_attempt;
                    self.advance(&mut state, RunEvent::RetryStarted);
                }
                _ => {
                    tracing::warn!(
                        event_name = "qbr.invocation_degraded",
                        account = %normalized.account_name,
                        attempts = attempt,
                        unresolved = report.issues.len(),
                        "budget exhausted, returning last draft with issues"
                    );
                    return Ok(QbrOutcome {
                        output,
                        disposition: Disposition::Degraded,
                        unresolved_issues: report.issues,
                        generator_attempts: attempt,
                    });
                }
            }
        }
    }

    // The driver only emits events that are legal in its current
    // state; an invalid pair would be a controller bug, so it pins the
    // run to Failed rather than panicking.
    fn advance(&self, state: &mut RunState, event: RunEvent) {
        *state = match transition(state, &event, &self.policy) {
            Ok(outcome) => outcome.to,
            Err(_) => RunState::Failed,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use qbrgen_core::config::ClassifierThresholds;
    use qbrgen_core::domain::report::Disposition;
    use qbrgen_core::errors::PipelineError;

    use super::{transition, Pipeline, RetryPolicy, RunEvent, RunState};
    use crate::generator::Generator;
    use crate::judge::Judge;
    use crate::testing::{record_fixture, stable_output_json, ScriptedChatModel};

    const PASS_VERDICT: &str = "{\"issues\": []}";
    const FAIL_VERDICT: &str = "{\"issues\": [{\"category\": \"data_grounding\", \
                                \"detail\": \"cites an uplift figure not in the data\"}]}";

    fn pipeline(
        generator_model: Arc<ScriptedChatModel>,
        judge_model: Arc<ScriptedChatModel>,
        budget: u32,
    ) -> Pipeline {
        Pipeline::new(
            Generator::new(generator_model),
            Judge::new(judge_model, 3),
            RetryPolicy { budget },
            ClassifierThresholds::default(),
        )
    }

    #[test]
    fn verdict_failures_within_budget_schedule_a_retry() {
        let policy = RetryPolicy { budget: 2 };

        let outcome =
            transition(&RunState::Validating { attempt: 1 }, &RunEvent::VerdictFailed, &policy)
                .expect("legal transition");
        assert_eq!(outcome.to, RunState::Retrying { next_attempt: 2 });

        let outcome =
            transition(&RunState::Validating { attempt: 3 }, &RunEvent::VerdictFailed, &policy)
                .expect("legal transition");
        assert_eq!(outcome.to, RunState::Degraded);
    }

    #[test]
    fn terminal_states_accept_no_events() {
        let policy = RetryPolicy { budget: 2 };
        for terminal in [RunState::Accepted, RunState::Degraded, RunState::Failed] {
            for event in [
                RunEvent::Generated,
                RunEvent::VerdictPassed,
                RunEvent::VerdictFailed,
                RunEvent::RetryStarted,
                RunEvent::HardFailure,
            ] {
                assert!(transition(&terminal, &event, &policy).is_err());
            }
        }
    }

    #[test]
    fn zero_budget_degrades_after_the_first_failed_verdict() {
        let policy = RetryPolicy { budget: 0 };
        let outcome =
            transition(&RunState::Validating { attempt: 1 }, &RunEvent::VerdictFailed, &policy)
                .expect("legal transition");
        assert_eq!(outcome.to, RunState::Degraded);
    }

    #[tokio::test]
    async fn first_attempt_pass_uses_one_generator_call() {
        let valid = stable_output_json();
        let generator_model = Arc::new(ScriptedChatModel::new(vec![Ok(&valid)]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![Ok(PASS_VERDICT)]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let outcome = pipeline.run(&record_fixture()).await.expect("run should succeed");

        assert_eq!(outcome.disposition, Disposition::Accepted);
        assert_eq!(outcome.generator_attempts, 1);
        assert!(outcome.unresolved_issues.is_empty());
        assert_eq!(generator_model.calls(), 1);
        assert_eq!(judge_model.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_yields_degraded_with_unresolved_issues() {
        let valid = stable_output_json();
        let generator_model =
            Arc::new(ScriptedChatModel::new(vec![Ok(&valid), Ok(&valid), Ok(&valid)]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![
            Ok(FAIL_VERDICT),
            Ok(FAIL_VERDICT),
            Ok(FAIL_VERDICT),
        ]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let outcome = pipeline.run(&record_fixture()).await.expect("degraded is not an error");

        assert_eq!(outcome.disposition, Disposition::Degraded);
        assert_eq!(outcome.generator_attempts, 3);
        assert!(!outcome.unresolved_issues.is_empty());
        // budget 2 means exactly budget + 1 generator invocations
        assert_eq!(generator_model.calls(), 3);
        assert_eq!(judge_model.calls(), 3);
    }

    #[tokio::test]
    async fn second_round_can_recover_after_feedback() {
        let valid = stable_output_json();
        let generator_model = Arc::new(ScriptedChatModel::new(vec![Ok(&valid), Ok(&valid)]));
        let judge_model =
            Arc::new(ScriptedChatModel::new(vec![Ok(FAIL_VERDICT), Ok(PASS_VERDICT)]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let outcome = pipeline.run(&record_fixture()).await.expect("second round should pass");

        assert_eq!(outcome.disposition, Disposition::Accepted);
        assert_eq!(outcome.generator_attempts, 2);
        assert_eq!(generator_model.calls(), 2);
    }

    #[tokio::test]
    async fn generator_transport_exhaustion_fails_the_run() {
        let generator_model =
            Arc::new(ScriptedChatModel::new(vec![Err("gateway timeout"), Err("gateway timeout")]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let error = pipeline.run(&record_fixture()).await.expect_err("transport must fail hard");

        assert!(matches!(error, PipelineError::Transport { .. }));
        // one call plus one transport retry, never the judge budget
        assert_eq!(generator_model.calls(), 2);
        assert_eq!(judge_model.calls(), 0);
    }

    #[tokio::test]
    async fn schema_repair_does_not_consume_the_judge_budget() {
        let valid = stable_output_json();
        let generator_model =
            Arc::new(ScriptedChatModel::new(vec![Ok("no json here"), Ok(&valid)]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![Ok(PASS_VERDICT)]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let outcome = pipeline.run(&record_fixture()).await.expect("repair round should succeed");

        assert_eq!(outcome.disposition, Disposition::Accepted);
        assert_eq!(outcome.generator_attempts, 1);
        assert_eq!(generator_model.calls(), 2);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_model_call() {
        let generator_model = Arc::new(ScriptedChatModel::new(vec![]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![]));
        let pipeline = pipeline(generator_model.clone(), judge_model.clone(), 2);

        let mut record = record_fixture();
        record.nps_score = 42;

        let error = pipeline.run(&record).await.expect_err("invalid input must be rejected");

        assert!(matches!(error, PipelineError::InputValidation { .. }));
        assert_eq!(generator_model.calls(), 0);
        assert_eq!(judge_model.calls(), 0);
    }
}
