use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use qbrgen_core::domain::record::CustomerRecord;
use qbrgen_core::domain::report::QbrOutcome;
use qbrgen_core::errors::{CallStage, PipelineError};

use crate::runner::Pipeline;

/// One account's result inside a batch. Failures stay per-item; the
/// batch itself never fails.
#[derive(Debug)]
pub struct BatchItem {
    pub account_name: String,
    pub result: Result<QbrOutcome, PipelineError>,
}

/// Run every record through the pipeline with at most
/// `max_concurrency` invocations in flight. Results come back in
/// input order. Retry budgets are per-invocation; one account's
/// failure or exhaustion never touches another's.
pub async fn run_batch(
    pipeline: Arc<Pipeline>,
    records: Vec<CustomerRecord>,
    max_concurrency: usize,
) -> Vec<BatchItem> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            // The semaphore is never closed; a failed acquire would
            // only drop the concurrency bound, not the work.
            let _permit = semaphore.acquire_owned().await.ok();
            let result = pipeline.run(&record).await;
            (index, BatchItem { account_name: record.account_name, result })
        });
    }

    let mut slots: Vec<Option<BatchItem>> = Vec::new();
    slots.resize_with(tasks.len(), || None);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, item)) => slots[index] = Some(item),
            Err(join_error) => {
                tracing::error!(
                    event_name = "qbr.batch_task_lost",
                    error = %join_error,
                    "batch worker did not complete"
                );
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| BatchItem {
                account_name: format!("record #{index}"),
                result: Err(PipelineError::transport(
                    CallStage::Generator,
                    "batch worker did not complete",
                )),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use qbrgen_core::config::ClassifierThresholds;
    use qbrgen_core::domain::report::Disposition;
    use qbrgen_core::errors::PipelineError;

    use super::run_batch;
    use crate::generator::Generator;
    use crate::judge::Judge;
    use crate::runner::{Pipeline, RetryPolicy};
    use crate::testing::{record_fixture, stable_output_json, ScriptedChatModel};

    const PASS_VERDICT: &str = "{\"issues\": []}";

    #[tokio::test]
    async fn one_poisoned_record_does_not_abort_the_batch() {
        let valid = stable_output_json();
        // two healthy accounts: 2 generator calls and 2 verdicts
        let generator_model = Arc::new(ScriptedChatModel::new(vec![Ok(&valid), Ok(&valid)]));
        let judge_model =
            Arc::new(ScriptedChatModel::new(vec![Ok(PASS_VERDICT), Ok(PASS_VERDICT)]));
        let pipeline = Arc::new(Pipeline::new(
            Generator::new(generator_model),
            Judge::new(judge_model, 3),
            RetryPolicy { budget: 2 },
            ClassifierThresholds::default(),
        ));

        let mut poisoned = record_fixture();
        poisoned.account_name = "Globex".to_string();
        poisoned.scat_score = 200;

        let mut healthy_one = record_fixture();
        healthy_one.account_name = "Initech".to_string();
        let mut healthy_two = record_fixture();
        healthy_two.account_name = "Hooli".to_string();

        // run sequentially so the scripted responses pair up per account
        let items = run_batch(
            Arc::clone(&pipeline),
            vec![healthy_one, poisoned, healthy_two],
            1,
        )
        .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].account_name, "Initech");
        assert_eq!(items[1].account_name, "Globex");
        assert_eq!(items[2].account_name, "Hooli");

        assert!(matches!(
            items[1].result,
            Err(PipelineError::InputValidation { .. })
        ));
        for index in [0, 2] {
            let outcome = items[index].result.as_ref().expect("healthy account succeeds");
            assert_eq!(outcome.disposition, Disposition::Accepted);
            assert_eq!(outcome.generator_attempts, 1);
        }
    }

    #[tokio::test]
    async fn results_preserve_input_order_under_concurrency() {
        let valid = stable_output_json();
        let generator_model = Arc::new(ScriptedChatModel::new(vec![
            Ok(&valid),
            Ok(&valid),
            Ok(&valid),
            Ok(&valid),
        ]));
        let judge_model = Arc::new(ScriptedChatModel::new(vec![
            Ok(PASS_VERDICT),
            Ok(PASS_VERDICT),
            Ok(PASS_VERDICT),
            Ok(PASS_VERDICT),
        ]));
        let pipeline = Arc::new(Pipeline::new(
            Generator::new(generator_model),
            Judge::new(judge_model, 3),
            RetryPolicy { budget: 2 },
            ClassifierThresholds::default(),
        ));

        let names = ["Acme", "Initech", "Globex", "Hooli"];
        let records = names
            .iter()
            .map(|name| {
                let mut record = record_fixture();
                record.account_name = (*name).to_string();
                record
            })
            .collect();

        let items = run_batch(pipeline, records, 4).await;

        let got: Vec<&str> = items.iter().map(|item| item.account_name.as_str()).collect();
        assert_eq!(got, names);
        assert!(items.iter().all(|item| item.result.is_ok()));
    }
}
