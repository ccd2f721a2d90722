use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use qbrgen_core::config::AppConfig;
use qbrgen_core::domain::report::Disposition;
use qbrgen_pipeline::run_batch;

use super::{build_pipeline, load_records, write_artifact};

pub async fn run(config: &AppConfig, input: &Path, out_dir: &Path) -> Result<()> {
    let records = load_records(input)?;
    let total = records.len();
    let pipeline = Arc::new(build_pipeline(config)?);

    let items = run_batch(pipeline, records, config.batch.max_concurrency).await;

    let mut accepted = 0usize;
    let mut degraded = 0usize;
    let mut failed = 0usize;

    for item in &items {
        match &item.result {
            Ok(outcome) => {
                let path = write_artifact(out_dir, outcome)?;
                match outcome.disposition {
                    Disposition::Accepted => {
                        accepted += 1;
                        println!("accepted: {} -> {}", item.account_name, path.display());
                    }
                    Disposition::Degraded => {
                        degraded += 1;
                        println!(
                            "degraded: {} ({} unresolved issue(s)) -> {}",
                            item.account_name,
                            outcome.unresolved_issues.len(),
                            path.display()
                        );
                    }
                }
            }
            Err(error) => {
                failed += 1;
                println!("failed:   {}: {error}", item.account_name);
            }
        }
    }

    println!(
        "batch complete: {total} record(s), {accepted} accepted, {degraded} degraded, \
         {failed} failed"
    );
    Ok(())
}
