use std::path::Path;

use anyhow::{bail, Result};

use qbrgen_core::config::AppConfig;
use qbrgen_core::domain::report::Disposition;

use super::{build_pipeline, load_records, write_artifact};

pub async fn run(
    config: &AppConfig,
    input: &Path,
    account: &str,
    out_dir: &Path,
) -> Result<()> {
    let records = load_records(input)?;
    let Some(record) = records.into_iter().find(|record| record.account_name == account) else {
        bail!("account `{account}` not found in `{}`", input.display());
    };

    let pipeline = build_pipeline(config)?;
    let outcome = pipeline.run(&record).await?;
    let path = write_artifact(out_dir, &outcome)?;

    match outcome.disposition {
        Disposition::Accepted => {
            println!(
                "accepted: {account} ({} attempt(s)) -> {}",
                outcome.generator_attempts,
                path.display()
            );
        }
        Disposition::Degraded => {
            println!(
                "degraded: {account} ({} attempt(s), {} unresolved issue(s)) -> {}",
                outcome.generator_attempts,
                outcome.unresolved_issues.len(),
                path.display()
            );
            for issue in &outcome.unresolved_issues {
                println!("  - [{}] {}", issue.category.as_str(), issue.detail);
            }
        }
    }

    Ok(())
}
