pub mod batch;
pub mod config;
pub mod generate;

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use qbrgen_core::config::AppConfig;
use qbrgen_core::domain::record::CustomerRecord;
use qbrgen_core::domain::report::QbrOutcome;
use qbrgen_pipeline::runner::RetryPolicy;
use qbrgen_pipeline::{Generator, Judge, OpenAiChatModel, Pipeline};

/// Read a JSON array of customer records. Serde enforces presence and
/// type of every field here; value-range problems are caught later by
/// the normalizer, per record.
pub fn load_records(path: &Path) -> Result<Vec<CustomerRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read records file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("records file `{}` is not a valid record array", path.display()))
}

pub fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let generator_model = Arc::new(
        OpenAiChatModel::for_generator(&config.llm).context("generator client setup failed")?,
    );
    let judge_model = Arc::new(
        OpenAiChatModel::for_judge(&config.llm, &config.judge)
            .context("judge client setup failed")?,
    );

    Ok(Pipeline::new(
        Generator::new(generator_model),
        Judge::new(judge_model, config.judge.advisory_tolerance),
        RetryPolicy { budget: config.retry.budget },
        config.classifier,
    ))
}

/// Write the markdown artifact for one outcome and return its path.
/// Degraded outcomes get the unresolved review issues appended so the
/// reader sees them next to the draft.
pub fn write_artifact(out_dir: &Path, outcome: &QbrOutcome) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create `{}`", out_dir.display()))?;

    let path = out_dir.join(format!("{}_qbr.md", file_stem(&outcome.output.account_name)));
    fs::write(&path, render_artifact(outcome))
        .with_context(|| format!("could not write `{}`", path.display()))?;
    Ok(path)
}

pub fn render_artifact(outcome: &QbrOutcome) -> String {
    let mut body = outcome.output.raw_markdown.clone();
    if outcome.is_degraded() {
        body.push_str("\n\n---\n## Review Notes (Unresolved)\n");
        let _ = writeln!(
            body,
            "This draft did not pass automated review after {} attempt(s). \
             Verify the points below before sending:",
            outcome.generator_attempts
        );
        for issue in &outcome.unresolved_issues {
            let _ = writeln!(body, "- [{}] {}", issue.category.as_str(), issue.detail);
        }
    }
    body
}

pub fn file_stem(account_name: &str) -> String {
    let mut stem: String = account_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    while stem.contains("__") {
        stem = stem.replace("__", "_");
    }
    stem.trim_matches('_').to_string()
}
