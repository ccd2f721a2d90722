use std::fmt::Write as _;

use qbrgen_core::config::AppConfig;

/// Effective configuration, one value per line, secrets redacted.
pub fn render(config: &AppConfig) -> String {
    let mut out = String::new();

    let api_key = if config.llm.api_key.is_some() { "***redacted***" } else { "(unset)" };

    let _ = writeln!(out, "[llm]");
    let _ = writeln!(out, "api_key = {api_key}");
    let _ = writeln!(out, "base_url = {}", config.llm.base_url);
    let _ = writeln!(out, "model = {}", config.llm.model);
    let _ = writeln!(out, "temperature = {}", config.llm.temperature);
    let _ = writeln!(out, "timeout_secs = {}", config.llm.timeout_secs);

    let _ = writeln!(out, "\n[judge]");
    let _ = writeln!(out, "model = {}", config.judge.model);
    let _ = writeln!(out, "timeout_secs = {}", config.judge.timeout_secs);
    let _ = writeln!(out, "advisory_tolerance = {}", config.judge.advisory_tolerance);

    let _ = writeln!(out, "\n[retry]");
    let _ = writeln!(out, "budget = {}", config.retry.budget);

    let _ = writeln!(out, "\n[batch]");
    let _ = writeln!(out, "max_concurrency = {}", config.batch.max_concurrency);

    let thresholds = &config.classifier;
    let _ = writeln!(out, "\n[classifier]");
    let _ = writeln!(out, "at_risk_risk_score = {}", thresholds.at_risk_risk_score);
    let _ = writeln!(out, "at_risk_max_nps = {}", thresholds.at_risk_max_nps);
    let _ = writeln!(out, "turnaround_max_scat = {}", thresholds.turnaround_max_scat);
    let _ = writeln!(out, "growth_min_growth = {}", thresholds.growth_min_growth);
    let _ = writeln!(out, "growth_min_nps = {}", thresholds.growth_min_nps);
    let _ = writeln!(out, "ratio_low_max = {}", thresholds.ratio_low_max);
    let _ = writeln!(out, "ratio_high_min = {}", thresholds.ratio_high_min);

    let _ = writeln!(out, "\n[logging]");
    let _ = writeln!(out, "level = {}", config.logging.level);
    let _ = write!(out, "format = {:?}", config.logging.format);

    out
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use qbrgen_core::config::AppConfig;

    use super::render;

    #[test]
    fn rendered_config_redacts_the_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some(SecretString::from("sk-very-secret"));

        let rendered = render(&config);
        assert!(rendered.contains("api_key = ***redacted***"));
        assert!(!rendered.contains("sk-very-secret"));
    }

    #[test]
    fn rendered_config_lists_every_section() {
        let rendered = render(&AppConfig::default());
        for section in ["[llm]", "[judge]", "[retry]", "[batch]", "[classifier]", "[logging]"] {
            assert!(rendered.contains(section), "missing section {section}");
        }
        assert!(rendered.contains("api_key = (unset)"));
    }
}
