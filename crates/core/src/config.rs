use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub judge: JudgeConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub classifier: ClassifierThresholds,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    /// Kept low on purpose: repeated runs on the same account should
    /// produce the same narrative, so creative variation loses to
    /// consistency. `validate` rejects anything above 0.4.
    pub temperature: f64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct JudgeConfig {
    pub model: String,
    pub timeout_secs: u64,
    /// Advisory (non-blocking) issues tolerated before a verdict fails.
    pub advisory_tolerance: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    /// Judge-driven regeneration attempts after the initial one.
    pub budget: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    pub max_concurrency: usize,
}

/// Story/risk thresholds. Configuration rather than constants so
/// deployments can tune the classification policy without a rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    pub at_risk_risk_score: f64,
    pub at_risk_max_nps: u8,
    pub turnaround_max_scat: u8,
    pub growth_min_growth: f64,
    pub growth_min_nps: u8,
    pub ratio_low_max: f64,
    pub ratio_high_min: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            at_risk_risk_score: 0.6,
            at_risk_max_nps: 5,
            turnaround_max_scat: 50,
            growth_min_growth: 0.15,
            growth_min_nps: 7,
            ratio_low_max: 0.1,
            ratio_high_min: 0.3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub judge_model: Option<String>,
    pub retry_budget: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
                temperature: 0.3,
                timeout_secs: 60,
            },
            judge: JudgeConfig {
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                advisory_tolerance: 3,
            },
            retry: RetryConfig { budget: 2 },
            batch: BatchConfig { max_concurrency: 4 },
            classifier: ClassifierThresholds::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("qbrgen.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(judge) = patch.judge {
            if let Some(model) = judge.model {
                self.judge.model = model;
            }
            if let Some(timeout_secs) = judge.timeout_secs {
                self.judge.timeout_secs = timeout_secs;
            }
            if let Some(advisory_tolerance) = judge.advisory_tolerance {
                self.judge.advisory_tolerance = advisory_tolerance;
            }
        }

        if let Some(retry) = patch.retry {
            if let Some(budget) = retry.budget {
                self.retry.budget = budget;
            }
        }

        if let Some(batch) = patch.batch {
            if let Some(max_concurrency) = batch.max_concurrency {
                self.batch.max_concurrency = max_concurrency;
            }
        }

        if let Some(classifier) = patch.classifier {
            let thresholds = &mut self.classifier;
            if let Some(value) = classifier.at_risk_risk_score {
                thresholds.at_risk_risk_score = value;
            }
            if let Some(value) = classifier.at_risk_max_nps {
                thresholds.at_risk_max_nps = value;
            }
            if let Some(value) = classifier.turnaround_max_scat {
                thresholds.turnaround_max_scat = value;
            }
            if let Some(value) = classifier.growth_min_growth {
                thresholds.growth_min_growth = value;
            }
            if let Some(value) = classifier.growth_min_nps {
                thresholds.growth_min_nps = value;
            }
            if let Some(value) = classifier.ratio_low_max {
                thresholds.ratio_low_max = value;
            }
            if let Some(value) = classifier.ratio_high_min {
                thresholds.ratio_high_min = value;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QBRGEN_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("QBRGEN_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("QBRGEN_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("QBRGEN_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f64("QBRGEN_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("QBRGEN_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("QBRGEN_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QBRGEN_JUDGE_MODEL") {
            self.judge.model = value;
        }
        if let Some(value) = read_env("QBRGEN_JUDGE_TIMEOUT_SECS") {
            self.judge.timeout_secs = parse_u64("QBRGEN_JUDGE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("QBRGEN_JUDGE_ADVISORY_TOLERANCE") {
            self.judge.advisory_tolerance =
                parse_u64("QBRGEN_JUDGE_ADVISORY_TOLERANCE", &value)? as usize;
        }

        if let Some(value) = read_env("QBRGEN_RETRY_BUDGET") {
            self.retry.budget = parse_u32("QBRGEN_RETRY_BUDGET", &value)?;
        }
        if let Some(value) = read_env("QBRGEN_BATCH_MAX_CONCURRENCY") {
            self.batch.max_concurrency =
                parse_u64("QBRGEN_BATCH_MAX_CONCURRENCY", &value)? as usize;
        }

        let log_level = read_env("QBRGEN_LOGGING_LEVEL").or_else(|| read_env("QBRGEN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QBRGEN_LOGGING_FORMAT").or_else(|| read_env("QBRGEN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(judge_model) = overrides.judge_model {
            self.judge.model = judge_model;
        }
        if let Some(retry_budget) = overrides.retry_budget {
            self.retry.budget = retry_budget;
        }
        if let Some(max_concurrency) = overrides.max_concurrency {
            self.batch.max_concurrency = max_concurrency;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_judge(&self.judge)?;
        validate_retry(&self.retry)?;
        validate_batch(&self.batch)?;
        validate_classifier(&self.classifier)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("qbrgen.toml"), PathBuf::from("config/qbrgen.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set QBRGEN_LLM_API_KEY or the [llm] section)".to_string(),
        ));
    }

    if llm.base_url.trim().is_empty()
        || !(llm.base_url.starts_with("http://") || llm.base_url.starts_with("https://"))
    {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if !(llm.temperature > 0.0 && llm.temperature <= 0.4) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in (0.0, 0.4]; repeated runs on the same account must stay consistent".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_judge(judge: &JudgeConfig) -> Result<(), ConfigError> {
    if judge.model.trim().is_empty() {
        return Err(ConfigError::Validation("judge.model must not be empty".to_string()));
    }
    if judge.timeout_secs == 0 || judge.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "judge.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if judge.advisory_tolerance == 0 {
        return Err(ConfigError::Validation(
            "judge.advisory_tolerance must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_retry(retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.budget > 5 {
        return Err(ConfigError::Validation(
            "retry.budget must be at most 5 to bound generation cost".to_string(),
        ));
    }
    Ok(())
}

fn validate_batch(batch: &BatchConfig) -> Result<(), ConfigError> {
    if batch.max_concurrency == 0 {
        return Err(ConfigError::Validation(
            "batch.max_concurrency must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_classifier(classifier: &ClassifierThresholds) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&classifier.at_risk_risk_score) {
        return Err(ConfigError::Validation(
            "classifier.at_risk_risk_score must be in [0,1]".to_string(),
        ));
    }
    if classifier.growth_min_growth < 0.0 {
        return Err(ConfigError::Validation(
            "classifier.growth_min_growth must be non-negative".to_string(),
        ));
    }
    if classifier.at_risk_max_nps > 10 || classifier.growth_min_nps > 10 {
        return Err(ConfigError::Validation(
            "classifier NPS thresholds must be on the 0-10 scale".to_string(),
        ));
    }
    if classifier.turnaround_max_scat > 100 {
        return Err(ConfigError::Validation(
            "classifier.turnaround_max_scat must be on the 0-100 scale".to_string(),
        ));
    }
    if classifier.ratio_low_max <= 0.0 || classifier.ratio_low_max >= classifier.ratio_high_min {
        return Err(ConfigError::Validation(
            "classifier ratio buckets must satisfy 0 < ratio_low_max < ratio_high_min".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    judge: Option<JudgePatch>,
    retry: Option<RetryPatch>,
    batch: Option<BatchPatch>,
    classifier: Option<ClassifierPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct JudgePatch {
    model: Option<String>,
    timeout_secs: Option<u64>,
    advisory_tolerance: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryPatch {
    budget: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchPatch {
    max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    at_risk_risk_score: Option<f64>,
    at_risk_max_nps: Option<u8>,
    turnaround_max_scat: Option<u8>,
    growth_min_growth: Option<f64>,
    growth_min_nps: Option<u8>,
    ratio_low_max: Option<f64>,
    ratio_high_min: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
