use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Persona names tried in order. Unknown names are skipped with a
    /// warning; an empty list falls back to the built-in default chain.
    #[serde(default = "default_personas")]
    pub personas: Vec<String>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    /// Overall deadline for one `get_manifest` call, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_personas() -> Vec<String> {
    vec!["ios".to_string(), "android".to_string()]
}

fn default_deadline_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            personas: default_personas(),
            http: HttpConfig::default(),
            evaluator: EvaluatorConfig::default(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Per-request deadline, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: u32,
    /// Fractional jitter applied to each delay, e.g. 0.2 for ±20%.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_factor() -> u32 {
    2
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EvaluatorConfig {
    /// Budget for one descrambler evaluation, in abstract instructions.
    #[serde(default = "default_instruction_budget")]
    pub instruction_budget: u64,
}

fn default_instruction_budget() -> u64 {
    100_000
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            instruction_budget: default_instruction_budget(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.personas, vec!["ios", "android"]);
        assert_eq!(config.deadline_secs, 60);
        assert_eq!(config.http.request_timeout_secs, 30);
        assert_eq!(config.http.retry.max_attempts, 5);
        assert_eq!(config.http.retry.base_delay_ms, 250);
        assert_eq!(config.evaluator.instruction_budget, 100_000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"personas": ["web"]}"#).unwrap();
        assert_eq!(config.personas, vec!["web"]);
        assert_eq!(config.http.retry.max_attempts, 5);
        assert_eq!(config.deadline_secs, 60);
    }
}
