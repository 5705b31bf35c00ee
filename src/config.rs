use std::{env, time::Duration};

/// Upper bound on the configured pre-fallback wait. Misconfigured
/// environments must not be able to park a request for longer than this.
pub const MAX_FALLBACK_DELAY_SECS: u64 = 3600;

const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub keep_alive: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub num_ctx: u32,
    pub num_gpu: u32,
    pub request_timeout: Duration,
    pub stream_connect_timeout: Duration,
    pub stream_read_timeout: Duration,
    pub probe_timeout: Duration,
    pub fallback_first: bool,
    pub fallback_delay: Duration,
    pub max_code_length: usize,
    pub listen_host: String,
    pub listen_port: u16,
}

impl Settings {
    pub fn from_env() -> Self {
        let ollama_host = env_or("OLLAMA_HOST", "localhost");
        let ollama_port = env_parse("OLLAMA_PORT", 11434u16);

        Self {
            base_url: format!("http://{ollama_host}:{ollama_port}"),
            model: env_or("MODEL_NAME", "qwen2.5-coder:7b"),
            keep_alive: Some(env_or("KEEP_ALIVE", "5m")).filter(|value| !value.is_empty()),
            temperature: env_parse("TEMPERATURE", 0.7f32),
            top_p: env_parse("TOP_P", 0.9f32),
            max_tokens: env_parse("MAX_TOKENS", 100u32),
            num_ctx: env_parse("OLLAMA_NUM_CTX", 2048u32),
            num_gpu: env_parse("OLLAMA_NUM_GPU", 0u32),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT", 60u64)),
            stream_connect_timeout: Duration::from_secs(env_parse("STREAM_CONNECT_TIMEOUT", 10u64)),
            stream_read_timeout: Duration::from_secs(env_parse("STREAM_TIMEOUT", 600u64)),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            fallback_first: env_flag("USE_FALLBACK_FIRST", false),
            fallback_delay: clamped_fallback_delay(env_parse("FALLBACK_DELAY_SECONDS", 0u64)),
            max_code_length: env_parse("MAX_CODE_LENGTH", 10_000usize),
            listen_host: env_or("HOST", "0.0.0.0"),
            listen_port: env_parse("PORT", 5000u16),
        }
    }

    /// Fixed defaults, no environment reads. Tests tune individual fields
    /// from here instead of mutating process state.
    pub fn for_tests() -> Self {
        Self {
            base_url: "http://localhost:11434".to_owned(),
            model: "test-model".to_owned(),
            keep_alive: None,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 100,
            num_ctx: 2048,
            num_gpu: 0,
            request_timeout: Duration::from_secs(5),
            stream_connect_timeout: Duration::from_secs(2),
            stream_read_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(1),
            fallback_first: false,
            fallback_delay: Duration::ZERO,
            max_code_length: 10_000,
            listen_host: "127.0.0.1".to_owned(),
            listen_port: 0,
        }
    }
}

/// Clamp the configured delay so a bad environment value can never hold a
/// request hostage indefinitely.
pub fn clamped_fallback_delay(seconds: u64) -> Duration {
    Duration::from_secs(seconds.min(MAX_FALLBACK_DELAY_SECS))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_delay_is_clamped_to_one_hour() {
        assert_eq!(clamped_fallback_delay(0), Duration::ZERO);
        assert_eq!(clamped_fallback_delay(5), Duration::from_secs(5));
        assert_eq!(
            clamped_fallback_delay(86_400),
            Duration::from_secs(MAX_FALLBACK_DELAY_SECS)
        );
    }
}
