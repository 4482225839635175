//! Configuration loading and validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured transport.
pub const TRANSPORT_ENV: &str = "MCP_TRANSPORT";

/// Top-level Rusty Eats configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// How the tool host talks to its client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over a WebSocket at `/mcp`.
    Ws,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "ws" | "websocket" => Ok(Self::Ws),
            other => Err(format!("unknown transport '{other}' (expected stdio or ws)")),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Ws => f.write_str("ws"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported in `initialize` and used as the log notification logger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// How many agent runs may drive a browser at the same time (default: 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<usize>,
}

/// Browser automation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Run without a visible window (default: false).
    #[serde(default)]
    pub headless: bool,

    /// Page operation timeout in ms (default: 30000).
    #[serde(default = "default_browser_timeout")]
    pub timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            timeout_ms: default_browser_timeout(),
        }
    }
}

fn default_browser_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    /// Maximum LLM/browser steps per run before giving up (default: 50).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Configuration for the LLM provider that drives the browser agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Landing page the search task starts from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,

    /// Wait suggested to the caller before polling for results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "rusty_eats_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "file". Never stdout, the stdio transport owns it.
    #[serde(default = "default_log_output")]
    pub output: String,

    /// Log file used when `output` is "file".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
            file: None,
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Expand a leading `~` to the home directory.
fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::RustyEatsError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::RustyEatsError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Default config file location: `~/.rusty_eats/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Apply overrides read from the process environment.
    ///
    /// An unparseable `MCP_TRANSPORT` is reported back and leaves the config untouched.
    pub fn apply_env_overrides(&mut self) -> crate::error::Result<()> {
        if let Ok(raw) = std::env::var(TRANSPORT_ENV) {
            if !raw.trim().is_empty() {
                let transport: Transport = raw.parse().map_err(|e| {
                    crate::error::RustyEatsError::Config(format!("{TRANSPORT_ENV}: {e}"))
                })?;
                self.server.get_or_insert_with(ServerConfig::default).transport = Some(transport);
            }
        }
        Ok(())
    }

    pub fn server_name(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| "uber_eats".to_string())
    }

    pub fn transport(&self) -> Transport {
        self.server
            .as_ref()
            .and_then(|s| s.transport)
            .unwrap_or_default()
    }

    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(18790)
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.server
            .as_ref()
            .and_then(|s| s.max_concurrent_runs)
            .unwrap_or(1)
    }

    /// Browser settings, falling back to defaults when the section is absent.
    /// `~` in `chrome_path` is expanded.
    pub fn browser(&self) -> BrowserConfig {
        let mut browser = self.browser.clone().unwrap_or_default();
        browser.chrome_path = browser.chrome_path.map(|p| expand_path(&p));
        browser
    }

    /// Log file used when logging output is "file" (`mcp_debug.log` by default).
    pub fn log_file(&self) -> PathBuf {
        let raw = self
            .logging
            .as_ref()
            .and_then(|l| l.file.clone())
            .unwrap_or_else(|| "mcp_debug.log".to_string());
        PathBuf::from(expand_path(&raw))
    }

    fn provider(&self) -> Option<&ProviderConfig> {
        self.agent.as_ref().and_then(|a| a.provider.as_ref())
    }

    pub fn model(&self) -> String {
        self.provider()
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string())
    }

    /// Resolve the provider API key, defaulting to `ANTHROPIC_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        match self.provider() {
            Some(p) if p.api_key.is_some() || p.api_key_env.is_some() => p.resolve_api_key(),
            _ => resolve_secret_field(&None, &Some("ANTHROPIC_API_KEY".to_string())),
        }
    }

    pub fn provider_base_url(&self) -> Option<String> {
        self.provider().and_then(|p| p.base_url.clone())
    }

    pub fn max_steps(&self) -> u32 {
        self.agent.as_ref().and_then(|a| a.max_steps).unwrap_or(50)
    }

    pub fn max_tokens(&self) -> u32 {
        self.agent.as_ref().and_then(|a| a.max_tokens).unwrap_or(4096)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.agent.as_ref().and_then(|a| a.temperature)
    }

    pub fn search_url(&self) -> String {
        self.tasks
            .as_ref()
            .and_then(|t| t.search_url.clone())
            .unwrap_or_else(|| "https://www.ubereats.com/se-en/".to_string())
    }

    pub fn poll_wait_secs(&self) -> u64 {
        self.tasks
            .as_ref()
            .and_then(|t| t.poll_wait_secs)
            .unwrap_or(120)
    }

    /// Get a config value by dotted path (e.g. "server.port", "agent.provider.model").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.api_key().is_none() {
            warnings.push(
                "No LLM API key configured (agent.provider.api_key / api_key_env / ANTHROPIC_API_KEY)"
                    .to_string(),
            );
        }

        if let Some(path) = self.browser().chrome_path.as_ref() {
            if !Path::new(path).exists() {
                warnings.push(format!("Chrome binary not found: {path}"));
            }
        }

        if self.port() == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.max_concurrent_runs() == 0 {
            errors.push("server.max_concurrent_runs must be at least 1".to_string());
        }

        if self.max_steps() == 0 {
            errors.push("agent.max_steps must be at least 1".to_string());
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                errors.push(format!("Unknown log format: {}", logging.format));
            }
            if !matches!(logging.output.as_str(), "stderr" | "file") {
                errors.push(format!(
                    "Unknown log output: {} (stdout is reserved for the stdio transport)",
                    logging.output
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Rusty Eats data: `~/.rusty_eats/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rusty_eats")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, variable name is unique to this test
        unsafe { std::env::set_var("TEST_RE_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_RE_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_RE_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_RE_TEST}"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_name(), "uber_eats");
        assert_eq!(config.transport(), Transport::Stdio);
        assert_eq!(config.port(), 18790);
        assert_eq!(config.max_concurrent_runs(), 1);
        assert_eq!(config.max_steps(), 50);
        assert_eq!(config.model(), "claude-3-5-sonnet-latest");
        assert_eq!(config.poll_wait_secs(), 120);
        assert!(!config.browser().headless);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(config.server.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are fine in JSON5
                server: { transport: "ws", port: 9000, max_concurrent_runs: 2 },
                browser: { headless: true },
                tasks: { poll_wait_secs: 30 },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.transport(), Transport::Ws);
        assert_eq!(config.port(), 9000);
        assert_eq!(config.max_concurrent_runs(), 2);
        assert!(config.browser().headless);
        assert_eq!(config.browser().timeout_ms, 30_000);
        assert_eq!(config.poll_wait_secs(), 30);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ server: ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::RustyEatsError::Config(_)));
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("stdio".parse::<Transport>().unwrap(), Transport::Stdio);
        assert_eq!("WS".parse::<Transport>().unwrap(), Transport::Ws);
        assert_eq!("websocket".parse::<Transport>().unwrap(), Transport::Ws);
        assert!("sse".parse::<Transport>().is_err());
        assert_eq!(Transport::Ws.to_string(), "ws");
    }

    #[test]
    fn test_transport_env_override() {
        // SAFETY: test-only; the only test touching MCP_TRANSPORT
        unsafe { std::env::set_var(TRANSPORT_ENV, "ws") };
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.transport(), Transport::Ws);

        unsafe { std::env::set_var(TRANSPORT_ENV, "carrier-pigeon") };
        let mut config = Config::default();
        let err = config.apply_env_overrides().unwrap_err();
        assert!(matches!(err, crate::error::RustyEatsError::Config(ref msg) if msg.starts_with("MCP_TRANSPORT")));
        assert_eq!(config.transport(), Transport::Stdio);
        unsafe { std::env::remove_var(TRANSPORT_ENV) };
    }

    #[test]
    fn test_provider_resolve_api_key() {
        // SAFETY: test-only, variable name is unique to this test
        unsafe { std::env::set_var("TEST_RE_API_KEY", "from-env") };
        let provider = ProviderConfig {
            api_key_env: Some("TEST_RE_API_KEY".into()),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.resolve_api_key(), Some("from-env".into()));

        let provider = ProviderConfig {
            api_key_env: Some("TEST_RE_API_KEY".into()),
            api_key: Some("direct-key".into()),
            ..ProviderConfig::default()
        };
        // Direct key takes priority
        assert_eq!(provider.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_RE_API_KEY") };
    }

    #[test]
    fn test_get_path() {
        let config = Config {
            server: Some(ServerConfig {
                port: Some(4242),
                ..ServerConfig::default()
            }),
            ..Config::default()
        };
        assert_eq!(config.get_path("server.port"), Some(serde_json::json!(4242)));
        assert!(config.get_path("server.nope").is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert_eq!(logging.output, "stderr");
        assert!(logging.level.is_none());
        assert!(logging.file.is_none());
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let config = Config {
            server: Some(ServerConfig {
                port: Some(0),
                max_concurrent_runs: Some(0),
                ..ServerConfig::default()
            }),
            logging: Some(LoggingConfig {
                output: "stdout".into(),
                ..LoggingConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("port")));
        assert!(errors.iter().any(|e| e.contains("max_concurrent_runs")));
        assert!(errors.iter().any(|e| e.contains("stdout")));
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let config = Config {
            agent: Some(AgentConfig {
                provider: Some(ProviderConfig {
                    api_key_env: Some("NONEXISTENT_RE_KEY_VAR".into()),
                    ..ProviderConfig::default()
                }),
                ..AgentConfig::default()
            }),
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert!(
            warnings.iter().any(|w| w.contains("API key")),
            "Expected a warning about the API key, got: {warnings:?}"
        );
    }
}
