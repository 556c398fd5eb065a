use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Written by `examprep init` and used when no config file exists
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamPrepConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token for `/ai/*`; empty disables auth
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auth_token: String::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5003
}
fn default_max_body_bytes() -> usize {
    examprep_gateway::DEFAULT_MAX_BODY_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub gemini: ApiKeyProviderConfig,
    #[serde(default)]
    pub groq: ApiKeyProviderConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub huggingface: ApiKeyProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            gemini: ApiKeyProviderConfig::default(),
            groq: ApiKeyProviderConfig::default(),
            ollama: OllamaConfig::default(),
            huggingface: ApiKeyProviderConfig::default(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    examprep_core::providers::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Hosted backend keyed by an API key. Unset fields use the backend's defaults.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ApiKeyProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyProviderConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Blank falls back to the local default endpoint
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            model: None,
        }
    }
}

impl OllamaConfig {
    /// Endpoint handed to the client; empty when disabled
    pub fn effective_base_url(&self) -> String {
        if !self.enabled {
            return String::new();
        }
        match self.base_url.trim() {
            "" => examprep_core::providers::ollama::OLLAMA_BASE_URL.to_string(),
            url => url.to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".examprep")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl ExamPrepConfig {
    /// Load from `custom_path`, else `~/.examprep/config.toml`, else the
    /// embedded default. A custom path that does not exist is an error.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path.clone(),
            None => {
                let path = default_config_path();
                if !path.exists() {
                    debug!(
                        "No config at {}, using built-in defaults and environment",
                        path.display()
                    );
                    return Self::from_toml_str(DEFAULT_CONFIG, "built-in default config");
                }
                path
            }
        };

        check_permissions(&path)?;

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `examprep init` first.",
                path.display()
            )
        })?;

        let config = Self::from_toml_str(&content, &path.display().to_string())?;
        config.warn_hardcoded_secrets(&content);
        Ok(config)
    }

    /// Expand allowlisted `${VAR}`s from the process environment, then parse
    pub fn from_toml_str(content: &str, source: &str) -> Result<Self> {
        Self::parse_with(content, source, |name| std::env::var(name).ok())
    }

    fn parse_with(
        content: &str,
        source: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let expanded = expand_env_vars(content, &lookup);

        let mut config: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", source))?;

        if config.providers.huggingface.api_key.trim().is_empty() {
            if let Some(token) = lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()) {
                debug!("Using HF_TOKEN for the Hugging Face API key");
                config.providers.huggingface.api_key = token;
            }
        }

        config
            .validate()
            .with_context(|| format!("Invalid config at {}", source))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.providers.request_timeout_secs == 0 {
            bail!("providers.request_timeout_secs must be greater than 0");
        }
        if self.server.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be greater than 0");
        }

        let urls = [
            ("gemini", self.providers.gemini.base_url.as_deref()),
            ("groq", self.providers.groq.base_url.as_deref()),
            ("huggingface", self.providers.huggingface.base_url.as_deref()),
            ("ollama", Some(self.providers.ollama.base_url.as_str())),
        ];
        for (name, url) in urls {
            if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
                validate_base_url(name, url)?;
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.bind, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "server.bind/port do not form a socket address: {}:{}",
                    self.server.bind, self.server.port
                )
            })
    }

    /// Copy with every secret masked, for display
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        cfg.server.auth_token = mask_secret(&cfg.server.auth_token);
        for provider in [
            &mut cfg.providers.gemini,
            &mut cfg.providers.groq,
            &mut cfg.providers.huggingface,
        ] {
            provider.api_key = mask_secret(&provider.api_key);
        }
        cfg
    }

    /// `raw` is the file before expansion
    fn warn_hardcoded_secrets(&self, raw: &str) {
        let hardcoded = |key: &str, var: &str| {
            !key.is_empty() && !raw.contains(&format!("${{{}}}", var))
        };

        if hardcoded(&self.providers.gemini.api_key, "GEMINI_API_KEY") {
            warn!(
                "Gemini API key is hardcoded in config file. For security, use environment variables: api_key = \"${{GEMINI_API_KEY}}\""
            );
        }
        if hardcoded(&self.providers.groq.api_key, "GROQ_API_KEY") {
            warn!(
                "Groq API key is hardcoded in config file. For security, use environment variables: api_key = \"${{GROQ_API_KEY}}\""
            );
        }
        if hardcoded(&self.server.auth_token, "EXAMPREP_AUTH_TOKEN") {
            warn!(
                "Auth token is hardcoded in config file. For security, use environment variables: auth_token = \"${{EXAMPREP_AUTH_TOKEN}}\""
            );
        }
    }
}

fn validate_base_url(name: &str, raw: &str) -> Result<()> {
    let url = url::Url::parse(raw)
        .with_context(|| format!("providers.{}.base_url is not a valid URL: {}", name, raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "providers.{}.base_url must use http or https, got {}",
            name,
            url.scheme()
        );
    }
    Ok(())
}

/// Refuse config files readable by group or other (Unix only)
fn check_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                bail!(
                    "Config file {:?} has overly permissive permissions ({:o}). \
                     It may contain secrets. Fix with: chmod 600 {:?}",
                    path,
                    mode & 0o777,
                    path
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "GROQ_API_KEY",
    "HF_API_KEY",
    "HF_TOKEN",
    "OLLAMA_BASE_URL",
    "EXAMPREP_AUTH_TOKEN",
];

fn expand_env_vars(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while let Some(start) = result[pos..].find("${") {
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = &result[abs_start + 2..abs_start + end];

        if !ALLOWED_ENV_VARS.contains(&var_name) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}
