use crate::error::HarkError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarkConfig {
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub transport: TransportConfig,
    pub apps: AppsConfig,
}

impl HarkConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: HarkConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// `<config dir>/hark/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hark").join("config.toml"))
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("HARK_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("STT_BASE_URL") {
            self.stt.base_url = v;
        }
        if let Ok(v) = std::env::var("STT_MODEL") {
            self.stt.model = v;
        }
        if let Ok(v) = std::env::var("HARK_EXECUTION_DEADLINE_SECS") {
            if let Ok(n) = v.parse() {
                self.transport.execution_deadline_secs = n;
            }
        }
        if let Ok(v) = std::env::var("HARK_PROBE_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.transport.probe_timeout_ms = n;
            }
        }
    }

    /// Reject configurations that would fail at the first generation call.
    pub fn validate(&self) -> Result<(), HarkError> {
        match self.llm.provider.as_str() {
            "openai" => {
                if self.llm.api_key().is_none() {
                    return Err(HarkError::Config(
                        "llm.api_key is required for the openai provider \
                         (set it in the config file or OPENAI_API_KEY)"
                            .into(),
                    ));
                }
            }
            "ollama" | "mock" => {}
            other => {
                return Err(HarkError::Config(format!("unknown llm provider '{}'", other)));
            }
        }
        if self.llm.timeout_secs == 0 || self.stt.timeout_secs == 0 {
            return Err(HarkError::Config(
                "llm.timeout_secs and stt.timeout_secs must be positive".into(),
            ));
        }
        if self.transport.probe_timeout_ms == 0 {
            return Err(HarkError::Config(
                "transport.probe_timeout_ms must be positive".into(),
            ));
        }
        if self.transport.winrm_port == 0 || self.transport.ssh_port == 0 {
            return Err(HarkError::Config("transport ports must be non-zero".into()));
        }
        if self.transport.execution_deadline_secs == 0 {
            return Err(HarkError::Config(
                "transport.execution_deadline_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// The API key, if one was configured and it is not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub base_url: String,
    pub model: String,
    /// Falls back to `llm.api_key` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub probe_timeout_ms: u64,
    pub winrm_port: u16,
    pub ssh_port: u16,
    pub execution_deadline_secs: u64,
}

impl TransportConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn execution_deadline(&self) -> Duration {
        Duration::from_secs(self.execution_deadline_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3_000,
            winrm_port: 5985,
            ssh_port: 22,
            execution_deadline_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownAppEntry {
    pub keyword: String,
    pub executable: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Directories walked by the application search fallback, in order.
    pub search_roots: Vec<PathBuf>,
    /// Extra keyword → executable entries, appended after the built-ins.
    pub known: Vec<KnownAppEntry>,
    /// How many directory levels below each root the search descends.
    pub search_depth: usize,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            search_roots: default_search_roots(),
            known: vec![],
            search_depth: 6,
        }
    }
}

fn default_search_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        let mut roots = vec![
            PathBuf::from(r"C:\Program Files"),
            PathBuf::from(r"C:\Program Files (x86)"),
        ];
        if let Some(local) = dirs::data_local_dir() {
            roots.push(local);
        }
        roots
    } else {
        vec![
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
            PathBuf::from("/opt"),
            PathBuf::from("/Applications"),
        ]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = HarkConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.temperature, 0.0);
        assert_eq!(cfg.transport.winrm_port, 5985);
        assert_eq!(cfg.transport.ssh_port, 22);
        assert_eq!(cfg.transport.probe_timeout(), Duration::from_secs(3));
        assert!(!cfg.apps.search_roots.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3"
"#;
        let cfg: HarkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.model, "llama3");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.transport.execution_deadline_secs, 120);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "http://proxy.local/v1"
api_key = "sk-test"
temperature = 0.2
timeout_secs = 30

[stt]
base_url = "http://stt.local/v1"
model = "whisper-large"

[transport]
probe_timeout_ms = 500
winrm_port = 5986
ssh_port = 2222
execution_deadline_secs = 10

[apps]
search_roots = ["/srv/apps"]
known = [{ keyword = "wordpad", executable = "wordpad" }]
"#;
        let cfg: HarkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.api_key(), Some("sk-test"));
        assert_eq!(cfg.stt.model, "whisper-large");
        assert_eq!(cfg.stt.api_key, None);
        assert_eq!(cfg.transport.ssh_port, 2222);
        assert_eq!(cfg.transport.probe_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.apps.search_roots, vec![PathBuf::from("/srv/apps")]);
        assert_eq!(cfg.apps.search_depth, 6);
        assert_eq!(
            cfg.apps.known,
            vec![KnownAppEntry {
                keyword: "wordpad".into(),
                executable: "wordpad".into()
            }]
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_api_key_for_openai() {
        let mut cfg = HarkConfig::default();
        cfg.llm.api_key = Some("   ".into());
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, HarkError::Config(_)));

        cfg.llm.provider = "mock".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_provider_and_zero_deadline() {
        let mut cfg = HarkConfig::default();
        cfg.llm.provider = "carrier-pigeon".into();
        assert!(cfg.validate().is_err());

        cfg.llm.provider = "mock".into();
        cfg.transport.execution_deadline_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut cfg = HarkConfig::default();
        cfg.llm.provider = "mock".into();
        assert!(cfg.validate().is_ok());

        cfg.transport.probe_timeout_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("probe_timeout_ms"));

        cfg.transport.probe_timeout_ms = 3_000;
        cfg.llm.timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(HarkError::Config(_))));

        cfg.llm.timeout_secs = 60;
        cfg.stt.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nprovider = \"mock\"\n").unwrap();
        let cfg = HarkConfig::load(&path).unwrap();
        assert_eq!(cfg.transport.winrm_port, 5985);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let cfg = HarkConfig::load_or_default("/nonexistent/hark/config.toml");
        assert_eq!(cfg.transport.ssh_port, 22);
    }
}
