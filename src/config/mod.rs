use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::ProviderKind;
use crate::validate::LimitPolicy;
use crate::wire::GenerateOptions;

/// Everything the service reads from the outside world, resolved once at
/// start-up and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub provider: ProviderKind,
    /// Empty means "the provider's default model".
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub database_path: Option<PathBuf>,
    pub limit_policy: LimitPolicy,
    /// Where failed generations are dumped for diagnosis; off when unset.
    pub artifacts_dir: Option<PathBuf>,
    pub log_json: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            provider: ProviderKind::OpenAI,
            model: String::new(),
            api_key: None,
            api_base: None,
            timeout_secs: 120,
            temperature: 0.8,
            max_output_tokens: 2000,
            database_path: None,
            limit_policy: LimitPolicy::Soft,
            artifacts_dir: None,
            log_json: false,
            request_timeout_secs: 180,
        }
    }
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub database: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(p) = &self.provider {
            cfg.provider = p.clone();
        }
        if let Some(m) = &self.model {
            cfg.model = m.clone();
        }
        if let Some(d) = &self.database {
            cfg.database_path = Some(d.clone());
        }
        if let Some(h) = &self.host {
            cfg.host = h.clone();
        }
        if let Some(p) = self.port {
            cfg.port = p;
        }
    }
}

pub fn default_model(kind: &ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAI => "gpt-4-turbo-preview",
        ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
        ProviderKind::Ollama => "llama3.1",
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then the process environment,
    /// then command-line overrides.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let env = |k: &str| std::env::var(k).ok();
        cfg.apply_env(env)?;
        overrides.apply(&mut cfg);
        cfg.fill_provider_key(env);
        cfg.finalize();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs_err::read_to_string(path)?;
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))
    }

    /// | Env Var                   | Field              |
    /// |---------------------------|--------------------|
    /// | `ADGENIUS_HOST`           | `host`             |
    /// | `ADGENIUS_PORT`           | `port`             |
    /// | `ADGENIUS_PROVIDER`       | `provider`         |
    /// | `ADGENIUS_MODEL`          | `model`            |
    /// | `ADGENIUS_API_BASE`       | `api_base`         |
    /// | `ADGENIUS_API_KEY`        | `api_key`          |
    /// | `ADGENIUS_DATABASE`       | `database_path`    |
    /// | `ADGENIUS_LIMIT_POLICY`   | `limit_policy`     |
    /// | `ADGENIUS_ARTIFACTS_DIR`  | `artifacts_dir`    |
    /// | `ADGENIUS_LOG_JSON`       | `log_json`         |
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| var(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("ADGENIUS_HOST") {
            self.host = v;
        }
        if let Some(v) = var("ADGENIUS_PORT") {
            self.port = v.parse().with_context(|| format!("ADGENIUS_PORT must be a valid u16, got `{v}`"))?;
        }
        if let Some(v) = var("ADGENIUS_PROVIDER") {
            self.provider = v.parse().map_err(|e: String| anyhow!("ADGENIUS_PROVIDER: {e}"))?;
        }
        if let Some(v) = var("ADGENIUS_MODEL") {
            self.model = v;
        }
        if let Some(v) = var("ADGENIUS_API_BASE") {
            self.api_base = Some(v);
        }
        if let Some(v) = var("ADGENIUS_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("ADGENIUS_DATABASE") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ADGENIUS_LIMIT_POLICY") {
            self.limit_policy = v.parse().map_err(|e: String| anyhow!("ADGENIUS_LIMIT_POLICY: {e}"))?;
        }
        if let Some(v) = var("ADGENIUS_ARTIFACTS_DIR") {
            self.artifacts_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ADGENIUS_LOG_JSON") {
            self.log_json = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Fall back to the vendor's own variable (`OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`) once the provider is settled.
    pub fn fill_provider_key<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return;
        }
        let name = match self.provider {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Ollama => return,
        };
        if let Some(v) = var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.api_key = Some(v);
        }
    }

    pub fn finalize(&mut self) {
        if self.model.trim().is_empty() {
            self.model = default_model(&self.provider).to_string();
        }
        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.api_key = None;
        }
    }

    pub fn has_backend_credentials(&self) -> bool {
        match self.provider {
            ProviderKind::Ollama => true,
            ProviderKind::OpenAI | ProviderKind::Anthropic => self.api_key.is_some(),
        }
    }

    /// Live mode needs both a generation backend and a store.
    pub fn is_live(&self) -> bool {
        self.has_backend_credentials() && self.database_path.is_some()
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            structured_output: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_demo_mode() {
        let mut cfg = Config::default();
        cfg.finalize();
        assert!(!cfg.is_live());
        assert_eq!(cfg.model, "gpt-4-turbo-preview");
        assert_eq!(cfg.generate_options(), GenerateOptions::default());
    }

    #[test]
    fn env_overrides_and_provider_keys() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("ADGENIUS_PROVIDER", "anthropic"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ADGENIUS_DATABASE", "/tmp/adgenius.db"),
            ("ADGENIUS_LIMIT_POLICY", "strict"),
            ("ADGENIUS_PORT", "8080"),
        ]))
        .unwrap();
        cfg.fill_provider_key(env(&[("OPENAI_API_KEY", "sk-openai"), ("ANTHROPIC_API_KEY", "sk-ant")]));
        cfg.finalize();
        assert_eq!(cfg.provider, ProviderKind::Anthropic);
        assert_eq!(cfg.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(cfg.limit_policy, LimitPolicy::Strict);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.model, "claude-3-5-sonnet-latest");
        assert!(cfg.is_live());
    }

    #[test]
    fn blank_values_are_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[("OPENAI_API_KEY", "   "), ("ADGENIUS_DATABASE", "db.sqlite")])).unwrap();
        cfg.fill_provider_key(env(&[("OPENAI_API_KEY", "   ")]));
        cfg.finalize();
        assert!(cfg.api_key.is_none());
        assert!(!cfg.is_live());
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut cfg = Config { provider: ProviderKind::Ollama, database_path: Some("db".into()), ..Config::default() };
        cfg.finalize();
        assert!(cfg.is_live());
    }

    #[test]
    fn command_line_provider_picks_its_own_key_and_model() {
        let mut cfg = Config::default();
        let vars = env(&[("OPENAI_API_KEY", "sk-openai"), ("ANTHROPIC_API_KEY", "sk-ant")]);
        cfg.apply_env(&vars).unwrap();
        Overrides { provider: Some(ProviderKind::Anthropic), port: Some(9000), ..Overrides::default() }.apply(&mut cfg);
        cfg.fill_provider_key(&vars);
        cfg.finalize();
        assert_eq!(cfg.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(cfg.model, "claude-3-5-sonnet-latest");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.apply_env(env(&[("ADGENIUS_PORT", "http")])).is_err());
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adgenius.toml");
        fs_err::write(
            &path,
            "provider = \"ollama\"\nmodel = \"mistral\"\nlimit_policy = \"strict\"\nport = 4000\n",
        )
        .unwrap();
        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Ollama);
        assert_eq!(cfg.model, "mistral");
        assert_eq!(cfg.limit_policy, LimitPolicy::Strict);
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.max_output_tokens, 2000);
    }
}
