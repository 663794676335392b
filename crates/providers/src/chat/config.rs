use anyhow::Context;
use directories::BaseDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tutor_core::{ratelimit::RatePolicy, Session};

use crate::sse::DEFAULT_MAX_PENDING;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    pub endpoint: Option<String>,
    pub display_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub rate_limit: Option<u32>,
    pub rate_window_secs: Option<u64>,
    pub max_pending_bytes: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub endpoint: String,
    pub access_token: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub rate: RatePolicy,
    pub max_pending_bytes: usize,
}

impl ChatConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let file_cfg = match Self::config_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => ChatFileConfig::default(),
        };
        Self::resolve(file_cfg, |k| env::var(k).ok())
    }

    pub fn load_file(path: &Path) -> anyhow::Result<ChatFileConfig> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        toml::from_str::<ChatFileConfig>(&text)
            .with_context(|| format!("parse config file: {}", path.display()))
    }

    /// Layers environment values over the file values. `lookup` stands in
    /// for the process environment.
    pub fn resolve<F>(file_cfg: ChatFileConfig, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = lookup("TUTOR_ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("TUTOR_ACCESS_TOKEN not set"))?;
        let user_id = lookup("TUTOR_USER_ID").unwrap_or_else(|| "local".to_string());
        let endpoint = lookup("TUTOR_CHAT_URL")
            .or(file_cfg.endpoint)
            .ok_or_else(|| anyhow::anyhow!("no chat endpoint: set TUTOR_CHAT_URL or `endpoint` in config.toml"))?;
        let parsed = url::Url::parse(&endpoint)
            .with_context(|| format!("invalid chat endpoint: {}", endpoint))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("chat endpoint must be http(s): {}", endpoint);
        }
        let display_name = lookup("TUTOR_DISPLAY_NAME").or(file_cfg.display_name);
        let proxy = lookup("HTTPS_PROXY").or_else(|| lookup("HTTP_PROXY"));

        let defaults = RatePolicy::default();
        let rate = RatePolicy {
            limit: file_cfg.rate_limit.unwrap_or(defaults.limit).max(1),
            window: file_cfg
                .rate_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
        };

        Ok(ChatConfig {
            endpoint,
            access_token,
            user_id,
            display_name,
            connect_timeout: Duration::from_millis(file_cfg.connect_timeout_ms.unwrap_or(10_000)),
            proxy,
            rate,
            max_pending_bytes: file_cfg.max_pending_bytes.unwrap_or(DEFAULT_MAX_PENDING),
        })
    }

    pub fn session(&self) -> anyhow::Result<Session> {
        let s = Session::new(self.user_id.clone(), self.access_token.clone())?;
        Ok(match &self.display_name {
            Some(n) => s.with_display_name(n.clone()),
            None => s,
        })
    }

    pub fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let p = if cfg!(target_os = "windows") {
            base.home_dir().join(".tutor").join("config.toml")
        } else {
            base.config_dir().join("tutor").join("config.toml")
        };
        Some(p)
    }
}
