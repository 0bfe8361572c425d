//! `<data_dir>/config.toml`, merged with environment and flag overrides.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use agentlink_client::ClientConfig;
use agentlink_protocol::ProjectId;

pub const SERVER_URL_ENV: &str = "AGENTLINK_SERVER_URL";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    /// Committed on connect, so `/project` is not needed every run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub client: ClientConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            project_id: None,
            client: ClientConfig::default(),
        }
    }
}

impl Settings {
    /// Read the config file; a missing file means defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// `flag` beats `env` beats the file.
    pub fn with_server_override(mut self, env: Option<String>, flag: Option<String>) -> Self {
        if let Some(url) = flag.or(env).filter(|u| !u.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        self
    }

    pub fn project_id(&self) -> Option<String> {
        self.project_id.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server_url, "http://localhost:8000");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
server_url = "https://agent.example.com"
project_id = 42

[client]
send_queue_capacity = 16

[client.reconnect]
max_attempts = 0
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.server_url, "https://agent.example.com");
        assert_eq!(settings.project_id().as_deref(), Some("42"));
        assert_eq!(settings.client.send_queue_capacity, 16);
        assert_eq!(settings.client.reconnect.max_attempts, 0);
        assert_eq!(settings.client.reconnect.base_delay_ms, 3_000);
        assert_eq!(settings.client.loading_indicator_delay_ms, 200);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "server_url = [").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let base = Settings::default();
        assert_eq!(
            base.clone()
                .with_server_override(Some("http://env:1".into()), Some("http://flag:2".into()))
                .server_url,
            "http://flag:2"
        );
        assert_eq!(
            base.clone()
                .with_server_override(Some("http://env:1".into()), None)
                .server_url,
            "http://env:1"
        );
        assert_eq!(
            base.with_server_override(Some("  ".into()), None).server_url,
            DEFAULT_SERVER_URL
        );
    }
}
