/*!
common/src/lib.rs

Shared configuration types for studyfeed.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file
- A default-file/override-file merge so deployments only override what they need
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// URLs for the scrape target and the WebDriver endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlsConfig {
    /// Login page of the parent-communication portal
    pub login_page: String,
    /// Base URL of the paginated feeds listing (page number appended as ?page=N)
    pub feeds_base: String,
    /// WebDriver endpoint used for the interactive login (e.g. "http://localhost:9515")
    pub webdriver: Option<String>,
}

/// Portal credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

/// Feed collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Author allow-list; a single "*" entry means "all authors"
    #[serde(default)]
    pub authors: Vec<String>,
    /// Recency cutoff in weeks; values < 1 fall back to 1
    pub look_back_weeks: Option<i64>,
    /// Upper bound on pages walked before giving up
    pub max_pages: Option<usize>,
    /// Where the collected feeds are persisted for replay
    pub snapshot_path: Option<String>,
}

/// Remote LLM endpoint config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config grouping adapter selection and endpoint specifics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote"
    pub remote: Option<RemoteLlmConfig>,
}

/// Output document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the weekly document is written to (created if absent)
    pub dir: String,
    /// Grade label embedded in the prompt and the document title (e.g. "3rd Grade")
    pub grade_label: Option<String>,
    /// Week number used in the document title and filename
    pub week_number: Option<u32>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub urls: UrlsConfig,
    pub login: LoginConfig,
    pub collector: Option<CollectorConfig>,
    pub llm: Option<LlmConfig>,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Effective look-back window in weeks. Invalid or absent values fall back to 1.
    pub fn look_back_weeks(&self) -> i64 {
        let configured = self
            .collector
            .as_ref()
            .and_then(|c| c.look_back_weeks)
            .unwrap_or(1);
        if configured >= 1 {
            configured
        } else {
            1
        }
    }

    /// Effective author allow-list; an empty list behaves like the wildcard.
    pub fn authors(&self) -> Vec<String> {
        let authors = self
            .collector
            .as_ref()
            .map(|c| c.authors.clone())
            .unwrap_or_default();
        if authors.is_empty() {
            vec!["*".to_string()]
        } else {
            authors
        }
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [urls]
        login_page = "https://portal.example/login"
        feeds_base = "https://portal.example/feeds"
        webdriver = "http://localhost:9515"

        [login]
        username = "parent@example.com"
        password = "hunter2"

        [collector]
        authors = ["Ms. Rivera"]
        look_back_weeks = 2

        [output]
        dir = "out"
        grade_label = "3rd Grade"
    "#;

    #[test]
    fn config_parses_from_toml() {
        let cfg: Config = toml::from_str(BASE).expect("parse config");
        assert_eq!(cfg.urls.feeds_base, "https://portal.example/feeds");
        assert_eq!(cfg.look_back_weeks(), 2);
        assert_eq!(cfg.authors(), vec!["Ms. Rivera".to_string()]);
        assert_eq!(cfg.output.grade_label.as_deref(), Some("3rd Grade"));
    }

    #[test]
    fn invalid_look_back_falls_back_to_one_week() {
        let toml_src = BASE.replace("look_back_weeks = 2", "look_back_weeks = 0");
        let cfg: Config = toml::from_str(&toml_src).expect("parse config");
        assert_eq!(cfg.look_back_weeks(), 1);
    }

    #[test]
    fn missing_collector_defaults_to_wildcard_authors() {
        let toml_src = r#"
            [urls]
            login_page = "https://portal.example/login"
            feeds_base = "https://portal.example/feeds"

            [login]
            username = "u"
            password = "p"

            [output]
            dir = "out"
        "#;
        let cfg: Config = toml::from_str(toml_src).expect("parse config");
        assert_eq!(cfg.authors(), vec!["*".to_string()]);
        assert_eq!(cfg.look_back_weeks(), 1);
    }

    #[tokio::test]
    async fn load_with_defaults_merges_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(&default_path, BASE).await.expect("write default");
        tokio::fs::write(
            &override_path,
            r#"
            [collector]
            look_back_weeks = 4
            "#,
        )
        .await
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("merged config");

        // Override wins for look_back_weeks, defaults survive elsewhere
        assert_eq!(cfg.look_back_weeks(), 4);
        assert_eq!(cfg.login.username, "parent@example.com");
    }
}
