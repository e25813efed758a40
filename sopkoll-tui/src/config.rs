//! Configuration loading for the TUI binary.
//!
//! Reads `sopkoll.toml` from the working directory (or the path in
//! `SOPKOLL_CONFIG`); a missing file means defaults. All paths derive from
//! one data dir so a single setting relocates everything.

use std::env;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Deserialize;
use sopkoll_agent::AgentConfig;

const DEFAULT_PRECACHE: &str = "https://edp.ale.se/FutureWeb/SimpleWastePickup";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// Base directory for the store, cache, and log files.
    data_dir: Option<PathBuf>,
    /// Log file override.
    log_file: Option<PathBuf>,
    /// Static assets precached by the agent at install time.
    precache: Option<Vec<String>>,
    /// URL fragment identifying schedule API requests.
    api_marker: Option<String>,
}

impl Config {
    pub(crate) fn load() -> anyhow::Result<Self> {
        let path = env::var_os("SOPKOLL_CONFIG")
            .map_or_else(|| PathBuf::from("sopkoll.toml"), PathBuf::from);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub(crate) fn store_file(&self) -> PathBuf {
        self.data_dir().join("store.json")
    }

    pub(crate) fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("sopkoll.log"))
    }

    pub(crate) fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            cache_dir: self.data_dir().join("cache"),
            precache: self
                .precache
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_PRECACHE.to_owned()]),
            api_marker: self
                .api_marker
                .clone()
                .unwrap_or_else(|| sopkoll_provider_ale::API_MARKER.to_owned()),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = env::var_os("XDG_DATA_HOME").map_or_else(
        || {
            env::var_os("HOME").map_or_else(|| PathBuf::from("."), |home| {
                PathBuf::from(home).join(".local").join("share")
            })
        },
        PathBuf::from,
    );
    base.join("sopkoll")
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_fill_every_path() {
        let config = Config::default();
        assert!(config.store_file().ends_with("sopkoll/store.json"));
        assert!(config.log_file().ends_with("sopkoll/sopkoll.log"));

        let agent = config.agent_config();
        assert!(agent.cache_dir.ends_with("sopkoll/cache"));
        assert_eq!(agent.api_marker, "/SimpleWastePickup/");
        assert_eq!(agent.precache.len(), 1);
    }

    #[test]
    fn toml_overrides_are_honored() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/sopkoll-test"
            precache = []
            api_marker = "/api/"
            "#,
        )
        .expect("valid config");

        assert!(config.store_file().starts_with("/tmp/sopkoll-test"));
        let agent = config.agent_config();
        assert!(agent.precache.is_empty());
        assert_eq!(agent.api_marker, "/api/");
    }
}
