//! Run configuration.
//!
//! Configuration is read once at start from an optional TOML file, then
//! overridden by environment variables. Every key has a default, so an
//! empty file (or no file at all) tracks the two Dify plugin catalogs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PlugcountError;
use crate::notify::{NotifyOn, NotifySettings, WebhookFormat};
use crate::types::repository::checkout_dir_name;
use crate::types::{EnumerationRule, TrackedRepository};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "plugcount.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PLUGCOUNT_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub name: String,
    pub remote_url: String,
    /// Working copy location. Defaults to `<repos_dir>/<remote name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    pub rule: EnumerationRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub webhook_format: WebhookFormat,
    pub repos_dir: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub sync_timeout_secs: u64,
    pub webhook_timeout_secs: u64,
    pub notify_on: NotifyOn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_format: WebhookFormat::default(),
            repos_dir: PathBuf::from("repos"),
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            sync_timeout_secs: 300,
            webhook_timeout_secs: 15,
            notify_on: NotifyOn::default(),
            milestone: None,
            repositories: default_repositories(),
        }
    }
}

fn default_repositories() -> Vec<RepositoryConfig> {
    vec![
        RepositoryConfig {
            name: "community".to_string(),
            remote_url: "https://github.com/langgenius/dify-plugins.git".to_string(),
            local_path: None,
            rule: EnumerationRule::community(),
        },
        RepositoryConfig {
            name: "official".to_string(),
            remote_url: "https://github.com/langgenius/dify-official-plugins.git".to_string(),
            local_path: None,
            rule: EnumerationRule::official(),
        },
    ]
}

impl Config {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, PlugcountError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the configuration file at `path`, or the defaults when `path`
    /// is `None`. An explicitly named file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, PlugcountError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    PlugcountError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Picks the config file: the explicit path, then `$PLUGCOUNT_CONFIG`,
    /// then `plugcount.toml` in `cwd` if it exists.
    pub fn locate<F>(explicit: Option<&Path>, cwd: &Path, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = lookup(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        candidate.is_file().then_some(candidate)
    }

    /// Applies `WEBHOOK_URL` (or legacy `FEISHU_WEBHOOK`), `REPOS_DIR`,
    /// `DATA_DIR` and `LOGS_DIR`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("WEBHOOK_URL").or_else(|| get("FEISHU_WEBHOOK")) {
            self.webhook_url = Some(url);
        }
        if let Some(dir) = get("REPOS_DIR") {
            self.repos_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("LOGS_DIR") {
            self.logs_dir = PathBuf::from(dir);
        }
    }

    /// Makes every relative directory absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let absolutize = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        absolutize(&mut self.repos_dir);
        absolutize(&mut self.data_dir);
        absolutize(&mut self.logs_dir);
        for repo in &mut self.repositories {
            if let Some(path) = repo.local_path.as_mut() {
                absolutize(path);
            }
        }
    }

    /// Checks repository names and enumeration rules.
    pub fn validate(&self) -> Result<(), PlugcountError> {
        if self.repositories.is_empty() {
            return Err(PlugcountError::Config(
                "at least one repository must be configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if !is_valid_repository_name(&repo.name) {
                return Err(PlugcountError::Config(format!(
                    "invalid repository name '{}': use letters, digits, '-', '_' or '.'",
                    repo.name
                )));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(PlugcountError::Config(format!(
                    "duplicate repository name '{}'",
                    repo.name
                )));
            }
            if repo.remote_url.trim().is_empty() {
                return Err(PlugcountError::Config(format!(
                    "repository '{}' has an empty remote_url",
                    repo.name
                )));
            }
            if let EnumerationRule::ManifestFiles { pattern, .. } = &repo.rule {
                Regex::new(pattern).map_err(|e| {
                    PlugcountError::Config(format!(
                        "repository '{}' has an invalid manifest pattern: {e}",
                        repo.name
                    ))
                })?;
            }
        }

        if self.sync_timeout_secs == 0 || self.webhook_timeout_secs == 0 {
            return Err(PlugcountError::Config("timeouts must be non-zero".into()));
        }

        Ok(())
    }

    /// Builds the immutable repository list for a run.
    pub fn tracked_repositories(&self) -> Result<Vec<TrackedRepository>, PlugcountError> {
        self.validate()?;
        self.repositories
            .iter()
            .map(|repo| {
                let local_path = match &repo.local_path {
                    Some(path) => path.clone(),
                    None => {
                        let dir = checkout_dir_name(&repo.remote_url).ok_or_else(|| {
                            PlugcountError::Config(format!(
                                "cannot derive a checkout directory from '{}'",
                                repo.remote_url
                            ))
                        })?;
                        self.repos_dir.join(dir)
                    }
                };
                Ok(TrackedRepository {
                    name: repo.name.clone(),
                    remote_url: repo.remote_url.clone(),
                    local_path,
                    rule: repo.rule.clone(),
                })
            })
            .collect()
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn notify_settings(&self) -> NotifySettings {
        NotifySettings {
            notify_on: self.notify_on,
            milestone: self.milestone,
        }
    }

    pub fn to_toml_string(&self) -> Result<String, PlugcountError> {
        toml::to_string_pretty(self).map_err(|e| PlugcountError::Other(e.to_string()))
    }
}

fn is_valid_repository_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].name, "community");
        assert_eq!(config.repositories[1].rule, EnumerationRule::official());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn parses_full_file() {
        let toml = r#"
webhook_url = "https://hooks.example.com/abc"
webhook_format = "slack"
repos_dir = "/var/lib/plugcount/repos"
notify_on = "change"
milestone = 500
sync_timeout_secs = 60

[[repositories]]
name = "catalog"
remote_url = "https://example.com/org/catalog.git"
rule = { kind = "manifest-files", pattern = '^manifest\.ya?ml$', max_depth = 2 }
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.webhook_format, WebhookFormat::Slack);
        assert_eq!(config.notify_on, NotifyOn::Change);
        assert_eq!(config.milestone, Some(500));
        assert_eq!(config.sync_timeout(), Duration::from_secs(60));
        assert_eq!(config.webhook_timeout_secs, 15);

        let repos = config.tracked_repositories().unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(
            repos[0].local_path,
            PathBuf::from("/var/lib/plugcount/repos/catalog")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("webhok_url = \"x\"").is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("FEISHU_WEBHOOK", "https://legacy.example.com"),
            ("DATA_DIR", "/data"),
            ("LOGS_DIR", ""),
        ]));
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://legacy.example.com")
        );
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.logs_dir, PathBuf::from("logs"));

        config.apply_env_overrides(env(&[
            ("WEBHOOK_URL", "https://new.example.com"),
            ("FEISHU_WEBHOOK", "https://legacy.example.com"),
        ]));
        assert_eq!(config.webhook_url.as_deref(), Some("https://new.example.com"));
    }

    #[test]
    fn resolve_paths_anchors_relative_dirs() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/absolute/data");
        config.resolve_paths(Path::new("/srv/plugcount"));
        assert_eq!(config.repos_dir, PathBuf::from("/srv/plugcount/repos"));
        assert_eq!(config.logs_dir, PathBuf::from("/srv/plugcount/logs"));
        assert_eq!(config.data_dir, PathBuf::from("/absolute/data"));

        let repos = config.tracked_repositories().unwrap();
        assert_eq!(
            repos[0].local_path,
            PathBuf::from("/srv/plugcount/repos/dify-plugins")
        );
        assert_eq!(
            repos[1].local_path,
            PathBuf::from("/srv/plugcount/repos/dify-official-plugins")
        );
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let mut config = Config::default();
        config.repositories[1].name = "community".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate repository name"));
    }

    #[test]
    fn bad_manifest_pattern_fails_validation() {
        let mut config = Config::default();
        config.repositories[0].rule = EnumerationRule::ManifestFiles {
            pattern: "(".to_string(),
            max_depth: 2,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn locate_prefers_explicit_then_env() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(Config::locate(None, tmp.path(), env(&[])), None);

        std::fs::write(tmp.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
        assert_eq!(
            Config::locate(None, tmp.path(), env(&[])),
            Some(tmp.path().join(DEFAULT_CONFIG_FILE))
        );
        assert_eq!(
            Config::locate(None, tmp.path(), env(&[(CONFIG_ENV, "/etc/plugcount.toml")])),
            Some(PathBuf::from("/etc/plugcount.toml"))
        );
        assert_eq!(
            Config::locate(Some(Path::new("x.toml")), tmp.path(), env(&[])),
            Some(PathBuf::from("x.toml"))
        );
    }

    #[test]
    fn round_trips_through_toml_output() {
        let mut config = Config::default();
        config.milestone = Some(500);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[[repositories]]"));
        let parsed = Config::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
