use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".security-gate.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .security-gate.toml.
/// All fields are optional; the defaults match the repository's CI setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub precondition: PreconditionConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST base URL, overridden by GITHUB_API_URL on Actions runners.
    pub api_url: String,
    /// GraphQL endpoint. Defaults to `{api_url}/graphql`.
    pub graphql_url: Option<String>,
    /// `owner/name`. Falls back to GITHUB_REPOSITORY.
    pub repository: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            graphql_url: None,
            repository: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Exact `tool.name` reported by the code-scanning analyzer
    pub tool_name: String,
    /// Dismissal reasons that never justify a dismissal (case-insensitive)
    pub invalid_reasons: Vec<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            tool_name: "Olympix Integrated Security".to_string(),
            invalid_reasons: vec!["used in tests".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreconditionConfig {
    /// Workflow file name (or numeric id) of the upstream analysis run
    pub workflow: String,
}

impl Default for PreconditionConfig {
    fn default() -> Self {
        Self {
            workflow: "olympixStaticAnalysis.yml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Directory whose contents define the gates themselves
    pub protected_dir: String,
    /// Organization owning the privileged team. Defaults to the repository owner.
    pub organization: Option<String>,
    /// Slug of the privileged reviewer team
    pub team: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected_dir: ".github/workflows/".to_string(),
            organization: None,
            team: "smart-contract-admins".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Incoming-webhook URL. Falls back to NOTIFY_WEBHOOK_URL.
    pub webhook_url: Option<String>,
    /// Files or directories whose modification triggers a notification
    pub watched_paths: Vec<String>,
    pub message: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            watched_paths: Vec::new(),
            message: "A watched configuration file was changed. Please review the update."
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .security-gate.toml in the
    /// current directory when no path is given. A missing default file yields
    /// the default config; an explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill unset values from the variables GitHub Actions exports.
    fn apply_env(&mut self) {
        if self.github.token.is_none() {
            self.github.token = non_empty_env("GITHUB_TOKEN");
        }
        if let Some(api_url) = non_empty_env("GITHUB_API_URL") {
            self.github.api_url = api_url;
        }
        if self.github.graphql_url.is_none() {
            self.github.graphql_url = non_empty_env("GITHUB_GRAPHQL_URL");
        }
        if self.github.repository.is_none() {
            self.github.repository = non_empty_env("GITHUB_REPOSITORY");
        }
        if self.notify.webhook_url.is_none() {
            self.notify.webhook_url = non_empty_env("NOTIFY_WEBHOOK_URL");
        }
    }

    pub fn graphql_url(&self) -> String {
        self.github
            .graphql_url
            .clone()
            .unwrap_or_else(|| format!("{}/graphql", self.github.api_url.trim_end_matches('/')))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.alerts.tool_name, "Olympix Integrated Security");
        assert_eq!(config.alerts.invalid_reasons, vec!["used in tests"]);
        assert_eq!(config.guard.protected_dir, ".github/workflows/");
        assert!(config.notify.watched_paths.is_empty());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[alerts]
tool_name = "Slither"

[guard]
organization = "acme"
team = "core-admins"

[notify]
watched_paths = ["config/whitelist.json", "config/networks/"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.alerts.tool_name, "Slither");
        // untouched fields in a partially written section keep their defaults
        assert_eq!(config.alerts.invalid_reasons, vec!["used in tests"]);
        assert_eq!(config.guard.organization.as_deref(), Some("acme"));
        assert_eq!(config.guard.team, "core-admins");
        assert_eq!(config.guard.protected_dir, ".github/workflows/");
        assert_eq!(config.notify.watched_paths.len(), 2);
        assert_eq!(config.precondition.workflow, "olympixStaticAnalysis.yml");
    }

    #[test]
    fn test_graphql_url_derived_from_api_url() {
        let mut config = Config::default();
        config.github.api_url = "https://ghe.example.com/api/v3/".to_string();
        assert_eq!(config.graphql_url(), "https://ghe.example.com/api/v3/graphql");

        config.github.graphql_url = Some("https://ghe.example.com/api/graphql".to_string());
        assert_eq!(config.graphql_url(), "https://ghe.example.com/api/graphql");
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let path = std::env::temp_dir().join("security-gate-does-not-exist.toml");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::FileRead(_))
        ));
    }
}
