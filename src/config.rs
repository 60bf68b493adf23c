use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub rest_api: RestApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding workflows.json, notifications.json, work_items.json and crew.json
    pub state: String,
}

/// What happens to the following step when a step completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextStepPolicy {
    /// Log that the next step is ready, leave its status alone
    #[default]
    Advisory,
    /// Start the next pending step in the same transaction
    AutoStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub next_step_policy: NextStepPolicy,
    /// Roles allowed to reset a step back to pending
    #[serde(default = "default_reset_roles")]
    pub reset_roles: Vec<Role>,
}

fn default_reset_roles() -> Vec<Role> {
    vec![Role::Admin, Role::ProgramManager]
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            next_step_policy: NextStepPolicy::default(),
            reset_roles: default_reset_roles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconcileConfig {
    /// Seconds between background sweeps over every episode (0 = only on read)
    #[serde(default)]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub on_step_started: bool,
    pub on_step_ready: bool,
    pub on_step_assigned: bool,
    pub on_step_reset: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_step_started: true,
            on_step_ready: true,
            on_step_assigned: true,
            on_step_reset: true,
        }
    }
}

/// REST API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_rest_port")]
    pub port: u16,
}

fn default_rest_port() -> u16 {
    7008
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            port: default_rest_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether `serve` writes logs to a file under the state dir instead of stderr
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    false
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".showrunner/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Embedded defaults so showrunner works without any config file
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/showrunner/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("showrunner").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables, e.g. SHOWRUNNER__REST_API__PORT=9000
        builder = builder.add_source(
            config::Environment::with_prefix("SHOWRUNNER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .showrunner/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create showrunner config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// Whether the role may reset steps
    pub fn can_reset(&self, role: Role) -> bool {
        self.workflow.reset_roles.contains(&role)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                state: ".showrunner/state".to_string(),
            },
            workflow: WorkflowConfig::default(),
            reconcile: ReconcileConfig::default(),
            notifications: NotificationsConfig::default(),
            rest_api: RestApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_advisory_and_lazy() {
        let config = Config::default();
        assert_eq!(config.workflow.next_step_policy, NextStepPolicy::Advisory);
        assert_eq!(config.reconcile.interval_secs, 0);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_reset_roles_default_to_privileged() {
        let config = Config::default();
        assert!(config.can_reset(Role::Admin));
        assert!(config.can_reset(Role::ProgramManager));
        assert!(!config.can_reset(Role::Editor));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut config = Config::default();
        config.workflow.next_step_policy = NextStepPolicy::AutoStart;
        config.rest_api.port = 9100;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("next_step_policy = \"auto_start\""));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.workflow.next_step_policy, NextStepPolicy::AutoStart);
        assert_eq!(parsed.rest_api.port, 9100);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let toml_str = r#"
            [paths]
            state = "/tmp/showrunner"

            [notifications]
            enabled = false
            on_step_started = false
            on_step_ready = false
            on_step_assigned = false
            on_step_reset = false
        "#;
        let parsed: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.workflow.reset_roles, default_reset_roles());
        assert_eq!(parsed.rest_api.port, default_rest_port());
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_logs_path_is_under_state() {
        let mut config = Config::default();
        config.paths.state = "/var/lib/showrunner".to_string();
        assert_eq!(config.logs_path(), PathBuf::from("/var/lib/showrunner/logs"));
    }
}
