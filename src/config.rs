use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::runtime::{DefaultsTable, RuntimeKind};

const DEFAULT_CONFIG_PATH: &str = "/etc/podsniff.conf";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_POD_CREATE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_KUBECTL: &str = "kubectl";

/// Tool-wide configuration from `/etc/podsniff.conf` and `PODSNIFF_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    pub pod_create_timeout: Duration,
    pub service_account: Option<String>,
    pub log_level: String,
    pub kubectl: String,
    /// Per-engine images and sockets.
    pub defaults: DefaultsTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            pod_create_timeout: DEFAULT_POD_CREATE_TIMEOUT,
            service_account: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            kubectl: DEFAULT_KUBECTL.to_string(),
            defaults: DefaultsTable::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("PODSNIFF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(Path::new(&config_path), |key| std::env::var(key).ok())
    }

    /// Load from `path` (if it exists), then apply overrides from `env`.
    pub fn load_with<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    config.apply(key.trim(), value.trim())?;
                }
            }
        }

        // Allow environment variable overrides
        if let Some(val) = env("PODSNIFF_NAMESPACE") {
            config.namespace = val;
        }
        if let Some(val) = env("PODSNIFF_POD_CREATE_TIMEOUT") {
            config.pod_create_timeout = parse_timeout(&val)
                .map_err(|_| ConfigError::Invalid(format!("Invalid PODSNIFF_POD_CREATE_TIMEOUT: {}", val)))?;
        }
        if let Some(val) = env("PODSNIFF_SERVICE_ACCOUNT") {
            config.service_account = non_empty(&val);
        }
        if let Some(val) = env("PODSNIFF_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Some(val) = env("PODSNIFF_KUBECTL") {
            config.kubectl = val;
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "namespace" => self.namespace = value.to_string(),
            "pod_create_timeout" => {
                self.pod_create_timeout = parse_timeout(value)
                    .map_err(|_| ConfigError::Invalid(format!("Invalid pod_create_timeout: {}", value)))?;
            }
            "service_account" => self.service_account = non_empty(value),
            "log_level" => self.log_level = value.to_string(),
            "kubectl" => self.kubectl = value.to_string(),
            _ => {
                // Engine overrides look like `containerd.image = ...`
                let Some((engine, field)) = key.split_once('.') else {
                    return Ok(());
                };
                let kind: RuntimeKind = engine.parse().map_err(ConfigError::Invalid)?;
                let defaults = self.defaults.get_mut(kind);
                match field {
                    "image" => defaults.helper_image = value.to_string(),
                    "capture_image" => defaults.capture_image = value.to_string(),
                    "socket" => defaults.socket_path = value.to_string(),
                    _ => {
                        return Err(ConfigError::Invalid(format!("Unknown key: {}", key)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Filter directive for tracing-subscriber.
    pub fn tracing_filter(&self) -> String {
        format!("podsniff={}", self.log_level)
    }
}

fn parse_timeout(value: &str) -> Result<Duration, std::num::ParseIntError> {
    let value = value.trim_end_matches('s');
    value.parse::<u64>().map(Duration::from_secs)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Either the runtime's default or an explicit operator choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    UseDefault,
    Explicit(String),
}

impl Setting {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(v) => Setting::Explicit(v),
            None => Setting::UseDefault,
        }
    }

    pub fn resolve(&self, default: &str) -> String {
        match self {
            Setting::UseDefault => default.to_string(),
            Setting::Explicit(v) => v.clone(),
        }
    }
}

/// What to capture from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The host network namespace of the node.
    NodeWide,
    /// The network namespace of one container, by bare runtime id.
    Container { container_id: String },
}

/// Per-session capture settings. Not modified once a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub node: String,
    pub target: CaptureTarget,
    pub interface: String,
    pub filter: String,
    pub helper_image: Setting,
    pub capture_image: Setting,
    pub socket_path: Setting,
    pub pod_create_timeout: Duration,
    pub service_account: Option<String>,
    /// Run the helper pod with `hostNetwork`. Independent of node-wide capture,
    /// which joins the host namespace from the node-side script.
    pub host_network: bool,
}

impl CaptureSettings {
    /// Node-wide settings with every optional value at its default.
    pub fn node_wide(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            target: CaptureTarget::NodeWide,
            interface: "any".to_string(),
            filter: String::new(),
            helper_image: Setting::UseDefault,
            capture_image: Setting::UseDefault,
            socket_path: Setting::UseDefault,
            pod_create_timeout: DEFAULT_POD_CREATE_TIMEOUT,
            service_account: None,
            host_network: false,
        }
    }

    /// Settings for one container with every optional value at its default.
    pub fn container(node: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            target: CaptureTarget::Container {
                container_id: container_id.into(),
            },
            ..Self::node_wide(node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_with(Path::new("/nonexistent/podsniff.conf"), no_env).unwrap();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.pod_create_timeout, Duration::from_secs(60));
        assert_eq!(config.kubectl, "kubectl");
        assert_eq!(config.tracing_filter(), "podsniff=info");
    }

    #[test]
    fn test_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# podsniff settings").unwrap();
        writeln!(file, "namespace = sniffing").unwrap();
        writeln!(file, "pod_create_timeout = 120s").unwrap();
        writeln!(file, "service_account = capture").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "containerd.capture_image = registry.local/tcpdump:4.99").unwrap();
        writeln!(file, "cri-o.socket = /run/crio/crio.sock").unwrap();

        let config = Config::load_with(file.path(), no_env).unwrap();
        assert_eq!(config.namespace, "sniffing");
        assert_eq!(config.pod_create_timeout, Duration::from_secs(120));
        assert_eq!(config.service_account.as_deref(), Some("capture"));
        assert_eq!(
            config.defaults.get(RuntimeKind::Containerd).capture_image,
            "registry.local/tcpdump:4.99"
        );
        assert_eq!(config.defaults.get(RuntimeKind::Crio).socket_path, "/run/crio/crio.sock");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "namespace = from-file").unwrap();

        let env: HashMap<&str, &str> =
            [("PODSNIFF_NAMESPACE", "from-env"), ("PODSNIFF_POD_CREATE_TIMEOUT", "5")].into();
        let config =
            Config::load_with(file.path(), |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.namespace, "from-env");
        assert_eq!(config.pod_create_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pod_create_timeout = soon").unwrap();
        assert!(Config::load_with(file.path(), no_env).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rkt.image = foo").unwrap();
        assert!(Config::load_with(file.path(), no_env).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "docker.colour = blue").unwrap();
        assert!(Config::load_with(file.path(), no_env).is_err());
    }

    #[test]
    fn test_setting_resolve() {
        assert_eq!(Setting::UseDefault.resolve("a"), "a");
        assert_eq!(Setting::Explicit("b".to_string()).resolve("a"), "b");
        assert_eq!(Setting::from_option(None), Setting::UseDefault);
    }
}
