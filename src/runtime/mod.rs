//! Container runtime bridges.
//!
//! This module defines the `ContainerRuntimeBridge` trait and one
//! implementation per container engine family. A bridge only generates
//! node-side shell commands; it never talks to the cluster.

mod containerd;
mod crio;
mod docker;
pub mod script;

pub use containerd::ContainerdBridge;
pub use crio::CrioBridge;
pub use docker::DockerBridge;
pub use script::{CaptureCommand, FilterQuoting};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Container engine families with a bridge implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeKind {
    Containerd,
    Docker,
    Crio,
}

impl RuntimeKind {
    pub const ALL: [RuntimeKind; 3] = [RuntimeKind::Containerd, RuntimeKind::Docker, RuntimeKind::Crio];

    /// Name used by the cluster in container ids and runtime versions.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Containerd => "containerd",
            RuntimeKind::Docker => "docker",
            RuntimeKind::Crio => "cri-o",
        }
    }

    /// Detect the engine from a node's runtime version, e.g. `containerd://1.7.2`.
    pub fn from_runtime_version(version: &str) -> Option<Self> {
        let (scheme, _) = version.split_once("://")?;
        scheme.parse().ok()
    }

    /// Split a container status id such as `containerd://3f2a…` into engine and bare id.
    pub fn split_container_id(container_id: &str) -> Option<(Self, &str)> {
        let (scheme, id) = container_id.split_once("://")?;
        let kind = scheme.parse().ok()?;
        if id.is_empty() {
            return None;
        }
        Some((kind, id))
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "containerd" => Ok(RuntimeKind::Containerd),
            "docker" => Ok(RuntimeKind::Docker),
            "cri-o" | "crio" => Ok(RuntimeKind::Crio),
            other => Err(format!("unknown container runtime '{}'", other)),
        }
    }
}

/// Engine-specific defaults for images and the runtime socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDefaults {
    /// Image of the privileged helper container.
    pub helper_image: String,
    /// Image the ephemeral capture container runs tcpdump from.
    pub capture_image: String,
    /// Runtime control socket path on the node.
    pub socket_path: String,
}

impl RuntimeDefaults {
    /// Built-in defaults for an engine.
    pub fn builtin(kind: RuntimeKind) -> Self {
        let (helper_image, socket_path) = match kind {
            RuntimeKind::Containerd => (
                "docker.io/hamravesh/ksniff-helper:v3",
                "/run/containerd/containerd.sock",
            ),
            RuntimeKind::Docker => ("docker.io/library/docker:cli", "/var/run/docker.sock"),
            RuntimeKind::Crio => (
                "docker.io/hamravesh/ksniff-helper:v3",
                "/var/run/crio/crio.sock",
            ),
        };

        Self {
            helper_image: helper_image.to_string(),
            capture_image: "docker.io/maintained/tcpdump:latest".to_string(),
            socket_path: socket_path.to_string(),
        }
    }
}

/// Defaults for every engine, keyed by `RuntimeKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsTable {
    entries: HashMap<RuntimeKind, RuntimeDefaults>,
}

impl DefaultsTable {
    pub fn get(&self, kind: RuntimeKind) -> RuntimeDefaults {
        self.entries
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| RuntimeDefaults::builtin(kind))
    }

    pub fn get_mut(&mut self, kind: RuntimeKind) -> &mut RuntimeDefaults {
        self.entries
            .entry(kind)
            .or_insert_with(|| RuntimeDefaults::builtin(kind))
    }
}

impl Default for DefaultsTable {
    fn default() -> Self {
        let entries = RuntimeKind::ALL
            .iter()
            .map(|kind| (*kind, RuntimeDefaults::builtin(*kind)))
            .collect();
        Self { entries }
    }
}

/// Command generation for one container engine family.
///
/// A bridge is stateless apart from the ephemeral container it named in
/// its most recent capture command, which `build_cleanup_command` targets.
pub trait ContainerRuntimeBridge: Send {
    fn kind(&self) -> RuntimeKind;

    fn default_image(&self) -> &str;

    fn default_capture_image(&self) -> &str;

    fn default_socket_path(&self) -> &str;

    /// Whether the target must be addressed by process id.
    ///
    /// When false, `build_inspect_command` and `extract_pid` must not be called.
    fn needs_target_pid(&self) -> bool {
        false
    }

    /// Command that prints the runtime's inspection of a container, asking
    /// the runtime listening on `socket_path`.
    fn build_inspect_command(
        &self,
        _container_id: &str,
        _socket_path: &str,
    ) -> Result<Vec<String>, BridgeError> {
        Err(BridgeError::Unsupported {
            runtime: self.kind().as_str(),
            operation: "build_inspect_command",
        })
    }

    /// Pull the target pid out of the inspection output.
    fn extract_pid(&self, _inspection: &str) -> Result<String, BridgeError> {
        Err(BridgeError::Unsupported {
            runtime: self.kind().as_str(),
            operation: "extract_pid",
        })
    }

    /// Capture from the network namespace of one container.
    fn build_capture_command(
        &mut self,
        container_id: &str,
        interface: &str,
        filter: &str,
        pid: Option<&str>,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError>;

    /// Capture from the host network namespace.
    fn build_node_wide_capture_command(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError>;

    /// Kill the ephemeral container started by the most recent capture command.
    ///
    /// Returns `None` when there is nothing to clean up.
    fn build_cleanup_command(&self) -> Option<Vec<String>>;
}

/// Pick the bridge for an engine.
pub fn bridge_for(kind: RuntimeKind, defaults: RuntimeDefaults) -> Box<dyn ContainerRuntimeBridge> {
    match kind {
        RuntimeKind::Containerd => Box::new(ContainerdBridge::new(defaults)),
        RuntimeKind::Docker => Box::new(DockerBridge::new(defaults)),
        RuntimeKind::Crio => Box::new(CrioBridge::new(defaults)),
    }
}

/// The ephemeral container named by the last capture command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EphemeralContainer {
    pub name: String,
    pub socket_path: String,
}
