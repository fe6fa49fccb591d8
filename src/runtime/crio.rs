//! CRI-O bridge.
//!
//! CRI-O cannot start a container inside an existing sandbox's namespace
//! by handle, so the target is located by pid and the capture container
//! joins `/proc/<pid>/ns/net` through podman on the node.

use serde::Deserialize;

use super::script::{ephemeral_container_name, tcpdump_invocation, CaptureCommand, ScriptBuilder};
use super::{ContainerRuntimeBridge, EphemeralContainer, RuntimeDefaults, RuntimeKind};
use crate::error::BridgeError;
use crate::utils::ensure_shell_token;

#[derive(Debug, Deserialize)]
struct Inspection {
    info: InspectionInfo,
}

#[derive(Debug, Deserialize)]
struct InspectionInfo {
    pid: Option<u64>,
}

pub struct CrioBridge {
    defaults: RuntimeDefaults,
    last_container: Option<EphemeralContainer>,
}

impl CrioBridge {
    pub fn new(defaults: RuntimeDefaults) -> Self {
        Self {
            defaults,
            last_container: None,
        }
    }

    fn build(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
        network: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let interface = ensure_shell_token("interface", interface)?;
        let socket_path = ensure_shell_token("socket path", socket_path)?;
        let capture_image = ensure_shell_token("capture image", capture_image)?;

        let name = ephemeral_container_name();
        let tcpdump = tcpdump_invocation(interface, filter);

        let argv = ScriptBuilder::new()
            .export("CRIO_SOCKET", socket_path)
            .export("CONTAINER_RUNTIME_ENDPOINT", "unix:///host${CRIO_SOCKET}")
            .prefetch(format!("chroot /host podman pull {}", capture_image))
            .line(format!(
                "exec chroot /host podman run --rm --name {} --net {} {} {}",
                name, network, capture_image, tcpdump.command
            ))
            .into_command();

        self.last_container = Some(EphemeralContainer {
            name: name.clone(),
            socket_path: socket_path.to_string(),
        });

        Ok(CaptureCommand {
            argv,
            container_name: name,
            filter_quoting: tcpdump.quoting,
        })
    }
}

impl ContainerRuntimeBridge for CrioBridge {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Crio
    }

    fn default_image(&self) -> &str {
        &self.defaults.helper_image
    }

    fn default_capture_image(&self) -> &str {
        &self.defaults.capture_image
    }

    fn default_socket_path(&self) -> &str {
        &self.defaults.socket_path
    }

    fn needs_target_pid(&self) -> bool {
        true
    }

    fn build_inspect_command(&self, container_id: &str, socket_path: &str) -> Result<Vec<String>, BridgeError> {
        let container_id = ensure_shell_token("container id", container_id)?;
        let socket_path = ensure_shell_token("socket path", socket_path)?;
        // crictl runs chrooted into the host, so the socket path is used as is.
        let argv = ScriptBuilder::new()
            .export("CRIO_SOCKET", socket_path)
            .export("CONTAINER_RUNTIME_ENDPOINT", "unix://${CRIO_SOCKET}")
            .line(format!("chroot /host crictl inspect --output json {}", container_id))
            .into_command();
        Ok(argv)
    }

    fn extract_pid(&self, inspection: &str) -> Result<String, BridgeError> {
        let parsed: Inspection = serde_json::from_str(inspection)
            .map_err(|e| BridgeError::PidExtraction(e.to_string()))?;

        match parsed.info.pid {
            Some(pid) if pid > 0 => Ok(pid.to_string()),
            _ => Err(BridgeError::PidExtraction(
                "inspection output has no running pid".to_string(),
            )),
        }
    }

    fn build_capture_command(
        &mut self,
        _container_id: &str,
        interface: &str,
        filter: &str,
        pid: Option<&str>,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let pid = pid.ok_or_else(|| {
            BridgeError::PidExtraction("cri-o capture requires the target pid".to_string())
        })?;
        if pid.is_empty() || !pid.chars().all(|c| c.is_ascii_digit()) {
            return Err(BridgeError::InvalidIdentifier {
                kind: "pid",
                value: pid.to_string(),
            });
        }

        let network = format!("ns:/proc/{}/ns/net", pid);
        self.build(interface, filter, socket_path, capture_image, &network)
    }

    fn build_node_wide_capture_command(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        self.build(interface, filter, socket_path, capture_image, "host")
    }

    fn build_cleanup_command(&self) -> Option<Vec<String>> {
        let container = self.last_container.as_ref()?;
        let argv = ScriptBuilder::new()
            .export("CONTAINER_ID", container.name.as_str())
            .line("chroot /host podman rm -f ${CONTAINER_ID}")
            .into_command();
        Some(argv)
    }
}
