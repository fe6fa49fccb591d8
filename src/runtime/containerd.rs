//! containerd bridge.
//!
//! The target's network namespace is looked up with `crictl inspect` and
//! handed to `ctr run --with-ns`, so no pid is needed.

use super::script::{ephemeral_container_name, tcpdump_invocation, CaptureCommand, ScriptBuilder};
use super::{ContainerRuntimeBridge, EphemeralContainer, RuntimeDefaults, RuntimeKind};
use crate::error::BridgeError;
use crate::utils::ensure_shell_token;

pub struct ContainerdBridge {
    defaults: RuntimeDefaults,
    last_container: Option<EphemeralContainer>,
}

impl ContainerdBridge {
    pub fn new(defaults: RuntimeDefaults) -> Self {
        Self {
            defaults,
            last_container: None,
        }
    }

    fn preamble(socket_path: &str) -> ScriptBuilder {
        ScriptBuilder::new()
            .export("CONTAINERD_SOCKET", socket_path)
            .export("CONTAINERD_NAMESPACE", "k8s.io")
            .export("CONTAINER_RUNTIME_ENDPOINT", "unix:///host${CONTAINERD_SOCKET}")
            .export("IMAGE_SERVICE_ENDPOINT", "${CONTAINER_RUNTIME_ENDPOINT}")
    }

    /// Shared tail of both capture variants.
    fn build(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
        netns_lookup: Option<String>,
        ns_flag: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let interface = ensure_shell_token("interface", interface)?;
        let socket_path = ensure_shell_token("socket path", socket_path)?;
        let capture_image = ensure_shell_token("capture image", capture_image)?;

        let name = ephemeral_container_name();
        let tcpdump = tcpdump_invocation(interface, filter);

        let mut script = Self::preamble(socket_path).prefetch(format!("crictl pull {}", capture_image));
        if let Some(lookup) = netns_lookup {
            script = script.line(lookup);
        }
        script = script.line(format!(
            "exec chroot /host ctr -a ${{CONTAINERD_SOCKET}} run --rm {} {} {} {}",
            ns_flag, capture_image, name, tcpdump.command
        ));

        self.last_container = Some(EphemeralContainer {
            name: name.clone(),
            socket_path: socket_path.to_string(),
        });

        Ok(CaptureCommand {
            argv: script.into_command(),
            container_name: name,
            filter_quoting: tcpdump.quoting,
        })
    }
}

impl ContainerRuntimeBridge for ContainerdBridge {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Containerd
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

    fn build_capture_command(
        &mut self,
        container_id: &str,
        interface: &str,
        filter: &str,
        _pid: Option<&str>,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let container_id = ensure_shell_token("container id", container_id)?;
        let lookup = format!(
            "netns=$(crictl inspect {} | jq -r '.info.runtimeSpec.linux.namespaces[] | select(.type == \"network\") | .path')",
            container_id
        );
        self.build(
            interface,
            filter,
            socket_path,
            capture_image,
            Some(lookup),
            "--with-ns \"network:${netns}\"",
        )
    }

    fn build_node_wide_capture_command(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        self.build(interface, filter, socket_path, capture_image, None, "--net-host")
    }

    fn build_cleanup_command(&self) -> Option<Vec<String>> {
        let container = self.last_container.as_ref()?;
        let argv = ScriptBuilder::new()
            .export("CONTAINERD_SOCKET", container.socket_path.as_str())
            .export("CONTAINERD_NAMESPACE", "k8s.io")
            .export("CONTAINER_ID", container.name.as_str())
            .line("chroot /host ctr -a ${CONTAINERD_SOCKET} task kill -s SIGKILL ${CONTAINER_ID}")
            .into_command();
        Some(argv)
    }
}
